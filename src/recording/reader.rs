//! Recording file reader
//!
//! A recording is newline-delimited JSON, one sensor message per line.
//! Only image messages become frames; everything else is ignored.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

use crate::model::{ImageFrame, Timestamp};

/// Errors raised while loading a session recording
#[derive(Error, Debug)]
pub enum SessionLoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed message on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Standard message header
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageHeader {
    #[serde(default)]
    pub seq: u32,
    pub stamp: Timestamp,
    #[serde(default)]
    pub frame_id: String,
}

/// Image message body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePayload {
    pub width: u32,
    pub height: u32,
    pub encoding: String,
    pub data: Bytes,
}

/// Message body, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePayload {
    Image(ImagePayload),
    #[serde(other)]
    Other,
}

/// One line of a recording file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedMessage {
    pub topic: String,
    pub header: MessageHeader,
    pub payload: MessagePayload,
}

impl RecordedMessage {
    /// Convert to a frame if this is an image message
    pub fn into_frame(self) -> Option<ImageFrame> {
        match self.payload {
            MessagePayload::Image(image) => Some(ImageFrame {
                seq: self.header.seq,
                stamp: self.header.stamp,
                width: image.width,
                height: image.height,
                encoding: image.encoding,
                data: image.data,
            }),
            MessagePayload::Other => None,
        }
    }
}

/// Load the image frames of a recording, sorted by timestamp
///
/// The sort is stable: frames sharing a timestamp keep file order.
pub fn load_frames(path: &Path) -> Result<Vec<ImageFrame>, SessionLoadError> {
    let reader = BufReader::new(File::open(path)?);
    let mut frames = Vec::new();
    let mut skipped = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let message: RecordedMessage = serde_json::from_str(&line)
            .map_err(|source| SessionLoadError::Malformed { line: index + 1, source })?;

        match message.into_frame() {
            Some(frame) => frames.push(frame),
            None => skipped += 1,
        }
    }

    frames.sort_by_key(|f| f.stamp.as_nanos());

    tracing::debug!(
        "Loaded {} frame(s) from {:?} ({} non-image message(s) ignored)",
        frames.len(),
        path,
        skipped
    );

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn image_line(seq: u32, secs: u32, nsecs: u32) -> String {
        format!(
            r#"{{"topic":"/camera/rgb","header":{{"seq":{seq},"stamp":{{"secs":{secs},"nsecs":{nsecs}}}}},"payload":{{"type":"image","width":2,"height":1,"encoding":"mono8","data":[1,2]}}}}"#
        )
    }

    fn write_recording(lines: &[String]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn frames_are_sorted_by_stamp() {
        let file = write_recording(&[
            image_line(3, 2, 0),
            image_line(1, 1, 5),
            image_line(2, 1, 500),
        ]);

        let frames = load_frames(file.path()).unwrap();
        let seqs: Vec<u32> = frames.iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(&frames[0].data[..], &[1u8, 2][..]);
    }

    #[test]
    fn equal_stamps_keep_file_order() {
        let file = write_recording(&[image_line(9, 1, 0), image_line(4, 1, 0), image_line(7, 0, 0)]);

        let frames = load_frames(file.path()).unwrap();
        let seqs: Vec<u32> = frames.iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![7, 9, 4]);
    }

    #[test]
    fn unnormalized_stamps_sort_by_total_nanos() {
        // 1s + 1.5e9ns lands after 2s
        let file = write_recording(&[image_line(1, 1, 1_500_000_000), image_line(2, 2, 0)]);

        let frames = load_frames(file.path()).unwrap();
        let seqs: Vec<u32> = frames.iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![2, 1]);
    }

    #[test]
    fn non_image_messages_are_ignored() {
        let imu = r#"{"topic":"/imu","header":{"seq":1,"stamp":{"secs":0,"nsecs":1}},"payload":{"type":"imu","accel":[0,0,9.8]}}"#;
        let file = write_recording(&[imu.to_string(), String::new(), image_line(5, 0, 2)]);

        let frames = load_frames(file.path()).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].seq, 5);
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let file = write_recording(&[image_line(1, 0, 0), "{not json".to_string()]);

        match load_frames(file.path()) {
            Err(SessionLoadError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed error, got {:?}", other),
        }
    }
}
