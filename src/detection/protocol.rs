//! Wire protocol for the detection services
//!
//! TCP with length-delimited framing; every frame carries one JSON document.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use super::traits::{DetectionError, DetectionResult};
use crate::model::{HandDetection, ImageFrame, PoseDetection};

/// Largest accepted frame (raw images can be big)
pub const MAX_FRAME_LENGTH: usize = 32 * 1024 * 1024;

// --- Message types ---

/// Request sent to either service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRequest {
    pub seq: u32,
    pub width: u32,
    pub height: u32,
    pub encoding: String,
    pub data: Bytes,
}

impl From<&ImageFrame> for DetectionRequest {
    fn from(frame: &ImageFrame) -> Self {
        Self {
            seq: frame.seq,
            width: frame.width,
            height: frame.height,
            encoding: frame.encoding.clone(),
            data: frame.data.clone(),
        }
    }
}

/// Hands service result body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandsReply {
    pub hands: Vec<HandDetection>,
}

/// Pose service result body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoseReply {
    pub pose: Option<PoseDetection>,
}

/// Envelope for every service response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceReply<T> {
    Ok(T),
    Err(String),
}

impl<T> ServiceReply<T> {
    pub fn into_result(self) -> DetectionResult<T> {
        match self {
            ServiceReply::Ok(body) => Ok(body),
            ServiceReply::Err(message) => Err(DetectionError::Service(message)),
        }
    }
}

// --- TCP codec helpers ---

pub type MessageStream = Framed<TcpStream, LengthDelimitedCodec>;

/// Create a framed message stream with length-delimited framing.
pub fn message_stream(stream: TcpStream) -> MessageStream {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec();
    Framed::new(stream, codec)
}

/// Send a serializable message (JSON + length prefix).
pub async fn send_message<T: Serialize>(stream: &mut MessageStream, msg: &T) -> DetectionResult<()> {
    let data = serde_json::to_vec(msg)?;
    stream.send(Bytes::from(data)).await?;
    Ok(())
}

/// Receive and deserialize a message.
pub async fn recv_message<T: DeserializeOwned>(stream: &mut MessageStream) -> DetectionResult<T> {
    match stream.next().await {
        Some(Ok(bytes)) => Ok(serde_json::from_slice(&bytes)?),
        Some(Err(e)) => Err(e.into()),
        None => Err(DetectionError::Disconnected),
    }
}
