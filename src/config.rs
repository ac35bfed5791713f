//! Process configuration
//!
//! Read once at startup from the command line (or `LANDMARK_REPLAY_*`
//! environment variables) and fixed for the lifetime of the process.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::recording::SessionFilter;

/// Fastest intake polling rate accepted (1 ms period)
pub const MAX_POLL_RATE_HZ: u32 = 1000;

/// Invalid or missing configuration; always fatal
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Input directory {0:?} does not exist or is not a directory")]
    InputDir(PathBuf),

    #[error("Cannot create output directory {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot list input directory {path:?}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Parser, Debug, Clone)]
#[command(name = "landmark-replay")]
#[command(version)]
#[command(about = "Replay session recordings through hand and pose landmark services", long_about = None)]
pub struct PipelineConfig {
    /// Directory holding the session recordings
    #[arg(long, env = "LANDMARK_REPLAY_INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Directory receiving one JSON artifact per session
    #[arg(long, env = "LANDMARK_REPLAY_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Image topic the dispatcher listens on
    #[arg(long, env = "LANDMARK_REPLAY_INPUT_IMAGE_TOPIC")]
    pub input_image_topic: String,

    /// Image topic the replay publishes on
    #[arg(long, env = "LANDMARK_REPLAY_OUTPUT_IMAGE_TOPIC")]
    pub output_image_topic: String,

    /// Extension of recording files
    #[arg(long, env = "LANDMARK_REPLAY_RECORDING_EXTENSION", default_value = "bag")]
    pub recording_extension: String,

    /// Hand landmark service address
    #[arg(long, env = "LANDMARK_REPLAY_HANDS_ENDPOINT", default_value = "127.0.0.1:7001")]
    pub hands_endpoint: String,

    /// Pose landmark service address
    #[arg(long, env = "LANDMARK_REPLAY_POSE_ENDPOINT", default_value = "127.0.0.1:7002")]
    pub pose_endpoint: String,

    /// Intake checks per second
    #[arg(long, env = "LANDMARK_REPLAY_POLL_RATE_HZ", default_value_t = 20)]
    pub poll_rate_hz: u32,

    /// Deadline for each detection request
    #[arg(long, env = "LANDMARK_REPLAY_REQUEST_TIMEOUT_MS", default_value_t = 5000)]
    pub request_timeout_ms: u64,

    /// Wait before retrying a failed artifact write
    #[arg(long, env = "LANDMARK_REPLAY_FLUSH_RETRY_BACKOFF_MS", default_value_t = 500)]
    pub flush_retry_backoff_ms: u64,

    /// Interval between connection attempts while waiting for the services
    #[arg(long, env = "LANDMARK_REPLAY_READINESS_RETRY_MS", default_value_t = 1000)]
    pub readiness_retry_ms: u64,

    /// Only replay these objects (repeatable)
    #[arg(long = "object")]
    pub objects: Vec<String>,

    /// Only replay these people (repeatable)
    #[arg(long = "person")]
    pub people: Vec<String>,

    /// Only replay these session indices (repeatable)
    #[arg(long = "session")]
    pub sessions: Vec<String>,

    /// Write a JSON run summary here
    #[arg(long = "summary", env = "LANDMARK_REPLAY_SUMMARY")]
    pub summary_path: Option<PathBuf>,
}

impl PipelineConfig {
    /// Config with defaults for everything but the required fields
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        image_topic: impl Into<String>,
    ) -> Self {
        let image_topic = image_topic.into();
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            input_image_topic: image_topic.clone(),
            output_image_topic: image_topic,
            recording_extension: "bag".to_string(),
            hands_endpoint: "127.0.0.1:7001".to_string(),
            pose_endpoint: "127.0.0.1:7002".to_string(),
            poll_rate_hz: 20,
            request_timeout_ms: 5000,
            flush_retry_backoff_ms: 500,
            readiness_retry_ms: 1000,
            objects: Vec::new(),
            people: Vec::new(),
            sessions: Vec::new(),
            summary_path: None,
        }
    }

    /// Check the configuration and prepare the output directory
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.input_dir.is_dir() {
            return Err(ConfigError::InputDir(self.input_dir.clone()));
        }

        for (field, value) in [
            ("input_image_topic", &self.input_image_topic),
            ("output_image_topic", &self.output_image_topic),
            ("recording_extension", &self.recording_extension),
            ("hands_endpoint", &self.hands_endpoint),
            ("pose_endpoint", &self.pose_endpoint),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must not be empty".to_string(),
                });
            }
        }

        if self.input_image_topic != self.output_image_topic {
            return Err(ConfigError::Invalid {
                field: "output_image_topic",
                reason: format!(
                    "replayed frames on {} would never reach the dispatcher listening on {}",
                    self.output_image_topic, self.input_image_topic
                ),
            });
        }

        if !(1..=MAX_POLL_RATE_HZ).contains(&self.poll_rate_hz) {
            return Err(ConfigError::Invalid {
                field: "poll_rate_hz",
                reason: format!("must be between 1 and {}", MAX_POLL_RATE_HZ),
            });
        }

        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_ms",
                reason: "must be at least 1".to_string(),
            });
        }

        std::fs::create_dir_all(&self.output_dir).map_err(|source| ConfigError::OutputDir {
            path: self.output_dir.clone(),
            source,
        })?;

        Ok(())
    }

    /// Period of the intake polling loop, never shorter than 1 ms
    pub fn poll_interval(&self) -> Duration {
        let hz = self.poll_rate_hz.clamp(1, MAX_POLL_RATE_HZ);
        Duration::from_micros(1_000_000 / hz as u64)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn flush_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.flush_retry_backoff_ms)
    }

    pub fn readiness_retry(&self) -> Duration {
        Duration::from_millis(self.readiness_retry_ms)
    }

    pub fn session_filter(&self) -> SessionFilter {
        SessionFilter {
            objects: self.objects.clone(),
            people: self.people.clone(),
            sessions: self.sessions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_command_line() {
        let config = PipelineConfig::try_parse_from([
            "landmark-replay",
            "--input-dir",
            "/data/bags",
            "--output-dir",
            "/data/out",
            "--input-image-topic",
            "/replay/image",
            "--output-image-topic",
            "/replay/image",
            "--object",
            "cube",
            "--object",
            "phone",
            "--request-timeout-ms",
            "250",
        ])
        .unwrap();

        assert_eq!(config.poll_rate_hz, 20);
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
        assert_eq!(config.session_filter().objects, vec!["cube", "phone"]);
        assert_eq!(config.recording_extension, "bag");
    }

    #[test]
    fn missing_input_dir_is_rejected() {
        let out = tempdir().unwrap();
        let config = PipelineConfig::new("/definitely/not/here", out.path(), "img");
        assert!(matches!(config.validate(), Err(ConfigError::InputDir(_))));
    }

    #[test]
    fn mismatched_topics_are_rejected() {
        let input = tempdir().unwrap();
        let out = tempdir().unwrap();
        let mut config = PipelineConfig::new(input.path(), out.path(), "img");
        config.output_image_topic = "other".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "output_image_topic", .. })
        ));
    }

    #[test]
    fn poll_rate_must_stay_within_bounds() {
        let input = tempdir().unwrap();
        let out = tempdir().unwrap();
        let mut config = PipelineConfig::new(input.path(), out.path(), "img");

        for rate in [0, MAX_POLL_RATE_HZ + 1, 2_000_000] {
            config.poll_rate_hz = rate;
            assert!(matches!(
                config.validate(),
                Err(ConfigError::Invalid { field: "poll_rate_hz", .. })
            ));
            assert!(config.poll_interval() >= Duration::from_millis(1));
        }

        config.poll_rate_hz = MAX_POLL_RATE_HZ;
        config.validate().unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn validation_creates_output_dir() {
        let input = tempdir().unwrap();
        let out = tempdir().unwrap();
        let nested = out.path().join("a/b");
        let config = PipelineConfig::new(input.path(), &nested, "img");
        config.validate().unwrap();
        assert!(nested.is_dir());
    }
}
