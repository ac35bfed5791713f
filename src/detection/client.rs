//! TCP clients for the landmark services

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use super::protocol::{
    self, DetectionRequest, HandsReply, MessageStream, PoseReply, ServiceReply,
};
use super::traits::{DetectionResult, HandDetector, PoseDetector};
use crate::model::{HandDetection, ImageFrame, PoseDetection};

/// One persistent connection to a detection service
///
/// The stream is taken out of its slot for the duration of an exchange and
/// only put back once a full reply was read. A request that is abandoned
/// midway (timeout) therefore closes the connection instead of leaving a
/// stale reply behind for the next request.
pub struct ServiceClient {
    name: &'static str,
    addr: String,
    retry_interval: Duration,
    connection: Mutex<Option<MessageStream>>,
}

impl ServiceClient {
    pub fn new(name: &'static str, addr: impl Into<String>, retry_interval: Duration) -> Self {
        Self {
            name,
            addr: addr.into(),
            retry_interval,
            connection: Mutex::new(None),
        }
    }

    async fn connect(&self) -> DetectionResult<MessageStream> {
        let stream = TcpStream::connect(&self.addr).await?;
        stream.set_nodelay(true)?;
        Ok(protocol::message_stream(stream))
    }

    /// Retry connecting until the service answers
    pub async fn wait_until_ready(&self) -> DetectionResult<()> {
        let mut attempts = 0u32;
        loop {
            match self.connect().await {
                Ok(stream) => {
                    *self.connection.lock().await = Some(stream);
                    tracing::info!("{} service ready at {}", self.name, self.addr);
                    return Ok(());
                }
                Err(e) => {
                    attempts += 1;
                    if attempts == 1 || attempts % 10 == 0 {
                        tracing::info!(
                            "Waiting for {} service at {} ({})",
                            self.name,
                            self.addr,
                            e
                        );
                    }
                    tokio::time::sleep(self.retry_interval).await;
                }
            }
        }
    }

    /// Send one request and read its reply
    pub async fn call<T: DeserializeOwned>(&self, request: &DetectionRequest) -> DetectionResult<T> {
        let mut slot = self.connection.lock().await;
        let mut stream = match slot.take() {
            Some(stream) => stream,
            None => {
                tracing::debug!("Reconnecting to {} service at {}", self.name, self.addr);
                self.connect().await?
            }
        };

        protocol::send_message(&mut stream, request).await?;
        let reply: ServiceReply<T> = protocol::recv_message(&mut stream).await?;

        *slot = Some(stream);
        reply.into_result()
    }
}

/// Hand detector reached over TCP
pub struct RemoteHandDetector {
    client: ServiceClient,
}

impl RemoteHandDetector {
    pub fn new(addr: impl Into<String>, retry_interval: Duration) -> Self {
        Self {
            client: ServiceClient::new("hands", addr, retry_interval),
        }
    }
}

#[async_trait]
impl HandDetector for RemoteHandDetector {
    async fn wait_until_ready(&self) -> DetectionResult<()> {
        self.client.wait_until_ready().await
    }

    async fn detect_hands(&self, frame: &ImageFrame) -> DetectionResult<Vec<HandDetection>> {
        let reply: HandsReply = self.client.call(&DetectionRequest::from(frame)).await?;
        Ok(reply.hands)
    }
}

/// Pose detector reached over TCP
pub struct RemotePoseDetector {
    client: ServiceClient,
}

impl RemotePoseDetector {
    pub fn new(addr: impl Into<String>, retry_interval: Duration) -> Self {
        Self {
            client: ServiceClient::new("pose", addr, retry_interval),
        }
    }
}

#[async_trait]
impl PoseDetector for RemotePoseDetector {
    async fn wait_until_ready(&self) -> DetectionResult<()> {
        self.client.wait_until_ready().await
    }

    async fn detect_pose(&self, frame: &ImageFrame) -> DetectionResult<Option<PoseDetection>> {
        let reply: PoseReply = self.client.call(&DetectionRequest::from(frame)).await?;
        Ok(reply.pose)
    }
}
