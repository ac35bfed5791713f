//! In-process image topics
//!
//! The replay side publishes frames on a named topic; the dispatcher
//! subscribes to its input topic with a single-slot holding area. Publishing
//! is fire-and-forget: a topic with no subscriber silently drops frames.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::dispatch::FrameSlot;
use crate::model::ImageFrame;

/// Topic registry shared by publishers and subscribers
#[derive(Clone, Default)]
pub struct FrameBus {
    topics: Arc<RwLock<HashMap<String, Vec<Arc<FrameSlot>>>>>,
}

impl FrameBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a fresh holding slot to `topic`
    pub fn subscribe(&self, topic: &str) -> Arc<FrameSlot> {
        let slot = Arc::new(FrameSlot::new());
        self.topics
            .write()
            .entry(topic.to_string())
            .or_default()
            .push(Arc::clone(&slot));
        tracing::debug!("Subscribed to image topic {}", topic);
        slot
    }

    /// Create a publisher for `topic`
    pub fn publisher(&self, topic: &str) -> FramePublisher {
        FramePublisher {
            topic: topic.to_string(),
            bus: self.clone(),
        }
    }

    fn deliver(&self, topic: &str, frame: ImageFrame) -> usize {
        let topics = self.topics.read();
        let Some(slots) = topics.get(topic) else {
            return 0;
        };

        for slot in slots {
            if let Some(replaced) = slot.offer(frame.clone()) {
                tracing::debug!(
                    "Frame {} on {} overwritten before dispatch",
                    replaced.seq,
                    topic
                );
            }
        }
        slots.len()
    }
}

/// Publishing handle bound to one topic
#[derive(Clone)]
pub struct FramePublisher {
    topic: String,
    bus: FrameBus,
}

impl FramePublisher {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish a frame, returning how many subscribers received it
    pub fn publish(&self, frame: ImageFrame) -> usize {
        self.bus.deliver(&self.topic, frame)
    }
}
