use async_trait::async_trait;
use std::sync::Mutex;

use super::messages::OutgoingMessage;
use super::traits::MessageSink;
use crate::error::Result;

/// Sink that keeps everything it was asked to send
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<OutgoingMessage>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.sent().iter().filter(|m| m.kind() == kind).count()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}
