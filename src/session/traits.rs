use async_trait::async_trait;

use super::messages::OutgoingMessage;
use crate::error::Result;

/// Outbound half of the interception host. Sends are fire-and-forget: a successful return only
/// means the command left this process.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, message: OutgoingMessage) -> Result<()>;
}
