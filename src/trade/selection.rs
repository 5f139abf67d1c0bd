use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{TradeItem, TradeTarget};

#[derive(Debug, Default)]
struct Selection {
    target: Option<TradeTarget>,
    item: Option<TradeItem>,
}

/// Operator's choice, shared between the polling loop and the notification handlers.
///
/// The target only ever goes from present to absent; the item can be swapped in place for a
/// fresher trade identifier but is never populated from nothing.
#[derive(Debug, Clone, Default)]
pub struct SharedSelection {
    inner: Arc<RwLock<Selection>>,
}

impl SharedSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn select(&self, target: Option<TradeTarget>, item: Option<TradeItem>) {
        let mut selection = self.inner.write().await;
        selection.target = target;
        selection.item = item;
    }

    /// Consistent view of both halves
    pub async fn snapshot(&self) -> (Option<TradeTarget>, Option<TradeItem>) {
        let selection = self.inner.read().await;
        (selection.target.clone(), selection.item.clone())
    }

    pub async fn is_empty(&self) -> bool {
        let selection = self.inner.read().await;
        selection.target.is_none() && selection.item.is_none()
    }

    /// Drop the target if it sits at `index`, handing back what was dropped
    pub async fn clear_target_if_index(&self, index: i32) -> Option<TradeTarget> {
        let mut selection = self.inner.write().await;
        if selection.target.as_ref().map(|t| t.index) == Some(index) {
            selection.target.take()
        } else {
            None
        }
    }

    /// Swap in a fresher item. Ignored when nothing is selected.
    pub async fn replace_item(&self, item: TradeItem) -> bool {
        let mut selection = self.inner.write().await;
        match selection.item.as_mut() {
            Some(current) => {
                *current = item;
                true
            }
            None => false,
        }
    }
}
