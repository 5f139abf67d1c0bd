use serde::{Deserialize, Serialize};

use super::inventory::{trade_identifier, InventoryItem};
use super::room::RoomUser;

/// Counterparty selected by the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeTarget {
    pub id: i64,
    pub name: String,
    pub index: i32,
}

impl From<&RoomUser> for TradeTarget {
    fn from(user: &RoomUser) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            index: user.index,
        }
    }
}

/// Item offered on every trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeItem {
    pub id: i64,
    /// Always negative
    pub trade_id: i64,
    pub name: String,
}

impl From<&InventoryItem> for TradeItem {
    /// Falls back to the inventory id when no trade identifier was reported
    fn from(item: &InventoryItem) -> Self {
        let raw = if item.item_id != 0 { item.item_id } else { item.id };
        Self {
            id: item.id,
            trade_id: trade_identifier(raw),
            name: item.name.clone(),
        }
    }
}

/// One side of an open trade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeOffer {
    pub furni_count: u32,
    #[serde(default)]
    pub credit_count: u32,
}

impl TradeOffer {
    pub fn has_furni(&self) -> bool {
        self.furni_count > 0
    }
}
