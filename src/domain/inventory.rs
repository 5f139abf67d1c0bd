use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Furniture entry in the player's inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Inventory identity
    pub id: i64,
    /// Identifier used when offering the item in a trade
    #[serde(default)]
    pub item_id: i64,
    /// Resolved display name
    pub name: String,
    #[serde(default = "default_tradeable")]
    pub tradeable: bool,
}

fn default_tradeable() -> bool {
    true
}

/// Trade-time identifiers must be negative. Positive values are negated, the rest kept as is,
/// so applying this twice gives the same result as applying it once.
pub fn trade_identifier(id: i64) -> i64 {
    if id > 0 {
        -id
    } else {
        id
    }
}

impl InventoryItem {
    /// Copy of this item carrying the trade-time identifier derived from its inventory id
    pub fn with_trade_identifier(mut self) -> Self {
        self.item_id = trade_identifier(self.id);
        self
    }
}

/// Tradeable entries deduplicated by display name, in first-seen order
pub fn tradeable_names(items: &[InventoryItem]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| item.tradeable)
        .filter(|item| seen.insert(item.name.as_str()))
        .map(|item| item.name.clone())
        .collect()
}

/// First tradeable entry named `name`, ignoring case
pub fn find_item<'a>(items: &'a [InventoryItem], name: &str) -> Option<&'a InventoryItem> {
    let wanted = name.to_lowercase();
    items
        .iter()
        .filter(|item| item.tradeable)
        .find(|item| item.name.to_lowercase() == wanted)
}
