//! Messages exchanged with the interception bridge.
//!
//! One JSON object per line, discriminated by `type`.

use serde::{Deserialize, Serialize};

use crate::domain::{InventoryItem, Room, RoomUser, TradeOffer, UserProfile};
use crate::error::{Result, TraderError};

/// Notification pushed by the interception host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Game client attached to the interception host
    Connected {
        hotel: String,
        #[serde(default)]
        client_identifier: String,
        #[serde(default)]
        client_version: String,
    },
    /// Game client went away
    Disconnected,
    UserData {
        profile: UserProfile,
    },
    RoomEntered {
        room: Room,
    },
    RoomLeft,
    UsersAdded {
        users: Vec<RoomUser>,
    },
    /// Carries the session index as the game sends it: a string
    UserRemoved {
        index: String,
    },
    InventoryLoaded {
        items: Vec<InventoryItem>,
    },
    InventoryItemUpdated {
        item: InventoryItem,
    },
    TradeOpened {
        initiator: bool,
        partner_id: i64,
    },
    TradeUpdated {
        self_offer: TradeOffer,
        partner_offer: TradeOffer,
    },
    TradeItemList {
        first: TradeOffer,
        second: TradeOffer,
    },
    TradeClosed,
    TradeCompleted,
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Connected { .. } => "connected",
            SessionEvent::Disconnected => "disconnected",
            SessionEvent::UserData { .. } => "user_data",
            SessionEvent::RoomEntered { .. } => "room_entered",
            SessionEvent::RoomLeft => "room_left",
            SessionEvent::UsersAdded { .. } => "users_added",
            SessionEvent::UserRemoved { .. } => "user_removed",
            SessionEvent::InventoryLoaded { .. } => "inventory_loaded",
            SessionEvent::InventoryItemUpdated { .. } => "inventory_item_updated",
            SessionEvent::TradeOpened { .. } => "trade_opened",
            SessionEvent::TradeUpdated { .. } => "trade_updated",
            SessionEvent::TradeItemList { .. } => "trade_item_list",
            SessionEvent::TradeClosed => "trade_closed",
            SessionEvent::TradeCompleted => "trade_completed",
        }
    }
}

/// Command sent to the interception host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    RequestUserData,
    RequestInventory,
    /// Open a trade with the user at `index`
    TradeUser {
        index: i32,
    },
    OfferTradeItems {
        item_ids: Vec<i64>,
    },
    CloseTrade,
    AcceptTrade,
    ConfirmAcceptTrade,
}

impl OutgoingMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutgoingMessage::RequestUserData => "request_user_data",
            OutgoingMessage::RequestInventory => "request_inventory",
            OutgoingMessage::TradeUser { .. } => "trade_user",
            OutgoingMessage::OfferTradeItems { .. } => "offer_trade_items",
            OutgoingMessage::CloseTrade => "close_trade",
            OutgoingMessage::AcceptTrade => "accept_trade",
            OutgoingMessage::ConfirmAcceptTrade => "confirm_accept_trade",
        }
    }
}

/// Serialize a command as one newline-terminated line
pub fn encode_line(message: &OutgoingMessage) -> Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Parse one bridge line. Blank lines yield `None`.
pub fn decode_line(line: &str) -> Result<Option<SessionEvent>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| TraderError::Protocol(format!("{e}: {trimmed}")))
}
