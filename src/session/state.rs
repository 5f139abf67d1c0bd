use tracing::{debug, warn};

use super::messages::SessionEvent;
use crate::domain::{InventoryItem, Room, UserProfile};

/// What the interception host has told us so far about the game session
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub connected: bool,
    pub hotel: Option<String>,
    pub profile: Option<UserProfile>,
    pub room: Option<Room>,
    pub inventory: Option<Vec<InventoryItem>>,
    pub trading: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one notification into the snapshot
    pub fn apply(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Connected { hotel, .. } => {
                self.connected = true;
                self.hotel = Some(hotel.clone());
            }
            SessionEvent::Disconnected => {
                self.connected = false;
                self.trading = false;
            }
            SessionEvent::UserData { profile } => {
                self.profile = Some(profile.clone());
            }
            SessionEvent::RoomEntered { room } => {
                self.room = Some(room.clone());
            }
            SessionEvent::RoomLeft => {
                self.room = None;
                self.trading = false;
            }
            SessionEvent::UsersAdded { users } => match self.room.as_mut() {
                Some(room) => room.add_users(users.iter().cloned()),
                None => debug!("users added outside of a room, ignoring"),
            },
            SessionEvent::UserRemoved { index } => {
                let Ok(index) = index.trim().parse::<i32>() else {
                    warn!(index = %index, "user removed with a non-numeric index");
                    return;
                };
                if let Some(room) = self.room.as_mut() {
                    room.remove_user(index);
                }
            }
            SessionEvent::InventoryLoaded { items } => {
                self.inventory = Some(items.clone());
            }
            SessionEvent::InventoryItemUpdated { item } => {
                let items = self.inventory.get_or_insert_with(Vec::new);
                match items.iter_mut().find(|existing| existing.id == item.id) {
                    Some(existing) => *existing = item.clone(),
                    None => items.push(item.clone()),
                }
            }
            SessionEvent::TradeOpened { .. } => {
                self.trading = true;
            }
            SessionEvent::TradeClosed | SessionEvent::TradeCompleted => {
                self.trading = false;
            }
            SessionEvent::TradeUpdated { .. } | SessionEvent::TradeItemList { .. } => {}
        }
    }

    /// Room names of everyone but the logged-in player
    pub fn users_to_trade(&self) -> Vec<String> {
        match (&self.room, &self.profile) {
            (Some(room), Some(profile)) => room.tradeable_user_names(profile.id),
            _ => Vec::new(),
        }
    }
}
