use serde::{Deserialize, Serialize};

/// Logged-in player, as reported by the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
}

/// Occupant of the current room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomUser {
    pub id: i64,
    pub name: String,
    /// Session index inside the room; trade commands are addressed by it
    pub index: i32,
}

/// Room the player is standing in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub owner_name: String,
    #[serde(default)]
    pub users: Vec<RoomUser>,
}

impl Room {
    /// Is there anyone other than `self_id` to trade with?
    pub fn has_user_to_trade(&self, self_id: i64) -> bool {
        self.users.iter().any(|u| u.id != self_id)
    }

    /// Occupant names excluding `self_id`, in room order
    pub fn tradeable_user_names(&self, self_id: i64) -> Vec<String> {
        self.users
            .iter()
            .filter(|u| u.id != self_id)
            .map(|u| u.name.clone())
            .collect()
    }

    pub fn find_user(&self, name: &str) -> Option<&RoomUser> {
        let wanted = name.to_lowercase();
        self.users.iter().find(|u| u.name.to_lowercase() == wanted)
    }

    pub fn add_users(&mut self, users: impl IntoIterator<Item = RoomUser>) {
        for user in users {
            match self.users.iter_mut().find(|u| u.index == user.index) {
                Some(existing) => *existing = user,
                None => self.users.push(user),
            }
        }
    }

    pub fn remove_user(&mut self, index: i32) -> Option<RoomUser> {
        let pos = self.users.iter().position(|u| u.index == index)?;
        Some(self.users.remove(pos))
    }
}
