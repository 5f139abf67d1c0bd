//! Boundary with the game-session collaborator: the notifications it pushes, the commands it
//! accepts, and the snapshot we keep of what it reported.

pub mod messages;
pub mod state;
mod traits;

pub use messages::{decode_line, encode_line, OutgoingMessage, SessionEvent};
pub use state::SessionState;
pub use traits::MessageSink;

#[cfg(test)]
pub mod testing;
#[cfg(test)]
pub use traits::MockMessageSink;
