pub mod inventory;
pub mod room;
pub mod state;
pub mod trade;

pub use inventory::*;
pub use room::*;
pub use state::*;
pub use trade::*;
