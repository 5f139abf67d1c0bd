//! Trade flow: the operator's selection, the polling loop that opens the trade window, and the
//! notification handlers that offer, accept and confirm.

pub mod handlers;
pub mod orchestrator;
pub mod selection;

pub use handlers::{TradeEventHandler, TradeLatch};
pub use orchestrator::{decide, TickDecision, TradeOrchestrator};
pub use selection::SharedSelection;
