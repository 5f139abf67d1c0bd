pub mod adapters;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod extension;
pub mod logging;
pub mod session;
pub mod trade;

pub use adapters::BridgeClient;
pub use config::AppConfig;
pub use coordination::{
    install_signal_handlers, select_port, NamedGate, ProcessRegistry, Shutdown, ShutdownSignal,
    SyncRole,
};
pub use domain::{OrchestratorState, TradeItem, TradeTarget};
pub use error::{Result, TraderError};
pub use extension::TraderExtension;
pub use session::{MessageSink, OutgoingMessage, SessionEvent, SessionState};
pub use trade::{SharedSelection, TradeEventHandler, TradeOrchestrator};
