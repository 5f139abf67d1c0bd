//! Coordination between the two cooperating processes and across the run:
//! - Named startup gate deciding which process opens trades
//! - Sibling process registry deciding the port
//! - Run-wide cancellation

pub mod gate;
pub mod process;
pub mod shutdown;

pub use gate::{NamedGate, SyncRole};
pub use process::{select_port, ProcessRegistry};
pub use shutdown::{install_signal_handlers, Shutdown, ShutdownSignal};
