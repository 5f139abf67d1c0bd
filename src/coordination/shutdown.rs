//! Run-wide cancellation.
//!
//! One `Shutdown` is threaded through the whole run. Operator aborts and fatal notification
//! errors both trip it; every wait in the run selects on `cancelled()` so pending delays end
//! promptly. The first fatal error recorded is what the top-level handler reports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::TraderError;

/// Why the run is being cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Operator abort (Ctrl+C, SIGTERM)
    Operator,
    /// A notification handler or background task failed
    Fatal,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Operator => write!(f, "operator"),
            ShutdownSignal::Fatal => write!(f, "fatal"),
        }
    }
}

pub struct Shutdown {
    requested: AtomicBool,
    signal_tx: watch::Sender<Option<ShutdownSignal>>,
    fatal: Mutex<Option<TraderError>>,
}

impl Shutdown {
    pub fn new() -> Arc<Self> {
        let (signal_tx, _) = watch::channel(None);
        Arc::new(Self {
            requested: AtomicBool::new(false),
            signal_tx,
            fatal: Mutex::new(None),
        })
    }

    /// Check if shutdown has been requested
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Request shutdown with specified signal type
    pub fn request(&self, signal: ShutdownSignal) {
        if self.requested.swap(true, Ordering::SeqCst) {
            warn!("Shutdown already requested, ignoring duplicate signal: {}", signal);
            return;
        }

        info!("Shutdown requested: {}", signal);
        self.signal_tx.send_replace(Some(signal));
    }

    /// Record a fatal error and cancel the run. Only the first error is kept.
    pub fn fail(&self, error: TraderError) {
        if let Ok(mut slot) = self.fatal.lock() {
            if slot.is_none() {
                *slot = Some(error);
            }
        }
        self.request(ShutdownSignal::Fatal);
    }

    /// Resolves once shutdown has been requested
    pub async fn cancelled(&self) {
        let mut rx = self.signal_tx.subscribe();
        let _ = rx.wait_for(|signal| signal.is_some()).await;
    }

    /// Error explaining why the run was cancelled
    pub fn take_error(&self) -> TraderError {
        self.fatal
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .unwrap_or(TraderError::Cancelled)
    }
}

/// Helper to install OS signal handlers
pub fn install_signal_handlers(shutdown: Arc<Shutdown>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let shutdown_sigterm = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("Received SIGTERM");
                    shutdown_sigterm.request(ShutdownSignal::Operator);
                }
                Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
            }
        });
    }

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C");
                shutdown.request(ShutdownSignal::Operator);
            }
            Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_shutdown_signal_display() {
        assert_eq!(ShutdownSignal::Operator.to_string(), "operator");
        assert_eq!(ShutdownSignal::Fatal.to_string(), "fatal");
    }

    #[tokio::test]
    async fn test_request_wakes_waiters() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_requested());

        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.cancelled().await })
        };

        shutdown.request(ShutdownSignal::Operator);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();

        // Late subscribers see the request too.
        shutdown.cancelled().await;
        assert!(shutdown.is_requested());
    }

    #[tokio::test]
    async fn test_first_fatal_error_wins() {
        let shutdown = Shutdown::new();
        shutdown.fail(TraderError::LeftRoom);
        shutdown.fail(TraderError::SessionLeft("Connection closed".into()));

        assert!(shutdown.is_requested());
        assert!(matches!(shutdown.take_error(), TraderError::LeftRoom));
        assert!(matches!(shutdown.take_error(), TraderError::Cancelled));
    }

    #[test]
    fn test_operator_abort_reports_cancelled() {
        let shutdown = Shutdown::new();
        shutdown.request(ShutdownSignal::Operator);
        assert!(matches!(shutdown.take_error(), TraderError::Cancelled));
    }
}
