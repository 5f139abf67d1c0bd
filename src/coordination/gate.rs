//! Host-wide startup gate shared by the two cooperating processes.
//!
//! A manual-reset binary signal, named and visible to every process on the host, realised as a
//! directory in the runtime dir. `create_dir` is atomic, so exactly one process creates the gate
//! and every later one attaches. The gate is set while its `ready` marker exists.
//!
//! The creator is the signaler: it sets the gate at its ready point and never waits. The
//! attacher is the waiter: it blocks until the gate is set and is then the only process allowed
//! to open trades.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::process::{is_alive, LIVENESS_SUPPORTED};
use super::shutdown::Shutdown;
use crate::error::{Result, TraderError};

const OWNER_FILE: &str = "owner.json";
const READY_FILE: &str = "ready";

/// Which side of the startup handshake this process plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRole {
    /// Created the gate: sets it, never waits, never opens trades
    Signaler,
    /// Attached to an existing gate: waits for it, then opens trades
    Waiter,
}

impl SyncRole {
    pub fn is_active_sender(&self) -> bool {
        matches!(self, SyncRole::Waiter)
    }
}

impl std::fmt::Display for SyncRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncRole::Signaler => write!(f, "signaler"),
            SyncRole::Waiter => write!(f, "waiter"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GateOwner {
    pid: u32,
    instance: Uuid,
    created_at: DateTime<Utc>,
}

pub struct NamedGate {
    path: PathBuf,
    role: SyncRole,
    instance: Uuid,
    poll: Duration,
}

impl NamedGate {
    /// Create the gate `name` under `dir`, or attach to it if a live process already created it
    pub fn create_or_attach(dir: &Path, name: &str, poll: Duration) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{name}.gate"));
        let instance = Uuid::new_v4();

        let role = match try_create(&path, instance)? {
            true => SyncRole::Signaler,
            false if is_stale(&path) => {
                warn!(gate = %path.display(), "removing gate left behind by a dead process");
                let _ = fs::remove_dir_all(&path);
                if try_create(&path, instance)? {
                    SyncRole::Signaler
                } else {
                    SyncRole::Waiter
                }
            }
            false => {
                if !LIVENESS_SUPPORTED {
                    warn!(
                        gate = %path.display(),
                        "Attaching to an existing gate; delete it if no other TraderUp is running"
                    );
                }
                SyncRole::Waiter
            }
        };

        debug!(gate = %path.display(), role = %role, "startup gate ready");
        Ok(Self {
            path,
            role,
            instance,
            poll,
        })
    }

    pub fn role(&self) -> SyncRole {
        self.role
    }

    /// Did this process create the gate?
    pub fn created(&self) -> bool {
        self.role == SyncRole::Signaler
    }

    pub fn is_set(&self) -> bool {
        self.path.join(READY_FILE).exists()
    }

    /// Set the gate, waking every waiter. Stays set until `reset`.
    pub fn set(&self) -> Result<()> {
        fs::write(self.path.join(READY_FILE), Utc::now().to_rfc3339())
            .map_err(|e| TraderError::Gate(format!("cannot set {}: {e}", self.path.display())))
    }

    pub fn reset(&self) -> Result<()> {
        match fs::remove_file(self.path.join(READY_FILE)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Block until the gate is set. No timeout; only cancellation ends the wait early.
    pub async fn wait(&self, shutdown: &Shutdown) -> Result<()> {
        loop {
            if self.is_set() {
                return Ok(());
            }
            if !self.path.exists() {
                return Err(TraderError::Gate(format!(
                    "{} was removed before it was set",
                    self.path.display()
                )));
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll) => {}
                _ = shutdown.cancelled() => return Err(shutdown.take_error()),
            }
        }
    }

    /// Reach the ready point: the signaler sets the gate, the waiter blocks until it is set
    pub async fn arrive(&self, shutdown: &Shutdown) -> Result<()> {
        match self.role {
            SyncRole::Signaler => {
                self.set()?;
                info!("Signaled the other process, waiting for it to open the trade");
                Ok(())
            }
            SyncRole::Waiter => {
                info!("Waiting for the other process to be ready...");
                self.wait(shutdown).await
            }
        }
    }
}

impl Drop for NamedGate {
    fn drop(&mut self) {
        if !self.created() || read_owner(&self.path).map(|o| o.instance) != Some(self.instance) {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!("Failed to remove gate {}: {}", self.path.display(), e);
        }
    }
}

fn try_create(path: &Path, instance: Uuid) -> Result<bool> {
    match fs::create_dir(path) {
        Ok(()) => {
            let owner = GateOwner {
                pid: std::process::id(),
                instance,
                created_at: Utc::now(),
            };
            fs::write(path.join(OWNER_FILE), serde_json::to_vec(&owner)?)?;
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn read_owner(path: &Path) -> Option<GateOwner> {
    let raw = fs::read(path.join(OWNER_FILE)).ok()?;
    serde_json::from_slice(&raw).ok()
}

/// A gate whose owner record is missing is being created right now, so it is not stale.
fn is_stale(path: &Path) -> bool {
    match read_owner(path) {
        Some(owner) => owner.pid != std::process::id() && !is_alive(owner.pid),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::shutdown::ShutdownSignal;
    use std::sync::Arc;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("traderup-gate-{}", Uuid::new_v4()))
    }

    const POLL: Duration = Duration::from_millis(10);

    #[test]
    fn test_first_creates_second_attaches() {
        let dir = scratch_dir();
        let first = NamedGate::create_or_attach(&dir, "Sync", POLL).unwrap();
        let second = NamedGate::create_or_attach(&dir, "Sync", POLL).unwrap();

        assert!(first.created());
        assert_eq!(first.role(), SyncRole::Signaler);
        assert!(!first.role().is_active_sender());
        assert_eq!(second.role(), SyncRole::Waiter);
        assert!(second.role().is_active_sender());

        drop(second);
        drop(first);
        assert!(!dir.join("Sync.gate").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_manual_reset() {
        let dir = scratch_dir();
        let gate = NamedGate::create_or_attach(&dir, "Sync", POLL).unwrap();
        assert!(!gate.is_set());

        gate.set().unwrap();
        assert!(gate.is_set());
        // Stays set until reset
        assert!(gate.is_set());

        gate.reset().unwrap();
        gate.reset().unwrap();
        assert!(!gate.is_set());

        drop(gate);
        let _ = fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_gate_is_recreated() {
        let dir = scratch_dir();
        let path = dir.join("Sync.gate");
        fs::create_dir_all(&path).unwrap();
        let owner = GateOwner {
            pid: 2_147_483_000,
            instance: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        fs::write(path.join(OWNER_FILE), serde_json::to_vec(&owner).unwrap()).unwrap();

        let gate = NamedGate::create_or_attach(&dir, "Sync", POLL).unwrap();
        assert_eq!(gate.role(), SyncRole::Signaler);

        drop(gate);
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_signaler_never_blocks() {
        let dir = scratch_dir();
        let shutdown = Shutdown::new();
        let gate = NamedGate::create_or_attach(&dir, "Sync", POLL).unwrap();

        tokio::time::timeout(Duration::from_millis(200), gate.arrive(&shutdown))
            .await
            .expect("signaler must not wait")
            .unwrap();
        assert!(gate.is_set());

        drop(gate);
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_waiter_blocks_until_set() {
        let dir = scratch_dir();
        let shutdown = Shutdown::new();
        let signaler = NamedGate::create_or_attach(&dir, "Sync", POLL).unwrap();
        let waiter = Arc::new(NamedGate::create_or_attach(&dir, "Sync", POLL).unwrap());

        let task = {
            let waiter = waiter.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { waiter.arrive(&shutdown).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        signaler.arrive(&shutdown).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("waiter should wake once set")
            .unwrap()
            .unwrap();

        drop(waiter);
        drop(signaler);
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_wait_is_cancellable() {
        let dir = scratch_dir();
        let shutdown = Shutdown::new();
        let _signaler = NamedGate::create_or_attach(&dir, "Sync", POLL).unwrap();
        let waiter = NamedGate::create_or_attach(&dir, "Sync", POLL).unwrap();

        shutdown.request(ShutdownSignal::Operator);
        let result = waiter.wait(&shutdown).await;
        assert!(matches!(result, Err(TraderError::Cancelled)));

        let _ = fs::remove_dir_all(&dir);
    }
}
