//! Sibling process tracking.
//!
//! Every running instance drops a `<pid>.pid` file in the runtime directory. Counting the live
//! entries tells a new instance how many siblings it has, which decides its port.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, TraderError};

/// Whether `is_alive` can actually tell dead processes apart on this platform. Without it,
/// entries and gates left by a crashed instance are never pruned.
pub const LIVENESS_SUPPORTED: bool = cfg!(unix);

/// Is the process with this id still running?
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None::<Signal>) {
        Ok(()) => true,
        // Exists, owned by someone else
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Every recorded process counts as running
#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    true
}

/// Registration of this process among its siblings, removed on drop
pub struct ProcessRegistry {
    entry: PathBuf,
    siblings: usize,
}

impl ProcessRegistry {
    /// Count live siblings under `runtime_dir`, pruning stale entries, then register this process
    pub fn register(runtime_dir: &Path) -> Result<Self> {
        Self::register_as(runtime_dir, std::process::id())
    }

    fn register_as(runtime_dir: &Path, pid: u32) -> Result<Self> {
        let dir = runtime_dir.join("processes");
        fs::create_dir_all(&dir)?;

        let mut siblings = 0;
        for entry in fs::read_dir(&dir)?.flatten() {
            let path = entry.path();
            let Some(other) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u32>().ok())
            else {
                continue;
            };
            if other == pid {
                continue;
            }
            if is_alive(other) {
                siblings += 1;
            } else {
                debug!(pid = other, "removing stale process entry");
                let _ = fs::remove_file(&path);
            }
        }

        if siblings > 0 && !LIVENESS_SUPPORTED {
            warn!(
                "Cannot check sibling processes on this platform; if no other TraderUp is \
                 running, delete {} and the gate next to it",
                dir.display()
            );
        }

        let entry = dir.join(format!("{pid}.pid"));
        fs::write(&entry, pid.to_string())?;

        Ok(Self { entry, siblings })
    }

    /// Live sibling processes seen at registration
    pub fn siblings(&self) -> usize {
        self.siblings
    }
}

impl Drop for ProcessRegistry {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.entry) {
            warn!("Failed to remove process entry {}: {}", self.entry.display(), e);
        }
    }
}

/// Port for this instance: each sibling shifts the base port by one, up to `max_siblings`
pub fn select_port(base_port: u16, siblings: usize, max_siblings: usize) -> Result<u16> {
    if siblings > max_siblings {
        return Err(TraderError::TooManyProcesses { running: siblings });
    }
    if siblings > 0 {
        info!("There is already an extension using the port {}...", base_port);
    }
    u16::try_from(siblings)
        .ok()
        .and_then(|offset| base_port.checked_add(offset))
        .ok_or_else(|| TraderError::InvalidConfig(format!("no port left above {base_port}")))
}
