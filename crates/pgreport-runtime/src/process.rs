//! Process-group handle for pipeline stages

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use pgreport_core::{Error, Result};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct GroupState {
    pgids: Vec<u32>,
    terminated: bool,
}

/// Process groups of one pipeline
///
/// Every stage is spawned as the leader of its own group, so killing the
/// group also takes down whatever the stage spawned. Once terminated, any
/// group added later is killed on arrival.
#[derive(Debug, Clone, Default)]
pub struct ProcessGroups {
    state: Arc<Mutex<GroupState>>,
}

impl ProcessGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new group. Returns false if the handle was already
    /// terminated, in which case the group has just been killed.
    pub fn add(&self, pgid: u32) -> bool {
        let mut state = self.state.lock();
        if state.terminated {
            drop(state);
            if let Err(e) = kill_group(pgid) {
                warn!("Failed to kill late process group {}: {}", pgid, e);
            }
            return false;
        }
        state.pgids.push(pgid);
        true
    }

    /// Stop tracking a group whose leader has been reaped, so its id is
    /// never signalled after the kernel may have reused it
    pub fn remove(&self, pgid: u32) {
        self.state.lock().pgids.retain(|p| *p != pgid);
    }

    pub fn pgids(&self) -> Vec<u32> {
        self.state.lock().pgids.clone()
    }

    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminated
    }

    /// SIGKILL every tracked group
    ///
    /// Returns the number of groups signalled. Fails only when groups were
    /// tracked and none of them could be signalled.
    pub fn terminate(&self) -> Result<usize> {
        // Held while signalling so `remove` cannot interleave
        let mut state = self.state.lock();
        state.terminated = true;

        let mut signalled = 0;
        let mut errors = Vec::new();
        for pgid in &state.pgids {
            match kill_group(*pgid) {
                Ok(()) => {
                    debug!("Killed process group {}", pgid);
                    signalled += 1;
                }
                Err(e) => errors.push(format!("group {}: {}", pgid, e)),
            }
        }

        drop(state);

        if signalled == 0 && !errors.is_empty() {
            return Err(Error::ProcessSignal(errors.join(", ")));
        }
        for e in &errors {
            debug!("Process {} already gone", e);
        }
        Ok(signalled)
    }
}

fn kill_group(pgid: u32) -> std::result::Result<(), Errno> {
    let pgid = i32::try_from(pgid).map_err(|_| Errno::EINVAL)?;
    killpg(Pid::from_raw(pgid), Signal::SIGKILL)
}
