//! Process memory sampling for the reserved report entry.

use std::sync::Mutex;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Reports the memory footprint of the current process in bytes.
pub trait MemoryProbe: Send + Sync {
    fn bytes(&self) -> u64;
}

/// Resident set size of this process, read through `sysinfo`.
///
/// Returns 0 when the platform cannot report it.
pub struct ProcessMemory {
    pid: Option<Pid>,
    sys: Mutex<System>,
}

impl ProcessMemory {
    pub fn new() -> Self {
        Self {
            pid: sysinfo::get_current_pid().ok(),
            sys: Mutex::new(System::new()),
        }
    }
}

impl Default for ProcessMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for ProcessMemory {
    fn bytes(&self) -> u64 {
        let Some(pid) = self.pid else { return 0 };
        let mut sys = self
            .sys
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::new().with_memory(),
        );
        sys.process(pid).map(|p| p.memory()).unwrap_or(0)
    }
}

/// Fixed value, for deterministic reports in tests.
impl MemoryProbe for u64 {
    fn bytes(&self) -> u64 {
        *self
    }
}
