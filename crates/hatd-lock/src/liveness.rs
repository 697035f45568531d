//! Process liveness probes.
//!
//! The supervisor never talks to the OS directly. It asks a
//! [`LivenessChecker`], so tests can substitute a fake and the production
//! daemon can use [`ProcessTable`], which reads `/proc`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use hatd_core::constants::DEFAULT_PROC_ROOT;

use crate::error::Result;
use crate::identity::CommandLineSource;

/// Outcome of a liveness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    /// The process exists.
    Alive,
    /// The process does not exist.
    Dead,
    /// The probe failed for another reason. The supervisor leaves the slot
    /// alone and checks again on the next tick.
    Unknown(String),
}

/// Side-effect free check of whether a process still exists.
pub trait LivenessChecker {
    /// Probe `pid`.
    fn probe(&self, pid: u32) -> Liveness;
}

impl<T: LivenessChecker + ?Sized> LivenessChecker for &T {
    fn probe(&self, pid: u32) -> Liveness {
        (**self).probe(pid)
    }
}

/// Process table backed by a procfs mount.
///
/// A process is alive while `<root>/<pid>` exists. The command line is read
/// from `<root>/<pid>/cmdline`, whose arguments are NUL separated.
///
/// # Examples
///
/// ```
/// use hatd_lock::{Liveness, LivenessChecker, ProcessTable};
///
/// let table = ProcessTable::default();
/// assert_eq!(table.probe(std::process::id()), Liveness::Alive);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTable {
    root: PathBuf,
}

impl ProcessTable {
    /// Create a process table rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Mount point of the table.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn process_dir(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string())
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl LivenessChecker for ProcessTable {
    fn probe(&self, pid: u32) -> Liveness {
        match std::fs::metadata(self.process_dir(pid)) {
            Ok(_) => Liveness::Alive,
            Err(e) if e.kind() == ErrorKind::NotFound => Liveness::Dead,
            Err(e) => Liveness::Unknown(e.to_string()),
        }
    }
}

impl CommandLineSource for ProcessTable {
    fn command_line(&self, pid: u32) -> Result<String> {
        let raw = std::fs::read(self.process_dir(pid).join("cmdline"))?;
        let command = raw
            .split(|&byte| byte == 0)
            .filter(|arg| !arg.is_empty())
            .map(String::from_utf8_lossy)
            .collect::<Vec<_>>()
            .join(" ");
        Ok(command)
    }
}
