//! Lock owner records.

use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// The process holding a priority slot.
///
/// Owners are compared by full content: two records are the same owner only
/// if the caller token, pid and command line all match. This is what lets
/// `unlock` find a slot by re-resolving the caller instead of remembering
/// the priority it locked at.
///
/// # Examples
///
/// ```
/// use hatd_lock::LockOwner;
///
/// let owner = LockOwner::new(":1.42", Some(1234), "python3 cpu_monitor.py");
/// assert_eq!(owner.to_string(), "python3 cpu_monitor.py (pid 1234)");
/// assert!(owner.token_matches(":1.42"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockOwner {
    /// Unique bus name of the connection that took the lock.
    pub caller_token: String,

    /// Process id behind the connection, if it could be resolved.
    pub pid: Option<u32>,

    /// Command line of the process, for diagnostics only.
    pub command_line: String,
}

impl LockOwner {
    /// Create a new owner record.
    pub fn new(
        caller_token: impl Into<String>,
        pid: Option<u32>,
        command_line: impl Into<String>,
    ) -> Self {
        Self {
            caller_token: caller_token.into(),
            pid,
            command_line: command_line.into(),
        }
    }

    /// Whether this record can be stored in a slot.
    ///
    /// An owner without a caller token is the "no data" value and is
    /// rejected by the lock table.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.caller_token.is_empty()
    }

    /// Compare a presented token with this owner's token.
    ///
    /// Tokens double as delegation credentials for `*_with_token` calls, so
    /// the comparison runs in constant time.
    #[must_use]
    pub fn token_matches(&self, presented: &str) -> bool {
        self.caller_token
            .as_bytes()
            .ct_eq(presented.as_bytes())
            .into()
    }
}

impl fmt::Display for LockOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let command = if self.command_line.is_empty() {
            self.caller_token.as_str()
        } else {
            self.command_line.as_str()
        };

        match self.pid {
            Some(pid) => write!(f, "{command} (pid {pid})"),
            None => write!(f, "{command} (pid unknown)"),
        }
    }
}
