//! Caller identity resolution.
//!
//! The bus hands every method call an opaque caller token (the unique name
//! of the calling connection). [`CallerIdentity`] turns that token into a
//! [`LockOwner`] by asking the transport for the process id behind the
//! connection and the process table for its command line.
//!
//! Resolution is best effort. A token whose pid cannot be resolved still
//! yields an owner (with `pid: None`), so the lock can be taken; such a lock
//! is only released by an explicit `unlock` because the supervisor has no
//! pid to probe.

use tracing::{debug, error};

use crate::error::{IdentityError, Result};
use crate::owner::LockOwner;

/// Transport query for the process behind a bus connection.
///
/// Implemented by the bus layer; the D-Bus equivalent is
/// `GetConnectionUnixProcessID`.
pub trait BusIdentity {
    /// Return the process id owning the connection `caller_token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is unknown or the query fails.
    fn connection_pid(&self, caller_token: &str) -> Result<u32>;
}

impl<T: BusIdentity + ?Sized> BusIdentity for &T {
    fn connection_pid(&self, caller_token: &str) -> Result<u32> {
        (**self).connection_pid(caller_token)
    }
}

impl<T: BusIdentity + ?Sized> BusIdentity for std::sync::Arc<T> {
    fn connection_pid(&self, caller_token: &str) -> Result<u32> {
        (**self).connection_pid(caller_token)
    }
}

/// Process table lookup of a human-readable command line.
pub trait CommandLineSource {
    /// Return the command line of `pid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process table cannot be read.
    fn command_line(&self, pid: u32) -> Result<String>;
}

/// Resolves bus caller tokens into lock owners.
#[derive(Debug, Clone)]
pub struct CallerIdentity<B, C> {
    bus: B,
    process_table: C,
}

impl<B: BusIdentity, C: CommandLineSource> CallerIdentity<B, C> {
    /// Create a resolver over a bus and a process table.
    pub fn new(bus: B, process_table: C) -> Self {
        Self { bus, process_table }
    }

    /// Resolve the process id behind `caller_token`.
    ///
    /// Returns `None` if the token is empty or the transport query fails.
    /// Failures are logged at error level.
    pub fn resolve_pid(&self, caller_token: &str) -> Option<u32> {
        match self.query_pid(caller_token)? {
            Ok(pid) => Some(pid),
            Err(e) => {
                error!(caller = caller_token, error = %e, "Failed to resolve caller pid");
                None
            }
        }
    }

    fn query_pid(&self, caller_token: &str) -> Option<Result<u32>> {
        (!caller_token.is_empty()).then(|| self.bus.connection_pid(caller_token))
    }

    /// Resolve the command line of `pid` for diagnostics.
    ///
    /// Returns an empty string on any failure.
    pub fn resolve_command_line(&self, pid: u32) -> String {
        match self.process_table.command_line(pid) {
            Ok(command) => command.trim().to_string(),
            Err(e) => {
                debug!(pid, error = %e, "Failed to read command line");
                String::new()
            }
        }
    }

    /// Build the owner record for `caller_token`.
    ///
    /// The same token resolves to an equal record as long as the process
    /// behind it is unchanged, which is what `unlock` relies on.
    pub fn resolve_owner(&self, caller_token: &str) -> LockOwner {
        self.owner_with_pid(caller_token, self.resolve_pid(caller_token))
    }

    /// Build the owner record `caller_token` would hold, to find its lock.
    ///
    /// Same record as [`resolve_owner`](Self::resolve_owner), but a failed
    /// pid query is only logged at debug level: it was already reported
    /// when the lock was taken.
    pub fn lookup_owner(&self, caller_token: &str) -> LockOwner {
        let pid = match self.query_pid(caller_token) {
            Some(Ok(pid)) => Some(pid),
            Some(Err(e)) => {
                debug!(caller = caller_token, error = %e, "Caller pid unknown");
                None
            }
            None => None,
        };
        self.owner_with_pid(caller_token, pid)
    }

    fn owner_with_pid(&self, caller_token: &str, pid: Option<u32>) -> LockOwner {
        let command_line = pid
            .map(|pid| self.resolve_command_line(pid))
            .unwrap_or_default();

        LockOwner::new(caller_token, pid, command_line)
    }

    /// Access the underlying bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }
}

/// Fixed token-to-pid table.
///
/// Useful for tests and for embedding the lock in a process whose callers
/// are known up front.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    pids: std::collections::HashMap<String, u32>,
    command_lines: std::collections::HashMap<u32, String>,
}

impl StaticIdentity {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and its process.
    pub fn with_caller(
        mut self,
        caller_token: impl Into<String>,
        pid: u32,
        command_line: impl Into<String>,
    ) -> Self {
        self.pids.insert(caller_token.into(), pid);
        self.command_lines.insert(pid, command_line.into());
        self
    }
}

impl BusIdentity for StaticIdentity {
    fn connection_pid(&self, caller_token: &str) -> Result<u32> {
        if caller_token.is_empty() {
            return Err(IdentityError::EmptyToken);
        }
        self.pids
            .get(caller_token)
            .copied()
            .ok_or_else(|| IdentityError::unknown_connection(caller_token))
    }
}

impl CommandLineSource for StaticIdentity {
    fn command_line(&self, pid: u32) -> Result<String> {
        self.command_lines.get(&pid).cloned().ok_or_else(|| {
            IdentityError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no process {pid}"),
            ))
        })
    }
}
