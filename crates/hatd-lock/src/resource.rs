//! Lockable resource façade.
//!
//! A [`LockableResource`] is what a hardware service embeds to let clients
//! lock its API. It ties together the lock table, the caller identity
//! resolver and the stale lock supervisor, and answers the admission
//! question asked before every mutating hardware call.
//!
//! All operations return plain `bool`/`String` sentinels. Nothing here
//! returns an error to the caller: a bad request from one client must not
//! take the shared service down.
//!
//! # Examples
//!
//! ```
//! use hatd_lock::{CallerIdentity, LockSupervisor, LockableResource, StaticIdentity};
//! use hatd_lock::{Liveness, LivenessChecker};
//!
//! struct AlwaysAlive;
//! impl LivenessChecker for AlwaysAlive {
//!     fn probe(&self, _pid: u32) -> Liveness {
//!         Liveness::Alive
//!     }
//! }
//!
//! let callers = StaticIdentity::new()
//!     .with_caller(":1.1", 100, "anim")
//!     .with_caller(":1.2", 200, "settings");
//! let mut ring = LockableResource::new(
//!     "LED ring",
//!     10,
//!     CallerIdentity::new(callers.clone(), callers),
//!     LockSupervisor::new(AlwaysAlive),
//! );
//!
//! assert_eq!(ring.lock(2, ":1.1"), ":1.1");
//! assert!(ring.admits(":1.1"));
//! assert!(!ring.admits(":1.2"));
//! assert!(ring.unlock(":1.1"));
//! assert!(ring.admits(":1.2"));
//! ```

use tracing::{debug, info};

use crate::identity::{BusIdentity, CallerIdentity, CommandLineSource};
use crate::liveness::LivenessChecker;
use crate::priority::PriorityLock;
use crate::supervisor::{LockSupervisor, TickOutcome};

/// Lock surface of a hardware service.
#[derive(Debug)]
pub struct LockableResource<B, C, L> {
    name: String,
    locks: PriorityLock,
    identity: CallerIdentity<B, C>,
    supervisor: LockSupervisor<L>,
}

impl<B, C, L> LockableResource<B, C, L>
where
    B: BusIdentity,
    C: CommandLineSource,
    L: LivenessChecker,
{
    /// Create an unlocked resource with slots `1..=max_priority`.
    pub fn new(
        name: impl Into<String>,
        max_priority: u8,
        identity: CallerIdentity<B, C>,
        supervisor: LockSupervisor<L>,
    ) -> Self {
        Self {
            name: name.into(),
            locks: PriorityLock::new(max_priority),
            identity,
            supervisor,
        }
    }

    /// Lock the resource at `priority` for `caller_token`.
    ///
    /// Returns the caller's token on success, which the caller may hand to
    /// a child process for `*_with_token` calls, or an empty string if the
    /// token is empty or the slot is already taken. The first lock on an
    /// empty table arms the supervisor.
    pub fn lock(&mut self, priority: i32, caller_token: &str) -> String {
        if caller_token.is_empty() {
            debug!(resource = %self.name, "Lock refused: no caller identity");
            return String::new();
        }

        if let Some(holder) = self.locks.get(priority) {
            info!(
                resource = %self.name,
                priority = self.locks.standardise(priority),
                caller = caller_token,
                holder = %holder,
                "Lock refused: priority slot already held"
            );
            return String::new();
        }

        let owner = self.identity.resolve_owner(caller_token);
        let was_empty = self.locks.is_empty();

        if !self.locks.put(priority, owner.clone()) {
            info!(resource = %self.name, priority, caller = caller_token, "Lock refused");
            return String::new();
        }

        if was_empty {
            self.supervisor.arm();
        }

        info!(
            resource = %self.name,
            priority = self.locks.standardise(priority),
            owner = %owner,
            "Locked"
        );

        caller_token.to_string()
    }

    /// Release the slot held by `caller_token`.
    ///
    /// Other priorities may still be locked afterwards. Returns `false` if
    /// the caller holds no slot.
    pub fn unlock(&mut self, caller_token: &str) -> bool {
        if caller_token.is_empty() {
            return false;
        }

        let owner = self.identity.lookup_owner(caller_token);
        let released = self.locks.remove(&owner);

        if released {
            info!(resource = %self.name, owner = %owner, "Unlocked");
        } else {
            debug!(resource = %self.name, caller = caller_token, "Unlock ignored: caller holds no lock");
        }

        released
    }

    /// Whether `priority` or any level above it is locked.
    pub fn is_locked(&self, priority: i32) -> bool {
        self.locks.contains_above(priority)
    }

    /// Highest priority a client can lock at.
    pub fn get_max_lock_priority(&self) -> i32 {
        i32::from(self.locks.max_priority())
    }

    /// Gate check for mutating hardware calls.
    ///
    /// `presented` is either the caller's own token or a delegation token
    /// obtained from `lock`. The call is admitted unless a dominant lock
    /// exists and is held by someone else.
    pub fn admits(&self, presented: &str) -> bool {
        match self.locks.dominant() {
            None => true,
            Some(owner) => {
                let admitted = owner.token_matches(presented);
                if !admitted {
                    debug!(
                        resource = %self.name,
                        caller = presented,
                        holder = %owner,
                        "Call rejected: resource locked by another client"
                    );
                }
                admitted
            }
        }
    }

    /// Run one supervisor tick over the lock table.
    pub fn supervise(&mut self) -> TickOutcome {
        self.supervisor.tick(&mut self.locks)
    }

    /// Whether the supervisor wants periodic ticks.
    pub fn supervisor_armed(&self) -> bool {
        self.supervisor.is_armed()
    }

    /// Supervisor tick interval.
    pub fn supervisor_interval(&self) -> std::time::Duration {
        self.supervisor.interval()
    }

    /// Read access to the lock table.
    pub fn table(&self) -> &PriorityLock {
        &self.locks
    }

    /// Resource name used in log lines.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Access the caller identity resolver.
    pub fn identity(&self) -> &CallerIdentity<B, C> {
        &self.identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticIdentity;
    use crate::liveness::Liveness;
    use crate::supervisor::SupervisorState;
    use std::cell::RefCell;
    use std::collections::HashSet;

    #[derive(Default)]
    struct DeadSet(RefCell<HashSet<u32>>);

    impl LivenessChecker for DeadSet {
        fn probe(&self, pid: u32) -> Liveness {
            if self.0.borrow().contains(&pid) {
                Liveness::Dead
            } else {
                Liveness::Alive
            }
        }
    }

    type TestResource<'a> = LockableResource<StaticIdentity, StaticIdentity, &'a DeadSet>;

    fn resource(dead: &DeadSet) -> TestResource<'_> {
        let callers = StaticIdentity::new()
            .with_caller(":1.1", 100, "anim")
            .with_caller(":1.2", 200, "settings")
            .with_caller(":1.3", 300, "tracker");
        LockableResource::new(
            "LED ring",
            10,
            CallerIdentity::new(callers.clone(), callers),
            LockSupervisor::new(dead),
        )
    }

    #[test]
    fn test_lock_returns_caller_token() {
        let dead = DeadSet::default();
        let mut ring = resource(&dead);
        assert_eq!(ring.lock(5, ":1.1"), ":1.1");
        assert!(ring.is_locked(5));
        assert_eq!(ring.name(), "LED ring");
    }

    #[test]
    fn test_lock_without_caller_fails() {
        let dead = DeadSet::default();
        let mut ring = resource(&dead);
        assert_eq!(ring.lock(5, ""), "");
        assert!(ring.table().is_empty());
        assert!(!ring.supervisor_armed());
    }

    #[test]
    fn test_lock_occupied_slot_fails() {
        let dead = DeadSet::default();
        let mut ring = resource(&dead);
        assert_eq!(ring.lock(3, ":1.1"), ":1.1");
        assert_eq!(ring.lock(3, ":1.2"), "");
        assert!(ring.is_locked(2));
        assert!(!ring.is_locked(4));
    }

    #[test]
    fn test_lock_vacant_slot_below_dominant_succeeds() {
        let dead = DeadSet::default();
        let mut ring = resource(&dead);
        assert_eq!(ring.lock(8, ":1.1"), ":1.1");
        assert_eq!(ring.lock(2, ":1.2"), ":1.2");
        assert_eq!(ring.table().count(), 2);
        assert!(ring.admits(":1.1"));
        assert!(!ring.admits(":1.2"));
    }

    #[test]
    fn test_unknown_caller_gets_degraded_lock() {
        let dead = DeadSet::default();
        let mut ring = resource(&dead);
        assert_eq!(ring.lock(4, ":1.99"), ":1.99");

        let holder = ring.table().get(4).unwrap();
        assert_eq!(holder.pid, None);
        assert!(ring.unlock(":1.99"));
    }

    #[test]
    fn test_unlock_by_identity_not_priority() {
        let dead = DeadSet::default();
        let mut ring = resource(&dead);
        ring.lock(1, ":1.1");
        ring.lock(6, ":1.2");

        assert!(ring.unlock(":1.2"));
        assert_eq!(ring.table().top_priority(), 1);
        assert!(!ring.unlock(":1.2"));
        assert!(!ring.unlock(":1.3"));
        assert!(!ring.unlock(""));
    }

    #[test]
    fn test_gate_check_scenario() {
        let dead = DeadSet::default();
        let mut ring = resource(&dead);
        assert!(ring.admits(":1.2"));

        ring.lock(2, ":1.1");
        assert!(!ring.admits(":1.2"));
        assert!(ring.admits(":1.1"));
        assert!(!ring.admits(""));
    }

    #[test]
    fn test_max_lock_priority() {
        let dead = DeadSet::default();
        let ring = resource(&dead);
        assert_eq!(ring.get_max_lock_priority(), 10);
    }

    #[test]
    fn test_first_lock_arms_supervisor() {
        let dead = DeadSet::default();
        let mut ring = resource(&dead);
        assert!(!ring.supervisor_armed());

        ring.lock(3, ":1.1");
        assert!(ring.supervisor_armed());
        ring.lock(4, ":1.2");
        assert!(ring.supervisor_armed());
    }

    #[test]
    fn test_supervise_reclaims_dead_holder() {
        let dead = DeadSet::default();
        let mut ring = resource(&dead);
        ring.lock(2, ":1.1");

        assert_eq!(ring.supervise(), TickOutcome::KeepRunning);
        dead.0.borrow_mut().insert(100);
        assert_eq!(ring.supervise(), TickOutcome::Stop);

        assert!(ring.table().is_empty());
        assert!(!ring.supervisor_armed());
        assert!(ring.admits(":1.2"));
    }

    #[test]
    fn test_relock_after_unlock_while_still_armed() {
        let dead = DeadSet::default();
        let mut ring = resource(&dead);
        ring.lock(2, ":1.1");
        ring.unlock(":1.1");
        assert!(ring.supervisor_armed());

        ring.lock(2, ":1.2");
        assert!(ring.supervisor_armed());
        assert_eq!(ring.supervise(), TickOutcome::KeepRunning);
        assert_eq!(ring.supervisor.state(), SupervisorState::Armed);
    }
}
