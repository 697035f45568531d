//! Stale lock supervisor.
//!
//! Clients are expected to `unlock` when they are done, but a client that
//! crashes never will. The [`LockSupervisor`] periodically probes every lock
//! holder and releases the slots of processes that no longer exist.
//!
//! # States
//!
//! ```text
//!            arm()                     tick() -> Stop
//!   Idle ─────────────► Armed ───────────────────────► Idle
//!                        │  ▲
//!                        └──┘ tick() -> KeepRunning
//! ```
//!
//! The supervisor only tracks whether a periodic check should be scheduled;
//! the event loop owning the lock table drives the actual timer.

use std::fmt;
use std::time::Duration;

use hatd_core::constants::DEFAULT_SUPERVISOR_INTERVAL_MS;
use tracing::{debug, warn};

use crate::liveness::{Liveness, LivenessChecker};
use crate::priority::PriorityLock;

/// Scheduling state of the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// No periodic check is scheduled.
    Idle,
    /// A periodic check is scheduled.
    Armed,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Armed => write!(f, "Armed"),
        }
    }
}

/// Result of a supervisor tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Locks remain; schedule the next tick.
    KeepRunning,
    /// The table is empty; stop ticking.
    Stop,
}

/// Periodic liveness checker for lock holders.
#[derive(Debug)]
pub struct LockSupervisor<L> {
    checker: L,
    interval: Duration,
    state: SupervisorState,
    reclaimed: u64,
}

impl<L: LivenessChecker> LockSupervisor<L> {
    /// Create an idle supervisor with the default interval.
    pub fn new(checker: L) -> Self {
        Self::with_interval(checker, Duration::from_millis(DEFAULT_SUPERVISOR_INTERVAL_MS))
    }

    /// Create an idle supervisor ticking every `interval`.
    pub fn with_interval(checker: L, interval: Duration) -> Self {
        Self {
            checker,
            interval,
            state: SupervisorState::Idle,
            reclaimed: 0,
        }
    }

    /// Schedule periodic checks.
    ///
    /// Returns `true` if the supervisor moved from Idle to Armed. Arming an
    /// already armed supervisor is a no-op so that a single periodic check
    /// exists at any time.
    pub fn arm(&mut self) -> bool {
        match self.state {
            SupervisorState::Idle => {
                self.state = SupervisorState::Armed;
                debug!(interval_ms = self.interval.as_millis() as u64, "Lock supervisor armed");
                true
            }
            SupervisorState::Armed => false,
        }
    }

    /// Probe every lock holder and release slots of dead processes.
    ///
    /// Slots whose owner has no pid cannot be probed and are left alone.
    /// Probe errors other than "process does not exist" are logged and the
    /// slot is kept until the next tick.
    pub fn tick(&mut self, locks: &mut PriorityLock) -> TickOutcome {
        for priority in 1..=i32::from(locks.max_priority()) {
            let Some(owner) = locks.get(priority) else {
                continue;
            };

            let Some(pid) = owner.pid else {
                debug!(priority, owner = %owner, "Lock holder has no pid, skipping liveness probe");
                continue;
            };

            match self.checker.probe(pid) {
                Liveness::Alive => {}
                Liveness::Dead => {
                    warn!(
                        priority,
                        pid,
                        command = %owner.command_line,
                        "Lock holder died without unlocking, releasing its slot"
                    );
                    if locks.remove_priority(priority) {
                        self.reclaimed += 1;
                    }
                }
                Liveness::Unknown(error) => {
                    warn!(priority, pid, %error, "Unexpected liveness probe failure");
                }
            }
        }

        if locks.is_empty() {
            self.state = SupervisorState::Idle;
            debug!("Lock table empty, lock supervisor disarmed");
            TickOutcome::Stop
        } else {
            TickOutcome::KeepRunning
        }
    }

    /// Current scheduling state.
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Whether a periodic check is scheduled.
    pub fn is_armed(&self) -> bool {
        self.state == SupervisorState::Armed
    }

    /// Interval between ticks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of slots released because their owner died.
    pub fn reclaimed(&self) -> u64 {
        self.reclaimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::LockOwner;
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};

    /// Fake process table with an explicit set of live pids.
    #[derive(Default)]
    struct FakeProcesses {
        alive: RefCell<HashSet<u32>>,
        failing: HashMap<u32, String>,
        probes: RefCell<Vec<u32>>,
    }

    impl FakeProcesses {
        fn with_alive(pids: &[u32]) -> Self {
            Self {
                alive: RefCell::new(pids.iter().copied().collect()),
                ..Self::default()
            }
        }

        fn kill(&self, pid: u32) {
            self.alive.borrow_mut().remove(&pid);
        }
    }

    impl LivenessChecker for FakeProcesses {
        fn probe(&self, pid: u32) -> Liveness {
            self.probes.borrow_mut().push(pid);
            if let Some(error) = self.failing.get(&pid) {
                return Liveness::Unknown(error.clone());
            }
            if self.alive.borrow().contains(&pid) {
                Liveness::Alive
            } else {
                Liveness::Dead
            }
        }
    }

    fn owner(token: &str, pid: Option<u32>) -> LockOwner {
        LockOwner::new(token, pid, "app")
    }

    #[test]
    fn test_new_supervisor_is_idle() {
        let supervisor = LockSupervisor::new(FakeProcesses::default());
        assert_eq!(supervisor.state(), SupervisorState::Idle);
        assert_eq!(supervisor.interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_arm_only_once() {
        let mut supervisor = LockSupervisor::new(FakeProcesses::default());
        assert!(supervisor.arm());
        assert!(!supervisor.arm());
        assert!(supervisor.is_armed());
    }

    #[test]
    fn test_tick_releases_dead_owner() {
        let processes = FakeProcesses::with_alive(&[100]);
        let mut supervisor = LockSupervisor::new(&processes);
        let mut locks = PriorityLock::new(10);

        locks.put(2, owner(":1.1", Some(100)));
        supervisor.arm();
        assert_eq!(supervisor.tick(&mut locks), TickOutcome::KeepRunning);
        assert!(!locks.is_empty());

        processes.kill(100);
        assert_eq!(supervisor.tick(&mut locks), TickOutcome::Stop);
        assert!(locks.is_empty());
        assert_eq!(supervisor.state(), SupervisorState::Idle);
        assert_eq!(supervisor.reclaimed(), 1);
    }

    #[test]
    fn test_tick_keeps_live_owners() {
        let processes = FakeProcesses::with_alive(&[100]);
        let mut supervisor = LockSupervisor::new(&processes);
        let mut locks = PriorityLock::new(10);

        locks.put(3, owner(":1.1", Some(100)));
        locks.put(8, owner(":1.2", Some(200)));
        supervisor.arm();

        assert_eq!(supervisor.tick(&mut locks), TickOutcome::KeepRunning);
        assert_eq!(locks.top_priority(), 3);
        assert_eq!(locks.count(), 1);
        assert!(supervisor.is_armed());
    }

    #[test]
    fn test_tick_skips_owner_without_pid() {
        let processes = FakeProcesses::default();
        let mut supervisor = LockSupervisor::new(&processes);
        let mut locks = PriorityLock::new(10);

        locks.put(5, owner(":1.1", None));
        supervisor.arm();

        assert_eq!(supervisor.tick(&mut locks), TickOutcome::KeepRunning);
        assert!(!locks.is_empty());
        assert!(processes.probes.borrow().is_empty());
    }

    #[test]
    fn test_tick_probe_error_is_optimistic() {
        let processes = FakeProcesses {
            failing: HashMap::from([(300, "permission denied".to_string())]),
            ..FakeProcesses::default()
        };
        let mut supervisor = LockSupervisor::new(&processes);
        let mut locks = PriorityLock::new(10);

        locks.put(4, owner(":1.3", Some(300)));
        supervisor.arm();

        assert_eq!(supervisor.tick(&mut locks), TickOutcome::KeepRunning);
        assert_eq!(locks.top_priority(), 4);
        assert_eq!(supervisor.reclaimed(), 0);
    }

    #[test]
    fn test_tick_on_empty_table_disarms() {
        let mut supervisor = LockSupervisor::new(FakeProcesses::default());
        let mut locks = PriorityLock::new(10);

        supervisor.arm();
        assert_eq!(supervisor.tick(&mut locks), TickOutcome::Stop);
        assert!(!supervisor.is_armed());
        assert!(supervisor.arm());
    }

    #[test]
    fn test_tick_probes_every_occupied_slot() {
        let processes = FakeProcesses::with_alive(&[1, 2, 3]);
        let mut supervisor = LockSupervisor::new(&processes);
        let mut locks = PriorityLock::new(10);

        locks.put(1, owner(":1.1", Some(1)));
        locks.put(5, owner(":1.2", Some(2)));
        locks.put(10, owner(":1.3", Some(3)));
        supervisor.tick(&mut locks);

        assert_eq!(*processes.probes.borrow(), vec![1, 2, 3]);
    }
}
