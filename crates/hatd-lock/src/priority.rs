//! Priority lock table.
//!
//! A [`PriorityLock`] is a fixed set of lock slots indexed by priority
//! level. Each slot holds at most one [`LockOwner`]. The highest occupied
//! slot is the *dominant* lock: it decides who may drive the hardware.
//!
//! ```text
//!   index   0     1     2     3     4     5   ...  max
//!         [---] [ A ] [   ] [ B ] [   ] [   ] ... [   ]
//!                             ^
//!                             top_priority = 3, dominant = B
//! ```
//!
//! Slot 0 is never occupied. `top_priority` is 0 when the table is empty,
//! so reading the dominant slot of an empty table yields `None`.
//!
//! Priorities arrive from untrusted bus callers. Every operation clamps the
//! requested priority into `[1, max_priority]` first, and an indexing
//! failure is logged and reported as `false` rather than panicking.

use std::fmt;

use hatd_core::constants::{MIN_PRIORITY, NO_PRIORITY};
use tracing::error;

use crate::owner::LockOwner;

/// Fixed-capacity table of priority lock slots.
///
/// # Examples
///
/// ```
/// use hatd_lock::{LockOwner, PriorityLock};
///
/// let mut locks = PriorityLock::new(10);
/// let app = LockOwner::new(":1.1", Some(100), "app");
///
/// assert!(locks.put(3, app.clone()));
/// assert!(locks.contains_above(2));
/// assert!(!locks.contains_above(4));
///
/// assert!(locks.remove(&app));
/// assert!(locks.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct PriorityLock {
    max_priority: u8,
    top_priority: usize,
    count: usize,
    slots: Vec<Option<LockOwner>>,
}

impl PriorityLock {
    /// Create an empty table with slots `1..=max_priority`.
    ///
    /// A `max_priority` of 0 is raised to 1 so the table always has at
    /// least one usable slot.
    pub fn new(max_priority: u8) -> Self {
        let max_priority = max_priority.max(1);

        Self {
            max_priority,
            top_priority: NO_PRIORITY,
            count: 0,
            slots: vec![None; usize::from(max_priority) + 1],
        }
    }

    /// Clamp a caller-supplied priority into `[1, max_priority]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use hatd_lock::PriorityLock;
    ///
    /// let locks = PriorityLock::new(10);
    /// assert_eq!(locks.standardise(0), 1);
    /// assert_eq!(locks.standardise(-5), 1);
    /// assert_eq!(locks.standardise(7), 7);
    /// assert_eq!(locks.standardise(999), 10);
    /// ```
    #[must_use]
    pub fn standardise(&self, priority: i32) -> usize {
        match usize::try_from(priority) {
            Ok(priority) => priority.clamp(MIN_PRIORITY, usize::from(self.max_priority)),
            Err(_) => MIN_PRIORITY,
        }
    }

    /// Store `owner` in the slot for `priority`.
    ///
    /// Fails if the owner has no caller token or if the slot is already
    /// occupied. A higher occupied priority does not block acquiring a
    /// different vacant slot.
    pub fn put(&mut self, priority: i32, owner: LockOwner) -> bool {
        if !owner.is_valid() {
            return false;
        }

        let priority = self.standardise(priority);

        let Some(slot) = self.slots.get_mut(priority) else {
            error!(
                priority,
                table = %self,
                "Unintentional out-of-range slot in put()"
            );
            return false;
        };

        if slot.is_some() {
            return false;
        }

        *slot = Some(owner);
        self.count += 1;

        if priority > self.top_priority {
            self.top_priority = priority;
        }

        true
    }

    /// Read the owner of the slot for `priority`.
    #[must_use]
    pub fn get(&self, priority: i32) -> Option<&LockOwner> {
        self.slot(self.standardise(priority))
    }

    /// Read the dominant owner, i.e. the slot at `top_priority`.
    ///
    /// Returns `None` when nothing is locked.
    #[must_use]
    pub fn dominant(&self) -> Option<&LockOwner> {
        self.slot(self.top_priority)
    }

    /// Whether any lock at `priority` or above is active.
    ///
    /// A caller at or below `top_priority` is blocked; a caller strictly
    /// above it is not.
    #[must_use]
    pub fn contains_above(&self, priority: i32) -> bool {
        self.standardise(priority) <= self.top_priority
    }

    /// Whether `owner` holds any slot.
    #[must_use]
    pub fn contains(&self, owner: &LockOwner) -> bool {
        owner.is_valid() && self.occupied().any(|(_, held)| held == owner)
    }

    /// Release the slot held by `owner`.
    ///
    /// Scans downward from `top_priority` and vacates the slot whose owner
    /// equals `owner`. Returns `false` if the owner holds no slot.
    pub fn remove(&mut self, owner: &LockOwner) -> bool {
        if !owner.is_valid() {
            return false;
        }

        let found = (MIN_PRIORITY..=self.top_priority)
            .rev()
            .find(|&priority| self.slot(priority) == Some(owner));

        match found {
            Some(priority) => self.vacate(priority),
            None => false,
        }
    }

    /// Release the slot for `priority` regardless of its owner.
    ///
    /// Returns `false` if the slot was already empty.
    pub fn remove_priority(&mut self, priority: i32) -> bool {
        let priority = self.standardise(priority);
        self.vacate(priority)
    }

    /// Whether no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dominant().is_none()
    }

    /// Highest occupied priority, or 0 if none.
    #[must_use]
    pub fn top_priority(&self) -> usize {
        self.top_priority
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Highest priority a caller can lock at.
    #[must_use]
    pub fn max_priority(&self) -> u8 {
        self.max_priority
    }

    /// Number of priority levels, including the sentinel slot 0.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Occupied slots as `(priority, owner)` pairs, lowest first.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &LockOwner)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(priority, slot)| slot.as_ref().map(|owner| (priority, owner)))
    }

    fn slot(&self, priority: usize) -> Option<&LockOwner> {
        self.slots.get(priority).and_then(Option::as_ref)
    }

    fn vacate(&mut self, priority: usize) -> bool {
        let Some(slot) = self.slots.get_mut(priority) else {
            error!(
                priority,
                table = %self,
                "Unintentional out-of-range slot while removing a lock"
            );
            return false;
        };

        if slot.take().is_none() {
            return false;
        }

        self.count = self.count.saturating_sub(1);

        if priority == self.top_priority {
            self.top_priority = (MIN_PRIORITY..priority)
                .rev()
                .find(|&below| self.slot(below).is_some())
                .unwrap_or(NO_PRIORITY);
        }

        true
    }
}

impl fmt::Display for PriorityLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "PriorityLock: top_priority={} count={}",
            self.top_priority, self.count
        )?;
        for (priority, owner) in self.occupied() {
            writeln!(f, "  {priority}. {owner}")?;
        }
        Ok(())
    }
}
