//! Core constants for the board daemon.
//!
//! This module centralises the values shared by the lock subsystem, the
//! board drivers and the bus surface: priority bounds, poll intervals, LED
//! counts and the bus names under which hardware services are published.
//!
//! # Priority Levels
//!
//! Lock priorities are discrete slots numbered `1..=max_priority`. The value
//! `0` is reserved as the "nothing is locked" sentinel and is never a valid
//! slot for a caller:
//!
//! ```text
//! slot:   0    1    2    3   ...   10
//!        (-)  [ ]  [x]  [ ]  ...  [ ]
//!         ^              ^
//!         sentinel       top_priority == 2
//! ```
//!
//! # Usage
//!
//! ```
//! use hatd_core::constants::*;
//!
//! assert_eq!(DEFAULT_MAX_PRIORITY, 10);
//! assert!(MIN_PRIORITY < usize::from(DEFAULT_MAX_PRIORITY));
//!
//! use std::time::Duration;
//! let interval = Duration::from_millis(DEFAULT_SUPERVISOR_INTERVAL_MS);
//! assert_eq!(interval.as_secs(), 10);
//! ```

// ============================================================================
// Lock Priorities
// ============================================================================

/// Sentinel value for "no active lock".
///
/// `top_priority` reads this value when the lock table is empty. It is never
/// handed out as a slot: requests for priority 0 are clamped to
/// [`MIN_PRIORITY`].
pub const NO_PRIORITY: usize = 0;

/// Lowest priority slot a caller can occupy.
pub const MIN_PRIORITY: usize = 1;

/// Default number of priority slots per lockable resource.
///
/// Clients query the configured value with `get_max_lock_priority` and
/// typically lock at that level when they need exclusive access.
pub const DEFAULT_MAX_PRIORITY: u8 = 10;

// ============================================================================
// Poll Intervals
// ============================================================================

/// Default interval between liveness checks of lock holders (milliseconds).
///
/// A lock whose owner died is reclaimed at most one interval after the
/// process exits.
pub const DEFAULT_SUPERVISOR_INTERVAL_MS: u64 = 10_000;

// ============================================================================
// Bus Surface
// ============================================================================

/// Well-known bus name of the daemon.
pub const BUS_NAME: &str = "me.kano.boards";

/// Base object path under which board services are published.
pub const OBJECT_BASE_PATH: &str = "/me/kano/boards";

/// Interface name exposed by every board service.
pub const SERVICE_API_IFACE: &str = "me.kano.boards.API";

/// Object path of the LED ring (speaker LED) service.
pub const LED_RING_OBJECT_PATH: &str = "/me/kano/boards/SpeakerLED";

/// Object path of the Pi hat service.
pub const PI_HAT_OBJECT_PATH: &str = "/me/kano/boards/PiHat";

/// Object path of the pro hat service.
pub const PRO_HAT_OBJECT_PATH: &str = "/me/kano/boards/CK2ProHat";

/// Prefix of unique connection names handed out by the bus.
///
/// Unique names look like `:1.42`; the number increases per connection
/// and is never reused during the bus lifetime.
pub const UNIQUE_NAME_PREFIX: &str = ":1.";

/// Default capacity of the bus request queue.
pub const DEFAULT_REQUEST_QUEUE: usize = 64;

/// Signals buffered per subscriber before the slowest one starts missing
/// them.
pub const SIGNAL_BUFFER: usize = 32;

// ============================================================================
// Boards
// ============================================================================

/// Number of RGB LEDs on the LED ring and the Pi hat.
pub const NUM_LEDS: usize = 10;

/// Battery level reported while the battery is not low (percent).
pub const BATTERY_LEVEL_FULL: i32 = 100;

/// Battery level reported while the battery is low (percent).
pub const BATTERY_LEVEL_LOW: i32 = 0;

// ============================================================================
// Process Table
// ============================================================================

/// Default mount point of the process table.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_bounds() {
        assert_eq!(NO_PRIORITY, 0);
        assert_eq!(MIN_PRIORITY, 1);
        assert!(usize::from(DEFAULT_MAX_PRIORITY) >= MIN_PRIORITY);
    }

    #[test]
    fn test_object_paths_under_base() {
        for path in [LED_RING_OBJECT_PATH, PI_HAT_OBJECT_PATH, PRO_HAT_OBJECT_PATH] {
            assert!(path.starts_with(OBJECT_BASE_PATH));
        }
        assert!(SERVICE_API_IFACE.starts_with(BUS_NAME));
    }

    #[test]
    fn test_battery_levels() {
        assert!(BATTERY_LEVEL_LOW < BATTERY_LEVEL_FULL);
    }
}
