//! Board event stream.
//!
//! Boards report state changes the service did not ask for: the board being
//! plugged in or pulled off the header, the battery-low line flipping, and
//! presses of the power button. A driver publishes each of these on a
//! `watch` channel and hands the receiving ends out as [`BoardEvents`],
//! which merges them into one stream of [`BoardEvent`]s.
//!
//! ```text
//! plugged      watch<bool> ──┐
//! battery low  watch<bool> ──┼──> BoardEvents::next() ──> BoardEvent
//! button       watch<u64>  ──┘          ▲
//! button enabled  watch<bool> ──────────┘ (filter)
//! ```
//!
//! Only changes made after the stream was created are reported. Presses are
//! counted, so presses that land between two polls arrive as one event.

use tokio::sync::watch;

/// A state change reported by a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BoardEvent {
    /// The board was plugged back in.
    Plugged,

    /// The board was pulled off the header.
    Unplugged,

    /// The battery-low line changed; `true` means low.
    BatteryLow(bool),

    /// The power button was pressed while enabled.
    PowerButtonPressed,
}

/// Merged event sources of one board.
///
/// A source whose sender is dropped is retired; [`next`](Self::next) returns
/// `None` once every source is gone.
#[derive(Debug, Default)]
pub struct BoardEvents {
    plugged: Option<watch::Receiver<bool>>,
    battery_low: Option<watch::Receiver<bool>>,
    button_presses: Option<watch::Receiver<u64>>,
    button_enabled: Option<watch::Receiver<bool>>,
}

impl BoardEvents {
    /// A stream with no sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report plug and unplug transitions.
    pub fn with_plugged(mut self, plugged: watch::Receiver<bool>) -> Self {
        self.plugged = Some(fresh(plugged));
        self
    }

    /// Report battery-low transitions.
    pub fn with_battery_low(mut self, battery_low: watch::Receiver<bool>) -> Self {
        self.battery_low = Some(fresh(battery_low));
        self
    }

    /// Report power button presses. `presses` counts presses; `enabled`
    /// is the button setting, and presses while it is `false` are dropped.
    pub fn with_power_button(
        mut self,
        presses: watch::Receiver<u64>,
        enabled: watch::Receiver<bool>,
    ) -> Self {
        self.button_presses = Some(fresh(presses));
        self.button_enabled = Some(enabled);
        self
    }

    /// Whether every source is gone.
    pub fn is_closed(&self) -> bool {
        self.plugged.is_none() && self.battery_low.is_none() && self.button_presses.is_none()
    }

    /// Wait for the next event.
    ///
    /// Cancel safe: an event that was not returned stays pending.
    pub async fn next(&mut self) -> Option<BoardEvent> {
        loop {
            if self.is_closed() {
                return None;
            }

            tokio::select! {
                plugged = changed(&mut self.plugged) => match plugged {
                    Some(true) => return Some(BoardEvent::Plugged),
                    Some(false) => return Some(BoardEvent::Unplugged),
                    None => self.plugged = None,
                },
                low = changed(&mut self.battery_low) => match low {
                    Some(low) => return Some(BoardEvent::BatteryLow(low)),
                    None => self.battery_low = None,
                },
                presses = changed(&mut self.button_presses) => match presses {
                    Some(_) if self.button_enabled() => {
                        return Some(BoardEvent::PowerButtonPressed);
                    }
                    Some(_) => {}
                    None => self.button_presses = None,
                },
            }
        }
    }

    fn button_enabled(&self) -> bool {
        self.button_enabled
            .as_ref()
            .is_some_and(|enabled| *enabled.borrow())
    }
}

fn fresh<T>(mut rx: watch::Receiver<T>) -> watch::Receiver<T> {
    rx.mark_unchanged();
    rx
}

/// Wait for `source` to change. `None` means the sender is gone; a missing
/// source never completes.
async fn changed<T: Clone>(source: &mut Option<watch::Receiver<T>>) -> Option<T> {
    match source {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(rx.borrow_and_update().clone()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}
