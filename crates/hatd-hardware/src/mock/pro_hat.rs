//! Mock pro hat implementation for testing and development.
//!
//! The pro hat has no LEDs. It reports a battery-low line and exposes a
//! power button that can be disabled. Battery, plug and button changes made
//! through the [`MockProHatHandle`] show up in the board's event stream.

use hatd_core::BoardKind;
use tokio::sync::watch;

use super::set_if_changed;
use crate::{HardwareError, Result, events::BoardEvents, traits::BoardDevice};

/// Mock pro hat board.
///
/// # Examples
///
/// ```
/// use hatd_hardware::BoardDevice;
/// use hatd_hardware::mock::MockProHat;
///
/// #[tokio::main]
/// async fn main() -> hatd_hardware::Result<()> {
///     let (hat, handle) = MockProHat::new();
///     assert!(!hat.is_battery_low().await?);
///
///     handle.set_battery_low(true);
///     assert!(hat.is_battery_low().await?);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockProHat {
    name: String,
    battery_low_rx: watch::Receiver<bool>,
    plugged_rx: watch::Receiver<bool>,
    power_button_tx: watch::Sender<bool>,
    presses_rx: watch::Receiver<u64>,
}

impl MockProHat {
    /// Create a new mock pro hat with a full battery.
    pub fn new() -> (Self, MockProHatHandle) {
        let (battery_low_tx, battery_low_rx) = watch::channel(false);
        let (plugged_tx, plugged_rx) = watch::channel(true);
        let (power_button_tx, power_button_rx) = watch::channel(true);
        let (presses_tx, presses_rx) = watch::channel(0);

        let hat = Self {
            name: "Mock Pro Hat".to_string(),
            battery_low_rx,
            plugged_rx,
            power_button_tx,
            presses_rx,
        };

        let handle = MockProHatHandle {
            battery_low_tx,
            plugged_tx,
            power_button_rx,
            presses_tx,
        };

        (hat, handle)
    }

    fn ensure_plugged(&self) -> Result<()> {
        if *self.plugged_rx.borrow() {
            Ok(())
        } else {
            Err(HardwareError::disconnected(self.name.clone()))
        }
    }
}

impl Default for MockProHat {
    fn default() -> Self {
        Self::new().0
    }
}

impl BoardDevice for MockProHat {
    fn kind(&self) -> BoardKind {
        BoardKind::ProHat
    }

    async fn initialise(&mut self) -> Result<()> {
        self.ensure_plugged()
            .map_err(|_| HardwareError::initialization_failed("pro hat is not plugged in"))
    }

    async fn detect(&self) -> Result<bool> {
        Ok(*self.plugged_rx.borrow())
    }

    fn events(&self) -> BoardEvents {
        BoardEvents::new()
            .with_plugged(self.plugged_rx.clone())
            .with_battery_low(self.battery_low_rx.clone())
            .with_power_button(self.presses_rx.clone(), self.power_button_tx.subscribe())
    }

    async fn is_battery_low(&self) -> Result<bool> {
        self.ensure_plugged()?;
        Ok(*self.battery_low_rx.borrow())
    }

    async fn set_power_button_enabled(&mut self, enabled: bool) -> Result<()> {
        self.ensure_plugged()?;
        self.power_button_tx.send_replace(enabled);
        Ok(())
    }
}

/// Handle for controlling a mock pro hat.
#[derive(Debug, Clone)]
pub struct MockProHatHandle {
    battery_low_tx: watch::Sender<bool>,
    plugged_tx: watch::Sender<bool>,
    power_button_rx: watch::Receiver<bool>,
    presses_tx: watch::Sender<u64>,
}

impl MockProHatHandle {
    /// Simulate the battery-low line changing.
    pub fn set_battery_low(&self, low: bool) {
        set_if_changed(&self.battery_low_tx, low);
    }

    /// Simulate pulling the hat off the header.
    pub fn unplug(&self) {
        set_if_changed(&self.plugged_tx, false);
    }

    /// Simulate plugging the hat back in.
    pub fn plug_in(&self) {
        set_if_changed(&self.plugged_tx, true);
    }

    /// Simulate a press of the power button.
    pub fn press_power_button(&self) {
        self.presses_tx.send_modify(|presses| *presses += 1);
    }

    /// Whether the power button is enabled.
    pub fn power_button_enabled(&self) -> bool {
        *self.power_button_rx.borrow()
    }
}
