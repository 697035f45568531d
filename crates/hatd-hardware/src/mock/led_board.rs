//! Mock LED board implementation for testing and development.
//!
//! Simulates the speaker LED ring and the Pi hat. The ring state, the
//! plugged-in flag and the power button are shared with a
//! [`MockLedBoardHandle`] through `watch` channels, so a test can observe
//! what the service wrote, unplug the board underneath it and press the
//! Pi hat's button.

use hatd_core::BoardKind;
use hatd_core::constants::NUM_LEDS;
use tokio::sync::watch;

use super::set_if_changed;
use crate::{
    HardwareError, Result,
    events::BoardEvents,
    traits::{BoardDevice, check_led_index},
    types::Rgb,
};

/// Mock LED ring board.
///
/// # Examples
///
/// ```
/// use hatd_hardware::mock::MockLedBoard;
/// use hatd_hardware::{BoardDevice, Rgb};
///
/// #[tokio::main]
/// async fn main() -> hatd_hardware::Result<()> {
///     let (mut ring, handle) = MockLedBoard::led_ring();
///
///     ring.set_led(3, Rgb::WHITE).await?;
///     assert_eq!(handle.led(3), Some(Rgb::WHITE));
///
///     handle.unplug();
///     assert!(ring.set_led(3, Rgb::OFF).await.is_err());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockLedBoard {
    kind: BoardKind,
    name: String,
    leds_tx: watch::Sender<Vec<Rgb>>,
    power_button_tx: watch::Sender<bool>,
    presses_rx: watch::Receiver<u64>,
    plugged_rx: watch::Receiver<bool>,
    faulty_rx: watch::Receiver<Option<usize>>,
    initialised: bool,
}

impl MockLedBoard {
    /// Create a mock speaker LED ring.
    pub fn led_ring() -> (Self, MockLedBoardHandle) {
        Self::new(BoardKind::LedRing, "Mock Speaker LED Ring")
    }

    /// Create a mock Pi hat.
    pub fn pi_hat() -> (Self, MockLedBoardHandle) {
        Self::new(BoardKind::PiHat, "Mock Pi Hat")
    }

    /// Create a mock board of `kind` with a custom name.
    pub fn new(kind: BoardKind, name: impl Into<String>) -> (Self, MockLedBoardHandle) {
        let (leds_tx, leds_rx) = watch::channel(vec![Rgb::OFF; NUM_LEDS]);
        let (power_button_tx, power_button_rx) = watch::channel(true);
        let (presses_tx, presses_rx) = watch::channel(0);
        let (plugged_tx, plugged_rx) = watch::channel(true);
        let (faulty_tx, faulty_rx) = watch::channel(None);
        let name = name.into();

        let board = Self {
            kind,
            name: name.clone(),
            leds_tx,
            power_button_tx,
            presses_rx,
            plugged_rx,
            faulty_rx,
            initialised: false,
        };

        let handle = MockLedBoardHandle {
            name,
            leds_rx,
            power_button_rx,
            presses_tx,
            plugged_tx,
            faulty_tx,
        };

        (board, handle)
    }

    /// Whether `initialise` has completed.
    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    fn ensure_plugged(&self) -> Result<()> {
        if *self.plugged_rx.borrow() {
            Ok(())
        } else {
            Err(HardwareError::disconnected(self.name.clone()))
        }
    }
}

impl Default for MockLedBoard {
    fn default() -> Self {
        Self::led_ring().0
    }
}

impl BoardDevice for MockLedBoard {
    fn kind(&self) -> BoardKind {
        self.kind
    }

    async fn initialise(&mut self) -> Result<()> {
        if !*self.plugged_rx.borrow() {
            return Err(HardwareError::initialization_failed(format!(
                "{} is not plugged in",
                self.name
            )));
        }
        self.leds_tx.send_modify(|leds| leds.fill(Rgb::OFF));
        self.initialised = true;
        Ok(())
    }

    async fn detect(&self) -> Result<bool> {
        Ok(*self.plugged_rx.borrow())
    }

    fn events(&self) -> BoardEvents {
        let events = BoardEvents::new().with_plugged(self.plugged_rx.clone());
        if self.kind == BoardKind::PiHat {
            events.with_power_button(self.presses_rx.clone(), self.power_button_tx.subscribe())
        } else {
            events
        }
    }

    fn num_leds(&self) -> usize {
        NUM_LEDS
    }

    async fn set_led(&mut self, index: usize, colour: Rgb) -> Result<()> {
        self.ensure_plugged()?;
        check_led_index(index, NUM_LEDS)?;

        if *self.faulty_rx.borrow() == Some(index) {
            return Err(HardwareError::communication(format!(
                "write to LED {index} failed"
            )));
        }

        self.leds_tx.send_modify(|leds| leds[index] = colour);
        Ok(())
    }

    async fn set_power_button_enabled(&mut self, enabled: bool) -> Result<()> {
        if self.kind != BoardKind::PiHat {
            return Err(HardwareError::unsupported("set_power_button_enabled"));
        }
        self.ensure_plugged()?;
        self.power_button_tx.send_replace(enabled);
        Ok(())
    }
}

/// Handle for observing and controlling a mock LED board.
#[derive(Debug, Clone)]
pub struct MockLedBoardHandle {
    name: String,
    leds_rx: watch::Receiver<Vec<Rgb>>,
    power_button_rx: watch::Receiver<bool>,
    presses_tx: watch::Sender<u64>,
    plugged_tx: watch::Sender<bool>,
    faulty_tx: watch::Sender<Option<usize>>,
}

impl MockLedBoardHandle {
    /// Current colour of every LED.
    pub fn leds(&self) -> Vec<Rgb> {
        self.leds_rx.borrow().clone()
    }

    /// Current colour of LED `index`.
    pub fn led(&self, index: usize) -> Option<Rgb> {
        self.leds_rx.borrow().get(index).copied()
    }

    /// Whether every LED is off.
    pub fn all_off(&self) -> bool {
        self.leds_rx.borrow().iter().all(Rgb::is_off)
    }

    /// Whether the power button is enabled (Pi hat only).
    pub fn power_button_enabled(&self) -> bool {
        *self.power_button_rx.borrow()
    }

    /// Simulate pulling the board off the header.
    pub fn unplug(&self) {
        set_if_changed(&self.plugged_tx, false);
    }

    /// Simulate plugging the board back in.
    pub fn plug_in(&self) {
        set_if_changed(&self.plugged_tx, true);
    }

    /// Simulate a press of the power button. Only the Pi hat reports it.
    pub fn press_power_button(&self) {
        self.presses_tx.send_modify(|presses| *presses += 1);
    }

    /// Make writes to LED `index` fail, or clear the fault with `None`.
    pub fn fail_led(&self, index: Option<usize>) {
        self.faulty_tx.send_replace(index);
    }

    /// Name of the board this handle controls.
    pub fn name(&self) -> &str {
        &self.name
    }
}
