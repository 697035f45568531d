//! Board capability trait.
//!
//! [`BoardDevice`] is the contract between a hardware service and the board
//! it drives. Every board implements the identity and detection methods;
//! the remaining capabilities have default implementations that report
//! [`HardwareError::Unsupported`](crate::HardwareError::Unsupported), so a
//! board only implements what it physically has.
//!
//! All methods use native `async fn` (Rust 1.90 + Edition 2024 RPITIT). The
//! trait is therefore not object-safe; use the [`AnyBoard`](crate::AnyBoard)
//! enum for runtime selection.

#![allow(async_fn_in_trait)]

use hatd_core::BoardKind;

use crate::error::{HardwareError, Result};
use crate::events::BoardEvents;
use crate::types::Rgb;

/// Board device abstraction.
///
/// # Examples
///
/// ```no_run
/// use hatd_hardware::{BoardDevice, Result, Rgb};
///
/// async fn flash_white<B: BoardDevice>(board: &mut B) -> Result<()> {
///     for index in 0..board.num_leds() {
///         board.set_led(index, Rgb::WHITE).await?;
///     }
///     Ok(())
/// }
/// ```
pub trait BoardDevice: Send + Sync {
    /// Which board this is.
    fn kind(&self) -> BoardKind;

    /// Prepare the board for use.
    ///
    /// Called once when the service starts and again when the board is
    /// plugged back in.
    ///
    /// # Errors
    ///
    /// Returns an error if the board is not present or cannot be set up.
    async fn initialise(&mut self) -> Result<()>;

    /// Check whether the board is plugged in.
    ///
    /// # Errors
    ///
    /// Returns an error only if the check itself fails; an absent board is
    /// `Ok(false)`.
    async fn detect(&self) -> Result<bool>;

    /// Subscribe to state changes the board reports on its own.
    ///
    /// Each call returns an independent stream. Boards without event
    /// sources return an empty, already closed stream.
    fn events(&self) -> BoardEvents {
        BoardEvents::new()
    }

    /// Number of addressable LEDs, 0 for boards without a ring.
    fn num_leds(&self) -> usize {
        0
    }

    /// Set the colour of one LED.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The board has no LEDs
    /// - `index` is past the end of the ring
    /// - The board was unplugged
    async fn set_led(&mut self, index: usize, colour: Rgb) -> Result<()> {
        let _ = (index, colour);
        Err(HardwareError::unsupported("set_led"))
    }

    /// Check whether the battery is low.
    ///
    /// # Errors
    ///
    /// Returns an error if the board has no battery monitor.
    async fn is_battery_low(&self) -> Result<bool> {
        Err(HardwareError::unsupported("is_battery_low"))
    }

    /// Enable or disable the power button.
    ///
    /// # Errors
    ///
    /// Returns an error if the board has no power button.
    async fn set_power_button_enabled(&mut self, enabled: bool) -> Result<()> {
        let _ = enabled;
        Err(HardwareError::unsupported("set_power_button_enabled"))
    }
}

/// Check an LED index against the ring size.
///
/// # Errors
///
/// Returns [`HardwareError::InvalidData`] if `index >= num_leds`.
pub fn check_led_index(index: usize, num_leds: usize) -> Result<()> {
    if index >= num_leds {
        return Err(HardwareError::invalid_data(format!(
            "LED index {index} out of range (board has {num_leds} LEDs)"
        )));
    }
    Ok(())
}
