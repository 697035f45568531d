//! Board abstraction layer for the hat daemon.
//!
//! This crate defines the [`BoardDevice`] trait implemented by every add-on
//! board the daemon can serve, and in-memory mock boards for development
//! and testing.
//!
//! # Design
//!
//! - **Async-first**: all I/O uses native `async fn` in traits.
//! - **Enum dispatch**: [`AnyBoard`] replaces `Box<dyn BoardDevice>`, which
//!   native async traits do not allow.
//! - **Capability defaults**: a board only implements what it has; other
//!   calls fail with [`HardwareError::Unsupported`].
//!
//! ```no_run
//! use hatd_hardware::{BoardDevice, Result, Rgb};
//!
//! async fn clear<B: BoardDevice>(board: &mut B) -> Result<()> {
//!     for index in 0..board.num_leds() {
//!         board.set_led(index, Rgb::OFF).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Boards also report unsolicited state changes (plugging, battery line,
//! power button) through [`BoardEvents`].

pub mod devices;
pub mod error;
pub mod events;
pub mod mock;
pub mod traits;
pub mod types;

pub use devices::{AnyBoard, AnyMockHandle};
pub use error::{HardwareError, Result};
pub use events::{BoardEvent, BoardEvents};
pub use traits::BoardDevice;
pub use types::Rgb;
