//! Mock board implementations for testing and development.
//!
//! These boards keep their state in memory and can be controlled
//! programmatically through a handle, without a board on the header.

pub mod led_board;
pub mod pro_hat;

pub use led_board::{MockLedBoard, MockLedBoardHandle};
pub use pro_hat::{MockProHat, MockProHatHandle};

use tokio::sync::watch;

/// Publish `value` only if it differs, so watchers see transitions only.
fn set_if_changed(tx: &watch::Sender<bool>, value: bool) {
    tx.send_if_modified(|current| {
        let changed = *current != value;
        *current = value;
        changed
    });
}
