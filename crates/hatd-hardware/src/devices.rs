//! Enum wrapper for board dispatch.
//!
//! Native `async fn` in traits is not object-safe, so `Box<dyn BoardDevice>`
//! is not available. [`AnyBoard`] provides concrete dispatch instead, and
//! keeps the futures `Send` so a service owning a board can be spawned.
//!
//! # Examples
//!
//! ```
//! use hatd_core::BoardKind;
//! use hatd_hardware::{AnyBoard, BoardDevice};
//!
//! let (board, _handle) = AnyBoard::mock(BoardKind::ProHat);
//! assert_eq!(board.kind(), BoardKind::ProHat);
//! assert_eq!(board.num_leds(), 0);
//! ```

use hatd_core::BoardKind;

use crate::mock::{MockLedBoard, MockLedBoardHandle, MockProHat, MockProHatHandle};
use crate::traits::BoardDevice;
use crate::events::BoardEvents;
use crate::{Result, Rgb};

/// Enum wrapper for board device dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyBoard {
    /// Mock LED ring or Pi hat.
    MockLed(MockLedBoard),
    /// Mock pro hat.
    MockProHat(MockProHat),
}

/// Control handle returned alongside a mock board.
#[derive(Debug, Clone)]
pub enum AnyMockHandle {
    /// Handle of a mock LED ring or Pi hat.
    Led(MockLedBoardHandle),
    /// Handle of a mock pro hat.
    ProHat(MockProHatHandle),
}

impl AnyBoard {
    /// Create the mock board for `kind`.
    pub fn mock(kind: BoardKind) -> (Self, AnyMockHandle) {
        match kind {
            BoardKind::LedRing => {
                let (board, handle) = MockLedBoard::led_ring();
                (Self::MockLed(board), AnyMockHandle::Led(handle))
            }
            BoardKind::PiHat => {
                let (board, handle) = MockLedBoard::pi_hat();
                (Self::MockLed(board), AnyMockHandle::Led(handle))
            }
            BoardKind::ProHat => {
                let (board, handle) = MockProHat::new();
                (Self::MockProHat(board), AnyMockHandle::ProHat(handle))
            }
        }
    }
}

impl From<MockLedBoard> for AnyBoard {
    fn from(board: MockLedBoard) -> Self {
        Self::MockLed(board)
    }
}

impl From<MockProHat> for AnyBoard {
    fn from(board: MockProHat) -> Self {
        Self::MockProHat(board)
    }
}

impl BoardDevice for AnyBoard {
    fn kind(&self) -> BoardKind {
        match self {
            Self::MockLed(board) => board.kind(),
            Self::MockProHat(board) => board.kind(),
        }
    }

    async fn initialise(&mut self) -> Result<()> {
        match self {
            Self::MockLed(board) => board.initialise().await,
            Self::MockProHat(board) => board.initialise().await,
        }
    }

    async fn detect(&self) -> Result<bool> {
        match self {
            Self::MockLed(board) => board.detect().await,
            Self::MockProHat(board) => board.detect().await,
        }
    }

    fn events(&self) -> BoardEvents {
        match self {
            Self::MockLed(board) => board.events(),
            Self::MockProHat(board) => board.events(),
        }
    }

    fn num_leds(&self) -> usize {
        match self {
            Self::MockLed(board) => board.num_leds(),
            Self::MockProHat(board) => board.num_leds(),
        }
    }

    async fn set_led(&mut self, index: usize, colour: Rgb) -> Result<()> {
        match self {
            Self::MockLed(board) => board.set_led(index, colour).await,
            Self::MockProHat(board) => board.set_led(index, colour).await,
        }
    }

    async fn is_battery_low(&self) -> Result<bool> {
        match self {
            Self::MockLed(board) => board.is_battery_low().await,
            Self::MockProHat(board) => board.is_battery_low().await,
        }
    }

    async fn set_power_button_enabled(&mut self, enabled: bool) -> Result<()> {
        match self {
            Self::MockLed(board) => board.set_power_button_enabled(enabled).await,
            Self::MockProHat(board) => board.set_power_button_enabled(enabled).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BoardEvent;

    #[tokio::test]
    async fn test_mock_per_kind() {
        for kind in [BoardKind::LedRing, BoardKind::PiHat, BoardKind::ProHat] {
            let (board, handle) = AnyBoard::mock(kind);
            assert_eq!(board.kind(), kind);
            assert_eq!(board.num_leds() > 0, kind.has_leds());
            match (kind, handle) {
                (BoardKind::ProHat, AnyMockHandle::ProHat(_)) => {}
                (BoardKind::LedRing | BoardKind::PiHat, AnyMockHandle::Led(_)) => {}
                (kind, handle) => panic!("unexpected handle {handle:?} for {kind}"),
            }
        }
    }

    #[tokio::test]
    async fn test_dispatch_set_led() {
        let (mut board, handle) = AnyBoard::mock(BoardKind::LedRing);
        board.set_led(5, Rgb::WHITE).await.unwrap();

        let AnyMockHandle::Led(handle) = handle else {
            panic!("expected LED handle");
        };
        assert_eq!(handle.led(5), Some(Rgb::WHITE));
    }

    #[tokio::test]
    async fn test_dispatch_battery() {
        let (board, handle) = AnyBoard::mock(BoardKind::ProHat);
        let AnyMockHandle::ProHat(handle) = handle else {
            panic!("expected pro hat handle");
        };

        handle.set_battery_low(true);
        assert!(board.is_battery_low().await.unwrap());
        assert!(board.detect().await.unwrap());
    }

    #[tokio::test]
    async fn test_from_impls() {
        let board: AnyBoard = MockProHat::default().into();
        assert_eq!(board.kind(), BoardKind::ProHat);

        let board: AnyBoard = MockLedBoard::default().into();
        assert_eq!(board.kind(), BoardKind::LedRing);
    }

    #[tokio::test]
    async fn test_dispatch_events() {
        let (board, handle) = AnyBoard::mock(BoardKind::ProHat);
        let AnyMockHandle::ProHat(handle) = handle else {
            panic!("expected pro hat handle");
        };

        let mut events = board.events();
        handle.set_battery_low(true);
        assert_eq!(events.next().await, Some(BoardEvent::BatteryLow(true)));
    }
}
