//! Board daemon: serves one add-on board to client processes.
//!
//! Clients connect over the in-process [`bus`], lock the board's API at a
//! priority, and drive its LEDs or read its battery state. The daemon runs
//! the [`BoardService`] on a single event loop together with the stale lock
//! supervisor, and forwards board events to subscribers as bus signals.
//!
//! # Examples
//!
//! ```no_run
//! use hatd_core::{BoardKind, DaemonConfig};
//! use hatd_daemon::BoardDaemon;
//! use hatd_hardware::{AnyBoard, Rgb};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hatd_daemon::BusError> {
//!     let config = DaemonConfig::default();
//!     let (board, _handle) = AnyBoard::mock(BoardKind::LedRing);
//!     let (daemon, bus) = BoardDaemon::new(&config, board);
//!     let daemon = daemon.spawn();
//!
//!     let client = bus.connect_self();
//!     let token = client.lock(5).await?;
//!     assert!(!token.is_empty());
//!     client.set_led(0, Rgb::WHITE).await?;
//!     client.unlock().await?;
//!
//!     daemon.shutdown().await
//! }
//! ```

pub mod bus;
pub mod logging;
pub mod runtime;
pub mod service;

pub use bus::{
    BusConnection, BusError, BusRequest, ConnectionRegistry, LocalBus, Method, Reply, Signal,
    SignalEmitter,
};
pub use runtime::{BoardDaemon, DaemonHandle};
pub use service::{BoardResource, BoardService};
