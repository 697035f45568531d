//! Daemon event loop.
//!
//! One task owns the [`BoardService`] and runs every bus call, every
//! supervisor tick and every board event in turn, so lock operations never
//! interleave with each other or with stale lock recovery.
//!
//! ```text
//!  mpsc<BusRequest> ──┐
//!  supervisor timer ──┼──> select! ──> BoardService ──> broadcast<Signal>
//!  board events ──────┘       ▲
//!  shutdown signal ───────────┘
//! ```
//!
//! The supervisor timer only exists while the supervisor is armed. It is
//! created one interval after the first lock and dropped once a tick finds
//! the lock table empty.

use std::time::Duration;

use hatd_core::DaemonConfig;
use hatd_hardware::{AnyBoard, BoardDevice, BoardEvent, BoardEvents};
use hatd_lock::TickOutcome;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::bus::{BusError, BusRequest, LocalBus, SignalEmitter};
use crate::service::BoardService;

/// The board daemon: a service and the queue it serves.
#[derive(Debug)]
pub struct BoardDaemon {
    service: BoardService,
    requests: mpsc::Receiver<BusRequest>,
    events: Option<BoardEvents>,
    signals: SignalEmitter,
    supervisor_interval: Duration,
}

impl BoardDaemon {
    /// Wire a daemon for `board` and return it with the bus clients connect
    /// through.
    pub fn new(config: &DaemonConfig, board: AnyBoard) -> (Self, LocalBus) {
        let (bus, requests) = LocalBus::new(config.request_queue);
        let events = board.events();
        let service = BoardService::new(config, board, bus.registry());
        let daemon = Self {
            service,
            requests,
            events: Some(events),
            signals: bus.signal_emitter(),
            supervisor_interval: config.supervisor_interval(),
        };
        (daemon, bus)
    }

    /// Serve until `shutdown` fires (or its sender is dropped) or every bus
    /// handle is gone.
    ///
    /// On shutdown, calls already queued are still answered.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        self.service.initialise().await;
        info!(
            board = %self.service.board().kind(),
            object_path = self.service.board().kind().object_path(),
            "Board service running"
        );

        let mut supervisor: Option<Interval> = None;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                request = self.requests.recv() => match request {
                    Some(request) => self.dispatch(request).await,
                    None => {
                        debug!("All bus handles dropped");
                        break;
                    }
                },
                _ = next_tick(&mut supervisor) => {
                    if self.service.supervise() == TickOutcome::Stop {
                        supervisor = None;
                    }
                }
                event = next_event(&mut self.events) => match event {
                    Some(event) => self.on_board_event(event).await,
                    None => {
                        debug!("Board event sources closed");
                        self.events = None;
                    }
                },
            }

            self.sync_supervisor(&mut supervisor);
        }

        self.requests.close();
        while let Some(request) = self.requests.recv().await {
            self.dispatch(request).await;
        }

        info!("Board service stopped");
    }

    /// Run the daemon on its own task.
    pub fn spawn(self) -> DaemonHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(shutdown_rx));
        DaemonHandle {
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }

    async fn dispatch(&mut self, request: BusRequest) {
        let BusRequest {
            sender,
            method,
            reply,
        } = request;
        let name = method.name();

        let answer = self.service.handle(&sender, method).await;
        debug!(caller = %sender, method = name, reply = %answer, "Bus call handled");

        if reply.send(answer).is_err() {
            debug!(caller = %sender, method = name, "Caller went away before the reply");
        }
    }

    async fn on_board_event(&mut self, event: BoardEvent) {
        if let Some(signal) = self.service.on_board_event(event).await {
            self.signals.emit(signal);
        }
    }

    /// Create or drop the timer so it matches the supervisor state.
    fn sync_supervisor(&self, supervisor: &mut Option<Interval>) {
        match (self.service.supervisor_armed(), supervisor.is_some()) {
            (true, false) => {
                let period = self.supervisor_interval.max(Duration::from_millis(1));
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                *supervisor = Some(interval);
            }
            (false, true) => *supervisor = None,
            _ => {}
        }
    }
}

async fn next_tick(supervisor: &mut Option<Interval>) {
    match supervisor {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_event(events: &mut Option<BoardEvents>) -> Option<BoardEvent> {
    match events {
        Some(events) => events.next().await,
        None => std::future::pending().await,
    }
}

/// Handle to a spawned daemon.
#[derive(Debug)]
pub struct DaemonHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl DaemonHandle {
    /// Stop the daemon and wait for it to finish answering queued calls.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Task`] if the daemon task panicked.
    pub async fn shutdown(mut self) -> Result<(), BusError> {
        if let Some(tx) = self.shutdown_tx.take()
            && tx.send(()).is_err()
        {
            warn!("Daemon already stopped");
        }
        self.task.await?;
        Ok(())
    }

    /// Whether the daemon task has finished.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hatd_core::BoardKind;

    fn config(proc_root: &std::path::Path) -> DaemonConfig {
        DaemonConfig {
            proc_root: proc_root.to_path_buf(),
            supervisor_interval_ms: 1_000,
            ..DaemonConfig::default()
        }
    }

    #[tokio::test]
    async fn test_spawn_and_shutdown() {
        let proc_root = tempfile::tempdir().unwrap();
        let (board, _handle) = AnyBoard::mock(BoardKind::LedRing);
        let (daemon, bus) = BoardDaemon::new(&config(proc_root.path()), board);
        let handle = daemon.spawn();

        let client = bus.connect(1);
        assert!(client.is_iface_valid().await.unwrap());

        handle.shutdown().await.unwrap();
        assert!(matches!(
            client.detect().await,
            Err(BusError::Closed { .. })
        ));
    }

    #[tokio::test]
    async fn test_loop_ends_when_bus_dropped() {
        let proc_root = tempfile::tempdir().unwrap();
        let (board, _handle) = AnyBoard::mock(BoardKind::ProHat);
        let (daemon, bus) = BoardDaemon::new(&config(proc_root.path()), board);
        let handle = daemon.spawn();

        drop(bus);
        tokio::time::timeout(Duration::from_secs(5), async {
            while !handle.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_timer_follows_lock_state() {
        let proc_root = tempfile::tempdir().unwrap();
        std::fs::create_dir(proc_root.path().join("100")).unwrap();

        let (board, _handle) = AnyBoard::mock(BoardKind::LedRing);
        let (daemon, bus) = BoardDaemon::new(&config(proc_root.path()), board);
        let handle = daemon.spawn();

        let client = bus.connect(100);
        assert_eq!(client.lock(4).await.unwrap(), ":1.1");

        std::fs::remove_dir(proc_root.path().join("100")).unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        let observer = bus.connect(200);
        assert!(!observer.is_locked(1).await.unwrap());

        handle.shutdown().await.unwrap();
    }
}
