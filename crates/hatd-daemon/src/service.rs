//! Board service object.
//!
//! A [`BoardService`] is what the daemon publishes at a board's object path:
//! one board plus the lockable resource guarding it. It answers every bus
//! [`Method`] with a [`Reply`], never an error. Mutating LED calls pass the
//! lock gate before any device I/O is started.
//!
//! Board events become bus [`Signal`]s: plug changes map to
//! `device_connected`/`device_disconnected` with the service's object path,
//! battery changes to `power_level_changed`, button presses to
//! `power_button_pressed`.

use std::sync::Arc;

use hatd_core::DaemonConfig;
use hatd_core::constants::{BATTERY_LEVEL_FULL, BATTERY_LEVEL_LOW};
use hatd_hardware::{AnyBoard, BoardDevice, BoardEvent, HardwareError, Rgb};
use hatd_lock::{CallerIdentity, LockSupervisor, LockableResource, ProcessTable, TickOutcome};
use tracing::{debug, info, warn};

use crate::bus::{ConnectionRegistry, Method, Reply, Signal};

/// Lockable resource as wired in the daemon: identities come from the bus
/// registry, command lines and liveness from the process table.
pub type BoardResource = LockableResource<Arc<ConnectionRegistry>, ProcessTable, ProcessTable>;

/// One board and its lock.
#[derive(Debug)]
pub struct BoardService {
    board: AnyBoard,
    resource: BoardResource,
}

impl BoardService {
    /// Build the service for `board` from the daemon configuration.
    pub fn new(config: &DaemonConfig, board: AnyBoard, registry: Arc<ConnectionRegistry>) -> Self {
        let processes = ProcessTable::new(&config.proc_root);
        let identity = CallerIdentity::new(registry, processes.clone());
        let supervisor = LockSupervisor::with_interval(processes, config.supervisor_interval());
        let resource = LockableResource::new(
            board.kind().resource_name(),
            config.max_priority,
            identity,
            supervisor,
        );

        Self { board, resource }
    }

    /// Bring the board up. A missing board is logged, not fatal; it may be
    /// plugged in later.
    pub async fn initialise(&mut self) {
        match self.board.initialise().await {
            Ok(()) => info!(board = %self.board.kind(), "Board initialised"),
            Err(e) => warn!(board = %self.board.kind(), error = %e, "Board initialisation failed"),
        }
    }

    /// Answer one bus call from `sender`.
    pub async fn handle(&mut self, sender: &str, method: Method) -> Reply {
        if method.is_gated() && !self.admits(sender, &method) {
            return Reply::Bool(false);
        }

        match method {
            Method::IsIfaceValid => Reply::Bool(true),
            Method::Detect | Method::IsPlugged => Reply::Bool(self.detect().await),
            Method::GetNumLeds => {
                Reply::Int(i32::try_from(self.board.num_leds()).unwrap_or(i32::MAX))
            }
            Method::Lock { priority } => Reply::Str(self.resource.lock(priority, sender)),
            Method::Unlock => Reply::Bool(self.resource.unlock(sender)),
            Method::IsLocked { priority } => Reply::Bool(self.resource.is_locked(priority)),
            Method::GetMaxLockPriority => Reply::Int(self.resource.get_max_lock_priority()),
            Method::SetLed { index, colour, .. } => Reply::Bool(self.set_led(index, colour).await),
            Method::SetAllLeds { colours, .. } => Reply::Bool(self.set_all_leds(&colours).await),
            Method::SetLedsOff { .. } => Reply::Bool(self.set_leds_off().await),
            Method::IsBatteryLow => Reply::Bool(self.is_battery_low().await),
            Method::GetBatteryLevel => Reply::Int(self.get_battery_level().await),
            Method::SetPowerButtonEnabled { enabled } => {
                Reply::Bool(self.set_power_button_enabled(enabled).await)
            }
        }
    }

    /// Translate a board event into the signal to emit.
    ///
    /// A board that comes back is initialised again before the signal goes
    /// out.
    pub async fn on_board_event(&mut self, event: BoardEvent) -> Option<Signal> {
        let kind = self.board.kind();
        let object_path = kind.object_path().to_string();

        match event {
            BoardEvent::Plugged => {
                info!(board = %kind, "Board plugged in");
                self.initialise().await;
                Some(Signal::DeviceConnected { object_path })
            }
            BoardEvent::Unplugged => {
                warn!(board = %kind, "Board unplugged");
                Some(Signal::DeviceDisconnected { object_path })
            }
            BoardEvent::BatteryLow(low) => {
                let level = battery_level(low);
                info!(board = %kind, level, "Battery level changed");
                Some(Signal::PowerLevelChanged { level })
            }
            BoardEvent::PowerButtonPressed => {
                info!(board = %kind, "Power button pressed");
                Some(Signal::PowerButtonPressed)
            }
            _ => {
                debug!(board = %kind, ?event, "Board event ignored");
                None
            }
        }
    }

    /// Run one supervisor tick.
    pub fn supervise(&mut self) -> TickOutcome {
        self.resource.supervise()
    }

    /// Whether the supervisor wants periodic ticks.
    pub fn supervisor_armed(&self) -> bool {
        self.resource.supervisor_armed()
    }

    /// Lock surface of this service.
    pub fn resource(&self) -> &BoardResource {
        &self.resource
    }

    /// The board driven by this service.
    pub fn board(&self) -> &AnyBoard {
        &self.board
    }

    /// Gate check. The delegated variants present a token; the plain ones
    /// present the caller's own connection name.
    fn admits(&self, sender: &str, method: &Method) -> bool {
        let presented = match method {
            Method::SetLed { token: Some(token), .. }
            | Method::SetAllLeds { token: Some(token), .. }
            | Method::SetLedsOff { token: Some(token) } => token.as_str(),
            _ => sender,
        };

        let admitted = self.resource.admits(presented);
        if !admitted {
            info!(
                resource = self.resource.name(),
                method = method.name(),
                caller = sender,
                "Call rejected: resource is locked"
            );
        }
        admitted
    }

    async fn detect(&self) -> bool {
        self.board.detect().await.unwrap_or_else(|e| {
            warn!(board = %self.board.kind(), error = %e, "Board detection failed");
            false
        })
    }

    async fn set_led(&mut self, index: usize, colour: Rgb) -> bool {
        let result = self.board.set_led(index, colour).await;
        self.report("set_led", result)
    }

    /// Write `colours` from the first LED onwards, ignoring values past the
    /// end of the ring. Stops at the first LED that fails.
    async fn set_all_leds(&mut self, colours: &[Rgb]) -> bool {
        let num_leds = self.board.num_leds();
        if num_leds == 0 {
            return self.report("set_all_leds", Err(HardwareError::unsupported("set_all_leds")));
        }

        for (index, colour) in colours.iter().take(num_leds).enumerate() {
            let result = self.board.set_led(index, *colour).await;
            if !self.report("set_all_leds", result) {
                debug!(index, "set_all_leds stopped at failing LED");
                return false;
            }
        }
        true
    }

    async fn set_leds_off(&mut self) -> bool {
        let off = vec![Rgb::OFF; self.board.num_leds()];
        if off.is_empty() {
            return self.report("set_leds_off", Err(HardwareError::unsupported("set_leds_off")));
        }
        self.set_all_leds(&off).await
    }

    async fn is_battery_low(&self) -> bool {
        let result = self.board.is_battery_low().await;
        self.report_value("is_battery_low", result).unwrap_or(false)
    }

    async fn get_battery_level(&self) -> i32 {
        let result = self.board.is_battery_low().await;
        self.report_value("get_battery_level", result)
            .map_or(BATTERY_LEVEL_LOW, battery_level)
    }

    async fn set_power_button_enabled(&mut self, enabled: bool) -> bool {
        let result = self.board.set_power_button_enabled(enabled).await;
        if result.is_ok() {
            info!(board = %self.board.kind(), enabled, "Power button setting changed");
        }
        self.report("set_power_button_enabled", result)
    }

    fn report(&self, operation: &str, result: hatd_hardware::Result<()>) -> bool {
        self.report_value(operation, result).is_some()
    }

    /// Turn a device result into a value, logging unsupported calls at debug
    /// and device failures at warn.
    fn report_value<T>(&self, operation: &str, result: hatd_hardware::Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) if e.is_unsupported() => {
                debug!(board = %self.board.kind(), operation, "Not supported by this board");
                None
            }
            Err(e) => {
                warn!(board = %self.board.kind(), operation, error = %e, "Device call failed");
                None
            }
        }
    }
}

fn battery_level(low: bool) -> i32 {
    if low { BATTERY_LEVEL_LOW } else { BATTERY_LEVEL_FULL }
}
