//! In-process message bus.
//!
//! Clients talk to a board service the way they would over the system bus:
//! each client opens a [`BusConnection`], which is given a unique name
//! (`:1.N`) bound to the client's pid, and every method call carries that
//! name as its sender. The service side receives [`BusRequest`]s from a
//! single queue and answers each one through a oneshot reply channel.
//!
//! ```text
//! BusConnection :1.1 ┐
//!                    ├──> mpsc<BusRequest> ──> BoardDaemon event loop
//! BusConnection :1.2 ┘                              │
//!        ▲                                          │
//!        └──────────── oneshot<Reply> ◄─────────────┘
//! ```
//!
//! The [`ConnectionRegistry`] answers the pid-of-connection query the lock
//! layer needs to identify callers. Dropping a connection removes its name.
//!
//! Signals travel the other way: the service emits a [`Signal`] on a
//! broadcast channel and every connection that subscribed receives a copy.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use hatd_core::constants::{SIGNAL_BUFFER, UNIQUE_NAME_PREFIX};
use hatd_hardware::Rgb;
use hatd_lock::{BusIdentity, IdentityError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

/// Bus transport errors.
#[derive(Debug, Error)]
pub enum BusError {
    /// The service side of the bus has shut down.
    #[error("Bus closed: {method} could not be delivered")]
    Closed { method: &'static str },

    /// The service answered with a reply of the wrong shape.
    #[error("Unexpected reply to {method}: {reply}")]
    UnexpectedReply { method: &'static str, reply: Reply },

    /// The daemon task panicked or was cancelled.
    #[error("Daemon task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A method call on a board service object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Method {
    /// Liveness ping of the service interface.
    IsIfaceValid,
    /// Whether the board is plugged in.
    Detect,
    /// Alias of `detect`.
    IsPlugged,
    /// Number of LEDs on the board.
    GetNumLeds,
    /// Lock the board API at `priority`.
    Lock { priority: i32 },
    /// Release the caller's lock.
    Unlock,
    /// Whether `priority` or above is locked.
    IsLocked { priority: i32 },
    /// Highest lockable priority.
    GetMaxLockPriority,
    /// Set one LED. `token` selects the delegated variant.
    SetLed {
        index: usize,
        colour: Rgb,
        token: Option<String>,
    },
    /// Set LEDs in order from the start of the ring.
    SetAllLeds {
        colours: Vec<Rgb>,
        token: Option<String>,
    },
    /// Turn every LED off.
    SetLedsOff { token: Option<String> },
    /// Whether the battery is low.
    IsBatteryLow,
    /// Battery level, 0 or 100.
    GetBatteryLevel,
    /// Enable or disable the power button.
    SetPowerButtonEnabled { enabled: bool },
}

impl Method {
    /// Bus-visible method name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::IsIfaceValid => "is_iface_valid",
            Self::Detect => "detect",
            Self::IsPlugged => "is_plugged",
            Self::GetNumLeds => "get_num_leds",
            Self::Lock { .. } => "lock",
            Self::Unlock => "unlock",
            Self::IsLocked { .. } => "is_locked",
            Self::GetMaxLockPriority => "get_max_lock_priority",
            Self::SetLed { token: None, .. } => "set_led",
            Self::SetLed { token: Some(_), .. } => "set_led_with_token",
            Self::SetAllLeds { token: None, .. } => "set_all_leds",
            Self::SetAllLeds { token: Some(_), .. } => "set_all_leds_with_token",
            Self::SetLedsOff { token: None } => "set_leds_off",
            Self::SetLedsOff { token: Some(_) } => "set_leds_off_with_token",
            Self::IsBatteryLow => "is_battery_low",
            Self::GetBatteryLevel => "get_battery_level",
            Self::SetPowerButtonEnabled { .. } => "set_power_button_enabled",
        }
    }

    /// Whether the call mutates hardware and must pass the lock gate.
    pub fn is_gated(&self) -> bool {
        matches!(
            self,
            Self::SetLed { .. } | Self::SetAllLeds { .. } | Self::SetLedsOff { .. }
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reply to a method call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Bool(bool),
    Int(i32),
    Str(String),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(value) => write!(f, "{value:?}"),
        }
    }
}

/// A signal emitted by a board service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    /// The board at `object_path` was plugged in.
    DeviceConnected { object_path: String },
    /// The board at `object_path` was unplugged.
    DeviceDisconnected { object_path: String },
    /// The battery level changed, 0 (low) or 100.
    PowerLevelChanged { level: i32 },
    /// The power button was pressed while enabled.
    PowerButtonPressed,
}

impl Signal {
    /// Bus-visible signal name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DeviceConnected { .. } => "device_connected",
            Self::DeviceDisconnected { .. } => "device_disconnected",
            Self::PowerLevelChanged { .. } => "power_level_changed",
            Self::PowerButtonPressed => "power_button_pressed",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A method call in flight, as seen by the service.
#[derive(Debug)]
pub struct BusRequest {
    /// Unique name of the calling connection.
    pub sender: String,
    /// The call.
    pub method: Method,
    /// Where to send the answer.
    pub reply: oneshot::Sender<Reply>,
}

/// Unique-name to pid table of open connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    connections: Mutex<HashMap<String, u32>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `pid` and return its unique name.
    pub fn register(&self, pid: u32) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let name = format!("{UNIQUE_NAME_PREFIX}{id}");
        self.table().insert(name.clone(), pid);
        debug!(connection = %name, pid, "Connection registered");
        name
    }

    /// Remove a connection. Returns `false` if it was not registered.
    pub fn unregister(&self, unique_name: &str) -> bool {
        let removed = self.table().remove(unique_name).is_some();
        if removed {
            debug!(connection = unique_name, "Connection closed");
        }
        removed
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// Whether no connection is open.
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<String, u32>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BusIdentity for ConnectionRegistry {
    fn connection_pid(&self, caller_token: &str) -> hatd_lock::Result<u32> {
        self.table()
            .get(caller_token)
            .copied()
            .ok_or_else(|| IdentityError::unknown_connection(caller_token))
    }
}

/// Service side of the bus: the connection registry, the request queue and
/// the signal channel.
#[derive(Debug, Clone)]
pub struct LocalBus {
    registry: Arc<ConnectionRegistry>,
    request_tx: mpsc::Sender<BusRequest>,
    signal_tx: broadcast::Sender<Signal>,
}

impl LocalBus {
    /// Create a bus whose request queue holds `capacity` pending calls.
    ///
    /// Returns the bus and the receiving end the service reads from.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<BusRequest>) {
        let (request_tx, request_rx) = mpsc::channel(capacity.max(1));
        let (signal_tx, _) = broadcast::channel(SIGNAL_BUFFER);
        let bus = Self {
            registry: Arc::new(ConnectionRegistry::new()),
            request_tx,
            signal_tx,
        };
        (bus, request_rx)
    }

    /// Open a connection on behalf of process `pid`.
    pub fn connect(&self, pid: u32) -> BusConnection {
        let unique_name = self.registry.register(pid);
        BusConnection {
            unique_name,
            registry: Arc::clone(&self.registry),
            request_tx: self.request_tx.clone(),
            signal_tx: self.signal_tx.clone(),
        }
    }

    /// Open a connection for the current process.
    pub fn connect_self(&self) -> BusConnection {
        self.connect(std::process::id())
    }

    /// Shared connection registry.
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Emitting end of the signal channel, for the service side.
    pub fn signal_emitter(&self) -> SignalEmitter {
        SignalEmitter {
            signal_tx: self.signal_tx.clone(),
        }
    }
}

/// Emits signals to every subscribed connection.
///
/// Holding an emitter does not keep the request queue open.
#[derive(Debug, Clone)]
pub struct SignalEmitter {
    signal_tx: broadcast::Sender<Signal>,
}

impl SignalEmitter {
    /// Broadcast `signal`. Returns how many subscribers received it.
    pub fn emit(&self, signal: Signal) -> usize {
        let name = signal.name();
        match self.signal_tx.send(signal) {
            Ok(receivers) => {
                debug!(signal = name, receivers, "Signal emitted");
                receivers
            }
            Err(_) => {
                debug!(signal = name, "Signal emitted with no subscribers");
                0
            }
        }
    }
}

/// Client side of one bus connection.
///
/// Typed proxy methods mirror the service's bus surface. The connection is
/// unregistered when dropped or closed.
#[derive(Debug)]
pub struct BusConnection {
    unique_name: String,
    registry: Arc<ConnectionRegistry>,
    request_tx: mpsc::Sender<BusRequest>,
    signal_tx: broadcast::Sender<Signal>,
}

impl BusConnection {
    /// Unique name of this connection; also the caller token.
    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    /// Close the connection.
    pub fn close(self) {
        drop(self);
    }

    /// Receive the signals emitted from now on.
    ///
    /// A subscriber that falls more than the signal buffer behind gets
    /// `RecvError::Lagged` and skips the oldest signals.
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.signal_tx.subscribe()
    }

    /// Send a raw method call and wait for the reply.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] if the service has shut down.
    pub async fn call(&self, method: Method) -> Result<Reply, BusError> {
        let name = method.name();
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = BusRequest {
            sender: self.unique_name.clone(),
            method,
            reply: reply_tx,
        };

        self.request_tx
            .send(request)
            .await
            .map_err(|_| BusError::Closed { method: name })?;

        reply_rx.await.map_err(|_| BusError::Closed { method: name })
    }

    async fn call_bool(&self, method: Method) -> Result<bool, BusError> {
        let name = method.name();
        match self.call(method).await? {
            Reply::Bool(value) => Ok(value),
            reply => Err(BusError::UnexpectedReply { method: name, reply }),
        }
    }

    async fn call_int(&self, method: Method) -> Result<i32, BusError> {
        let name = method.name();
        match self.call(method).await? {
            Reply::Int(value) => Ok(value),
            reply => Err(BusError::UnexpectedReply { method: name, reply }),
        }
    }

    /// Check that the service interface answers.
    pub async fn is_iface_valid(&self) -> Result<bool, BusError> {
        self.call_bool(Method::IsIfaceValid).await
    }

    /// Whether the board is plugged in.
    pub async fn detect(&self) -> Result<bool, BusError> {
        self.call_bool(Method::Detect).await
    }

    /// Whether the board is plugged in; same answer as [`detect`](Self::detect).
    pub async fn is_plugged(&self) -> Result<bool, BusError> {
        self.call_bool(Method::IsPlugged).await
    }

    /// Number of LEDs on the board.
    pub async fn get_num_leds(&self) -> Result<i32, BusError> {
        self.call_int(Method::GetNumLeds).await
    }

    /// Lock the board API. Returns the delegation token, or an empty string
    /// if the lock was refused.
    pub async fn lock(&self, priority: i32) -> Result<String, BusError> {
        let method = Method::Lock { priority };
        let name = method.name();
        match self.call(method).await? {
            Reply::Str(token) => Ok(token),
            reply => Err(BusError::UnexpectedReply { method: name, reply }),
        }
    }

    /// Release this connection's lock.
    pub async fn unlock(&self) -> Result<bool, BusError> {
        self.call_bool(Method::Unlock).await
    }

    /// Whether `priority` or above is locked.
    pub async fn is_locked(&self, priority: i32) -> Result<bool, BusError> {
        self.call_bool(Method::IsLocked { priority }).await
    }

    /// Highest lockable priority.
    pub async fn get_max_lock_priority(&self) -> Result<i32, BusError> {
        self.call_int(Method::GetMaxLockPriority).await
    }

    /// Set one LED.
    pub async fn set_led(&self, index: usize, colour: Rgb) -> Result<bool, BusError> {
        self.call_bool(Method::SetLed {
            index,
            colour,
            token: None,
        })
        .await
    }

    /// Set one LED on behalf of the holder of `token`.
    pub async fn set_led_with_token(
        &self,
        index: usize,
        colour: Rgb,
        token: &str,
    ) -> Result<bool, BusError> {
        self.call_bool(Method::SetLed {
            index,
            colour,
            token: Some(token.to_string()),
        })
        .await
    }

    /// Set LEDs in order from the start of the ring.
    pub async fn set_all_leds(&self, colours: Vec<Rgb>) -> Result<bool, BusError> {
        self.call_bool(Method::SetAllLeds {
            colours,
            token: None,
        })
        .await
    }

    /// Set LEDs on behalf of the holder of `token`.
    pub async fn set_all_leds_with_token(
        &self,
        colours: Vec<Rgb>,
        token: &str,
    ) -> Result<bool, BusError> {
        self.call_bool(Method::SetAllLeds {
            colours,
            token: Some(token.to_string()),
        })
        .await
    }

    /// Turn every LED off.
    pub async fn set_leds_off(&self) -> Result<bool, BusError> {
        self.call_bool(Method::SetLedsOff { token: None }).await
    }

    /// Turn every LED off on behalf of the holder of `token`.
    pub async fn set_leds_off_with_token(&self, token: &str) -> Result<bool, BusError> {
        self.call_bool(Method::SetLedsOff {
            token: Some(token.to_string()),
        })
        .await
    }

    /// Whether the battery is low.
    pub async fn is_battery_low(&self) -> Result<bool, BusError> {
        self.call_bool(Method::IsBatteryLow).await
    }

    /// Battery level, 0 when low and 100 otherwise.
    pub async fn get_battery_level(&self) -> Result<i32, BusError> {
        self.call_int(Method::GetBatteryLevel).await
    }

    /// Enable or disable the power button.
    pub async fn set_power_button_enabled(&self, enabled: bool) -> Result<bool, BusError> {
        self.call_bool(Method::SetPowerButtonEnabled { enabled })
            .await
    }
}

impl Drop for BusConnection {
    fn drop(&mut self) {
        self.registry.unregister(&self.unique_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_unique_names_are_sequential() {
        let (bus, _rx) = LocalBus::new(4);
        let first = bus.connect(100);
        let second = bus.connect(200);

        assert_eq!(first.unique_name(), ":1.1");
        assert_eq!(second.unique_name(), ":1.2");
        assert_eq!(bus.registry().len(), 2);
    }

    #[test]
    fn test_registry_resolves_pid() {
        let (bus, _rx) = LocalBus::new(4);
        let conn = bus.connect(4242);
        let registry = bus.registry();

        assert_eq!(registry.connection_pid(conn.unique_name()).unwrap(), 4242);
        assert!(matches!(
            registry.connection_pid(":1.99"),
            Err(IdentityError::UnknownConnection { .. })
        ));
    }

    #[test]
    fn test_close_unregisters() {
        let (bus, _rx) = LocalBus::new(4);
        let conn = bus.connect(7);
        let name = conn.unique_name().to_string();
        let registry = bus.registry();

        conn.close();
        assert!(registry.is_empty());
        assert!(registry.connection_pid(&name).is_err());
        assert!(!registry.unregister(&name));
    }

    #[tokio::test]
    async fn test_call_delivers_sender_and_reply() {
        let (bus, mut rx) = LocalBus::new(4);
        let conn = bus.connect(1);

        let server = tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            assert_eq!(request.sender, ":1.1");
            assert_eq!(request.method, Method::Lock { priority: 3 });
            request.reply.send(Reply::Str(request.sender.clone())).unwrap();
        });

        assert_eq!(conn.lock(3).await.unwrap(), ":1.1");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unexpected_reply() {
        let (bus, mut rx) = LocalBus::new(4);
        let conn = bus.connect(1);

        tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            request.reply.send(Reply::Int(5)).unwrap();
        });

        let err = conn.unlock().await.unwrap_err();
        assert!(matches!(err, BusError::UnexpectedReply { method: "unlock", .. }));
    }

    #[tokio::test]
    async fn test_closed_bus() {
        let (bus, rx) = LocalBus::new(4);
        let conn = bus.connect(1);
        drop(rx);

        let err = conn.detect().await.unwrap_err();
        assert!(matches!(err, BusError::Closed { method: "detect" }));
    }

    #[rstest]
    #[case(Method::SetLed { index: 0, colour: Rgb::OFF, token: None }, "set_led", true)]
    #[case(Method::SetLed { index: 0, colour: Rgb::OFF, token: Some("t".into()) }, "set_led_with_token", true)]
    #[case(Method::SetAllLeds { colours: vec![], token: None }, "set_all_leds", true)]
    #[case(Method::SetLedsOff { token: Some("t".into()) }, "set_leds_off_with_token", true)]
    #[case(Method::Lock { priority: 1 }, "lock", false)]
    #[case(Method::IsBatteryLow, "is_battery_low", false)]
    #[case(Method::IsPlugged, "is_plugged", false)]
    #[case(Method::SetPowerButtonEnabled { enabled: true }, "set_power_button_enabled", false)]
    fn test_method_names_and_gating(
        #[case] method: Method,
        #[case] name: &str,
        #[case] gated: bool,
    ) {
        assert_eq!(method.name(), name);
        assert_eq!(method.to_string(), name);
        assert_eq!(method.is_gated(), gated);
    }

    #[tokio::test]
    async fn test_signals_reach_subscribers() {
        let (bus, _rx) = LocalBus::new(4);
        let emitter = bus.signal_emitter();
        assert_eq!(emitter.emit(Signal::PowerButtonPressed), 0);

        let first = bus.connect(1);
        let second = bus.connect(2);
        let mut first_signals = first.subscribe();
        let mut second_signals = second.subscribe();

        let signal = Signal::PowerLevelChanged { level: 0 };
        assert_eq!(emitter.emit(signal.clone()), 2);
        assert_eq!(first_signals.recv().await.unwrap(), signal);
        assert_eq!(second_signals.recv().await.unwrap(), signal);
    }

    #[test]
    fn test_signal_serde() {
        let signal = Signal::DeviceDisconnected {
            object_path: "/me/kano/boards/PiHat".to_string(),
        };
        let json = serde_json::to_string(&signal).unwrap();
        assert_eq!(
            json,
            r#"{"signal":"device_disconnected","object_path":"/me/kano/boards/PiHat"}"#
        );
        assert_eq!(signal.to_string(), "device_disconnected");
    }

    #[test]
    fn test_method_deserialization_clamps_colours() {
        let method: Method = serde_json::from_str(
            r#"{"method":"set_led","index":0,"colour":{"r":5.0,"g":-3.0,"b":0.5}}"#,
        )
        .unwrap();
        assert_eq!(
            method,
            Method::SetLed {
                index: 0,
                colour: Rgb::new(1.0, 0.0, 0.5),
                token: None,
            }
        );
    }

    #[test]
    fn test_method_serde() {
        let method = Method::Lock { priority: 4 };
        let json = serde_json::to_string(&method).unwrap();
        assert_eq!(json, r#"{"method":"lock","priority":4}"#);
        let parsed: Method = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, method);
    }
}
