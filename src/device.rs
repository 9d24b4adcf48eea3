//! State of the simulated control unit.
//!
//! There is exactly one [`DeviceState`] per simulator process. The reader
//! thread and the operator menu both reach it through [`SharedDevice`],
//! which guards the whole record with a single mutex.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};

use crate::dispatch;
use crate::frame::Frame;

/// Highest volume step the unit accepts.
pub const MAX_VOLUME: u8 = 15;
/// Volume at power-up.
pub const DEFAULT_VOLUME: u8 = 8;
pub const DEFAULT_FIRMWARE: &str = "v1.0.5";
pub const DEFAULT_BT_ADDRESS: &str = "00:11:22:33:44:55";

/// Button state reported by `GetButtonStatus`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ButtonStatus {
    #[default]
    None,
    PlayPressed,
    PowerPressed,
    /// Operator-injected free text.
    Other(String),
}

impl fmt::Display for ButtonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonStatus::None => f.write_str("None"),
            ButtonStatus::PlayPressed => f.write_str("PlayPressed"),
            ButtonStatus::PowerPressed => f.write_str("PowerPressed"),
            ButtonStatus::Other(text) => f.write_str(text),
        }
    }
}

// The persistent record of the simulated unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    pub volume: u8,
    pub button_status: ButtonStatus,
    pub firmware_version: String,
    pub bt_address: String,
    pub test_mode_enabled: bool,
    // One-shot reply override, consumed by the next dispatched frame.
    pub pending_override: Option<String>,
}

impl DeviceState {
    /// Creates the power-up state with the given identity strings.
    pub fn new(firmware_version: impl Into<String>, bt_address: impl Into<String>) -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            button_status: ButtonStatus::None,
            firmware_version: firmware_version.into(),
            bt_address: bt_address.into(),
            test_mode_enabled: false,
            pending_override: None,
        }
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new(DEFAULT_FIRMWARE, DEFAULT_BT_ADDRESS)
    }
}

/// The last exchange seen by the simulator. A single slot, not a history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommLog {
    pub last_received: Option<String>,
    pub last_sent: Option<String>,
    pub at: Option<DateTime<Local>>,
}

impl CommLog {
    fn record(&mut self, received: Option<String>, sent: String) {
        if received.is_some() {
            self.last_received = received;
        }
        self.last_sent = Some(sent);
        self.at = Some(Local::now());
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: DeviceState,
    log: CommLog,
}

/// A consistent copy of the device state and log, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub state: DeviceState,
    pub log: CommLog,
}

/// Lock-guarded handle to the single device record.
///
/// Every mutation goes through one of these methods, each of which holds
/// the lock for the whole read-modify-write.
#[derive(Debug, Clone, Default)]
pub struct SharedDevice {
    inner: Arc<Mutex<Inner>>,
}

impl SharedDevice {
    pub fn new(state: DeviceState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                log: CommLog::default(),
            })),
        }
    }

    // The record is plain data, so a panic elsewhere cannot leave it torn.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Dispatches `frame` against the state and records the exchange.
    ///
    /// Returns the reply message without the `ACK: ` wrapper.
    pub fn dispatch(&self, frame: Frame) -> String {
        let mut inner = self.lock();
        let reply = dispatch::dispatch(&mut inner.state, frame);
        let received = format!("CMD:0x{:02X} PARAM:0x{:02X}", frame.cmd(), frame.param());
        inner.log.record(Some(received), format!("ACK: {reply}"));
        reply
    }

    /// Arms the one-shot override. Returns a still-pending override it replaced.
    pub fn set_override(&self, text: impl Into<String>) -> Option<String> {
        self.lock().state.pending_override.replace(text.into())
    }

    pub fn clear_override(&self) -> Option<String> {
        self.lock().state.pending_override.take()
    }

    /// Raises the volume one step, saturating at [`MAX_VOLUME`].
    pub fn volume_up(&self) -> u8 {
        let mut inner = self.lock();
        inner.state.volume = inner.state.volume.saturating_add(1).min(MAX_VOLUME);
        inner.state.volume
    }

    /// Lowers the volume one step, saturating at zero.
    pub fn volume_down(&self) -> u8 {
        let mut inner = self.lock();
        inner.state.volume = inner.state.volume.saturating_sub(1);
        inner.state.volume
    }

    pub fn set_button(&self, status: ButtonStatus) {
        self.lock().state.button_status = status;
    }

    pub fn clear_button(&self) {
        self.set_button(ButtonStatus::None);
    }

    /// Records an operator-initiated send in the communication log.
    pub fn record_unsolicited(&self, text: &str) {
        self.lock().log.record(None, text.to_string());
    }

    /// Takes a copy of state and log under the lock.
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.lock();
        Snapshot {
            state: inner.state.clone(),
            log: inner.log.clone(),
        }
    }
}
