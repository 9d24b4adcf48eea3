//! Maps a decoded frame onto the device state and produces the reply text.

use tracing::debug;

use crate::device::{DeviceState, MAX_VOLUME};
use crate::frame::Frame;

// Opcodes understood by the unit. Anything else is answered, not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetFirmwareVersion,
    GetBluetoothAddress,
    GetButtonStatus,
    MagicLed,
    SetVolume(u8),
    SetTestMode(bool),
    Unknown(u8),
}

impl Command {
    /// Interprets the opcode and operand of `frame`.
    pub fn parse(frame: Frame) -> Self {
        match frame.cmd() {
            0x00 => Command::GetFirmwareVersion,
            0x01 => Command::GetBluetoothAddress,
            0x02 => Command::GetButtonStatus,
            0x04 => Command::MagicLed,
            0x0C => Command::SetVolume(frame.param()),
            // Only 0x01 switches test mode on.
            0x99 => Command::SetTestMode(frame.param() == 0x01),
            other => Command::Unknown(other),
        }
    }
}

/// Produces the reply message for `frame`, applying its side effects.
///
/// A pending override wins over every opcode and is consumed here.
pub fn dispatch(state: &mut DeviceState, frame: Frame) -> String {
    if let Some(text) = state.pending_override.take() {
        debug!(cmd = %format_args!("0x{:02X}", frame.cmd()), "override consumed");
        return text;
    }
    execute(state, Command::parse(frame))
}

fn execute(state: &mut DeviceState, command: Command) -> String {
    match command {
        Command::GetFirmwareVersion => state.firmware_version.clone(),
        Command::GetBluetoothAddress => state.bt_address.clone(),
        Command::GetButtonStatus => state.button_status.to_string(),
        Command::MagicLed => String::from("OK"),
        Command::SetVolume(level) if level <= MAX_VOLUME => {
            state.volume = level;
            format!("OK (Vol:{level})")
        }
        Command::SetVolume(level) => {
            debug!(level, "volume out of range");
            String::from("Error: Range 0-15")
        }
        Command::SetTestMode(true) => {
            state.test_mode_enabled = true;
            String::from("Test Mode ON")
        }
        Command::SetTestMode(false) => {
            state.test_mode_enabled = false;
            String::from("Test Mode OFF")
        }
        Command::Unknown(_) => String::from("Unknown CMD"),
    }
}
