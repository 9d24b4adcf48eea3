//! Operator actions on the running simulator.

use std::fmt::Write as _;

use tracing::info;

use crate::device::{ButtonStatus, SharedDevice, Snapshot};
use crate::error::Result;
use crate::frame;
use crate::simulator::Outbound;

/// A menu entry as typed by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    VolumeUp,
    VolumeDown,
    PressPlay,
    PressPower,
    CustomButton,
    ClearButton,
    Override,
    Unsolicited,
    Status,
    Quit,
}

impl Choice {
    /// Parses a menu line. Unknown input yields `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let choice = match input.trim().to_ascii_lowercase().as_str() {
            "1" | "+" => Choice::VolumeUp,
            "2" | "-" => Choice::VolumeDown,
            "3" => Choice::PressPlay,
            "4" => Choice::PressPower,
            "5" => Choice::CustomButton,
            "6" => Choice::ClearButton,
            "7" => Choice::Override,
            "8" => Choice::Unsolicited,
            "9" | "s" => Choice::Status,
            "q" | "0" => Choice::Quit,
            _ => return None,
        };
        Some(choice)
    }

    /// The prompt for entries that need a line of text.
    pub fn text_prompt(&self) -> Option<&'static str> {
        match self {
            Choice::CustomButton => Some("Button text"),
            Choice::Override => Some("Next reply text"),
            Choice::Unsolicited => Some("Text to send"),
            _ => None,
        }
    }

    /// Builds the action, attaching `text` where the entry takes one.
    pub fn into_action(self, text: String) -> Action {
        match self {
            Choice::VolumeUp => Action::VolumeUp,
            Choice::VolumeDown => Action::VolumeDown,
            Choice::PressPlay => Action::SetButton(ButtonStatus::PlayPressed),
            Choice::PressPower => Action::SetButton(ButtonStatus::PowerPressed),
            Choice::CustomButton => Action::SetButton(ButtonStatus::Other(text)),
            Choice::ClearButton => Action::SetButton(ButtonStatus::None),
            Choice::Override => Action::SetOverride(text),
            Choice::Unsolicited => Action::SendUnsolicited(text),
            Choice::Status => Action::Status,
            Choice::Quit => Action::Quit,
        }
    }
}

/// The menu text shown by the simulator.
pub const MENU: &str = "\
  1. Volume +1
  2. Volume -1
  3. Press Play
  4. Press Power
  5. Set custom button text
  6. Clear button
  7. Override next reply
  8. Send unsolicited text
  9. Status
  q. Quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    VolumeUp,
    VolumeDown,
    SetButton(ButtonStatus),
    SetOverride(String),
    SendUnsolicited(String),
    Status,
    Quit,
}

/// Applies `action` and returns a line of feedback for the operator.
///
/// `Quit` is a no-op here; the caller owns shutdown.
pub fn apply(action: Action, device: &SharedDevice, outbound: &Outbound) -> Result<String> {
    let feedback = match action {
        Action::VolumeUp => format!("Volume: {}", device.volume_up()),
        Action::VolumeDown => format!("Volume: {}", device.volume_down()),
        Action::SetButton(status) => {
            let shown = status.to_string();
            device.set_button(status);
            format!("Button: {shown}")
        }
        Action::SetOverride(text) => {
            let feedback = format!("Next reply will be {text:?}");
            if let Some(old) = device.set_override(text) {
                info!(replaced = %old, "override replaced");
            }
            feedback
        }
        Action::SendUnsolicited(text) => {
            outbound.send(&frame::encode_unsolicited(&text))?;
            device.record_unsolicited(&text);
            info!(text = %text, "unsolicited send");
            format!("Sent {text:?}")
        }
        Action::Status => render_status(&device.snapshot()),
        Action::Quit => String::from("Quitting"),
    };
    Ok(feedback)
}

/// Renders a status block from a snapshot.
pub fn render_status(snap: &Snapshot) -> String {
    let state = &snap.state;
    let mut out = String::new();
    let _ = writeln!(out, "Firmware : {}", state.firmware_version);
    let _ = writeln!(out, "BT addr  : {}", state.bt_address);
    let _ = writeln!(out, "Volume   : {}", state.volume);
    let _ = writeln!(out, "Button   : {}", state.button_status);
    let _ = writeln!(
        out,
        "TestMode : {}",
        if state.test_mode_enabled { "ON" } else { "OFF" }
    );
    let _ = writeln!(
        out,
        "Override : {}",
        state.pending_override.as_deref().unwrap_or("-")
    );
    let _ = writeln!(
        out,
        "Last RX  : {}",
        snap.log.last_received.as_deref().unwrap_or("-")
    );
    let _ = write!(
        out,
        "Last TX  : {}",
        snap.log.last_sent.as_deref().unwrap_or("-")
    );
    if let Some(at) = snap.log.at {
        let _ = write!(out, " @ {}", at.format("%H:%M:%S"));
    }
    out
}
