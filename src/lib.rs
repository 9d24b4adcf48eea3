//! # Loewe Test Protocol Library
//!
//! Core of the production-test protocol spoken over a serial link between
//! a PC test fixture and the control unit under test (DUT).
//!
//! The PC sends fixed 14-byte frames (`Loewe test ` + CMD + PARAM + `0x0D`);
//! the unit answers with free text `ACK: <message>\r`. This crate holds both
//! sides: the DUT simulator ([`simulator`], [`dispatch`], [`device`]) and the
//! PC tester ([`runner`], [`validator`], [`config`]), sharing the wire
//! format in [`frame`] and the port abstraction in [`transport`].

pub mod config;
pub mod control;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod framer;
pub mod runner;
pub mod simulator;
pub mod transport;
pub mod validator;

pub use device::{ButtonStatus, DeviceState, SharedDevice};
pub use error::{Error, FrameError, Result};
pub use frame::Frame;
pub use framer::StreamFramer;
pub use simulator::Simulator;
pub use transport::{MemoryPort, Port, SerialLink};
