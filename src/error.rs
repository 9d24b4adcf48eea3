//! Error types shared by the simulator and the tester.

use std::path::PathBuf;

/// Errors raised while decoding a 14-byte request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Fewer than 14 bytes were handed to the decoder.
    #[error("frame too short: {0} bytes")]
    TooShort(usize),
    /// The first 11 bytes are not the `Loewe test ` header.
    #[error("frame header mismatch")]
    MalformedHeader,
    /// The byte at offset 13 is not a carriage return.
    #[error("bad frame terminator 0x{0:02X}")]
    MalformedTerminator(u8),
}

/// The error type for transport, configuration and runtime failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The serial device could not be opened. Fatal at startup.
    #[error("cannot open port {path}: {source}")]
    PortUnavailable {
        path: String,
        #[source]
        source: serialport::Error,
    },

    /// A read or write on an open port failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The test-case file exists but could not be parsed.
    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A hex byte field (`cmd_hex`, `param_hex`, manual input) did not parse.
    #[error("invalid hex byte: {0:?}")]
    InvalidHex(String),

    /// The reader thread exited without reporting a result.
    #[error("reader task stopped unexpectedly")]
    ReaderStopped,
}

/// A convenience `Result` alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_error_display() {
        assert_eq!(FrameError::TooShort(3).to_string(), "frame too short: 3 bytes");
        assert_eq!(
            FrameError::MalformedTerminator(0x0A).to_string(),
            "bad frame terminator 0x0A"
        );
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("unplugged"));
    }

    #[test]
    fn invalid_hex_display() {
        let e = Error::InvalidHex("0xZZ".into());
        assert_eq!(e.to_string(), "invalid hex byte: \"0xZZ\"");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
