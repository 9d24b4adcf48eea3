//! Finds request frames in an arbitrarily chunked byte stream.
//!
//! The framer slides over its buffer one byte at a time until the header
//! sits at offset 0, then commits to the next 14 bytes as one packet. A
//! packet whose terminator is wrong is dropped whole. Scanning stops while
//! fewer than 14 bytes are buffered, so at most 13 bytes are ever carried
//! between calls.

use tracing::{trace, warn};

use crate::frame::{self, Frame, FRAME_LEN};

/// Counters kept across the lifetime of a framer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerStats {
    pub frames: u64,
    pub malformed: u64,
    pub skipped_bytes: u64,
}

/// Per-connection stream framer.
#[derive(Debug, Default)]
pub struct StreamFramer {
    buffer: Vec<u8>,
    stats: FramerStats,
}

impl StreamFramer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(2 * FRAME_LEN),
            stats: FramerStats::default(),
        }
    }

    /// Appends `chunk` and returns every complete frame now available, in
    /// stream order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut pos = 0;
        while self.buffer.len() - pos >= FRAME_LEN {
            let window = &self.buffer[pos..pos + FRAME_LEN];
            if !frame::has_header(window) {
                pos += 1;
                self.stats.skipped_bytes += 1;
                continue;
            }
            match frame::decode(window) {
                Ok(frame) => {
                    trace!(
                        cmd = %format_args!("0x{:02X}", frame.cmd()),
                        param = %format_args!("0x{:02X}", frame.param()),
                        "frame"
                    );
                    self.stats.frames += 1;
                    frames.push(frame);
                }
                Err(e) => {
                    warn!(error = %e, bytes = %frame::hex_dump(window), "dropping malformed frame");
                    self.stats.malformed += 1;
                }
            }
            pos += FRAME_LEN;
        }
        self.buffer.drain(..pos);
        frames
    }

    /// Number of bytes waiting for more input.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> FramerStats {
        self.stats
    }
}
