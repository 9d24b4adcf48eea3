//! Wire format of the test protocol.
//!
//! Requests from the PC are fixed 14-byte frames:
//!
//! ```text
//! offset  0..=10   11    12     13
//!         header   CMD   PARAM  0x0D
//! ```
//!
//! The header is the ASCII literal `Loewe test ` (trailing space included).
//! Replies travel the other way as free text, `ACK: <message>\r`, delimited
//! only by the trailing carriage return. There is no checksum.

use crate::error::FrameError;

/// The 11-byte request header.
pub const HEADER: &[u8; 11] = b"Loewe test ";
/// Last byte of every request frame, and the reply delimiter.
pub const TERMINATOR: u8 = 0x0D;
/// Total length of a request frame.
pub const FRAME_LEN: usize = 14;
/// Prefix of a normal (solicited) reply.
pub const ACK_PREFIX: &str = "ACK: ";

const CMD_OFFSET: usize = HEADER.len();
const PARAM_OFFSET: usize = CMD_OFFSET + 1;
const TERMINATOR_OFFSET: usize = FRAME_LEN - 1;

/// A decoded request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame {
    cmd: u8,
    param: u8,
}

impl Frame {
    pub fn new(cmd: u8, param: u8) -> Self {
        Self { cmd, param }
    }

    pub fn cmd(&self) -> u8 {
        self.cmd
    }

    pub fn param(&self) -> u8 {
        self.param
    }
}

/// Builds the 14-byte request for `cmd`/`param`.
pub fn encode(cmd: u8, param: u8) -> [u8; FRAME_LEN] {
    let mut out = [0u8; FRAME_LEN];
    out[..CMD_OFFSET].copy_from_slice(HEADER);
    out[CMD_OFFSET] = cmd;
    out[PARAM_OFFSET] = param;
    out[TERMINATOR_OFFSET] = TERMINATOR;
    out
}

/// Returns true if `bytes` starts with the request header.
pub fn has_header(bytes: &[u8]) -> bool {
    bytes.starts_with(HEADER)
}

/// Decodes the first 14 bytes of `bytes` into a [`Frame`].
///
/// Both the header and the terminator are checked, so this is safe to call
/// on any buffer; the stream framer only calls it once the header matched.
pub fn decode(bytes: &[u8]) -> Result<Frame, FrameError> {
    if bytes.len() < FRAME_LEN {
        return Err(FrameError::TooShort(bytes.len()));
    }
    if !has_header(bytes) {
        return Err(FrameError::MalformedHeader);
    }
    let end = bytes[TERMINATOR_OFFSET];
    if end != TERMINATOR {
        return Err(FrameError::MalformedTerminator(end));
    }
    Ok(Frame::new(bytes[CMD_OFFSET], bytes[PARAM_OFFSET]))
}

/// Wraps a dispatcher message as a solicited reply: `ACK: <message>\r`.
pub fn encode_ack(message: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(ACK_PREFIX.len() + message.len() + 1);
    out.extend_from_slice(ACK_PREFIX.as_bytes());
    out.extend_from_slice(message.as_bytes());
    out.push(TERMINATOR);
    out
}

/// Wraps operator text as an unsolicited send: `<text>\r`, no ACK prefix.
pub fn encode_unsolicited(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 1);
    out.extend_from_slice(text.as_bytes());
    out.push(TERMINATOR);
    out
}

/// Formats bytes as space-separated upper-case hex, e.g. `4C 6F 0D`.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_set_volume() {
        let bytes = encode(0x0C, 0x09);
        assert_eq!(&bytes[..11], b"Loewe test ");
        assert_eq!(bytes[11], 0x0C);
        assert_eq!(bytes[12], 0x09);
        assert_eq!(bytes[13], 0x0D);
        assert_eq!(bytes.len(), FRAME_LEN);
    }

    #[test]
    fn decode_valid_frame() {
        let frame = decode(&encode(0x99, 0x01)).unwrap();
        assert_eq!(frame, Frame::new(0x99, 0x01));
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let mut bytes = encode(0x00, 0x00).to_vec();
        bytes.extend_from_slice(b"extra");
        assert_eq!(decode(&bytes).unwrap(), Frame::new(0x00, 0x00));
    }

    #[test]
    fn decode_rejects_short_input() {
        assert_eq!(decode(b"Loewe test "), Err(FrameError::TooShort(11)));
    }

    #[test]
    fn decode_rejects_bad_terminator() {
        let mut bytes = encode(0x01, 0x00);
        bytes[13] = 0x0A;
        assert_eq!(decode(&bytes), Err(FrameError::MalformedTerminator(0x0A)));
    }

    #[test]
    fn decode_rejects_bad_header() {
        let mut bytes = encode(0x01, 0x00);
        bytes[0] = b'l';
        assert_eq!(decode(&bytes), Err(FrameError::MalformedHeader));
    }

    #[test]
    fn ack_encoding() {
        assert_eq!(encode_ack("OK (Vol:9)"), b"ACK: OK (Vol:9)\r".to_vec());
        assert_eq!(encode_unsolicited("BTN"), b"BTN\r".to_vec());
    }

    #[test]
    fn hex_dump_format() {
        assert_eq!(hex_dump(&[0x4C, 0x0D, 0x00]), "4C 0D 00");
        assert_eq!(hex_dump(&[]), "");
    }

    proptest! {
        #[test]
        fn prop_round_trip(cmd in any::<u8>(), param in any::<u8>()) {
            let bytes = encode(cmd, param);
            prop_assert_eq!(&bytes[..11], &HEADER[..]);
            prop_assert_eq!(bytes[13], TERMINATOR);
            let frame = decode(&bytes).unwrap();
            prop_assert_eq!(frame.cmd(), cmd);
            prop_assert_eq!(frame.param(), param);
        }
    }
}
