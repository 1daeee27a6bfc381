//! # CAN Messages
//!
//! The node greets the bus once at startup and echoes every frame it
//! receives to the console. Framing and the controller driver belong to the
//! board; the node only sees whole frames through [`Can`].

use core::fmt;

use heapless::Vec;

/// Maximum payload of a classic CAN frame.
pub const CAN_PAYLOAD: usize = 8;

/// One CAN frame as seen by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    pub msg_id: u8,
    pub node_id: u8,
    pub data: Vec<u8, CAN_PAYLOAD>,
}

impl CanFrame {
    /// Frame carrying `data`, truncated to [`CAN_PAYLOAD`] bytes.
    pub fn new(msg_id: u8, node_id: u8, data: &[u8]) -> Self {
        let len = data.len().min(CAN_PAYLOAD);
        let mut payload = Vec::new();
        // Cannot fail: `len` is clamped to the capacity.
        let _ = payload.extend_from_slice(&data[..len]);
        Self {
            msg_id,
            node_id,
            data: payload,
        }
    }

    /// The greeting sent when the node starts: NUL-terminated `Hello`.
    pub fn hello() -> Self {
        Self::new(1, 1, b"Hello\0")
    }

    /// Payload up to the first NUL.
    pub fn text(&self) -> FrameText<'_> {
        let end = self
            .data
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.data.len());
        FrameText(&self.data[..end])
    }
}

/// Printable view of a frame payload. Bytes are shown as Latin-1 characters.
pub struct FrameText<'a>(&'a [u8]);

impl fmt::Display for FrameText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0 {
            fmt::Write::write_char(f, b as char)?;
        }
        Ok(())
    }
}

/// Transmit side of the CAN controller.
pub trait Can {
    fn send(&mut self, frame: &CanFrame);
}

/// Controller that drops every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCan;

impl Can for NullCan {
    #[inline]
    fn send(&mut self, _frame: &CanFrame) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    fn render(frame: &CanFrame) -> heapless::String<16> {
        let mut s = heapless::String::new();
        write!(s, "{}", frame.text()).unwrap();
        s
    }

    #[test]
    fn test_hello_frame() {
        let frame = CanFrame::hello();
        assert_eq!(frame.msg_id, 1);
        assert_eq!(frame.node_id, 1);
        assert_eq!(frame.data.len(), 6);
        assert_eq!(render(&frame).as_str(), "Hello");
    }

    #[test]
    fn test_payload_truncated_to_eight_bytes() {
        let frame = CanFrame::new(2, 3, b"0123456789");
        assert_eq!(frame.data.as_slice(), b"01234567");
        assert_eq!(render(&frame).as_str(), "01234567");
    }

    #[test]
    fn test_text_stops_at_nul() {
        let frame = CanFrame::new(1, 1, b"ab\0cd");
        assert_eq!(render(&frame).as_str(), "ab");
    }
}
