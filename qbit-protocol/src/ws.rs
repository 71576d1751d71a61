//! WebSocket client codec (RFC 6455)
//!
//! Only the client side is implemented:
//! - the HTTP upgrade request and the status check of its response
//! - masked client frames
//! - an incremental decoder for server frames, reassembling fragmented
//!   data messages
//!
//! The `Sec-WebSocket-Accept` digest is not verified; the device talks to a
//! single configured peer.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

/// Largest reassembled message accepted from the peer
///
/// Two base64 bitmaps at their cap plus the JSON envelope fit comfortably.
pub const MAX_MESSAGE_LEN: usize = 24 * 1024;

/// Largest upgrade response header accepted
pub const MAX_HANDSHAKE_LEN: usize = 1024;

/// Largest frame header (2 + 8 byte length + 4 byte mask)
const MAX_HEADER_LEN: usize = 14;

/// Errors that can occur on the socket wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketError {
    /// Peer answered the upgrade with something other than 101
    HandshakeRejected,
    /// Upgrade response header exceeds [`MAX_HANDSHAKE_LEN`]
    HandshakeTooLarge,
    /// Frame or reassembled message exceeds [`MAX_MESSAGE_LEN`]
    FrameTooLarge,
    /// Reserved opcode, fragmented control frame or stray continuation
    ProtocolViolation,
}

/// Frame opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Opcode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl Opcode {
    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0x0 => Some(Opcode::Continuation),
            0x1 => Some(Opcode::Text),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    fn is_control(self) -> bool {
        (self as u8) & 0x8 != 0
    }
}

/// A complete message or control frame received from the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsFrame {
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

impl WsFrame {
    /// Payload as UTF-8 text, if this is a valid text message
    pub fn as_text(&self) -> Option<&str> {
        match self.opcode {
            Opcode::Text => core::str::from_utf8(&self.payload).ok(),
            _ => None,
        }
    }
}

/// Build the HTTP upgrade request
///
/// # Arguments
/// * `key` - base64 of 16 random bytes
/// * `bearer` - optional API key sent as `Authorization: Bearer <key>`
pub fn handshake_request(
    host: &str,
    port: u16,
    path: &str,
    key: &str,
    bearer: Option<&str>,
) -> String {
    let mut req = format!(
        "GET {} HTTP/1.1\r\n\
         Host: {}:{}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {}\r\n\
         Sec-WebSocket-Version: 13\r\n",
        path, host, port, key
    );
    if let Some(token) = bearer.filter(|t| !t.is_empty()) {
        req.push_str(&format!("Authorization: Bearer {}\r\n", token));
    }
    req.push_str("\r\n");
    req
}

/// Check the upgrade response
///
/// Returns `Ok(None)` until the full header has arrived, then the header
/// length. Bytes after the header already belong to the frame stream.
pub fn parse_handshake_response(buf: &[u8]) -> Result<Option<usize>, SocketError> {
    let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
        if buf.len() > MAX_HANDSHAKE_LEN {
            return Err(SocketError::HandshakeTooLarge);
        }
        return Ok(None);
    };

    let status = buf[..end]
        .split(|b| *b == b'\n')
        .next()
        .unwrap_or_default();
    let mut parts = status.split(|b| *b == b' ');
    let version = parts.next().unwrap_or_default();
    let code = parts.next().unwrap_or_default();
    if !version.starts_with(b"HTTP/1.1") || code != b"101" {
        return Err(SocketError::HandshakeRejected);
    }

    Ok(Some(end + 4))
}

/// Append one masked client frame to `out`
pub fn encode_frame(opcode: Opcode, payload: &[u8], mask: [u8; 4], out: &mut Vec<u8>) {
    out.push(0x80 | opcode as u8);

    let len = payload.len();
    if len < 126 {
        out.push(0x80 | len as u8);
    } else if len <= u16::MAX as usize {
        out.push(0x80 | 126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(0x80 | 127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }

    out.extend_from_slice(&mask);
    out.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
}

/// Incremental decoder for frames arriving from the peer
///
/// Feed raw socket bytes with [`push`](Self::push) and drain complete
/// messages with [`next_frame`](Self::next_frame). Control frames may be
/// interleaved with the fragments of a data message.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    partial: Option<(Opcode, Vec<u8>)>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes buffered but not yet decoded
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Append received bytes
    pub fn push(&mut self, data: &[u8]) -> Result<(), SocketError> {
        if self.buf.len() + data.len() > MAX_MESSAGE_LEN + MAX_HEADER_LEN {
            return Err(SocketError::FrameTooLarge);
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Drop all buffered state (after the connection closes)
    pub fn reset(&mut self) {
        self.buf.clear();
        self.partial = None;
    }

    /// Decode the next complete message or control frame
    pub fn next_frame(&mut self) -> Result<Option<WsFrame>, SocketError> {
        loop {
            let Some((fin, opcode, payload)) = self.take_raw_frame()? else {
                return Ok(None);
            };

            if opcode.is_control() {
                if !fin || payload.len() > 125 {
                    return Err(SocketError::ProtocolViolation);
                }
                return Ok(Some(WsFrame { opcode, payload }));
            }

            match (opcode, self.partial.take()) {
                (Opcode::Continuation, Some((first, mut data))) => {
                    if data.len() + payload.len() > MAX_MESSAGE_LEN {
                        return Err(SocketError::FrameTooLarge);
                    }
                    data.extend_from_slice(&payload);
                    if fin {
                        return Ok(Some(WsFrame {
                            opcode: first,
                            payload: data,
                        }));
                    }
                    self.partial = Some((first, data));
                }
                (Opcode::Continuation, None) | (_, Some(_)) => {
                    return Err(SocketError::ProtocolViolation);
                }
                (_, None) => {
                    if fin {
                        return Ok(Some(WsFrame { opcode, payload }));
                    }
                    self.partial = Some((opcode, payload));
                }
            }
        }
    }

    /// Split one raw frame off the front of the buffer
    fn take_raw_frame(&mut self) -> Result<Option<(bool, Opcode, Vec<u8>)>, SocketError> {
        if self.buf.len() < 2 {
            return Ok(None);
        }

        let b0 = self.buf[0];
        let b1 = self.buf[1];
        let fin = b0 & 0x80 != 0;
        let opcode = Opcode::from_bits(b0 & 0x0F).ok_or(SocketError::ProtocolViolation)?;
        let masked = b1 & 0x80 != 0;

        let mut header = 2;
        let len = match b1 & 0x7F {
            126 => {
                if self.buf.len() < 4 {
                    return Ok(None);
                }
                header += 2;
                u16::from_be_bytes([self.buf[2], self.buf[3]]) as usize
            }
            127 => {
                if self.buf.len() < 10 {
                    return Ok(None);
                }
                header += 8;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&self.buf[2..10]);
                let len = u64::from_be_bytes(raw);
                if len > MAX_MESSAGE_LEN as u64 {
                    return Err(SocketError::FrameTooLarge);
                }
                len as usize
            }
            n => n as usize,
        };
        if len > MAX_MESSAGE_LEN {
            return Err(SocketError::FrameTooLarge);
        }

        let mut mask = None;
        if masked {
            if self.buf.len() < header + 4 {
                return Ok(None);
            }
            let mut key = [0u8; 4];
            key.copy_from_slice(&self.buf[header..header + 4]);
            mask = Some(key);
            header += 4;
        }

        let total = header + len;
        if self.buf.len() < total {
            return Ok(None);
        }

        let mut payload: Vec<u8> = self.buf[header..total].to_vec();
        if let Some(key) = mask {
            for (i, b) in payload.iter_mut().enumerate() {
                *b ^= key[i % 4];
            }
        }
        self.buf.drain(..total);

        Ok(Some((fin, opcode, payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use proptest::prelude::*;

    fn server_frame(fin: bool, opcode: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![(if fin { 0x80 } else { 0 }) | opcode];
        if payload.len() < 126 {
            out.push(payload.len() as u8);
        } else {
            out.push(126);
            out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        }
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_handshake_request_with_bearer() {
        let req = handshake_request("example.com", 3001, "/device", "abc==", Some("k1"));
        assert!(req.starts_with("GET /device HTTP/1.1\r\n"));
        assert!(req.contains("Host: example.com:3001\r\n"));
        assert!(req.contains("Sec-WebSocket-Key: abc==\r\n"));
        assert!(req.contains("Authorization: Bearer k1\r\n"));
        assert!(req.ends_with("\r\n\r\n"));

        let req = handshake_request("h", 80, "/device", "abc==", Some(""));
        assert!(!req.contains("Authorization"));
    }

    #[test]
    fn test_handshake_response() {
        assert_eq!(parse_handshake_response(b"HTTP/1.1 101 Switch"), Ok(None));

        let ok = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n\r\n\x81\x00";
        assert_eq!(parse_handshake_response(ok), Ok(Some(ok.len() - 2)));

        let denied = b"HTTP/1.1 401 Unauthorized\r\n\r\n";
        assert_eq!(
            parse_handshake_response(denied),
            Err(SocketError::HandshakeRejected)
        );

        let huge = vec![b'a'; MAX_HANDSHAKE_LEN + 1];
        assert_eq!(
            parse_handshake_response(&huge),
            Err(SocketError::HandshakeTooLarge)
        );
    }

    #[test]
    fn test_client_frame_is_masked() {
        let mut out = Vec::new();
        encode_frame(Opcode::Text, b"hi", [1, 2, 3, 4], &mut out);
        assert_eq!(out, vec![0x81, 0x82, 1, 2, 3, 4, b'h' ^ 1, b'i' ^ 2]);
    }

    #[test]
    fn test_client_frame_extended_length() {
        let payload = vec![0u8; 300];
        let mut out = Vec::new();
        encode_frame(Opcode::Binary, &payload, [0; 4], &mut out);
        assert_eq!(&out[..4], &[0x82, 0x80 | 126, 0x01, 0x2C]);
        assert_eq!(out.len(), 4 + 4 + 300);
    }

    #[test]
    fn test_decode_text_frame() {
        let mut dec = FrameDecoder::new();
        dec.push(&server_frame(true, 0x1, b"{\"type\":\"poke\"}")).unwrap();
        let frame = dec.next_frame().unwrap().unwrap();
        assert_eq!(frame.as_text(), Some("{\"type\":\"poke\"}"));
        assert_eq!(dec.next_frame(), Ok(None));
        assert_eq!(dec.buffered(), 0);
    }

    #[test]
    fn test_decode_fragmented_with_interleaved_ping() {
        let mut dec = FrameDecoder::new();
        dec.push(&server_frame(false, 0x1, b"hel")).unwrap();
        dec.push(&server_frame(true, 0x9, b"p")).unwrap();
        dec.push(&server_frame(true, 0x0, b"lo")).unwrap();

        let ping = dec.next_frame().unwrap().unwrap();
        assert_eq!(ping.opcode, Opcode::Ping);
        assert_eq!(ping.payload, b"p");

        let text = dec.next_frame().unwrap().unwrap();
        assert_eq!(text.as_text(), Some("hello"));
    }

    #[test]
    fn test_stray_continuation_is_rejected() {
        let mut dec = FrameDecoder::new();
        dec.push(&server_frame(true, 0x0, b"x")).unwrap();
        assert_eq!(dec.next_frame(), Err(SocketError::ProtocolViolation));
    }

    #[test]
    fn test_reserved_opcode_is_rejected() {
        let mut dec = FrameDecoder::new();
        dec.push(&[0x83, 0x00]).unwrap();
        assert_eq!(dec.next_frame(), Err(SocketError::ProtocolViolation));
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let mut dec = FrameDecoder::new();
        let mut header = vec![0x81, 127];
        header.extend_from_slice(&((MAX_MESSAGE_LEN as u64) + 1).to_be_bytes());
        dec.push(&header).unwrap();
        assert_eq!(dec.next_frame(), Err(SocketError::FrameTooLarge));
    }

    proptest! {
        #[test]
        fn test_decoder_handles_any_split(payload in proptest::collection::vec(any::<u8>(), 0..400), split in 0usize..410) {
            let mut wire = Vec::new();
            encode_frame(Opcode::Binary, &payload, [9, 8, 7, 6], &mut wire);
            let split = split.min(wire.len());

            let mut dec = FrameDecoder::new();
            dec.push(&wire[..split]).unwrap();
            let early = dec.next_frame().unwrap();
            if split < wire.len() {
                prop_assert!(early.is_none());
                dec.push(&wire[split..]).unwrap();
                let frame = dec.next_frame().unwrap().unwrap();
                prop_assert_eq!(frame.payload, payload);
            } else {
                prop_assert_eq!(early.unwrap().payload, payload);
            }
        }
    }
}
