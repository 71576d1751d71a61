//! MQTT 3.1.1 client packet codec
//!
//! Covers what the device needs and nothing more:
//! - CONNECT with optional credentials and a retained last will
//! - PUBLISH at QoS 0 (optionally retained)
//! - SUBSCRIBE at QoS 0, PINGREQ, DISCONNECT
//! - decoding CONNACK, PUBLISH, SUBACK and PINGRESP
//!
//! Packet format:
//! - fixed header byte (type << 4 | flags)
//! - remaining length (1-4 byte varint, 7 bits per byte, LSB first)
//! - variable header and payload

use alloc::vec::Vec;

/// Keep-alive interval requested in CONNECT
pub const KEEP_ALIVE_SECS: u16 = 15;

/// Largest inbound packet accepted
pub const MAX_PACKET_LEN: usize = 8 * 1024;

/// Largest value the remaining-length varint can carry
pub const MAX_REMAINING_LEN: usize = 268_435_455;

/// Packet type identifiers (upper nibble of the fixed header)
pub mod packet_type {
    pub const CONNECT: u8 = 1;
    pub const CONNACK: u8 = 2;
    pub const PUBLISH: u8 = 3;
    pub const SUBSCRIBE: u8 = 8;
    pub const SUBACK: u8 = 9;
    pub const PINGREQ: u8 = 12;
    pub const PINGRESP: u8 = 13;
    pub const DISCONNECT: u8 = 14;
}

/// Errors that can occur during packet encoding or decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MqttError {
    /// Packet structure is invalid
    Malformed,
    /// Packet exceeds [`MAX_PACKET_LEN`] or the varint range
    PacketTooLarge,
    /// A string field is longer than 65535 bytes
    StringTooLong,
    /// Broker refused the connection (CONNACK return code)
    Refused(u8),
}

/// Last-will message registered at CONNECT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Will<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub retain: bool,
}

/// CONNECT parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions<'a> {
    pub client_id: &'a str,
    pub keep_alive_secs: u16,
    pub will: Option<Will<'a>>,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
}

/// A decoded inbound packet, borrowing from the receive buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet<'a> {
    ConnAck { session_present: bool, return_code: u8 },
    Publish { topic: &'a str, payload: &'a [u8], retain: bool },
    SubAck { packet_id: u16 },
    PingResp,
    /// Any other packet type (ignored by the client)
    Other(u8),
}

impl Packet<'_> {
    /// Turn a CONNACK into a result
    pub fn connack_result(&self) -> Result<(), MqttError> {
        match *self {
            Packet::ConnAck { return_code: 0, .. } => Ok(()),
            Packet::ConnAck { return_code, .. } => Err(MqttError::Refused(return_code)),
            _ => Err(MqttError::Malformed),
        }
    }
}

/// Append a remaining-length varint
pub fn encode_remaining_length(mut len: usize, out: &mut Vec<u8>) -> Result<(), MqttError> {
    if len > MAX_REMAINING_LEN {
        return Err(MqttError::PacketTooLarge);
    }
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            return Ok(());
        }
    }
}

/// Decode a remaining-length varint
///
/// Returns `Ok(None)` if more bytes are needed, otherwise the value and
/// the number of bytes it occupied.
pub fn decode_remaining_length(buf: &[u8]) -> Result<Option<(usize, usize)>, MqttError> {
    let mut value = 0usize;
    let mut multiplier = 1usize;
    for (i, byte) in buf.iter().enumerate() {
        if i == 4 {
            return Err(MqttError::Malformed);
        }
        value += (*byte as usize & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
        multiplier *= 128;
    }
    if buf.len() >= 4 {
        return Err(MqttError::Malformed);
    }
    Ok(None)
}

fn push_str(s: &[u8], out: &mut Vec<u8>) -> Result<(), MqttError> {
    let len = u16::try_from(s.len()).map_err(|_| MqttError::StringTooLong)?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(s);
    Ok(())
}

fn finish(first: u8, body: &[u8], out: &mut Vec<u8>) -> Result<(), MqttError> {
    out.push(first);
    encode_remaining_length(body.len(), out)?;
    out.extend_from_slice(body);
    Ok(())
}

/// Append a CONNECT packet (clean session)
pub fn encode_connect(opts: &ConnectOptions<'_>, out: &mut Vec<u8>) -> Result<(), MqttError> {
    let mut flags = 0x02;
    if let Some(will) = &opts.will {
        flags |= 0x04;
        if will.retain {
            flags |= 0x20;
        }
    }
    let username = opts.username.filter(|u| !u.is_empty());
    let password = opts.password.filter(|_| username.is_some());
    if username.is_some() {
        flags |= 0x80;
    }
    if password.is_some() {
        flags |= 0x40;
    }

    let mut body = Vec::new();
    push_str(b"MQTT", &mut body)?;
    body.push(4);
    body.push(flags);
    body.extend_from_slice(&opts.keep_alive_secs.to_be_bytes());

    push_str(opts.client_id.as_bytes(), &mut body)?;
    if let Some(will) = &opts.will {
        push_str(will.topic.as_bytes(), &mut body)?;
        push_str(will.payload, &mut body)?;
    }
    if let Some(user) = username {
        push_str(user.as_bytes(), &mut body)?;
    }
    if let Some(pass) = password {
        push_str(pass.as_bytes(), &mut body)?;
    }

    finish(packet_type::CONNECT << 4, &body, out)
}

/// Append a QoS 0 PUBLISH packet
pub fn encode_publish(
    topic: &str,
    payload: &[u8],
    retain: bool,
    out: &mut Vec<u8>,
) -> Result<(), MqttError> {
    let mut body = Vec::with_capacity(2 + topic.len() + payload.len());
    push_str(topic.as_bytes(), &mut body)?;
    body.extend_from_slice(payload);

    let first = (packet_type::PUBLISH << 4) | u8::from(retain);
    finish(first, &body, out)
}

/// Append a SUBSCRIBE packet requesting QoS 0 for every topic
pub fn encode_subscribe<S: AsRef<str>>(
    packet_id: u16,
    topics: &[S],
    out: &mut Vec<u8>,
) -> Result<(), MqttError> {
    let mut body = Vec::new();
    body.extend_from_slice(&packet_id.to_be_bytes());
    for topic in topics {
        push_str(topic.as_ref().as_bytes(), &mut body)?;
        body.push(0);
    }
    finish((packet_type::SUBSCRIBE << 4) | 0x02, &body, out)
}

/// Append a PINGREQ packet
pub fn encode_pingreq(out: &mut Vec<u8>) {
    out.extend_from_slice(&[packet_type::PINGREQ << 4, 0]);
}

/// Append a DISCONNECT packet
pub fn encode_disconnect(out: &mut Vec<u8>) {
    out.extend_from_slice(&[packet_type::DISCONNECT << 4, 0]);
}

/// Decode one packet from the front of `buf`
///
/// Returns `Ok(None)` if the packet is incomplete, otherwise the packet
/// and the total number of bytes it occupied.
pub fn decode_packet(buf: &[u8]) -> Result<Option<(Packet<'_>, usize)>, MqttError> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };
    let Some((remaining, len_bytes)) = decode_remaining_length(&buf[1..])? else {
        return Ok(None);
    };
    if remaining > MAX_PACKET_LEN {
        return Err(MqttError::PacketTooLarge);
    }

    let header = 1 + len_bytes;
    let total = header + remaining;
    if buf.len() < total {
        return Ok(None);
    }
    let body = &buf[header..total];

    let packet = match first >> 4 {
        packet_type::CONNACK => {
            if body.len() != 2 {
                return Err(MqttError::Malformed);
            }
            Packet::ConnAck {
                session_present: body[0] & 0x01 != 0,
                return_code: body[1],
            }
        }
        packet_type::PUBLISH => {
            if body.len() < 2 {
                return Err(MqttError::Malformed);
            }
            let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
            let mut offset = 2 + topic_len;
            if body.len() < offset {
                return Err(MqttError::Malformed);
            }
            let topic =
                core::str::from_utf8(&body[2..offset]).map_err(|_| MqttError::Malformed)?;
            let qos = (first >> 1) & 0x03;
            if qos > 0 {
                offset += 2;
                if body.len() < offset {
                    return Err(MqttError::Malformed);
                }
            }
            Packet::Publish {
                topic,
                payload: &body[offset..],
                retain: first & 0x01 != 0,
            }
        }
        packet_type::SUBACK => {
            if body.len() < 2 {
                return Err(MqttError::Malformed);
            }
            Packet::SubAck {
                packet_id: u16::from_be_bytes([body[0], body[1]]),
            }
        }
        packet_type::PINGRESP => Packet::PingResp,
        other => Packet::Other(other),
    };

    Ok(Some((packet, total)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use proptest::prelude::*;

    #[test]
    fn test_connect_with_will() {
        let opts = ConnectOptions {
            client_id: "qbit-1",
            keep_alive_secs: 15,
            will: Some(Will {
                topic: "q/1/status",
                payload: b"offline",
                retain: true,
            }),
            username: None,
            password: Some("ignored without user"),
        };
        let mut out = Vec::new();
        encode_connect(&opts, &mut out).unwrap();

        assert_eq!(out[0], 0x10);
        // flags: clean session | will | will retain
        assert_eq!(out[9], 0x02 | 0x04 | 0x20);
        assert_eq!(&out[10..12], &[0, 15]);
        assert_eq!(&out[12..14], &[0, 6]);
        assert_eq!(&out[14..20], b"qbit-1");
        assert_eq!(&out[20..22], &[0, 10]);
        assert_eq!(&out[22..32], b"q/1/status");
        assert_eq!(&out[32..34], &[0, 7]);
        assert_eq!(&out[34..41], b"offline");
        assert_eq!(out.len(), 41);
        assert_eq!(out[1] as usize, out.len() - 2);
    }

    #[test]
    fn test_connect_with_credentials() {
        let opts = ConnectOptions {
            client_id: "c",
            keep_alive_secs: KEEP_ALIVE_SECS,
            will: None,
            username: Some("user"),
            password: Some("pw"),
        };
        let mut out = Vec::new();
        encode_connect(&opts, &mut out).unwrap();
        assert_eq!(out[9], 0x02 | 0x80 | 0x40);
        assert!(out.ends_with(&[0, 4, b'u', b's', b'e', b'r', 0, 2, b'p', b'w']));
    }

    #[test]
    fn test_publish_retained() {
        let mut out = Vec::new();
        encode_publish("a/b", b"ON", true, &mut out).unwrap();
        assert_eq!(out, vec![0x31, 7, 0, 3, b'a', b'/', b'b', b'O', b'N']);
    }

    #[test]
    fn test_subscribe() {
        let mut out = Vec::new();
        encode_subscribe(7, &["x/y", "z"], &mut out).unwrap();
        assert_eq!(
            out,
            vec![0x82, 12, 0, 7, 0, 3, b'x', b'/', b'y', 0, 0, 1, b'z', 0]
        );
    }

    #[test]
    fn test_decode_connack() {
        let (packet, used) = decode_packet(&[0x20, 2, 0, 0]).unwrap().unwrap();
        assert_eq!(used, 4);
        assert_eq!(packet.connack_result(), Ok(()));

        let (packet, _) = decode_packet(&[0x20, 2, 0, 5]).unwrap().unwrap();
        assert_eq!(packet.connack_result(), Err(MqttError::Refused(5)));
    }

    #[test]
    fn test_decode_publish_incrementally() {
        let mut wire = Vec::new();
        encode_publish("q/1/mute/set", b"OFF", false, &mut wire).unwrap();
        wire.extend_from_slice(&[0xD0, 0]);

        assert_eq!(decode_packet(&wire[..5]), Ok(None));

        let (packet, used) = decode_packet(&wire).unwrap().unwrap();
        assert_eq!(
            packet,
            Packet::Publish {
                topic: "q/1/mute/set",
                payload: b"OFF",
                retain: false
            }
        );
        let (next, _) = decode_packet(&wire[used..]).unwrap().unwrap();
        assert_eq!(next, Packet::PingResp);
    }

    #[test]
    fn test_decode_publish_qos1_skips_packet_id() {
        let wire = [0x32, 8, 0, 1, b't', 0, 9, b'h', b'e', b'y'];
        let (packet, _) = decode_packet(&wire).unwrap().unwrap();
        assert_eq!(
            packet,
            Packet::Publish {
                topic: "t",
                payload: b"hey",
                retain: false
            }
        );
    }

    #[test]
    fn test_oversized_packet_rejected() {
        let mut wire = vec![0x30];
        encode_remaining_length(MAX_PACKET_LEN + 1, &mut wire).unwrap();
        assert_eq!(decode_packet(&wire), Err(MqttError::PacketTooLarge));
    }

    #[test]
    fn test_remaining_length_boundaries() {
        for (len, bytes) in [(0, 1), (127, 1), (128, 2), (16_383, 2), (16_384, 3), (2_097_152, 4)] {
            let mut out = Vec::new();
            encode_remaining_length(len, &mut out).unwrap();
            assert_eq!(out.len(), bytes);
        }
        let mut out = Vec::new();
        assert_eq!(
            encode_remaining_length(MAX_REMAINING_LEN + 1, &mut out),
            Err(MqttError::PacketTooLarge)
        );
        assert_eq!(
            decode_remaining_length(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
            Err(MqttError::Malformed)
        );
    }

    proptest! {
        #[test]
        fn test_remaining_length_roundtrip(len in 0usize..=MAX_REMAINING_LEN) {
            let mut out = Vec::new();
            encode_remaining_length(len, &mut out).unwrap();
            let decoded = decode_remaining_length(&out).unwrap();
            prop_assert_eq!(decoded, Some((len, out.len())));
        }
    }
}
