//! Wire formats spoken by the QBIT companion display
//!
//! This crate is `no_std` (with `alloc`) and contains no I/O:
//!
//! - JSON messages exchanged with the cloud peer over the device socket
//! - A WebSocket client codec (handshake, masked frames, incremental decoder)
//! - An MQTT 3.1.1 client packet codec
//! - MQTT topic naming and Home Assistant discovery payloads
//! - The time zone lookup request and response

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

pub mod discovery;
pub mod geo;
pub mod message;
pub mod mqtt;
pub mod topics;
pub mod ws;

pub use message::{
    CommandPayload, InboundMessage, MessageError, OutboundMessage, PokeMessage, PokePayload,
    TouchPayload,
};
pub use geo::LookupError;
pub use mqtt::{MqttError, Packet};
pub use topics::{Subscription, Topics};
pub use ws::{FrameDecoder, Opcode, SocketError, WsFrame};
