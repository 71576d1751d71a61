//! Network sessions on top of embassy-net
//!
//! Each session owns one socket and speaks one protocol. Supervision and
//! message routing live in the network task; these modules only move
//! bytes.

pub mod broker;
pub mod geo;
pub mod sntp;
pub mod socket;
pub mod wifi;

use embassy_net::dns::DnsQueryType;
use embassy_net::{IpAddress, Ipv4Address, Stack};

use qbit_protocol::{LookupError, MessageError, MqttError, SocketError};

pub use broker::BrokerLink;
pub use socket::DeviceSocket;
pub use wifi::Wifi;

/// Timeout for connects and protocol handshakes
pub const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Timeout for a single write
pub const WRITE_TIMEOUT_SECS: u64 = 5;

/// Errors from a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum LinkError {
    /// Host name did not resolve
    Dns,
    /// TCP connect refused or reset
    Connect,
    /// Read or write failed, or the peer closed the connection
    Io,
    /// Peer did not answer in time
    Timeout,
    Socket(SocketError),
    Mqtt(MqttError),
    Message(MessageError),
    Lookup(LookupError),
}

impl From<SocketError> for LinkError {
    fn from(e: SocketError) -> Self {
        LinkError::Socket(e)
    }
}

impl From<MqttError> for LinkError {
    fn from(e: MqttError) -> Self {
        LinkError::Mqtt(e)
    }
}

impl From<MessageError> for LinkError {
    fn from(e: MessageError) -> Self {
        LinkError::Message(e)
    }
}

impl From<LookupError> for LinkError {
    fn from(e: LookupError) -> Self {
        LinkError::Lookup(e)
    }
}

impl From<embassy_net::tcp::Error> for LinkError {
    fn from(_: embassy_net::tcp::Error) -> Self {
        LinkError::Io
    }
}

impl From<embassy_net::tcp::ConnectError> for LinkError {
    fn from(_: embassy_net::tcp::ConnectError) -> Self {
        LinkError::Connect
    }
}

impl From<embassy_time::TimeoutError> for LinkError {
    fn from(_: embassy_time::TimeoutError) -> Self {
        LinkError::Timeout
    }
}

/// Resolve a host name or dotted IPv4 literal
pub async fn resolve(stack: Stack<'static>, host: &str) -> Result<IpAddress, LinkError> {
    if let Ok(addr) = host.parse::<Ipv4Address>() {
        return Ok(IpAddress::Ipv4(addr));
    }
    let addrs = stack
        .dns_query(host, DnsQueryType::A)
        .await
        .map_err(|_| LinkError::Dns)?;
    addrs.first().copied().ok_or(LinkError::Dns)
}

/// Dotted form of an address
pub fn format_ip(ip: [u8; 4]) -> heapless::String<16> {
    use core::fmt::Write;
    let mut out = heapless::String::new();
    let _ = write!(out, "{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3]);
    out
}
