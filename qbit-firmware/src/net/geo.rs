//! Time zone lookup over plain HTTP
//!
//! Runs once, the first time the link comes up, when `device.toml` names
//! no zone.

use alloc::string::String;
use alloc::vec::Vec;

use defmt::*;
use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration};
use embedded_io_async::Write;

use qbit_protocol::geo::{
    lookup_request, parse_lookup_response, LOOKUP_HOST, LOOKUP_PORT, MAX_LOOKUP_RESPONSE_LEN,
};

use super::{resolve, LinkError, CONNECT_TIMEOUT_SECS};

/// Whole exchange, connect to EOF
const LOOKUP_TIMEOUT_SECS: u64 = 5;

/// IANA name of the zone the public address belongs to
pub async fn lookup_timezone(stack: Stack<'static>) -> Result<String, LinkError> {
    let addr = resolve(stack, LOOKUP_HOST).await?;

    let mut rx = [0u8; MAX_LOOKUP_RESPONSE_LEN];
    let mut tx = [0u8; 256];
    let mut tcp = TcpSocket::new(stack, &mut rx, &mut tx);

    with_timeout(
        Duration::from_secs(CONNECT_TIMEOUT_SECS),
        tcp.connect((addr, LOOKUP_PORT)),
    )
    .await??;

    let response = with_timeout(
        Duration::from_secs(LOOKUP_TIMEOUT_SECS),
        exchange(&mut tcp),
    )
    .await;
    tcp.abort();
    let response = response??;

    debug!("Zone lookup answered {} bytes", response.len());
    Ok(parse_lookup_response(&response)?)
}

async fn exchange(tcp: &mut TcpSocket<'_>) -> Result<Vec<u8>, LinkError> {
    tcp.write_all(lookup_request().as_bytes()).await?;

    let mut response = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let n = tcp.read(&mut buf).await?;
        if n == 0 {
            return Ok(response);
        }
        if response.len() + n > MAX_LOOKUP_RESPONSE_LEN {
            return Err(LinkError::Io);
        }
        response.extend_from_slice(&buf[..n]);
    }
}
