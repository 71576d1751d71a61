//! SNTP client
//!
//! One request, one reply. The transmit timestamp of the reply is taken as
//! the current time; round-trip delay is ignored at one-second display
//! resolution.

use defmt::*;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration};

use super::{resolve, LinkError, CONNECT_TIMEOUT_SECS};

const NTP_SERVER: &str = "time.google.com";
const NTP_PORT: u16 = 123;

/// Seconds from 1900-01-01 (NTP era 0) to the Unix epoch
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// Interval between syncs once the first one succeeded
pub const RESYNC_INTERVAL_MS: u64 = 60 * 60 * 1000;

/// Interval between attempts until the first sync succeeds
pub const RETRY_INTERVAL_MS: u64 = 30_000;

const PACKET_LEN: usize = 48;

/// Ask the time server for the current Unix time in milliseconds
pub async fn fetch_unix_ms(stack: Stack<'static>) -> Result<u64, LinkError> {
    let server = resolve(stack, NTP_SERVER).await?;

    let mut rx_meta = [PacketMetadata::EMPTY; 1];
    let mut rx_buffer = [0; 128];
    let mut tx_meta = [PacketMetadata::EMPTY; 1];
    let mut tx_buffer = [0; 128];
    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    socket.bind(0).map_err(|_| LinkError::Io)?;

    // LI=0, VN=3, Mode=3 (client)
    let mut request = [0u8; PACKET_LEN];
    request[0] = 0x1B;
    socket
        .send_to(&request, (server, NTP_PORT))
        .await
        .map_err(|_| LinkError::Io)?;

    let mut response = [0u8; PACKET_LEN];
    let (n, _) = with_timeout(
        Duration::from_secs(CONNECT_TIMEOUT_SECS),
        socket.recv_from(&mut response),
    )
    .await?
    .map_err(|_| LinkError::Io)?;

    parse_reply(&response[..n])
}

/// Transmit timestamp of a server reply, as Unix milliseconds
fn parse_reply(reply: &[u8]) -> Result<u64, LinkError> {
    if reply.len() < PACKET_LEN {
        warn!("NTP reply too short: {} bytes", reply.len());
        return Err(LinkError::Io);
    }
    // Mode 4 (server); a zero stratum is a kiss-o'-death
    if reply[0] & 0x07 != 4 || reply[1] == 0 {
        return Err(LinkError::Io);
    }
    let secs = u64::from(u32::from_be_bytes([reply[40], reply[41], reply[42], reply[43]]));
    let frac = u64::from(u32::from_be_bytes([reply[44], reply[45], reply[46], reply[47]]));
    let unix = secs.checked_sub(NTP_UNIX_OFFSET).ok_or(LinkError::Io)?;
    Ok(unix * 1000 + ((frac * 1000) >> 32))
}
