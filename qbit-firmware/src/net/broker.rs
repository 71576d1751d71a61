//! MQTT session with the broker
//!
//! QoS 0 only: nothing is acknowledged except CONNECT and SUBSCRIBE, so the
//! session needs no packet store.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use embassy_net::tcp::{State, TcpSocket};
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration};
use embedded_io_async::Write;

use qbit_core::config::BrokerConfig;
use qbit_protocol::mqtt::{
    decode_packet, encode_connect, encode_disconnect, encode_pingreq, encode_publish,
    encode_subscribe, ConnectOptions, Will, KEEP_ALIVE_SECS, MAX_PACKET_LEN,
};
use qbit_protocol::{MqttError, Packet};

use super::{resolve, LinkError, CONNECT_TIMEOUT_SECS, WRITE_TIMEOUT_SECS};

/// Send PINGREQ after this much silence on our side
const PING_AFTER_MS: u64 = KEEP_ALIVE_SECS as u64 * 1000 * 2 / 3;

/// Give up on the broker if a PINGRESP takes this long
const PING_TIMEOUT_MS: u64 = KEEP_ALIVE_SECS as u64 * 1000;

/// Packet id used for the single SUBSCRIBE
const SUBSCRIBE_PACKET_ID: u16 = 1;

/// A PUBLISH copied out of the receive buffer
pub struct Inbound {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// One broker connection, reused across reconnects
pub struct BrokerLink<'a> {
    tcp: TcpSocket<'a>,
    rx: Vec<u8>,
    open: bool,
    last_tx_ms: u64,
    ping_sent_ms: Option<u64>,
}

impl<'a> BrokerLink<'a> {
    pub fn new(stack: Stack<'static>, rx: &'a mut [u8], tx: &'a mut [u8]) -> Self {
        Self {
            tcp: TcpSocket::new(stack, rx, tx),
            rx: Vec::new(),
            open: false,
            last_tx_ms: 0,
            ping_sent_ms: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Connect and wait for an accepting CONNACK
    ///
    /// The last will publishes `will_payload` retained on `will_topic`.
    pub async fn connect(
        &mut self,
        stack: Stack<'static>,
        broker: &BrokerConfig,
        client_id: &str,
        will_topic: &str,
        will_payload: &str,
        now_ms: u64,
    ) -> Result<(), LinkError> {
        self.reset().await;

        let addr = resolve(stack, &broker.host).await?;
        with_timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            self.tcp.connect((addr, broker.port)),
        )
        .await??;

        let opts = ConnectOptions {
            client_id,
            keep_alive_secs: KEEP_ALIVE_SECS,
            will: Some(Will {
                topic: will_topic,
                payload: will_payload.as_bytes(),
                retain: true,
            }),
            username: Some(broker.username.as_str()).filter(|u| !u.is_empty()),
            password: Some(broker.password.as_str()).filter(|p| !p.is_empty()),
        };
        let mut out = Vec::new();
        encode_connect(&opts, &mut out)?;
        self.write(&out, now_ms).await?;

        with_timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            self.read_connack(),
        )
        .await??;

        self.open = true;
        self.ping_sent_ms = None;
        Ok(())
    }

    async fn read_connack(&mut self) -> Result<(), LinkError> {
        let mut buf = [0u8; 64];
        loop {
            let n = self.tcp.read(&mut buf).await?;
            if n == 0 {
                return Err(LinkError::Io);
            }
            self.rx.extend_from_slice(&buf[..n]);
            if let Some((packet, used)) = decode_packet(&self.rx)? {
                let result = packet.connack_result();
                self.rx.drain(..used);
                return result.map_err(LinkError::from);
            }
        }
    }

    async fn write(&mut self, data: &[u8], now_ms: u64) -> Result<(), LinkError> {
        with_timeout(
            Duration::from_secs(WRITE_TIMEOUT_SECS),
            self.tcp.write_all(data),
        )
        .await??;
        self.last_tx_ms = now_ms;
        Ok(())
    }

    pub async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        now_ms: u64,
    ) -> Result<(), LinkError> {
        let mut out = Vec::with_capacity(topic.len() + payload.len() + 8);
        encode_publish(topic, payload, retain, &mut out)?;
        self.write(&out, now_ms).await
    }

    pub async fn subscribe(&mut self, filters: &[String], now_ms: u64) -> Result<(), LinkError> {
        let mut out = Vec::new();
        encode_subscribe(SUBSCRIBE_PACKET_ID, filters, &mut out)?;
        self.write(&out, now_ms).await
    }

    /// Send PINGREQ when due; fails once the broker stops answering
    pub async fn keep_alive(&mut self, now_ms: u64) -> Result<(), LinkError> {
        if !self.open {
            return Ok(());
        }
        if let Some(sent) = self.ping_sent_ms {
            if now_ms.saturating_sub(sent) >= PING_TIMEOUT_MS {
                return Err(LinkError::Timeout);
            }
            return Ok(());
        }
        if now_ms.saturating_sub(self.last_tx_ms) >= PING_AFTER_MS {
            let mut out = Vec::new();
            encode_pingreq(&mut out);
            self.write(&out, now_ms).await?;
            self.ping_sent_ms = Some(now_ms);
        }
        Ok(())
    }

    /// Wait for bytes from the broker; never completes while closed
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        if !self.open {
            return core::future::pending().await;
        }
        match self.tcp.read(buf).await? {
            0 => Err(LinkError::Io),
            n => Ok(n),
        }
    }

    /// Decode received bytes, collecting PUBLISH packets
    pub fn receive(&mut self, data: &[u8], out: &mut Vec<Inbound>) -> Result<(), LinkError> {
        if self.rx.len() + data.len() > MAX_PACKET_LEN {
            return Err(MqttError::PacketTooLarge.into());
        }
        self.rx.extend_from_slice(data);
        while let Some((packet, used)) = decode_packet(&self.rx)? {
            match packet {
                Packet::Publish { topic, payload, .. } => out.push(Inbound {
                    topic: topic.to_string(),
                    payload: payload.to_vec(),
                }),
                Packet::PingResp => self.ping_sent_ms = None,
                Packet::ConnAck { .. } | Packet::SubAck { .. } | Packet::Other(_) => {}
            }
            self.rx.drain(..used);
        }
        Ok(())
    }

    /// Disconnect cleanly if possible and drop the connection
    pub async fn close(&mut self, now_ms: u64) {
        if self.open {
            let mut out = Vec::new();
            encode_disconnect(&mut out);
            let _ = self.write(&out, now_ms).await;
        }
        self.reset().await;
    }

    async fn reset(&mut self) {
        self.open = false;
        self.rx.clear();
        self.ping_sent_ms = None;
        if self.tcp.state() != State::Closed {
            self.tcp.abort();
            let _ = with_timeout(Duration::from_secs(1), self.tcp.flush()).await;
        }
    }
}
