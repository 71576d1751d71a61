//! Device socket: WebSocket client to the cloud peer
//!
//! Plain TCP (no TLS). Client frames are masked with fresh random keys.

use alloc::vec::Vec;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use embassy_net::tcp::{State, TcpSocket};
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration};
use embedded_io_async::Write;

use qbit_core::animation::Rng;
use qbit_core::config::ServerConfig;
use qbit_protocol::ws::{encode_frame, handshake_request, parse_handshake_response};
use qbit_protocol::{FrameDecoder, Opcode, WsFrame};

use super::{resolve, LinkError, CONNECT_TIMEOUT_SECS, WRITE_TIMEOUT_SECS};

/// One WebSocket connection, reused across reconnects
pub struct DeviceSocket<'a> {
    tcp: TcpSocket<'a>,
    decoder: FrameDecoder,
    open: bool,
}

impl<'a> DeviceSocket<'a> {
    pub fn new(stack: Stack<'static>, rx: &'a mut [u8], tx: &'a mut [u8]) -> Self {
        Self {
            tcp: TcpSocket::new(stack, rx, tx),
            decoder: FrameDecoder::new(),
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Connect, upgrade and leave the socket ready for frames
    pub async fn connect(
        &mut self,
        stack: Stack<'static>,
        server: &ServerConfig,
        rng: &mut Rng,
    ) -> Result<(), LinkError> {
        self.reset().await;

        let addr = resolve(stack, &server.host).await?;
        with_timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            self.tcp.connect((addr, server.port)),
        )
        .await??;

        let mut nonce = [0u8; 16];
        rng.fill_bytes(&mut nonce);
        let key = STANDARD.encode(nonce);
        let request = handshake_request(
            &server.host,
            server.port,
            &server.path,
            &key,
            Some(server.api_key.as_str()),
        );
        self.write(request.as_bytes()).await?;

        with_timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            self.read_handshake(),
        )
        .await??;

        self.open = true;
        Ok(())
    }

    /// Read the upgrade response; bytes past the header go to the decoder
    async fn read_handshake(&mut self) -> Result<(), LinkError> {
        let mut response = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            let n = self.tcp.read(&mut buf).await?;
            if n == 0 {
                return Err(LinkError::Io);
            }
            response.extend_from_slice(&buf[..n]);
            if let Some(header_len) = parse_handshake_response(&response)? {
                self.decoder.push(&response[header_len..])?;
                return Ok(());
            }
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), LinkError> {
        with_timeout(
            Duration::from_secs(WRITE_TIMEOUT_SECS),
            self.tcp.write_all(data),
        )
        .await??;
        Ok(())
    }

    async fn send_frame(
        &mut self,
        opcode: Opcode,
        payload: &[u8],
        rng: &mut Rng,
    ) -> Result<(), LinkError> {
        let mut mask = [0u8; 4];
        rng.fill_bytes(&mut mask);
        let mut out = Vec::with_capacity(payload.len() + 8);
        encode_frame(opcode, payload, mask, &mut out);
        self.write(&out).await
    }

    pub async fn send_text(&mut self, text: &str, rng: &mut Rng) -> Result<(), LinkError> {
        self.send_frame(Opcode::Text, text.as_bytes(), rng).await
    }

    pub async fn pong(&mut self, payload: &[u8], rng: &mut Rng) -> Result<(), LinkError> {
        self.send_frame(Opcode::Pong, payload, rng).await
    }

    /// Wait for bytes from the peer; never completes while closed
    ///
    /// End of stream is reported as [`LinkError::Io`].
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        if !self.open {
            return core::future::pending().await;
        }
        match self.tcp.read(buf).await? {
            0 => Err(LinkError::Io),
            n => Ok(n),
        }
    }

    /// Decode received bytes into complete frames
    pub fn receive(&mut self, data: &[u8], frames: &mut Vec<WsFrame>) -> Result<(), LinkError> {
        self.decoder.push(data)?;
        while let Some(frame) = self.decoder.next_frame()? {
            frames.push(frame);
        }
        Ok(())
    }

    /// Say goodbye if possible and drop the connection
    pub async fn close(&mut self, rng: &mut Rng) {
        if self.open {
            let _ = self.send_frame(Opcode::Close, &[], rng).await;
        }
        self.reset().await;
    }

    async fn reset(&mut self) {
        self.open = false;
        self.decoder.reset();
        if self.tcp.state() != State::Closed {
            self.tcp.abort();
            let _ = with_timeout(Duration::from_secs(1), self.tcp.flush()).await;
        }
    }
}
