//! Network task
//!
//! Keeps the WiFi link, the device socket and the broker session alive,
//! routes inbound messages to the render task and publishes what the
//! render task posts to the outbox.
//!
//! Connectivity decisions are made by [`ConnectivityManager`]; this task
//! observes the radio and the sockets, feeds the manager and carries out
//! the actions it returns.

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

use cyw43::Control;
use cyw43_pio::PioSpi;
use defmt::*;
use embassy_futures::select::{select4, Either4};
use embassy_net::Stack;
use embassy_rp::gpio::Output;
use embassy_rp::peripherals::{DMA_CH0, PIO0};
use embassy_time::{with_timeout, Duration, Instant, Ticker};

use qbit_core::animation::Rng;
use qbit_core::clock::Clock;
use qbit_core::config::{DeviceSettings, Settings};
use qbit_core::net::{Action, Actions, ConnectivityManager, Observation};
use qbit_core::state::NetworkEvent;
use qbit_core::timezone::ZoneId;
use qbit_core::traits::OutboundEvent;
use qbit_core::FIRMWARE_VERSION;
use qbit_protocol::discovery::discovery_messages;
use qbit_protocol::message::{to_json, InfoPayload};
use qbit_protocol::topics::{self, Subscription, Topics};
use qbit_protocol::{Opcode, OutboundMessage, PokePayload, TouchPayload};

use crate::channels::{CONNECTIVITY, NETWORK_EVENTS, NETWORK_SEND_TIMEOUT_MS, OUTBOX};
use crate::net::broker::Inbound;
use crate::net::{format_ip, geo, sntp, BrokerLink, DeviceSocket, LinkError, Wifi};

/// Interval of the supervision pass (link check, retries, keep-alive)
const SUPERVISE_INTERVAL_MS: u64 = 1000;

/// TCP buffers per session; poke bitmaps arrive as ~3 KB of JSON
const SOCKET_BUFFER_LEN: usize = 4096;
const BROKER_BUFFER_LEN: usize = 2048;

/// Chunk size for socket reads
const READ_CHUNK_LEN: usize = 512;

/// CYW43 bus driver
#[embassy_executor::task]
pub async fn wifi_task(
    runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>,
) -> ! {
    runner.run().await
}

/// embassy-net stack driver
#[embassy_executor::task]
pub async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}

/// Network task - link supervision and message routing
#[embassy_executor::task]
pub async fn network_task(
    settings: &'static DeviceSettings,
    stack: Stack<'static>,
    control: Control<'static>,
    seed: u32,
) {
    info!("Network task started");

    let mut socket_rx = [0u8; SOCKET_BUFFER_LEN];
    let mut socket_tx = [0u8; SOCKET_BUFFER_LEN];
    let mut broker_rx = [0u8; BROKER_BUFFER_LEN];
    let mut broker_tx = [0u8; BROKER_BUFFER_LEN];

    let mut ctx = NetworkContext {
        settings,
        stack,
        wifi: Wifi::new(
            control,
            stack,
            settings.wifi().clone(),
            settings.ap_password(),
        ),
        socket: DeviceSocket::new(stack, &mut socket_rx, &mut socket_tx),
        broker: BrokerLink::new(stack, &mut broker_rx, &mut broker_tx),
        manager: ConnectivityManager::new(
            !settings.wifi().ssid.is_empty(),
            !settings.server().host.is_empty(),
            settings.broker().is_usable(),
        )
        .with_zone_detection(settings.timezone().is_none()),
        topics: Topics::new(
            settings.broker().topic_prefix.as_str(),
            settings.device_id(),
        ),
        clock: Clock::new(settings.time_zone()),
        rng: Rng::new(seed),
        queue: VecDeque::new(),
        next_sync_ms: 0,
    };

    ctx.run().await;
}

/// State owned by the network task
struct NetworkContext<'a> {
    settings: &'static DeviceSettings,
    stack: Stack<'static>,
    wifi: Wifi,
    socket: DeviceSocket<'a>,
    broker: BrokerLink<'a>,
    manager: ConnectivityManager,
    topics: Topics,
    /// Wall clock for `/poke` and `/touch` timestamps
    clock: Clock,
    /// WebSocket keys and masks
    rng: Rng,
    /// Actions waiting to be carried out
    queue: VecDeque<Action>,
    /// Uptime of the next SNTP attempt
    next_sync_ms: u64,
}

fn now_ms() -> u64 {
    Instant::now().as_millis()
}

impl NetworkContext<'_> {
    async fn run(&mut self) -> ! {
        let mut socket_buf = [0u8; READ_CHUNK_LEN];
        let mut broker_buf = [0u8; READ_CHUNK_LEN];
        let mut ticker = Ticker::every(Duration::from_millis(SUPERVISE_INTERVAL_MS));

        loop {
            match select4(
                self.socket.read(&mut socket_buf),
                self.broker.read(&mut broker_buf),
                OUTBOX.receive(),
                ticker.next(),
            )
            .await
            {
                Either4::First(Ok(n)) => self.on_socket_bytes(&socket_buf[..n]).await,
                Either4::First(Err(e)) => {
                    warn!("Device socket lost: {:?}", e);
                    self.drop_socket().await;
                }
                Either4::Second(Ok(n)) => self.on_broker_bytes(&broker_buf[..n]).await,
                Either4::Second(Err(e)) => {
                    warn!("Broker connection lost: {:?}", e);
                    self.drop_broker().await;
                }
                Either4::Third(event) => self.on_outbound(event).await,
                Either4::Fourth(()) => self.supervise().await,
            }

            self.drain().await;
        }
    }

    fn observe(&mut self, obs: Observation) {
        let actions = self.manager.observe(obs, now_ms(), &CONNECTIVITY);
        self.enqueue(actions);
    }

    fn enqueue(&mut self, actions: Actions) {
        self.queue.extend(actions);
    }

    /// Carry out queued actions, including any their outcomes produce
    async fn drain(&mut self) {
        while let Some(action) = self.queue.pop_front() {
            match action {
                Action::Emit(event) => self.emit(event).await,
                Action::StartPortal => {
                    info!("Starting setup portal");
                    self.wifi.start_ap().await;
                }
                Action::StopPortal => self.wifi.close_ap().await,
                Action::ConnectSocket => match self.connect_socket().await {
                    Ok(()) => {
                        info!("Device socket open");
                        self.observe(Observation::SocketOpened);
                    }
                    Err(e) => {
                        warn!("Device socket connect failed: {:?}", e);
                        self.socket.close(&mut self.rng).await;
                        self.observe(Observation::SocketClosed);
                    }
                },
                Action::CloseSocket => self.socket.close(&mut self.rng).await,
                Action::ConnectBroker => match self.connect_broker().await {
                    Ok(()) => {
                        info!("Broker session up");
                        self.observe(Observation::BrokerConnected);
                    }
                    Err(e) => {
                        warn!("Broker connect failed: {:?}", e);
                        self.broker.close(now_ms()).await;
                        self.observe(Observation::BrokerLost);
                    }
                },
                Action::CloseBroker => self.broker.close(now_ms()).await,
                Action::DetectTimeZone => self.detect_time_zone().await,
                Action::PublishPoke { sender, text } => {
                    let time = self.timestamp();
                    let payload = PokePayload {
                        sender: &sender,
                        text: &text,
                        time: &time,
                    };
                    match to_json(&payload) {
                        Ok(json) => self.publish(topics::POKE, json.as_bytes(), true).await,
                        Err(e) => warn!("Poke record not encoded: {:?}", e),
                    }
                }
            }
        }
    }

    /// Hand an event to the render task, dropping it if the channel stays full
    async fn emit(&mut self, event: NetworkEvent) {
        let kind = event.kind();
        let sent = with_timeout(
            Duration::from_millis(NETWORK_SEND_TIMEOUT_MS),
            NETWORK_EVENTS.send(event),
        )
        .await;
        if sent.is_err() {
            warn!("Network event channel full, dropping {:?}", kind);
        }
    }

    // ---- Supervision ----

    async fn supervise(&mut self) {
        let now = now_ms();

        self.wifi.maybe_join(now).await;
        let link = match self.wifi.station_ip() {
            Some(ip) => Observation::LinkUp { ip },
            None => Observation::LinkDown,
        };
        self.observe(link);

        let actions = self.manager.poll(now_ms(), &CONNECTIVITY);
        self.enqueue(actions);

        if let Err(e) = self.broker.keep_alive(now_ms()).await {
            warn!("Broker keep-alive failed: {:?}", e);
            self.drop_broker().await;
        }

        self.maybe_sync_time().await;
    }

    /// SNTP: retried until the first success, then hourly
    async fn maybe_sync_time(&mut self) {
        let now = now_ms();
        if !self.manager.link_up() || now < self.next_sync_ms {
            return;
        }
        match sntp::fetch_unix_ms(self.stack).await {
            Ok(unix_ms) => {
                let uptime = now_ms();
                self.clock.sync(unix_ms, uptime);
                CONNECTIVITY.set_time_base(self.clock.base_ms());
                self.next_sync_ms = uptime + sntp::RESYNC_INTERVAL_MS;
                info!("Time synced: {}", self.clock.iso8601(uptime).as_deref().unwrap_or("?"));
            }
            Err(e) => {
                warn!("SNTP failed: {:?}", e);
                let interval = if self.clock.is_synced() {
                    sntp::RESYNC_INTERVAL_MS
                } else {
                    sntp::RETRY_INTERVAL_MS
                };
                self.next_sync_ms = now + interval;
            }
        }
    }

    /// One-shot lookup; on failure the configured offset stays in use
    async fn detect_time_zone(&mut self) {
        let name = match geo::lookup_timezone(self.stack).await {
            Ok(name) => name,
            Err(e) => {
                warn!("Timezone lookup failed: {:?}", e);
                return;
            }
        };
        match ZoneId::from_iana(&name) {
            Some(zone) => {
                info!("Timezone detected: {} ({})", zone.iana(), zone.posix());
                self.clock.set_zone(zone.rule());
                self.observe(Observation::ZoneDetected(zone));
            }
            None => warn!("Unknown timezone {}", name.as_str()),
        }
    }

    /// Local ISO 8601 time; counts from the epoch until the first sync
    fn timestamp(&self) -> heapless::String<20> {
        let now = now_ms();
        if let Some(time) = self.clock.iso8601(now) {
            return time;
        }
        let mut epoch = Clock::new(*self.clock.zone());
        epoch.set_base(Some(0));
        epoch.iso8601(now).unwrap_or_default()
    }

    fn station_ip(&self) -> heapless::String<16> {
        format_ip(CONNECTIVITY.snapshot().ip.unwrap_or_default())
    }

    // ---- Device socket ----

    async fn connect_socket(&mut self) -> Result<(), LinkError> {
        let s = self.settings;
        let server = s.server();
        info!(
            "Connecting device socket to {}:{}{}",
            server.host.as_str(),
            server.port,
            server.path.as_str()
        );
        self.socket.connect(self.stack, server, &mut self.rng).await?;

        let ip = self.station_ip();
        let register = OutboundMessage::Register {
            id: s.device_id(),
            name: s.device_name(),
            ip: &ip,
            version: FIRMWARE_VERSION,
        }
        .to_json()?;
        self.socket.send_text(&register, &mut self.rng).await
    }

    async fn on_socket_bytes(&mut self, data: &[u8]) {
        let mut frames = Vec::new();
        let result = self.socket.receive(data, &mut frames);

        for frame in frames {
            match frame.opcode {
                Opcode::Text => {
                    if let Some(text) = frame.as_text() {
                        let actions = self.manager.handle_socket_text(text);
                        self.enqueue(actions);
                    }
                }
                Opcode::Ping => {
                    if let Err(e) = self.socket.pong(&frame.payload, &mut self.rng).await {
                        warn!("Pong failed: {:?}", e);
                        self.drop_socket().await;
                        return;
                    }
                }
                Opcode::Close => {
                    info!("Peer closed the device socket");
                    self.drop_socket().await;
                    return;
                }
                _ => {}
            }
        }

        if let Err(e) = result {
            warn!("Device socket stream invalid: {:?}", e);
            self.drop_socket().await;
        }
    }

    async fn send_socket(&mut self, message: OutboundMessage<'_>) {
        if !self.socket.is_open() {
            debug!("Device socket down, dropping message");
            return;
        }
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("Message not encoded: {:?}", e);
                return;
            }
        };
        if let Err(e) = self.socket.send_text(&json, &mut self.rng).await {
            warn!("Device socket write failed: {:?}", e);
            self.drop_socket().await;
        }
    }

    async fn drop_socket(&mut self) {
        self.socket.close(&mut self.rng).await;
        self.observe(Observation::SocketClosed);
    }

    // ---- Broker ----

    async fn connect_broker(&mut self) -> Result<(), LinkError> {
        let s = self.settings;
        let broker = s.broker();
        info!("Connecting to broker {}:{}", broker.host.as_str(), broker.port);

        let client_id = alloc::format!("qbit-{}", s.device_id());
        let status = self.topics.topic(topics::STATUS);
        self.broker
            .connect(
                self.stack,
                broker,
                &client_id,
                &status,
                topics::OFFLINE,
                now_ms(),
            )
            .await?;

        self.broker
            .publish(&status, topics::ONLINE.as_bytes(), true, now_ms())
            .await?;

        let ip = self.station_ip();
        let info = to_json(&InfoPayload {
            id: s.device_id(),
            name: s.device_name(),
            ip: &ip,
        })?;
        self.broker
            .publish(&self.topics.topic(topics::INFO), info.as_bytes(), true, now_ms())
            .await?;

        let filters: Vec<String> = Subscription::ALL
            .iter()
            .map(|sub| self.topics.subscription(*sub))
            .collect();
        self.broker.subscribe(&filters, now_ms()).await?;

        for msg in discovery_messages(&self.topics, s.device_id(), s.device_name(), FIRMWARE_VERSION)? {
            self.broker
                .publish(&msg.topic, msg.payload.as_bytes(), true, now_ms())
                .await?;
        }
        Ok(())
    }

    async fn on_broker_bytes(&mut self, data: &[u8]) {
        let mut inbound: Vec<Inbound> = Vec::new();
        let result = self.broker.receive(data, &mut inbound);

        for msg in inbound {
            debug!("MQTT message on {}", msg.topic.as_str());
            let actions = self
                .manager
                .handle_broker_message(&self.topics, &msg.topic, &msg.payload);
            self.enqueue(actions);
        }

        if let Err(e) = result {
            warn!("Broker stream invalid: {:?}", e);
            self.drop_broker().await;
        }
    }

    /// Publish under the device's topic prefix; skipped while disconnected
    async fn publish(&mut self, suffix: &str, payload: &[u8], retain: bool) {
        if !self.broker.is_open() {
            return;
        }
        let topic = self.topics.topic(suffix);
        if let Err(e) = self.broker.publish(&topic, payload, retain, now_ms()).await {
            warn!("Publish to {} failed: {:?}", topic.as_str(), e);
            self.drop_broker().await;
        }
    }

    async fn drop_broker(&mut self) {
        self.broker.close(now_ms()).await;
        self.observe(Observation::BrokerLost);
    }

    // ---- Outbox ----

    async fn on_outbound(&mut self, event: OutboundEvent) {
        match event {
            OutboundEvent::ClaimConfirm => self.send_socket(OutboundMessage::ClaimConfirm).await,
            OutboundEvent::ClaimReject => self.send_socket(OutboundMessage::ClaimReject).await,
            OutboundEvent::MuteState(muted) => {
                let state: &[u8] = if muted { b"ON" } else { b"OFF" };
                self.publish(topics::MUTE_STATE, state, true).await;
            }
            OutboundEvent::Touch(kind) => {
                let time = self.timestamp();
                let payload = TouchPayload {
                    kind: kind.as_str(),
                    time: &time,
                };
                match to_json(&payload) {
                    Ok(json) => self.publish(topics::TOUCH, json.as_bytes(), false).await,
                    Err(e) => warn!("Touch record not encoded: {:?}", e),
                }
            }
            OutboundEvent::AnimationState(name) => {
                self.publish(topics::ANIMATION_STATE, name.as_bytes(), true)
                    .await;
            }
        }
    }
}
