//! Render task runtime
//!
//! The runtime is the render task's whole context: presentation state,
//! frame buffer, animation player, poke renderer, melody sequencer and the
//! mute/volume state. It is driven by [`DisplayRuntime::tick`], once per
//! loop iteration, in a fixed order:
//!
//! 1. Advance the melody
//! 2. Handle at most one network event
//! 3. Handle at most one gesture
//! 4. Run the current state's timeouts and animation
//!
//! Drawing only touches the in-memory frame buffer; the caller sends it to
//! the panel whenever `tick` reports a change.

use core::fmt::Write;

use embedded_graphics::mono_font::ascii::FONT_10X20;
use heapless::String;
use qbit_protocol::message::DEFAULT_POKE_TEXT;

use crate::animation::{AnimationLibrary, LibraryError, Player, BOOT_ANIMATION};
use crate::audio::{Sequencer, Tune};
use crate::clock::Clock;
use crate::config::{Settings, AP_SSID, DEFAULT_VOLUME};
use crate::display::{
    draw_centered, draw_lines, draw_time_screen, draw_wifi_qr, wifi_progress, FrameBuffer,
};
use crate::net::{ConnectivitySnapshot, AP_FALLBACK_MS};
use crate::poke::{bounded, PokeRenderer, HISTORY_CAPACITY, SCROLL_INTERVAL_MS};
use crate::state::{
    DisplayState, GestureEvent, GestureKind, NetworkEvent, RemoteCommand, Trigger, MAX_SENDER_LEN,
};
use crate::timezone::ZoneId;
use crate::traits::{AnimationStore, Buzzer, OutboundEvent, Outbox};

/// Connected banner duration
pub const CONNECTED_INFO_MS: u64 = 3000;

/// Claim prompt waits this long for a long press
pub const CLAIM_TIMEOUT_MS: u64 = 30_000;

/// `[ Claimed! ]` banner duration
pub const CLAIM_CONFIRMED_MS: u64 = 2000;

/// `[ Claim Timeout ]` banner duration
pub const CLAIM_EXPIRED_MS: u64 = 1500;

/// Idle timeout of the history screens
pub const HISTORY_IDLE_MS: u64 = 3000;

/// Poke display time when nothing scrolls
pub const POKE_DISPLAY_MS: u64 = 5000;

/// Display time of pokes and history entries that scroll
pub const POKE_SCROLL_DISPLAY_MS: u64 = 8000;

/// Mute banner duration
pub const MUTE_FEEDBACK_MS: u64 = 2000;

/// Offline overlay duration
pub const OFFLINE_OVERLAY_MS: u64 = 2000;

/// Speed divisor of the boot animation
pub const BOOT_SPEED: u16 = 10;

/// Longest the render loop sleeps without a deadline
pub const MAX_IDLE_MS: u64 = 100;

/// Dashboard address on the home network
pub const DASHBOARD_URL: &str = "http://qbit.local";

const WIFI_OFFLINE: &str = "WiFi Offline";
const SERVER_OFFLINE: &str = "Server Offline";

/// Splash shown when the library has no boot animation
const SPLASH_MS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClaimPhase {
    /// Waiting for a long press
    Waiting,
    Confirmed { since_ms: u64 },
    Expired { since_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Overlay {
    message: &'static str,
    since_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BootStage {
    Frames { index: usize, frame: usize },
    Splash,
    Done,
}

/// What the WiFi setup screen last showed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct WifiView {
    /// Portal screen shows the SSID and password instead of the QR code
    show_text: bool,
    portal_drawn: bool,
    /// Countdown seconds and filled cells last drawn
    progress: Option<(Option<u32>, u32)>,
}

/// Render task context
pub struct DisplayRuntime<B: Buzzer, A: AnimationStore, O: Outbox> {
    /// Current presentation state
    state: DisplayState,
    /// State before the last transition
    previous: DisplayState,
    /// Uptime when the current state was entered
    entered_ms: u64,
    buzzer: B,
    store: A,
    outbox: O,
    fb: FrameBuffer,
    library: AnimationLibrary,
    player: Player,
    sequencer: Sequencer,
    pokes: PokeRenderer,
    clock: Clock,
    /// Detected zone applied to the clock
    zone: Option<ZoneId>,
    /// Connectivity as of the current tick
    conn: ConnectivitySnapshot,
    /// Buzzer volume, 0 = muted
    volume: u8,
    /// Volume restored on unmute
    saved_volume: u8,
    claim: ClaimPhase,
    claim_user: String<MAX_SENDER_LEN>,
    overlay: Option<Overlay>,
    /// "Server Offline" was shown since the socket last came up
    server_offline_notified: bool,
    wifi_view: WifiView,
    boot: BootStage,
    ap_password: String<8>,
    /// Last animation read error, kept for the caller to log
    error: Option<LibraryError>,
    /// Frame buffer changed since the last tick
    dirty: bool,
}

impl<B: Buzzer, A: AnimationStore, O: Outbox> DisplayRuntime<B, A, O> {
    /// Create the runtime with an empty library; see [`Self::load_library`]
    pub fn new<S: Settings>(settings: &S, seed: u32, buzzer: B, store: A, outbox: O) -> Self {
        let volume = settings.volume();
        Self {
            state: DisplayState::BootAnim,
            previous: DisplayState::GifPlayback,
            entered_ms: 0,
            buzzer,
            store,
            outbox,
            fb: FrameBuffer::new(),
            library: AnimationLibrary::empty(),
            player: Player::new(seed, settings.playback_speed()),
            sequencer: Sequencer::new(),
            pokes: PokeRenderer::new(),
            clock: Clock::new(settings.time_zone()),
            zone: None,
            conn: ConnectivitySnapshot::default(),
            volume,
            saved_volume: volume,
            claim: ClaimPhase::Waiting,
            claim_user: String::new(),
            overlay: None,
            server_offline_notified: false,
            wifi_view: WifiView::default(),
            boot: BootStage::Done,
            ap_password: bounded(settings.ap_password()),
            error: None,
            dirty: false,
        }
    }

    /// Scan the animation archive, returning the number of entries
    ///
    /// On error the library stays empty and playback shows a placeholder.
    pub fn load_library(&mut self) -> Result<usize, LibraryError> {
        self.library = AnimationLibrary::scan(&mut self.store)?;
        self.player.build_shuffle_bag(&self.library);
        Ok(self.library.len())
    }

    pub fn state(&self) -> DisplayState {
        self.state
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.fb
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.volume == 0
    }

    pub fn library(&self) -> &AnimationLibrary {
        &self.library
    }

    pub fn pokes(&self) -> &PokeRenderer {
        &self.pokes
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn buzzer(&self) -> &B {
        &self.buzzer
    }

    pub fn outbox(&self) -> &O {
        &self.outbox
    }

    /// Overlay message currently covering the animation
    pub fn overlay(&self) -> Option<&'static str> {
        self.overlay.map(|o| o.message)
    }

    /// Take the last animation read error
    pub fn take_error(&mut self) -> Option<LibraryError> {
        self.error.take()
    }

    // ---- Boot ----

    /// Start the boot sequence: melody plus the library's boot animation
    pub fn begin_boot(&mut self, now_ms: u64) {
        self.state = DisplayState::BootAnim;
        self.entered_ms = now_ms;
        self.play_tune(Tune::Boot);
        self.boot = match self.library.find(BOOT_ANIMATION) {
            Some(index) => BootStage::Frames { index, frame: 0 },
            None => BootStage::Splash,
        };
    }

    /// Draw the next boot frame
    ///
    /// Returns how long to wait before the next call, or `None` once the
    /// animation has played through.
    pub fn boot_frame(&mut self, now_ms: u64) -> Option<u32> {
        self.sequencer.tick(now_ms, &mut self.buzzer);
        match self.boot {
            BootStage::Frames { index, frame } => {
                let count = self.library.get(index).map(|e| e.frame_count()).unwrap_or(0);
                if frame >= count {
                    self.boot = BootStage::Done;
                    return None;
                }
                match self.player.draw_frame(
                    &self.library,
                    index,
                    frame,
                    BOOT_SPEED,
                    &mut self.store,
                    &mut self.fb,
                ) {
                    Ok(delay) => {
                        self.boot = BootStage::Frames {
                            index,
                            frame: frame + 1,
                        };
                        Some(delay)
                    }
                    Err(e) => {
                        self.error = Some(e);
                        self.boot = BootStage::Done;
                        None
                    }
                }
            }
            BootStage::Splash => {
                self.fb.clear();
                draw_centered(&mut self.fb, "QBIT", &FONT_10X20, 38);
                self.boot = BootStage::Done;
                Some(SPLASH_MS)
            }
            BootStage::Done => None,
        }
    }

    /// Stop the boot melody and enter the first interactive state
    pub fn finish_boot(&mut self, now_ms: u64, conn: &ConnectivitySnapshot) {
        self.sequencer.stop(&mut self.buzzer);
        self.boot = BootStage::Done;
        self.observe(conn);
        self.fire(
            Trigger::BootComplete {
                link_up: conn.wifi_up,
            },
            now_ms,
        );
    }

    // ---- Main loop ----

    /// Run one loop iteration; returns true when the frame changed
    pub fn tick(
        &mut self,
        now_ms: u64,
        conn: &ConnectivitySnapshot,
        event: Option<NetworkEvent>,
        gesture: Option<GestureEvent>,
    ) -> bool {
        self.observe(conn);
        self.sequencer.tick(now_ms, &mut self.buzzer);
        if let Some(event) = event {
            self.on_network(event, now_ms);
        }
        if let Some(gesture) = gesture {
            self.on_gesture(gesture.kind, now_ms);
        }
        self.periodic(now_ms);
        core::mem::take(&mut self.dirty)
    }

    /// Uptime at which the loop should run again without new events
    pub fn next_wake_ms(&self, now_ms: u64) -> u64 {
        let mut wake = now_ms + MAX_IDLE_MS;
        let mut consider = |t: Option<u64>| {
            if let Some(t) = t {
                wake = wake.min(t);
            }
        };

        consider(self.sequencer.next_due_ms());
        consider(self.state_deadline());
        match self.state {
            DisplayState::GifPlayback => match self.overlay {
                Some(o) => consider(Some(o.since_ms + OFFLINE_OVERLAY_MS)),
                None => consider(self.player.next_due_ms()),
            },
            DisplayState::PokeDisplay if self.pokes.active_needs_scroll() => {
                consider(Some(now_ms + SCROLL_INTERVAL_MS))
            }
            DisplayState::HistoryPoke if self.pokes.history_needs_scroll() => {
                consider(Some(now_ms + SCROLL_INTERVAL_MS))
            }
            _ => {}
        }
        wake.max(now_ms)
    }

    fn observe(&mut self, conn: &ConnectivitySnapshot) {
        self.conn = *conn;
        self.clock.set_base(conn.time_base_ms);
        if let Some(zone) = conn.zone.filter(|z| self.zone != Some(*z)) {
            self.zone = Some(zone);
            self.clock.set_zone(zone.rule());
        }
    }

    /// When the current state times out, if it does
    fn state_deadline(&self) -> Option<u64> {
        let after = |ms: u64| Some(self.entered_ms + ms);
        match self.state {
            DisplayState::ConnectedInfo => after(CONNECTED_INFO_MS),
            DisplayState::PokeDisplay => after(self.poke_timeout() + 1),
            DisplayState::ClaimPrompt => match self.claim {
                ClaimPhase::Waiting => after(CLAIM_TIMEOUT_MS + 1),
                ClaimPhase::Confirmed { since_ms } => Some(since_ms + CLAIM_CONFIRMED_MS),
                ClaimPhase::Expired { since_ms } => Some(since_ms + CLAIM_EXPIRED_MS),
            },
            DisplayState::HistoryTime => after(HISTORY_IDLE_MS),
            DisplayState::HistoryPoke => after(self.history_timeout()),
            DisplayState::MuteFeedback => after(MUTE_FEEDBACK_MS),
            _ => None,
        }
    }

    fn poke_timeout(&self) -> u64 {
        if self.pokes.active_needs_scroll() {
            POKE_SCROLL_DISPLAY_MS
        } else {
            POKE_DISPLAY_MS
        }
    }

    fn history_timeout(&self) -> u64 {
        if self.pokes.history_needs_scroll() {
            POKE_SCROLL_DISPLAY_MS
        } else {
            HISTORY_IDLE_MS
        }
    }

    // ---- Transitions ----

    /// Apply a trigger; returns true when a state was (re-)entered
    fn fire(&mut self, trigger: Trigger, now_ms: u64) -> bool {
        let next = self.state.transition(trigger);
        let reenter = matches!(trigger, Trigger::Poke | Trigger::ClaimRequest);
        if next == self.state && !reenter {
            return false;
        }
        self.enter(next, now_ms);
        true
    }

    fn enter(&mut self, next: DisplayState, now_ms: u64) {
        self.previous = self.state;
        self.state = next;
        self.entered_ms = now_ms;
        self.overlay = None;
        if !next.keeps_active_poke() {
            self.pokes.release_active();
        }

        match next {
            DisplayState::WifiSetup => self.wifi_view = WifiView::default(),
            DisplayState::GifPlayback => {
                if self.previous == DisplayState::ConnectedInfo || self.player.current().is_none() {
                    self.start_shuffle();
                } else {
                    self.player.resume();
                }
            }
            _ => {}
        }
        self.redraw(now_ms);
    }

    // ---- Network events ----

    fn accepts_pokes(&self) -> bool {
        self.state != DisplayState::BootAnim && !self.state.suppresses_pokes()
    }

    fn on_network(&mut self, event: NetworkEvent, now_ms: u64) {
        match event {
            NetworkEvent::Poke { sender, text } => {
                if !self.accepts_pokes() {
                    return;
                }
                // A bare "Poke!" must not replace a custom message on screen
                let generic_over_custom = self.state == DisplayState::PokeDisplay
                    && text.as_str() == DEFAULT_POKE_TEXT
                    && self
                        .pokes
                        .active()
                        .is_some_and(|p| p.text.as_str() != DEFAULT_POKE_TEXT);
                if generic_over_custom {
                    return;
                }
                let timestamp = self.clock.unix_secs(now_ms);
                self.pokes.show_text(&sender, &text, timestamp, now_ms);
                self.play_tune(Tune::Poke);
                self.fire(Trigger::Poke, now_ms);
            }
            NetworkEvent::PokeBitmap {
                sender,
                text,
                bitmaps,
            } => {
                if !self.accepts_pokes() {
                    // Dropping the event releases its bitmaps
                    drop(bitmaps);
                    return;
                }
                let timestamp = self.clock.unix_secs(now_ms);
                self.pokes
                    .show_bitmaps(&sender, &text, bitmaps, timestamp, now_ms);
                self.play_tune(Tune::Poke);
                self.fire(Trigger::Poke, now_ms);
            }
            NetworkEvent::ClaimRequest { user_name } => {
                if self.state == DisplayState::BootAnim {
                    return;
                }
                self.claim_user = user_name;
                self.claim = ClaimPhase::Waiting;
                self.play_tune(Tune::Claim);
                self.fire(Trigger::ClaimRequest, now_ms);
            }
            NetworkEvent::WifiStatus { connected: true } => {
                self.fire(Trigger::LinkUp, now_ms);
            }
            NetworkEvent::WifiStatus { connected: false } => {
                if self.state == DisplayState::GifPlayback && self.overlay.is_none() {
                    self.show_overlay(WIFI_OFFLINE, now_ms);
                }
            }
            NetworkEvent::LinkStatus { connected: true } => {
                self.server_offline_notified = false;
            }
            NetworkEvent::LinkStatus { connected: false } => {
                if self.state == DisplayState::GifPlayback && !self.server_offline_notified {
                    self.server_offline_notified = true;
                    self.show_overlay(SERVER_OFFLINE, now_ms);
                }
            }
            NetworkEvent::Command(RemoteCommand::Mute(mute)) => self.set_mute(mute),
            NetworkEvent::Command(RemoteCommand::NextAnimation) => self.next_animation(),
        }
    }

    fn show_overlay(&mut self, message: &'static str, now_ms: u64) {
        self.overlay = Some(Overlay {
            message,
            since_ms: now_ms,
        });
        self.redraw(now_ms);
    }

    // ---- Gestures ----

    fn on_gesture(&mut self, kind: GestureKind, now_ms: u64) {
        if kind.is_final() {
            self.outbox.post(OutboundEvent::Touch(kind));
        }
        if matches!(
            self.state,
            DisplayState::HistoryTime | DisplayState::HistoryPoke
        ) {
            self.entered_ms = now_ms;
        }

        match (self.state, kind) {
            (DisplayState::WifiSetup, GestureKind::SingleTap) => {
                if self.conn.portal_active {
                    self.wifi_view.show_text = !self.wifi_view.show_text;
                    self.redraw(now_ms);
                }
            }
            (DisplayState::GifPlayback, GestureKind::TouchDown) => self.play_tune(Tune::Touch),
            (DisplayState::GifPlayback, GestureKind::SingleTap) => self.next_animation(),
            (DisplayState::ClaimPrompt, GestureKind::LongPress) => {
                if self.claim == ClaimPhase::Waiting {
                    self.outbox.post(OutboundEvent::ClaimConfirm);
                    self.claim = ClaimPhase::Confirmed { since_ms: now_ms };
                    self.redraw(now_ms);
                }
            }
            (DisplayState::HistoryTime, GestureKind::SingleTap) => {
                self.pokes.select_history(0, now_ms);
                self.fire(Trigger::Gesture(kind), now_ms);
            }
            (DisplayState::HistoryPoke, GestureKind::SingleTap) => {
                let next = self.pokes.history_index() + 1;
                if next >= self.pokes.history().len().min(HISTORY_CAPACITY) {
                    self.fire(Trigger::HistoryExhausted, now_ms);
                } else {
                    self.pokes.select_history(next, now_ms);
                    self.redraw(now_ms);
                }
            }
            (state, GestureKind::LongPress) if state.accepts_mute_toggle() => {
                self.toggle_mute(now_ms)
            }
            (_, kind) => {
                self.fire(Trigger::Gesture(kind), now_ms);
            }
        }
    }

    // ---- Audio ----

    fn play_tune(&mut self, tune: Tune) {
        if self.volume == 0 {
            return;
        }
        if let Ok(melody) = tune.melody() {
            self.sequencer.start(&mut self.buzzer, melody, self.volume);
        }
    }

    /// Long-press mute toggle with its banner
    fn toggle_mute(&mut self, now_ms: u64) {
        let was_muted = self.volume == 0;
        if was_muted {
            self.volume = self.restored_volume();
            self.play_tune(Tune::Unmute);
        } else {
            // The melody keeps the volume it started with
            self.play_tune(Tune::Mute);
            self.saved_volume = self.volume;
            self.volume = 0;
        }
        self.fire(Trigger::Gesture(GestureKind::LongPress), now_ms);
        self.outbox.post(OutboundEvent::MuteState(!was_muted));
    }

    /// Remote mute from `/mute/set`
    fn set_mute(&mut self, mute: bool) {
        if mute {
            if self.volume > 0 {
                self.saved_volume = self.volume;
            }
            self.volume = 0;
            self.sequencer.stop(&mut self.buzzer);
        } else if self.volume == 0 {
            self.volume = self.restored_volume();
        }
        self.outbox.post(OutboundEvent::MuteState(mute));
    }

    fn restored_volume(&self) -> u8 {
        if self.saved_volume > 0 {
            self.saved_volume
        } else {
            DEFAULT_VOLUME
        }
    }

    // ---- Animation ----

    /// Refill the shuffle bag and start the first animation
    fn start_shuffle(&mut self) {
        self.player.build_shuffle_bag(&self.library);
        self.player.set_auto_advance(1);
        self.next_animation();
    }

    /// Switch to the next shuffled animation and announce it
    fn next_animation(&mut self) {
        let next = match self.player.advance() {
            Some(index) => Some(index),
            None => {
                self.player.build_shuffle_bag(&self.library);
                self.player.advance()
            }
        };
        if let Some(entry) = next.and_then(|i| self.library.get(i)) {
            self.outbox
                .post(OutboundEvent::AnimationState(entry.name.clone()));
        }
    }

    // ---- Periodic ----

    fn periodic(&mut self, now_ms: u64) {
        let elapsed = now_ms.saturating_sub(self.entered_ms);
        match self.state {
            DisplayState::BootAnim | DisplayState::OfflineStatus => {}
            DisplayState::WifiSetup => self.poll_wifi_setup(now_ms),
            DisplayState::ConnectedInfo => {
                if elapsed >= CONNECTED_INFO_MS {
                    self.fire(Trigger::Timeout, now_ms);
                }
            }
            DisplayState::GifPlayback => {
                if let Some(overlay) = self.overlay {
                    if now_ms.saturating_sub(overlay.since_ms) >= OFFLINE_OVERLAY_MS {
                        self.overlay = None;
                        self.player.resume();
                        self.redraw(now_ms);
                    }
                }
            }
            DisplayState::PokeDisplay => {
                if elapsed > self.poke_timeout() {
                    self.fire(Trigger::Timeout, now_ms);
                }
            }
            DisplayState::ClaimPrompt => match self.claim {
                ClaimPhase::Waiting => {
                    if elapsed > CLAIM_TIMEOUT_MS {
                        self.outbox.post(OutboundEvent::ClaimReject);
                        self.claim = ClaimPhase::Expired { since_ms: now_ms };
                        self.redraw(now_ms);
                    }
                }
                ClaimPhase::Confirmed { since_ms } => {
                    if now_ms.saturating_sub(since_ms) >= CLAIM_CONFIRMED_MS {
                        self.fire(Trigger::ClaimResolved, now_ms);
                    }
                }
                ClaimPhase::Expired { since_ms } => {
                    if now_ms.saturating_sub(since_ms) >= CLAIM_EXPIRED_MS {
                        self.fire(Trigger::ClaimResolved, now_ms);
                    }
                }
            },
            DisplayState::HistoryTime => {
                if elapsed >= HISTORY_IDLE_MS {
                    self.fire(Trigger::Timeout, now_ms);
                }
            }
            DisplayState::HistoryPoke => {
                if elapsed >= self.history_timeout() {
                    self.fire(Trigger::Timeout, now_ms);
                }
            }
            DisplayState::MuteFeedback => {
                if elapsed >= MUTE_FEEDBACK_MS {
                    let previous = self.previous;
                    self.fire(Trigger::FeedbackDone { previous }, now_ms);
                }
            }
        }
        self.animate(now_ms);
    }

    fn poll_wifi_setup(&mut self, now_ms: u64) {
        if self.conn.wifi_up {
            self.fire(Trigger::LinkUp, now_ms);
            return;
        }
        if self.conn.portal_active {
            if !self.wifi_view.portal_drawn {
                self.wifi_view.portal_drawn = true;
                self.wifi_view.show_text = false;
                self.redraw(now_ms);
            }
        } else {
            self.wifi_view.portal_drawn = false;
            let p = wifi_progress(now_ms, self.conn.link_lost_ms, AP_FALLBACK_MS);
            // Redraw only when the seconds or the bar change
            if self.wifi_view.progress != Some((p.seconds, p.filled)) {
                self.redraw(now_ms);
            }
        }
    }

    /// Continuous animation of the current state
    fn animate(&mut self, now_ms: u64) {
        match self.state {
            DisplayState::GifPlayback if self.overlay.is_none() => {
                match self
                    .player
                    .tick(now_ms, &self.library, &mut self.store, &mut self.fb)
                {
                    Ok(drawn) => self.dirty |= drawn,
                    Err(e) => self.error = Some(e),
                }
            }
            DisplayState::PokeDisplay => {
                if self.pokes.tick_active(now_ms) {
                    self.pokes.draw_active(&mut self.fb);
                    self.dirty = true;
                }
            }
            DisplayState::HistoryPoke => {
                if self.pokes.tick_history(now_ms) {
                    self.pokes
                        .draw_history(&mut self.fb, self.clock.zone());
                    self.dirty = true;
                }
            }
            _ => {}
        }
    }

    // ---- Drawing ----

    /// Draw the current state's screen
    fn redraw(&mut self, now_ms: u64) {
        self.dirty = true;
        match self.state {
            DisplayState::BootAnim | DisplayState::OfflineStatus => {}
            DisplayState::WifiSetup => self.draw_wifi_setup(now_ms),
            DisplayState::ConnectedInfo => {
                let ip = format_ip(self.conn.ip);
                draw_lines(&mut self.fb, &["[ Wi-Fi Connected ]", "", ip.as_str(), DASHBOARD_URL]);
            }
            DisplayState::GifPlayback => match self.overlay {
                Some(overlay) => draw_lines(&mut self.fb, &[overlay.message]),
                None => {
                    if !self.library.has_playable() {
                        draw_lines(
                            &mut self.fb,
                            &["[ No Animations ]", "", "Upload at", DASHBOARD_URL],
                        );
                    }
                }
            },
            DisplayState::PokeDisplay => self.pokes.draw_active(&mut self.fb),
            DisplayState::ClaimPrompt => match self.claim {
                ClaimPhase::Waiting => draw_lines(
                    &mut self.fb,
                    &["[ Claim Request ]", "", self.claim_user.as_str(), "Hold to confirm"],
                ),
                ClaimPhase::Confirmed { .. } => {
                    draw_lines(&mut self.fb, &["[ Claimed! ]", "", "Device bound."])
                }
                ClaimPhase::Expired { .. } => {
                    draw_lines(&mut self.fb, &["[ Claim Timeout ]", "", "Request expired."])
                }
            },
            DisplayState::HistoryTime => {
                let hhmm = self.clock.hhmm(now_ms);
                let date = self.clock.date(now_ms);
                draw_time_screen(&mut self.fb, &hhmm, &date);
            }
            DisplayState::HistoryPoke => self
                .pokes
                .draw_history(&mut self.fb, self.clock.zone()),
            DisplayState::MuteFeedback => {
                let banner = if self.volume == 0 {
                    "[ MUTED ]"
                } else {
                    "[ UNMUTED ]"
                };
                draw_lines(&mut self.fb, &["", banner]);
            }
        }
    }

    fn draw_wifi_setup(&mut self, now_ms: u64) {
        if self.conn.portal_active {
            if !self.wifi_view.show_text
                && draw_wifi_qr(&mut self.fb, AP_SSID, &self.ap_password).is_ok()
            {
                return;
            }
            let mut ssid: String<24> = String::new();
            let _ = write!(ssid, "SSID: {}", AP_SSID);
            let mut pass: String<24> = String::new();
            let _ = write!(pass, "Pass: {}", self.ap_password);
            draw_lines(
                &mut self.fb,
                &["[ Wi-Fi Setup ]", ssid.as_str(), pass.as_str(), "Tap for QR code"],
            );
        } else {
            let p = wifi_progress(now_ms, self.conn.link_lost_ms, AP_FALLBACK_MS);
            self.wifi_view.progress = Some((p.seconds, p.filled));
            draw_lines(&mut self.fb, &["[ Wi-Fi Setup ]", "", p.status.as_str(), p.bar.as_str()]);
        }
    }
}

fn format_ip(ip: Option<[u8; 4]>) -> String<16> {
    let [a, b, c, d] = ip.unwrap_or([0; 4]);
    let mut out = String::new();
    let _ = write!(out, "{}.{}.{}.{}", a, b, c, d);
    out
}
