//! Inter-task communication channels
//!
//! Defines the statics shared between the input, render and network tasks.
//! Every channel is bounded; a full channel drops the event in the producer.

use embassy_rp::i2c::{Async, I2c};
use embassy_rp::peripherals::I2C0;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;

use qbit_core::net::ConnectivityFlags;
use qbit_core::state::{GestureEvent, NetworkEvent};
use qbit_core::traits::{OutboundEvent, Outbox};

use crate::drivers::Ssd1306;

/// Channel capacity for touch gestures
const GESTURE_CHANNEL_SIZE: usize = 8;

/// Channel capacity for network events
const NETWORK_CHANNEL_SIZE: usize = 8;

/// Channel capacity for render-to-network publications
const OUTBOX_CHANNEL_SIZE: usize = 16;

/// How long the network task waits for room in [`NETWORK_EVENTS`]
pub const NETWORK_SEND_TIMEOUT_MS: u64 = 100;

/// The panel on I2C0
pub type Display = Ssd1306<I2c<'static, I2C0, Async>>;

/// Gestures from the input task, drained by the render task
pub static GESTURES: Channel<CriticalSectionRawMutex, GestureEvent, GESTURE_CHANNEL_SIZE> =
    Channel::new();

/// Events from the network task, drained by the render task
///
/// Poke bitmaps travel inside the events; an event dropped on a full
/// channel releases its bitmaps with it.
pub static NETWORK_EVENTS: Channel<CriticalSectionRawMutex, NetworkEvent, NETWORK_CHANNEL_SIZE> =
    Channel::new();

/// Publications from the render task, sent by the network task
pub static OUTBOX: Channel<CriticalSectionRawMutex, OutboundEvent, OUTBOX_CHANNEL_SIZE> =
    Channel::new();

/// Link, socket, broker and portal state (written by the network task only)
pub static CONNECTIVITY: ConnectivityFlags = ConnectivityFlags::new();

/// Display bus
///
/// The render task holds it for each flush; anything else touching the
/// panel (contrast writes) must take it too.
pub static DISPLAY: Mutex<CriticalSectionRawMutex, Option<Display>> = Mutex::new(None);

/// Render-side end of [`OUTBOX`]
pub struct ChannelOutbox;

impl Outbox for ChannelOutbox {
    fn post(&mut self, event: OutboundEvent) {
        if OUTBOX.try_send(event).is_err() {
            defmt::warn!("Outbox channel full, dropping event");
        }
    }
}
