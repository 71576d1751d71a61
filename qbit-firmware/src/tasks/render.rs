//! Render task
//!
//! Owns the display runtime: plays the boot sequence, then drains gestures
//! and network events and pushes every changed frame to the panel.

use defmt::*;
use embassy_futures::select::select3;
use embassy_futures::yield_now;
use embassy_time::{Instant, Timer};

use qbit_core::config::DeviceSettings;
use qbit_core::runtime::DisplayRuntime;
use qbit_core::traits::Panel;

use crate::channels::{ChannelOutbox, CONNECTIVITY, DISPLAY, GESTURES, NETWORK_EVENTS};
use crate::drivers::{FlashStore, PwmBuzzer};

type Runtime = DisplayRuntime<PwmBuzzer, FlashStore, ChannelOutbox>;

/// Render task - drives the panel and the buzzer
#[embassy_executor::task]
pub async fn render_task(
    settings: &'static DeviceSettings,
    buzzer: PwmBuzzer,
    store: FlashStore,
    seed: u32,
) {
    info!("Render task started");

    let mut rt = Runtime::new(settings, seed, buzzer, store, ChannelOutbox);
    match rt.load_library() {
        Ok(count) => info!("Animation library: {} entries", count),
        Err(e) => error!("Animation archive unreadable: {:?}", e),
    }

    play_boot(&mut rt).await;

    loop {
        let now_ms = Instant::now().as_millis();
        let wake = Instant::from_millis(rt.next_wake_ms(now_ms));
        select3(
            NETWORK_EVENTS.ready_to_receive(),
            GESTURES.ready_to_receive(),
            Timer::at(wake),
        )
        .await;

        // One event of each kind per tick keeps gesture latency bounded
        let event = NETWORK_EVENTS.try_receive().ok();
        let gesture = GESTURES.try_receive().ok();
        if let Some(ev) = &event {
            debug!("Network event: {:?}", ev.kind());
        }

        let now_ms = Instant::now().as_millis();
        if rt.tick(now_ms, &CONNECTIVITY.snapshot(), event, gesture) {
            flush(&rt).await;
        }
        if let Some(e) = rt.take_error() {
            warn!("Animation read failed: {:?}", e);
        }

        yield_now().await;
    }
}

/// Boot animation with the start-up melody, then the first real state
async fn play_boot(rt: &mut Runtime) {
    rt.begin_boot(Instant::now().as_millis());
    while let Some(delay_ms) = rt.boot_frame(Instant::now().as_millis()) {
        flush(rt).await;
        Timer::after_millis(u64::from(delay_ms)).await;
    }
    if let Some(e) = rt.take_error() {
        warn!("Boot animation failed: {:?}", e);
    }
    rt.finish_boot(Instant::now().as_millis(), &CONNECTIVITY.snapshot());
    flush(rt).await;
    info!("Boot complete");
}

async fn flush(rt: &Runtime) {
    let mut display = DISPLAY.lock().await;
    if let Some(panel) = display.as_mut() {
        if let Err(e) = panel.flush(rt.frame().as_bytes()).await {
            warn!("Display flush failed: {:?}", e);
        }
    }
}
