//! Touch pad sampling task
//!
//! Samples the pad every 10 ms and turns presses into gestures.

use defmt::*;
use embassy_rp::gpio::Input;
use embassy_time::{Duration, Instant, Ticker};

use qbit_core::input::{GestureDetector, POLL_INTERVAL_MS};

use crate::channels::GESTURES;

/// Input task - feeds gestures to the render task
#[embassy_executor::task]
pub async fn input_task(pad: Input<'static>) {
    info!("Input task started");

    let mut detector = GestureDetector::new();
    let mut ticker = Ticker::every(Duration::from_millis(POLL_INTERVAL_MS));

    loop {
        ticker.next().await;

        let now_ms = Instant::now().as_millis();
        if let Some(gesture) = detector.poll(pad.is_high(), now_ms) {
            debug!("Gesture: {:?}", gesture.kind);
            if GESTURES.try_send(gesture).is_err() {
                warn!("Gesture channel full, dropping event");
            }
        }
    }
}
