//! Passive piezo buzzer on a PWM channel
//!
//! Tone frequency comes from the PWM wrap value, volume from the duty
//! cycle. Half duty is the loudest a piezo gets, so 100 % volume maps to
//! 50 % duty.

use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use qbit_core::traits::Buzzer;

/// Clock divider: 125 MHz / 64 keeps `top` in range from ~30 Hz upward
const PWM_DIVIDER: u8 = 64;

/// Lowest tone the divider can produce without overflowing `top`
const MIN_FREQ_HZ: u32 = 30;

/// Buzzer on PWM output A of its slice
pub struct PwmBuzzer {
    pwm: Pwm<'static>,
    config: PwmConfig,
    /// PWM input clock after the divider
    counter_hz: u32,
}

impl PwmBuzzer {
    pub fn new(mut pwm: Pwm<'static>) -> Self {
        let mut config = PwmConfig::default();
        config.divider = PWM_DIVIDER.into();
        config.compare_a = 0;
        config.enable = false;
        pwm.set_config(&config);
        Self {
            pwm,
            config,
            counter_hz: embassy_rp::clocks::clk_sys_freq() / u32::from(PWM_DIVIDER),
        }
    }
}

/// Wrap value and compare level for a tone
fn timing(counter_hz: u32, freq_hz: u32, volume: u8) -> (u16, u16) {
    let period = counter_hz / freq_hz.max(MIN_FREQ_HZ);
    let top = period.saturating_sub(1).clamp(1, u32::from(u16::MAX));
    let compare = top * u32::from(volume.min(100)) / 200;
    (top as u16, compare as u16)
}

impl Buzzer for PwmBuzzer {
    fn tone(&mut self, freq_hz: u32, volume: u8) {
        if freq_hz == 0 || volume == 0 {
            self.silence();
            return;
        }
        let (top, compare) = timing(self.counter_hz, freq_hz, volume);
        self.config.top = top;
        self.config.compare_a = compare;
        self.config.enable = true;
        self.pwm.set_config(&self.config);
    }

    fn silence(&mut self) {
        self.config.compare_a = 0;
        self.config.enable = false;
        self.pwm.set_config(&self.config);
    }
}
