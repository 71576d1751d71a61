//! QBIT - Desktop companion display firmware
//!
//! Main firmware binary for the Raspberry Pi Pico W. Plays bitmap
//! animations on a 128x64 OLED, turns touch pad gestures into actions and
//! shows pokes delivered over the device socket or MQTT.
//!
//! Three tasks share the work, each on its own priority level:
//! input (highest), render, and network (thread mode).

#![no_std]
#![no_main]

extern crate alloc;

use cyw43_pio::{PioSpi, DEFAULT_CLOCK_DIVIDER};
use defmt::*;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_net::{Config as NetConfig, StackResources};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::i2c::{self, I2c};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::peripherals::{I2C0, PIO0};
use embassy_rp::pio::{self, Pio};
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_time::{Instant, Timer};
use embedded_alloc::LlffHeap as Heap;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use qbit_core::config::{DeviceSettings, Settings};
use qbit_core::traits::Panel;

use crate::channels::DISPLAY;
use crate::drivers::{FlashStore, PwmBuzzer, Ssd1306};

mod channels;
mod config;
mod drivers;
mod net;
mod tasks;

// Heap for JSON messages, poke bitmaps and MQTT packets
#[global_allocator]
static HEAP: Heap = Heap::empty();

// Heap size: 96KB
const HEAP_SIZE: usize = 96 * 1024;

/// Embedded configuration (compiled into firmware)
/// Edit device.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../device.toml");

/// Panel bus speed
const I2C_FREQUENCY_HZ: u32 = 400_000;

bind_interrupts!(struct Irqs {
    I2C0_IRQ => i2c::InterruptHandler<I2C0>;
    PIO0_IRQ_0 => pio::InterruptHandler<PIO0>;
});

/// Touch sampling
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();
/// Rendering and audio
static EXECUTOR_MED: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR_HIGH.on_interrupt()
}

#[interrupt]
unsafe fn SWI_IRQ_0() {
    EXECUTOR_MED.on_interrupt()
}

static CYW43_STATE: StaticCell<cyw43::State> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<5>> = StaticCell::new();
static SETTINGS: StaticCell<DeviceSettings> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("QBIT firmware v{} starting...", qbit_core::FIRMWARE_VERSION);

    init_heap();

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // WiFi chip: CYW43439 on PIO0 (PWR=GPIO23, CS=GPIO25, DIO=GPIO24, CLK=GPIO29)
    let fw = cyw43_firmware::CYW43_43439A0;
    let clm = cyw43_firmware::CYW43_43439A0_CLM;

    let pwr = Output::new(p.PIN_23, Level::Low);
    let cs = Output::new(p.PIN_25, Level::High);
    let mut pio = Pio::new(p.PIO0, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        p.PIN_24,
        p.PIN_29,
        p.DMA_CH0,
    );

    let state = CYW43_STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, fw).await;
    spawner.spawn(unwrap!(tasks::wifi_task(runner)));

    control.init(clm).await;
    control
        .set_power_management(cyw43::PowerManagementMode::PowerSave)
        .await;

    // The device id, name and AP passphrase all come from the MAC
    let mac = control.address().await;
    let settings: &'static DeviceSettings =
        SETTINGS.init(config::load_settings(EMBEDDED_CONFIG, mac));
    let seed = entropy_seed(mac);

    let (stack, net_runner) = embassy_net::new(
        net_device,
        NetConfig::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::<5>::new()),
        (u64::from(seed) << 32) | u64::from(seed.rotate_left(16)),
    );
    spawner.spawn(unwrap!(tasks::net_task(net_runner)));
    info!("WiFi chip initialized");

    // Panel on I2C0 (SDA=GPIO20, SCL=GPIO21)
    let mut i2c_config = i2c::Config::default();
    i2c_config.frequency = I2C_FREQUENCY_HZ;
    let i2c = I2c::new_async(p.I2C0, p.PIN_21, p.PIN_20, Irqs, i2c_config);
    {
        let mut display = DISPLAY.lock().await;
        let mut panel = Ssd1306::new(i2c);
        match panel.power_on(settings.brightness()).await {
            Ok(()) => {
                *display = Some(panel);
                info!("Display initialized");
            }
            Err(e) => error!("Display not responding: {:?}", e),
        }
    }

    // Buzzer on PWM slice 1 channel A (GPIO2)
    let pwm = Pwm::new_output_a(p.PWM_SLICE1, p.PIN_2, PwmConfig::default());
    let buzzer = PwmBuzzer::new(pwm);

    // Touch pad on GPIO1, active high
    let pad = Input::new(p.PIN_1, Pull::Down);

    let store = FlashStore::new(p.FLASH);

    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let high = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
    high.spawn(unwrap!(tasks::input_task(pad)));

    interrupt::SWI_IRQ_0.set_priority(Priority::P3);
    let med = EXECUTOR_MED.start(interrupt::SWI_IRQ_0);
    med.spawn(unwrap!(tasks::render_task(settings, buzzer, store, seed)));

    spawner.spawn(unwrap!(tasks::network_task(
        settings,
        stack,
        control,
        seed.rotate_left(7) ^ 0x5A5A_5A5A,
    )));

    info!("All tasks spawned, firmware running");

    loop {
        Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}

/// Initialize the heap allocator
fn init_heap() {
    use core::mem::MaybeUninit;
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
    #[allow(static_mut_refs)]
    unsafe {
        HEAP.init(HEAP_MEM.as_ptr() as usize, HEAP_SIZE)
    }
}

/// Seed for the shuffle and WebSocket masks
///
/// Mixes the MAC with the boot time, which varies with the WiFi firmware
/// load, so two devices never share a sequence.
fn entropy_seed(mac: [u8; 6]) -> u32 {
    let low = u32::from_le_bytes([mac[2], mac[3], mac[4], mac[5]]);
    let ticks = Instant::now().as_ticks();
    low ^ (ticks as u32) ^ ((ticks >> 32) as u32).rotate_left(11)
}
