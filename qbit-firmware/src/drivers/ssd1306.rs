//! SSD1306 OLED display driver
//!
//! Driver for 128x64 SSD1306-based OLED panels via I2C. The panel takes
//! whole frames already laid out in its native page format.

use embedded_hal_async::i2c::{Error as _, ErrorKind, I2c};
use qbit_core::codec::FRAME_BYTES;
use qbit_core::traits::{DisplayError, Panel};

/// SSD1306 I2C address (0x3D with the SA0 pad bridged)
pub const SSD1306_ADDR: u8 = 0x3C;

const WIDTH: usize = 128;
const PAGES: usize = 8;

/// Control byte: the rest of the transfer is a command
const CONTROL_COMMAND: u8 = 0x00;
/// Control byte: the rest of the transfer is display RAM
const CONTROL_DATA: u8 = 0x40;

/// SSD1306 commands
#[allow(dead_code)]
mod cmd {
    pub const DISPLAY_OFF: u8 = 0xAE;
    pub const DISPLAY_ON: u8 = 0xAF;
    pub const SET_CONTRAST: u8 = 0x81;
    pub const ENTIRE_DISPLAY_RESUME: u8 = 0xA4;
    pub const SET_NORMAL: u8 = 0xA6;
    pub const SET_MEMORY_MODE: u8 = 0x20;
    pub const SET_DISPLAY_OFFSET: u8 = 0xD3;
    pub const SET_COM_PINS: u8 = 0xDA;
    pub const SET_VCOM_DETECT: u8 = 0xDB;
    pub const SET_CLOCK_DIV: u8 = 0xD5;
    pub const SET_PRECHARGE: u8 = 0xD9;
    pub const SET_MUX_RATIO: u8 = 0xA8;
    pub const SET_LOW_COLUMN: u8 = 0x00;
    pub const SET_HIGH_COLUMN: u8 = 0x10;
    pub const SET_PAGE_ADDR: u8 = 0xB0;
    pub const SET_START_LINE: u8 = 0x40;
    pub const SET_SEG_REMAP: u8 = 0xA1;
    pub const SET_COM_SCAN_DEC: u8 = 0xC8;
    pub const SET_CHARGE_PUMP: u8 = 0x8D;
    pub const DEACTIVATE_SCROLL: u8 = 0x2E;
}

/// Power-on sequence for a 128x64 panel with the internal charge pump
const INIT_SEQUENCE: &[u8] = &[
    cmd::DISPLAY_OFF,
    cmd::SET_CLOCK_DIV,
    0x80,
    cmd::SET_MUX_RATIO,
    0x3F,
    cmd::SET_DISPLAY_OFFSET,
    0x00,
    cmd::SET_START_LINE,
    cmd::SET_CHARGE_PUMP,
    0x14,
    // Page addressing: flush sets each page explicitly
    cmd::SET_MEMORY_MODE,
    0x02,
    cmd::SET_SEG_REMAP,
    cmd::SET_COM_SCAN_DEC,
    cmd::SET_COM_PINS,
    0x12,
    cmd::SET_PRECHARGE,
    0xF1,
    cmd::SET_VCOM_DETECT,
    0x40,
    cmd::DEACTIVATE_SCROLL,
    cmd::ENTIRE_DISPLAY_RESUME,
    cmd::SET_NORMAL,
    cmd::DISPLAY_ON,
];

/// SSD1306 OLED driver
pub struct Ssd1306<I2C> {
    i2c: I2C,
    addr: u8,
}

impl<I2C> Ssd1306<I2C>
where
    I2C: I2c,
{
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            addr: SSD1306_ADDR,
        }
    }

    /// Send a command to the display
    async fn command(&mut self, c: u8) -> Result<(), DisplayError> {
        self.i2c
            .write(self.addr, &[CONTROL_COMMAND, c])
            .await
            .map_err(|_| DisplayError::Bus)
    }
}

impl<I2C> Panel for Ssd1306<I2C>
where
    I2C: I2c,
{
    async fn init(&mut self) -> Result<(), DisplayError> {
        // A missing panel NAKs its address
        if let Err(e) = self
            .i2c
            .write(self.addr, &[CONTROL_COMMAND, INIT_SEQUENCE[0]])
            .await
        {
            return Err(match e.kind() {
                ErrorKind::NoAcknowledge(_) => DisplayError::NotResponding,
                _ => DisplayError::Bus,
            });
        }
        for &c in &INIT_SEQUENCE[1..] {
            self.command(c).await?;
        }
        Ok(())
    }

    async fn flush(&mut self, frame: &[u8; FRAME_BYTES]) -> Result<(), DisplayError> {
        let mut data = [0u8; WIDTH + 1];
        data[0] = CONTROL_DATA;
        for (page, src) in frame.chunks_exact(WIDTH).enumerate().take(PAGES) {
            self.command(cmd::SET_PAGE_ADDR | page as u8).await?;
            self.command(cmd::SET_LOW_COLUMN).await?;
            self.command(cmd::SET_HIGH_COLUMN).await?;

            data[1..].copy_from_slice(src);
            self.i2c
                .write(self.addr, &data)
                .await
                .map_err(|_| DisplayError::Bus)?;
        }
        Ok(())
    }

    async fn set_contrast(&mut self, level: u8) -> Result<(), DisplayError> {
        self.command(cmd::SET_CONTRAST).await?;
        self.command(level).await
    }
}
