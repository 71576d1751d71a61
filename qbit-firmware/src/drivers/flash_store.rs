//! Animation archive in on-board flash
//!
//! The archive is written to the upper half of the 2 MiB flash by the
//! provisioning tool; the firmware only ever reads it.

use embassy_rp::flash::{Blocking, Flash};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use qbit_core::traits::{AnimationStore, StoreError};

/// Total flash on the Pico W
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// Archive region: starts where memory.x ends the program image
pub const ARCHIVE_OFFSET: u32 = 1024 * 1024;
pub const ARCHIVE_SIZE: usize = FLASH_SIZE - ARCHIVE_OFFSET as usize;

/// Read-only view of the archive region
pub struct FlashStore {
    flash: Flash<'static, FLASH, Blocking, FLASH_SIZE>,
}

impl FlashStore {
    pub fn new(flash: Peri<'static, FLASH>) -> Self {
        Self {
            flash: Flash::new_blocking(flash),
        }
    }
}

impl AnimationStore for FlashStore {
    fn capacity(&self) -> usize {
        ARCHIVE_SIZE
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError> {
        let end = offset.checked_add(buf.len()).ok_or(StoreError::OutOfBounds)?;
        if end > ARCHIVE_SIZE {
            return Err(StoreError::OutOfBounds);
        }
        self.flash
            .blocking_read(ARCHIVE_OFFSET + offset as u32, buf)
            .map_err(|_| StoreError::Read)
    }
}
