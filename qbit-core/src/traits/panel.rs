//! Page-addressed monochrome display trait

use crate::codec::FRAME_BYTES;

/// Errors that can occur talking to the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayError {
    /// Bus transfer failed (I2C NAK, arbitration loss)
    Bus,
    /// Panel did not respond during initialisation
    NotResponding,
}

/// A 128x64 panel that accepts whole frames in native page layout
#[allow(async_fn_in_trait)]
pub trait Panel {
    /// Send the panel's power-on command sequence
    async fn init(&mut self) -> Result<(), DisplayError>;

    /// Send a full frame (8 pages x 128 columns)
    async fn flush(&mut self, frame: &[u8; FRAME_BYTES]) -> Result<(), DisplayError>;

    /// Set the contrast register (0-255)
    async fn set_contrast(&mut self, level: u8) -> Result<(), DisplayError>;

    /// Initialise, apply the contrast and blank the panel
    ///
    /// The controller's RAM holds noise after power-up; the blank frame
    /// hides it until the first real frame arrives.
    async fn power_on(&mut self, contrast: u8) -> Result<(), DisplayError> {
        self.init().await?;
        self.set_contrast(contrast).await?;
        self.flush(&[0; FRAME_BYTES]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use embassy_futures::block_on;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Init,
        Flush(usize),
        Contrast(u8),
    }

    /// Records calls; fails `init` when `absent`
    #[derive(Default)]
    struct RecordingPanel {
        calls: Vec<Call>,
        absent: bool,
    }

    impl Panel for RecordingPanel {
        async fn init(&mut self) -> Result<(), DisplayError> {
            if self.absent {
                return Err(DisplayError::NotResponding);
            }
            self.calls.push(Call::Init);
            Ok(())
        }

        async fn flush(&mut self, frame: &[u8; FRAME_BYTES]) -> Result<(), DisplayError> {
            let lit = frame.iter().map(|b| b.count_ones() as usize).sum();
            self.calls.push(Call::Flush(lit));
            Ok(())
        }

        async fn set_contrast(&mut self, level: u8) -> Result<(), DisplayError> {
            self.calls.push(Call::Contrast(level));
            Ok(())
        }
    }

    #[test]
    fn test_power_on_sequence() {
        let mut panel = RecordingPanel::default();
        block_on(panel.power_on(0x80)).unwrap();
        assert_eq!(
            panel.calls,
            [Call::Init, Call::Contrast(0x80), Call::Flush(0)]
        );
    }

    #[test]
    fn test_power_on_stops_at_missing_panel() {
        let mut panel = RecordingPanel {
            absent: true,
            ..Default::default()
        };
        assert_eq!(
            block_on(panel.power_on(0x80)),
            Err(DisplayError::NotResponding)
        );
        assert!(panel.calls.is_empty());
    }
}
