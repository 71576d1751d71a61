//! Wi-Fi join QR code for the setup access point
//!
//! Phones scanning the code offer to join the network directly. The code
//! uses the `WIFI:T:WPA;S:<ssid>;P:<pass>;;` format, low error correction
//! and the smallest version that fits, up to version 5.

use embedded_graphics::mono_font::ascii::FONT_5X7;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use heapless::String;
use qrcodegen_no_heap::{QrCode, QrCodeEcc, Version};

use super::FrameBuffer;
use crate::codec::SCREEN_WIDTH;

/// Largest version drawn; 37 modules still fit above the label
const MAX_VERSION: u8 = 5;

const BUFFER_LEN: usize = Version::new(MAX_VERSION).buffer_len();

/// Rows left for the code above the label
const QR_AREA_HEIGHT: i32 = 58;

/// Caption under the code
pub const QR_LABEL: &str = "Scan to connect";

/// Errors building the code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QrError {
    /// Credentials do not fit the payload buffer or the largest version
    TooLong,
}

/// Where the code landed on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrLayout {
    /// Modules per side
    pub modules: i32,
    /// Pixels per module
    pub scale: i32,
    /// Left edge of the code
    pub x: i32,
}

/// Build the Wi-Fi join string, escaping the characters the format reserves
pub fn wifi_payload(ssid: &str, password: &str) -> Result<String<160>, QrError> {
    let mut out: String<160> = String::new();
    out.push_str("WIFI:T:WPA;S:").map_err(|_| QrError::TooLong)?;
    push_escaped(&mut out, ssid)?;
    out.push_str(";P:").map_err(|_| QrError::TooLong)?;
    push_escaped(&mut out, password)?;
    out.push_str(";;").map_err(|_| QrError::TooLong)?;
    Ok(out)
}

fn push_escaped<const N: usize>(out: &mut String<N>, value: &str) -> Result<(), QrError> {
    for c in value.chars() {
        if matches!(c, '\\' | ';' | ',' | ':' | '"') {
            out.push('\\').map_err(|_| QrError::TooLong)?;
        }
        out.push(c).map_err(|_| QrError::TooLong)?;
    }
    Ok(())
}

/// Clear the frame and draw the join code with its caption
pub fn draw_wifi_qr(fb: &mut FrameBuffer, ssid: &str, password: &str) -> Result<QrLayout, QrError> {
    let payload = wifi_payload(ssid, password)?;

    let mut temp = [0u8; BUFFER_LEN];
    let mut out = [0u8; BUFFER_LEN];
    let qr = QrCode::encode_text(
        &payload,
        &mut temp,
        &mut out,
        QrCodeEcc::Low,
        Version::MIN,
        Version::new(MAX_VERSION),
        None,
        true,
    )
    .map_err(|_| QrError::TooLong)?;

    let modules = qr.size();
    let scale = if modules * 2 <= QR_AREA_HEIGHT { 2 } else { 1 };
    let x = (SCREEN_WIDTH as i32 - modules * scale) / 2;

    fb.clear();
    for my in 0..modules {
        for mx in 0..modules {
            if !qr.get_module(mx, my) {
                continue;
            }
            for dy in 0..scale {
                for dx in 0..scale {
                    fb.set_pixel(x + mx * scale + dx, my * scale + dy, true);
                }
            }
        }
    }

    let style = MonoTextStyle::new(&FONT_5X7, BinaryColor::On);
    let label_x = (SCREEN_WIDTH as i32 - QR_LABEL.len() as i32 * 5) / 2;
    let _ = Text::with_baseline(QR_LABEL, Point::new(label_x, QR_AREA_HEIGHT), style, Baseline::Top)
        .draw(fb);

    Ok(QrLayout { modules, scale, x })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_format() {
        assert_eq!(
            wifi_payload("QBIT", "C10AB34F").unwrap().as_str(),
            "WIFI:T:WPA;S:QBIT;P:C10AB34F;;"
        );
        assert_eq!(
            wifi_payload("a;b", "p:\"q\"").unwrap().as_str(),
            "WIFI:T:WPA;S:a\\;b;P:p\\:\\\"q\\\";;"
        );
    }

    #[test]
    fn test_draws_finder_patterns() {
        let mut fb = FrameBuffer::new();
        let layout = draw_wifi_qr(&mut fb, "QBIT", "C10AB34F").unwrap();

        // Short payload fits version 2 or 3 at double scale
        assert_eq!(layout.scale, 2);
        assert!(layout.modules <= 29);
        assert_eq!(layout.x, (128 - layout.modules * 2) / 2);

        let module = |mx: i32, my: i32| fb.pixel(layout.x + mx * 2, my * 2);
        let right = layout.modules - 7;
        let bottom = layout.modules - 7;
        for (ox, oy) in [(0, 0), (right, 0), (0, bottom)] {
            // Dark outer ring, light inner ring, dark 3x3 core
            assert!(module(ox, oy));
            assert!(module(ox + 6, oy + 6));
            assert!(!module(ox + 1, oy + 1));
            assert!(!module(ox + 5, oy + 1));
            assert!(module(ox + 3, oy + 3));
        }

        // Caption sits below the code
        assert!((QR_AREA_HEIGHT..64).any(|y| (0..128).any(|x| fb.pixel(x, y))));
    }

    #[test]
    fn test_long_credentials_use_single_scale_or_fail() {
        let mut fb = FrameBuffer::new();
        let pass = "x".repeat(60);
        let layout = draw_wifi_qr(&mut fb, "QBIT", &pass).unwrap();
        assert_eq!(layout.scale, 1);

        let pass = "x".repeat(150);
        assert_eq!(draw_wifi_qr(&mut fb, "QBIT", &pass), Err(QrError::TooLong));
    }
}
