//! Text screens drawn with `embedded-graphics`

use core::fmt::Write;

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X13};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use heapless::String;

use super::FrameBuffer;
use crate::codec::SCREEN_WIDTH;
use crate::poke::scroll::SCROLL_GAP;

/// Left margin of text lines
pub const LINE_X: i32 = 4;

/// Baselines of the four text lines
pub const BASELINES: [i32; 4] = [13, 28, 43, 58];

/// Advance width of the body font
pub const CHAR_WIDTH: u32 = 6;

/// Cells in the WiFi countdown bar
pub const WIFI_PROGRESS_CELLS: u32 = 18;

fn body() -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyle::new(&FONT_6X13, BinaryColor::On)
}

/// Pixel width of `text` in the body font
pub fn text_width(text: &str) -> u32 {
    text.chars().count() as u32 * CHAR_WIDTH
}

fn draw_at(fb: &mut FrameBuffer, text: &str, x: i32, baseline: i32, style: MonoTextStyle<'_, BinaryColor>) {
    let _ = Text::with_baseline(text, Point::new(x, baseline), style, Baseline::Alphabetic).draw(fb);
}

/// Clear the frame and draw up to four lines
///
/// Empty strings leave their line blank.
pub fn draw_lines(fb: &mut FrameBuffer, lines: &[&str]) {
    fb.clear();
    for (line, baseline) in lines.iter().zip(BASELINES) {
        if !line.is_empty() {
            draw_at(fb, line, LINE_X, baseline, body());
        }
    }
}

/// Draw one line, scrolled circularly when wider than the screen
///
/// `offset` is ignored for text that fits.
pub fn draw_scrolled_line(fb: &mut FrameBuffer, line: usize, text: &str, offset: u32) {
    let Some(&baseline) = BASELINES.get(line) else {
        return;
    };
    let width = text_width(text);
    if width <= SCREEN_WIDTH as u32 {
        draw_at(fb, text, LINE_X, baseline, body());
        return;
    }

    let virtual_width = (width + SCROLL_GAP) as i32;
    let x = LINE_X - offset as i32;
    draw_at(fb, text, x, baseline, body());
    draw_at(fb, text, x + virtual_width, baseline, body());
}

/// Draw `text` horizontally centred with the given font
pub fn draw_centered(fb: &mut FrameBuffer, text: &str, font: &MonoFont<'_>, baseline: i32) {
    let width = text.chars().count() as u32 * (font.character_size.width + font.character_spacing);
    let x = (SCREEN_WIDTH as i32 - width as i32) / 2;
    draw_at(fb, text, x, baseline, MonoTextStyle::new(font, BinaryColor::On));
}

/// Large clock with the date underneath
pub fn draw_time_screen(fb: &mut FrameBuffer, hhmm: &str, date: &str) {
    fb.clear();
    draw_centered(fb, hhmm, &FONT_10X20, 38);
    draw_centered(fb, date, &FONT_6X13, 58);
}

/// WiFi countdown text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiProgress {
    /// ` AP in Ns` or ` Connecting`
    pub status: String<20>,
    /// `[####......]`
    pub bar: String<24>,
    /// Seconds shown, `None` while still connecting
    pub seconds: Option<u32>,
    /// Filled cells
    pub filled: u32,
}

/// Countdown to the AP fallback
///
/// `link_lost_ms` is when the link was declared lost; `None` means the
/// first connection attempt is still running.
pub fn wifi_progress(now_ms: u64, link_lost_ms: Option<u64>, window_ms: u64) -> WifiProgress {
    let mut status = String::new();
    let (seconds, filled) = match link_lost_ms {
        None => {
            let _ = status.push_str(" Connecting");
            (None, 0)
        }
        Some(lost) => {
            let elapsed = now_ms.saturating_sub(lost);
            let remaining = window_ms.saturating_sub(elapsed);
            let seconds = ((remaining + 500) / 1000) as u32;
            let filled = (elapsed * u64::from(WIFI_PROGRESS_CELLS + 1) / window_ms.max(1))
                .min(u64::from(WIFI_PROGRESS_CELLS)) as u32;
            let _ = write!(status, " AP in {}s", seconds);
            (Some(seconds), filled)
        }
    };

    let mut bar = String::new();
    let _ = bar.push('[');
    for cell in 0..WIFI_PROGRESS_CELLS {
        let _ = bar.push(if cell < filled { '#' } else { '.' });
    }
    let _ = bar.push(']');

    WifiProgress {
        status,
        bar,
        seconds,
        filled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("Poke!"), 30);
        assert_eq!(text_width(""), 0);
    }

    #[test]
    fn test_draw_lines_lights_pixels() {
        let mut fb = FrameBuffer::new();
        draw_lines(&mut fb, &["[ MUTED ]"]);
        assert!(fb.lit() > 0);

        // Only the first line's band is used
        for y in 20..64 {
            for x in 0..128 {
                assert!(!fb.pixel(x, y));
            }
        }
    }

    #[test]
    fn test_blank_lines_clear() {
        let mut fb = FrameBuffer::new();
        fb.set_pixel(10, 10, true);
        draw_lines(&mut fb, &["", "", "", ""]);
        assert_eq!(fb.lit(), 0);
    }

    #[test]
    fn test_wifi_progress_connecting() {
        let p = wifi_progress(5_000, None, 15_000);
        assert_eq!(p.status.as_str(), " Connecting");
        assert_eq!(p.bar.as_str(), "[..................]");
        assert_eq!(p.seconds, None);
    }

    #[test]
    fn test_wifi_progress_countdown() {
        let p = wifi_progress(1_000, Some(1_000), 15_000);
        assert_eq!(p.status.as_str(), " AP in 15s");
        assert_eq!(p.filled, 0);

        // 7.5 s in: 7.5 s remain (rounds to 8), 19 * 7500 / 15000 = 9 cells
        let p = wifi_progress(8_500, Some(1_000), 15_000);
        assert_eq!(p.status.as_str(), " AP in 8s");
        assert_eq!(p.filled, 9);
        assert_eq!(p.bar.as_str(), "[#########.........]");

        let p = wifi_progress(60_000, Some(1_000), 15_000);
        assert_eq!(p.status.as_str(), " AP in 0s");
        assert_eq!(p.filled, WIFI_PROGRESS_CELLS);
    }

    #[test]
    fn test_scrolled_line_wraps() {
        let long = "This message is definitely wider than the screen";
        let mut a = FrameBuffer::new();
        draw_scrolled_line(&mut a, 2, long, 0);
        let mut b = FrameBuffer::new();
        draw_scrolled_line(&mut b, 2, long, text_width(long) + SCROLL_GAP);
        // A full virtual width brings the text back to the start
        assert_eq!(a.as_bytes(), b.as_bytes());
    }
}
