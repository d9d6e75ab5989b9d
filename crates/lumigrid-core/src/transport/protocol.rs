//! Wire protocol for the driver devices.
//!
//! Every command is one leading opcode byte followed by its payload:
//!
//! ```text
//! SET_PIXEL      0x01  [idx_hi][idx_lo][r][g][b]
//! SET_BRIGHTNESS 0x02  [value]
//! SHOW           0x03
//! CLEAR          0x04
//! SET_RANGE      0x05  [start_hi][start_lo][count][r g b ...]
//! SET_ALL        0x06  [r g b ...] (full frame; device commits on receipt)
//! CONFIGURE      0x07  [strips][len_hi][len_lo]
//! PING           0xFF
//! ```
//!
//! Pixel indices are big-endian u16. Outbound buffers are zero-padded to a
//! 4-byte boundary before transmission and bounded by a configurable maximum
//! transfer size; frames that do not fit a single SET_ALL are split into
//! SET_RANGE chunks committed by exactly one trailing SHOW.

use crate::config::BusConfig;
use crate::layout::Rgb;

pub const CMD_SET_PIXEL: u8 = 0x01;
pub const CMD_SET_BRIGHTNESS: u8 = 0x02;
pub const CMD_SHOW: u8 = 0x03;
pub const CMD_CLEAR: u8 = 0x04;
pub const CMD_SET_RANGE: u8 = 0x05;
pub const CMD_SET_ALL: u8 = 0x06;
pub const CMD_CONFIGURE: u8 = 0x07;
pub const CMD_PING: u8 = 0xFF;

/// Pad `buf` with zero bytes up to the configured word boundary.
pub fn pad_to_boundary(buf: &mut Vec<u8>) {
    let rem = buf.len() % BusConfig::WORD_ALIGN;
    if rem != 0 {
        buf.resize(buf.len() + (BusConfig::WORD_ALIGN - rem), 0);
    }
}

pub fn encode_set_pixel(index: u16, color: Rgb) -> Vec<u8> {
    let idx = index.to_be_bytes();
    vec![CMD_SET_PIXEL, idx[0], idx[1], color.0, color.1, color.2]
}

pub fn encode_set_range(start: u16, pixels: &[Rgb]) -> Vec<u8> {
    debug_assert!(pixels.len() <= BusConfig::MAX_RANGE_PIXELS);
    let start_bytes = start.to_be_bytes();
    let mut buf = Vec::with_capacity(4 + pixels.len() * 3);
    buf.push(CMD_SET_RANGE);
    buf.push(start_bytes[0]);
    buf.push(start_bytes[1]);
    buf.push(pixels.len() as u8);
    for p in pixels {
        buf.extend_from_slice(&[p.0, p.1, p.2]);
    }
    buf
}

pub fn encode_set_all(frame: &[Rgb]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + frame.len() * 3);
    buf.push(CMD_SET_ALL);
    for p in frame {
        buf.extend_from_slice(&[p.0, p.1, p.2]);
    }
    buf
}

pub fn encode_set_brightness(value: u8) -> Vec<u8> {
    vec![CMD_SET_BRIGHTNESS, value]
}

pub fn encode_show() -> Vec<u8> {
    vec![CMD_SHOW]
}

pub fn encode_clear() -> Vec<u8> {
    vec![CMD_CLEAR]
}

pub fn encode_configure(strip_count: u8, leds_per_strip: u16) -> Vec<u8> {
    let len = leds_per_strip.to_be_bytes();
    vec![CMD_CONFIGURE, strip_count, len[0], len[1]]
}

pub fn encode_ping() -> Vec<u8> {
    vec![CMD_PING]
}

/// Plan the command sequence delivering a full frame within `max_transfer`.
///
/// When the inline SET_ALL fits the budget it is used alone (the device
/// commits on SET_ALL). Otherwise the frame is split into SET_RANGE chunks
/// no larger than the budget, followed by exactly one SHOW.
pub fn frame_commands(frame: &[Rgb], max_transfer: usize) -> Vec<Vec<u8>> {
    // Commands are zero-padded to the word boundary before hitting the bus,
    // so the budget is the largest aligned length not exceeding max_transfer.
    let budget = max_transfer - (max_transfer % BusConfig::WORD_ALIGN);

    let inline_len = 1 + frame.len() * 3;
    if inline_len <= budget {
        return vec![encode_set_all(frame)];
    }

    // 4-byte SET_RANGE header, 3 bytes per pixel, count field is one byte.
    let budget_pixels = budget.saturating_sub(4) / 3;
    let chunk_pixels = budget_pixels.min(BusConfig::MAX_RANGE_PIXELS).max(1);

    let mut commands = Vec::with_capacity(frame.len() / chunk_pixels + 2);
    let mut start = 0usize;
    while start < frame.len() {
        let end = (start + chunk_pixels).min(frame.len());
        commands.push(encode_set_range(start as u16, &frame[start..end]));
        start = end;
    }
    commands.push(encode_show());
    commands
}
