//! Small RGB helpers shared by the quantizer and the rasterizer.

use palette::Srgb;
use serde::Serialize;

/// Alpha values at or below this are treated as fully transparent.
pub const ALPHA_THRESHOLD: u8 = 128;

/// Channel bucket width used to merge near-identical colors before reduction.
const BUCKET: f64 = 4.0;

/// Label color picked for contrast against a palette fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TextColor {
    #[serde(rename = "#000000")]
    Black,
    #[serde(rename = "#FFFFFF")]
    White,
}

impl TextColor {
    pub fn hex(self) -> &'static str {
        match self {
            TextColor::Black => "#000000",
            TextColor::White => "#FFFFFF",
        }
    }
}

#[inline(always)]
pub fn is_opaque(alpha: u8) -> bool {
    alpha > ALPHA_THRESHOLD
}

/// Squared Euclidean distance in plain RGB.
#[inline(always)]
pub fn distance_sq(a: Srgb<u8>, b: Srgb<u8>) -> u32 {
    let dr = a.red as i32 - b.red as i32;
    let dg = a.green as i32 - b.green as i32;
    let db = a.blue as i32 - b.blue as i32;
    (dr * dr + dg * dg + db * db) as u32
}

/// Round a channel to the nearest multiple of 4, capped at 255. Halfway
/// values go to the even quotient, so 10 lands on 8 and 14 on 16.
#[inline(always)]
pub fn bucket_channel(value: u8) -> u8 {
    ((value as f64 / BUCKET).round_ties_even() * BUCKET).min(255.0) as u8
}

pub fn bucket(color: Srgb<u8>) -> Srgb<u8> {
    Srgb::new(
        bucket_channel(color.red),
        bucket_channel(color.green),
        bucket_channel(color.blue),
    )
}

/// `#RRGGBB`, uppercase.
pub fn to_hex(color: Srgb<u8>) -> String {
    format!("#{:02X}{:02X}{:02X}", color.red, color.green, color.blue)
}

/// Black text on light fills, white text on dark ones.
pub fn text_color_for(color: Srgb<u8>) -> TextColor {
    let luma = (299 * color.red as u32 + 587 * color.green as u32 + 114 * color.blue as u32) as f64
        / 1000.0;
    if luma >= 128.0 {
        TextColor::Black
    } else {
        TextColor::White
    }
}
