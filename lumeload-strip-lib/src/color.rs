//! HSV to RGB conversion in the strip's 8-bit units.

use crate::RGB8;

/// Width of one hue sextant in 8-bit hue units (255 / 6).
const SEXTANT_WIDTH: f32 = 42.5;

/// Convert an 8-bit hue/saturation/value triple to an RGB color.
///
/// The hue range `0..=255` is split into six sextants of 42.5 units each.
/// Within a sextant the fractional position `f` drives the two ramping
/// channels:
///
/// ```text
///   p = val * (1 - s)
///   q = val * (1 - s * f)        (falling edge)
///   t = val * (1 - s * (1 - f))  (rising edge)
/// ```
///
/// Hue 255 is the first step of a seventh sextant and wraps back to red, so
/// the wheel is continuous across the `255 -> 0` seam. Channels are truncated
/// and never exceed `val`.
#[must_use]
pub fn hsv_to_rgb(hue: u8, sat: u8, val: u8) -> RGB8 {
    let h = f32::from(hue) / SEXTANT_WIDTH;
    // h is in [0.0, 6.0], so the sextant index fits in a u8
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let sextant = h as u8;
    let f = h - f32::from(sextant);
    let s = f32::from(sat) / 255.0;
    let v = f32::from(val);

    let p = to_channel(v * (1.0 - s));
    let q = to_channel(v * (1.0 - s * f));
    let t = to_channel(v * (1.0 - s * (1.0 - f)));

    match sextant % 6 {
        0 => RGB8::new(val, t, p),
        1 => RGB8::new(q, val, p),
        2 => RGB8::new(p, val, t),
        3 => RGB8::new(p, q, val),
        4 => RGB8::new(t, p, val),
        _ => RGB8::new(val, p, q),
    }
}

#[inline]
fn to_channel(x: f32) -> u8 {
    // x is in [0.0, 255.0]; float-to-int casts saturate anyway
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let c = x as u8;
    c
}
