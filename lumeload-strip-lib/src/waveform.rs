//! Waveform brightness engine
//!
//! Maps elapsed time and the waveform parameters to an instantaneous
//! brightness. Time is absolute uptime and is never reset per cycle, so a
//! frequency change alters the phase rate without jumping the phase origin.

use std::f64::consts::TAU;

/// Waveform kind driving the strip brightness.
///
/// The discriminants are the wire codes used by the control protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Mode {
    /// Constant brightness.
    #[default]
    Static = 1,
    /// Smooth sine pulse between dark and peak.
    Sine = 2,
    /// On/off square wave with configurable duty cycle.
    Rect = 3,
    /// Linear ramp up, then instant drop.
    Saw = 4,
    /// Linear ramp up over one period, down over the next.
    Triangle = 5,
}

impl Mode {
    /// Parse a wire code (1-5). Anything else is rejected.
    #[must_use]
    pub const fn from_wire(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Static),
            2 => Some(Self::Sine),
            3 => Some(Self::Rect),
            4 => Some(Self::Saw),
            5 => Some(Self::Triangle),
            _ => None,
        }
    }

    /// Wire code for this mode.
    #[must_use]
    pub const fn to_wire(self) -> u8 {
        self as u8
    }
}

/// Compute the brightness at uptime `t` (seconds).
///
/// Per mode, with `x = frequency * t`:
///
/// ```text
///   Static    peak
///   Sine      peak * (0.5 + 0.5 * sin(2π x))
///   Rect      peak if (x mod 1) < duty / 100, else 0
///   Saw       peak * (x mod 1)
///   Triangle  peak * (1 - |(x mod 2) - 1|)
/// ```
///
/// The result is truncated and always lies in `[0, peak]`.
#[must_use]
pub fn brightness(t: f64, mode: Mode, frequency: f32, duty: f32, peak: u8) -> u8 {
    let x = f64::from(frequency) * t;
    let level = match mode {
        Mode::Static => return peak,
        Mode::Sine => 0.5 + 0.5 * (TAU * x).sin(),
        Mode::Rect => {
            if x.rem_euclid(1.0) < f64::from(duty) / 100.0 {
                1.0
            } else {
                0.0
            }
        }
        Mode::Saw => x.rem_euclid(1.0),
        Mode::Triangle => 1.0 - (x.rem_euclid(2.0) - 1.0).abs(),
    };
    scale(peak, level)
}

/// Scale `peak` by a level in `[0.0, 1.0]`, truncating.
#[inline]
fn scale(peak: u8, level: f64) -> u8 {
    // The product is in [0.0, peak], so the cast cannot truncate or go negative
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let value = (f64::from(peak) * level.clamp(0.0, 1.0)) as u8;
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_MODES: [Mode; 5] = [Mode::Static, Mode::Sine, Mode::Rect, Mode::Saw, Mode::Triangle];

    #[test]
    fn test_wire_codes() {
        for mode in ALL_MODES {
            assert_eq!(Mode::from_wire(mode.to_wire()), Some(mode));
        }
        assert_eq!(Mode::from_wire(0), None);
        assert_eq!(Mode::from_wire(6), None);
        assert_eq!(Mode::from_wire(9), None);
        assert_eq!(Mode::default(), Mode::Static);
    }

    #[test]
    fn test_static_is_constant() {
        for i in 0..100 {
            let t = f64::from(i) * 0.137;
            assert_eq!(brightness(t, Mode::Static, 1.3, 20.0, 200), 200);
        }
    }

    #[test]
    fn test_never_exceeds_peak() {
        for mode in ALL_MODES {
            for peak in [0u8, 1, 128, 255] {
                for i in 0..500 {
                    let t = f64::from(i) * 0.013;
                    let b = brightness(t, mode, 2.0, 37.0, peak);
                    assert!(b <= peak, "{mode:?} peak={peak} t={t} -> {b}");
                }
            }
        }
    }

    #[test]
    fn test_sine_shape() {
        // f = 1 Hz: t=0 mid level, t=0.25 peak, t=0.75 dark
        assert_eq!(brightness(0.0, Mode::Sine, 1.0, 50.0, 255), 127);
        assert_eq!(brightness(0.25, Mode::Sine, 1.0, 50.0, 255), 255);
        assert!(brightness(0.75, Mode::Sine, 1.0, 50.0, 255) <= 1);
    }

    #[test]
    fn test_saw_shape() {
        assert_eq!(brightness(0.0, Mode::Saw, 0.5, 50.0, 200), 0);
        // f = 0.5 Hz, t = 1 s: halfway up the ramp
        assert_eq!(brightness(1.0, Mode::Saw, 0.5, 50.0, 200), 100);
        // Drops back to zero at the period boundary
        assert_eq!(brightness(2.0, Mode::Saw, 0.5, 50.0, 200), 0);
    }

    #[test]
    fn test_triangle_shape() {
        // Rises over 1/f, falls over the next 1/f
        assert_eq!(brightness(0.0, Mode::Triangle, 1.0, 50.0, 200), 0);
        assert_eq!(brightness(0.5, Mode::Triangle, 1.0, 50.0, 200), 100);
        assert_eq!(brightness(1.0, Mode::Triangle, 1.0, 50.0, 200), 200);
        assert_eq!(brightness(1.5, Mode::Triangle, 1.0, 50.0, 200), 100);
        assert_eq!(brightness(2.0, Mode::Triangle, 1.0, 50.0, 200), 0);
    }

    #[test]
    fn test_periodic_with_one_over_frequency() {
        for mode in [Mode::Sine, Mode::Rect, Mode::Saw] {
            for frequency in [0.1f32, 0.5, 1.0, 2.0] {
                let period = 1.0 / f64::from(frequency);
                for i in 0..40 {
                    // Offsets chosen to stay clear of exact phase edges
                    let t = 0.0123 + f64::from(i) * 0.173;
                    let a = brightness(t, mode, frequency, 40.0, 255);
                    let b = brightness(t + period, mode, frequency, 40.0, 255);
                    let c = brightness(t + 7.0 * period, mode, frequency, 40.0, 255);
                    assert!(a.abs_diff(b) <= 1, "{mode:?} f={frequency} t={t}: {a} vs {b}");
                    assert!(a.abs_diff(c) <= 1, "{mode:?} f={frequency} t={t}: {a} vs {c}");
                }
            }
        }
    }

    #[test]
    fn test_triangle_repeats_every_two_ramps() {
        for frequency in [0.1f32, 0.5, 1.0, 2.0] {
            let period = 2.0 / f64::from(frequency);
            for i in 0..40 {
                let t = 0.0123 + f64::from(i) * 0.173;
                let a = brightness(t, Mode::Triangle, frequency, 50.0, 255);
                let b = brightness(t + period, Mode::Triangle, frequency, 50.0, 255);
                assert!(a.abs_diff(b) <= 1, "f={frequency} t={t}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_rect_duty_fraction() {
        const SAMPLES: u32 = 1000;
        for duty in [0.0f32, 10.0, 25.0, 50.0, 73.0, 100.0] {
            let frequency = 0.5f32;
            let period = 1.0 / f64::from(frequency);
            let lit = (0..SAMPLES)
                .map(|i| f64::from(i) * period / f64::from(SAMPLES))
                .filter(|&t| brightness(t, Mode::Rect, frequency, duty, 255) > 0)
                .count();
            #[allow(clippy::cast_precision_loss)]
            let fraction = lit as f32 / SAMPLES as f32;
            assert!(
                (fraction - duty / 100.0).abs() <= 0.01,
                "duty {duty}: lit fraction {fraction}"
            );
        }
    }

    #[test]
    fn test_rect_is_binary() {
        for i in 0..200 {
            let t = f64::from(i) * 0.031;
            let b = brightness(t, Mode::Rect, 1.7, 33.0, 180);
            assert!(b == 0 || b == 180, "t={t} -> {b}");
        }
    }
}
