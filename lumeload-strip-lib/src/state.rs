//! Shared strip parameters
//!
//! [`SharedStripState`] is the single source of truth read by the renderer
//! and written by the control protocol. The whole field set sits behind one
//! mutex that is only held to copy a snapshot in or out, so a render tick
//! never sees half of an update.

use std::sync::{Mutex, PoisonError};

use crate::waveform::Mode;

/// Lowest accepted waveform frequency (Hz).
pub const MIN_FREQUENCY: f32 = 0.1;
/// Highest accepted waveform frequency (Hz).
pub const MAX_FREQUENCY: f32 = 2.0;
/// Lowest duty cycle (percent).
pub const MIN_DUTY: f32 = 0.0;
/// Highest duty cycle (percent).
pub const MAX_DUTY: f32 = 100.0;

/// Snapshot of every strip parameter, in internal units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StripState {
    /// Strip lit (`true`) or forced dark.
    pub enabled: bool,
    pub mode: Mode,
    /// Number of leading pixels allowed to light up, `0..=strip_len`.
    pub active_count: usize,
    /// Peak brightness (0-255).
    pub brightness: u8,
    /// Hue in 8-bit units; 255 wraps to red.
    pub hue: u8,
    pub saturation: u8,
    /// Waveform frequency in Hz, `0.1..=2.0`.
    pub frequency: f32,
    /// Rect duty cycle in percent, `0..=100`. Kept at full precision.
    pub duty: f32,
}

impl Default for StripState {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: Mode::Static,
            active_count: 0,
            brightness: 128,
            hue: 0,
            saturation: 255,
            frequency: 0.5,
            duty: 50.0,
        }
    }
}

/// Sparse update: only `Some` fields are written.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StripUpdate {
    pub enabled: Option<bool>,
    pub mode: Option<Mode>,
    pub active_count: Option<usize>,
    pub brightness: Option<u8>,
    pub hue: Option<u8>,
    pub saturation: Option<u8>,
    pub frequency: Option<f32>,
    pub duty: Option<f32>,
}

impl StripUpdate {
    /// `true` when the update carries no field at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The process-wide strip state, shared by handle between the renderer and
/// the control protocol.
#[derive(Debug)]
pub struct SharedStripState {
    strip_len: usize,
    inner: Mutex<StripState>,
}

impl SharedStripState {
    /// Create the state for a strip of `strip_len` pixels with default values.
    #[must_use]
    pub fn new(strip_len: usize) -> Self {
        Self {
            strip_len,
            inner: Mutex::new(StripState::default()),
        }
    }

    /// Number of pixels on the strip (N).
    #[must_use]
    pub const fn strip_len(&self) -> usize {
        self.strip_len
    }

    /// Copy out the current snapshot.
    #[must_use]
    pub fn read(&self) -> StripState {
        // The state is plain data and always in domain, so a panic elsewhere
        // while holding the lock cannot leave it unusable
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clamp and write every field present in `update`, returning the
    /// resulting snapshot.
    ///
    /// Non-finite `frequency`/`duty` values cannot be clamped and are skipped.
    pub fn apply(&self, update: &StripUpdate) -> StripState {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(enabled) = update.enabled {
            state.enabled = enabled;
        }
        if let Some(mode) = update.mode {
            state.mode = mode;
        }
        if let Some(count) = update.active_count {
            state.active_count = count.min(self.strip_len);
        }
        if let Some(brightness) = update.brightness {
            state.brightness = brightness;
        }
        if let Some(hue) = update.hue {
            state.hue = hue;
        }
        if let Some(saturation) = update.saturation {
            state.saturation = saturation;
        }
        if let Some(frequency) = update.frequency.and_then(|f| clamp_finite(f, MIN_FREQUENCY, MAX_FREQUENCY)) {
            state.frequency = frequency;
        }
        if let Some(duty) = update.duty.and_then(|d| clamp_finite(d, MIN_DUTY, MAX_DUTY)) {
            state.duty = duty;
        }

        *state
    }
}

fn clamp_finite(value: f32, min: f32, max: f32) -> Option<f32> {
    value.is_finite().then(|| value.clamp(min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_defaults() {
        let shared = SharedStripState::new(60);
        let state = shared.read();
        assert!(!state.enabled);
        assert_eq!(state.mode, Mode::Static);
        assert_eq!(state.active_count, 0);
        assert_eq!(state.brightness, 128);
        assert_eq!(state.hue, 0);
        assert_eq!(state.saturation, 255);
        assert!((state.frequency - 0.5).abs() < f32::EPSILON);
        assert!((state.duty - 50.0).abs() < f32::EPSILON);
        assert_eq!(shared.strip_len(), 60);
    }

    #[test]
    fn test_partial_update_leaves_other_fields() {
        let shared = SharedStripState::new(60);
        let before = shared.read();
        let after = shared.apply(&StripUpdate {
            hue: Some(42),
            ..StripUpdate::default()
        });
        assert_eq!(after.hue, 42);
        assert_eq!(StripState { hue: before.hue, ..after }, before);
    }

    #[test]
    fn test_empty_update_is_noop() {
        let shared = SharedStripState::new(10);
        let update = StripUpdate::default();
        assert!(update.is_empty());
        assert_eq!(shared.apply(&update), StripState::default());
    }

    #[test]
    fn test_active_count_clamped_to_strip_len() {
        let shared = SharedStripState::new(60);
        let state = shared.apply(&StripUpdate {
            active_count: Some(500),
            ..StripUpdate::default()
        });
        assert_eq!(state.active_count, 60);
    }

    #[test]
    fn test_frequency_and_duty_clamped() {
        let shared = SharedStripState::new(60);
        let state = shared.apply(&StripUpdate {
            frequency: Some(5.0),
            duty: Some(-3.0),
            ..StripUpdate::default()
        });
        assert!((state.frequency - MAX_FREQUENCY).abs() < f32::EPSILON);
        assert!(state.duty.abs() < f32::EPSILON);

        let state = shared.apply(&StripUpdate {
            frequency: Some(0.0),
            duty: Some(150.0),
            ..StripUpdate::default()
        });
        assert!((state.frequency - MIN_FREQUENCY).abs() < f32::EPSILON);
        assert!((state.duty - MAX_DUTY).abs() < f32::EPSILON);
    }

    #[test]
    fn test_duty_keeps_full_precision() {
        let shared = SharedStripState::new(60);
        let state = shared.apply(&StripUpdate {
            duty: Some(33.3),
            ..StripUpdate::default()
        });
        assert!((state.duty - 33.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_non_finite_values_skipped() {
        let shared = SharedStripState::new(60);
        let state = shared.apply(&StripUpdate {
            frequency: Some(f32::NAN),
            duty: Some(f32::INFINITY),
            brightness: Some(7),
            ..StripUpdate::default()
        });
        assert!((state.frequency - 0.5).abs() < f32::EPSILON);
        assert!((state.duty - 50.0).abs() < f32::EPSILON);
        assert_eq!(state.brightness, 7);
    }

    /// A writer keeps `brightness`, `hue` and `saturation` equal in every
    /// update while readers check they never see them disagree.
    #[test]
    fn test_update_storm_never_tears() {
        const UPDATES: u8 = 250;
        let shared = SharedStripState::new(60);
        shared.apply(&StripUpdate {
            brightness: Some(0),
            hue: Some(0),
            saturation: Some(0),
            ..StripUpdate::default()
        });
        let done = AtomicBool::new(false);

        std::thread::scope(|s| {
            for _ in 0..3 {
                s.spawn(|| {
                    while !done.load(Ordering::Acquire) {
                        let state = shared.read();
                        assert_eq!(state.brightness, state.hue);
                        assert_eq!(state.hue, state.saturation);
                    }
                });
            }
            s.spawn(|| {
                for i in 1..=UPDATES {
                    shared.apply(&StripUpdate {
                        brightness: Some(i),
                        hue: Some(i),
                        saturation: Some(i),
                        ..StripUpdate::default()
                    });
                }
                done.store(true, Ordering::Release);
            });
        });

        let state = shared.read();
        assert_eq!(state.brightness, UPDATES);
        assert_eq!(state.hue, UPDATES);
    }

    #[test]
    fn test_last_applied_update_wins() {
        let shared = SharedStripState::new(60);
        for count in [5, 40, 12, 33] {
            shared.apply(&StripUpdate {
                active_count: Some(count),
                ..StripUpdate::default()
            });
        }
        assert_eq!(shared.read().active_count, 33);
    }
}
