//! Per-tick frame rendering
//!
//! Every tick reads one snapshot of the shared state, computes the waveform
//! brightness for the current uptime and writes a full frame to the pixel
//! sink. Ticks are sampled, not queued: a tick that comes too soon after the
//! previous one is skipped, and a late tick renders once without catching up.

use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::warn;

use crate::color::hsv_to_rgb;
use crate::state::{SharedStripState, StripState};
use crate::waveform::brightness;
use crate::RGB8;

/// Default minimum spacing between two rendered frames (~50 fps).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(20);

/// Output device for rendered frames.
///
/// Pixels are staged with [`set_pixel`](Self::set_pixel) and pushed out
/// together by [`commit`](Self::commit).
pub trait PixelSink {
    type Error: Display;

    /// Number of pixels the sink drives.
    fn pixel_count(&self) -> usize;

    /// Stage one pixel. Indices outside `0..pixel_count()` are ignored.
    fn set_pixel(&mut self, index: usize, color: RGB8);

    /// Push the staged frame to the strip.
    fn commit(&mut self) -> Result<(), Self::Error>;

    /// Turn every pixel off and commit.
    fn clear(&mut self) -> Result<(), Self::Error> {
        for index in 0..self.pixel_count() {
            self.set_pixel(index, RGB8::default());
        }
        self.commit()
    }
}

/// Compute the frame for `state` at uptime `t` (seconds).
///
/// A disabled strip is all black. Otherwise the first `active_count` pixels
/// show the state's hue and saturation at the waveform brightness and the
/// rest stay dark.
#[must_use]
pub fn render_frame(state: &StripState, strip_len: usize, t: f64) -> Vec<RGB8> {
    if !state.enabled {
        return vec![RGB8::default(); strip_len];
    }

    // Same t for every pixel, so the waveform is evaluated once per frame
    let lit = brightness(t, state.mode, state.frequency, state.duty, state.brightness);
    (0..strip_len)
        .map(|index| {
            let val = if index < state.active_count { lit } else { 0 };
            hsv_to_rgb(state.hue, state.saturation, val)
        })
        .collect()
}

/// Outcome of one [`FrameRenderer::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Too soon after the previous frame, nothing written.
    Skipped,
    /// Frame written and committed.
    Rendered,
    /// Frame written but the commit failed.
    Dropped,
}

/// Drives a [`PixelSink`] from the shared strip state.
pub struct FrameRenderer<S> {
    state: Arc<SharedStripState>,
    sink: S,
    interval: Duration,
    started: Instant,
    last_frame: Option<Instant>,
    dropped_frames: u32,
}

impl<S: PixelSink> FrameRenderer<S> {
    /// `started` is the uptime origin for the waveform phase.
    pub fn new(state: Arc<SharedStripState>, sink: S, interval: Duration, started: Instant) -> Self {
        Self {
            state,
            sink,
            interval,
            started,
            last_frame: None,
            dropped_frames: 0,
        }
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Frames whose commit failed since creation.
    pub const fn dropped_frames(&self) -> u32 {
        self.dropped_frames
    }

    /// Render one frame for time `now`, unless the previous one was less
    /// than one interval ago.
    pub fn tick(&mut self, now: Instant) -> Tick {
        if let Some(last) = self.last_frame {
            if now.saturating_duration_since(last) < self.interval {
                return Tick::Skipped;
            }
        }
        self.last_frame = Some(now);

        let snapshot = self.state.read();
        let t = now.saturating_duration_since(self.started).as_secs_f64();
        let frame = render_frame(&snapshot, self.state.strip_len(), t);
        for (index, color) in frame.into_iter().enumerate() {
            self.sink.set_pixel(index, color);
        }

        match self.sink.commit() {
            Ok(()) => Tick::Rendered,
            Err(e) => {
                self.dropped_frames = self.dropped_frames.wrapping_add(1);
                warn!("Frame dropped, strip write failed: {e}");
                Tick::Dropped
            }
        }
    }

    /// How long to wait from `now` until the next tick would render.
    pub fn time_until_next_frame(&self, now: Instant) -> Duration {
        self.last_frame
            .map_or(Duration::ZERO, |last| (last + self.interval).saturating_duration_since(now))
    }

    /// Render forever, sleeping between frames. `heartbeat` runs once per
    /// loop iteration, before the tick.
    pub fn run(&mut self, mut heartbeat: impl FnMut()) -> ! {
        loop {
            heartbeat();
            self.tick(Instant::now());
            std::thread::sleep(self.time_until_next_frame(Instant::now()));
        }
    }
}
