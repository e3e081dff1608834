//! Strip render task
//!
//! Runs the frame renderer on core 1, away from the WiFi stack on core 0,
//! and feeds the task watchdog once per loop.

use anyhow::Result;
use esp_idf_hal::cpu::Core;
use log::{error, info, warn};
use lumeload_strip_lib::{FrameRenderer, PixelSink, SharedStripState};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::leds::StripDriver;
use crate::thread_util::spawn_task;
use crate::watchdog::WatchdogHandle;

pub fn start_render_task(
    strip: Arc<SharedStripState>,
    mut driver: StripDriver,
    interval: Duration,
    started: Instant,
) -> Result<JoinHandle<()>> {
    let handle = spawn_task(c"render", Some(Core::Core1), move || {
        if let Err(e) = driver.boot_animation() {
            warn!("Boot animation failed: {e}");
        }
        if let Err(e) = driver.clear() {
            warn!("Failed to clear strip: {e}");
        }

        let watchdog = match WatchdogHandle::register(c"render") {
            Ok(watchdog) => Some(watchdog),
            Err(e) => {
                error!("Render task running without watchdog: {e}");
                None
            }
        };

        info!(
            "Render task started ({} pixels, {} ms/frame)",
            strip.strip_len(),
            interval.as_millis()
        );
        let mut renderer = FrameRenderer::new(strip, driver, interval, started);
        renderer.run(|| {
            if let Some(watchdog) = &watchdog {
                watchdog.feed();
            }
        })
    })?;

    Ok(handle)
}
