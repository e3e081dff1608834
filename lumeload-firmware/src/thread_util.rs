//! Named FreeRTOS task spawning
//!
//! ESP-IDF creates the FreeRTOS task when the pthread is created, so
//! `std::thread::Builder::name()` comes too late to name it. The name (and
//! optional core pinning) is set through `ThreadSpawnConfiguration` right
//! before spawning instead, then the previous configuration is restored.

use esp_idf_hal::cpu::Core;
use esp_idf_hal::task::thread::ThreadSpawnConfiguration;
use esp_idf_svc::sys::EspError;
use std::ffi::CStr;
use std::thread::JoinHandle;

/// Spawn a thread as a named FreeRTOS task, optionally pinned to `core`.
///
/// Task names are limited to 16 bytes including the null terminator.
pub fn spawn_task<F, T>(name: &'static CStr, core: Option<Core>, f: F) -> Result<JoinHandle<T>, EspError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let prev_conf = ThreadSpawnConfiguration::get();

    ThreadSpawnConfiguration {
        name: Some(name.to_bytes_with_nul()),
        pin_to_core: core,
        ..Default::default()
    }
    .set()?;

    let handle = std::thread::spawn(f);

    prev_conf.unwrap_or_default().set()?;

    Ok(handle)
}
