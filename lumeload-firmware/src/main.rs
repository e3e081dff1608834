use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::modem::Modem;
use esp_idf_hal::prelude::*;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::mdns::EspMdns;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi,
};
use log::{debug, info, warn};
use lumeload_strip_lib::{SharedStripState, StateSync};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

mod config;
mod leds;
mod render_task;
mod thread_util;
mod watchdog;
mod web_server;
mod ws_hub;

use config::Config;
use leds::StripDriver;
use thread_util::spawn_task;
use watchdog::WatchdogHandle;
use ws_hub::WsHub;

/// Seconds between reconnect attempts while the station link is down
const RECONNECT_INTERVAL_S: u32 = 10;

type SharedWifi = Arc<Mutex<BlockingWifi<EspWifi<'static>>>>;

/// Shared application state for the web server
pub struct State {
    pub config: Mutex<Config>,
    pub strip: Arc<SharedStripState>,
    pub sync: Arc<StateSync<WsHub>>,
}

/// Initialize mDNS for local discovery (`<hostname>.local`)
fn setup_mdns(hostname: &str) -> Option<EspMdns> {
    match EspMdns::take() {
        Ok(mut m) => {
            let _ = m.set_hostname(hostname);
            let _ = m.set_instance_name("LumeLoad LED strip");
            let _ = m.add_service(None, "_http", "_tcp", 80, &[]);
            info!("mDNS started: {hostname}.local");
            Some(m)
        }
        Err(e) => {
            warn!("Failed to start mDNS: {e:?}");
            None
        }
    }
}

/// Bring up WiFi as a station on the configured network.
///
/// Without a configured SSID the device opens an unprotected access point
/// named after its hostname instead, so `/api/config` stays reachable.
fn start_wifi(
    config: &Config,
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
) -> Result<SharedWifi> {
    let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sys_loop.clone(), Some(nvs))?, sys_loop)?;

    if config.wifi.ssid.is_empty() {
        warn!("No WiFi network configured, starting access point '{}'", config.hostname);
        wifi.set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
            ssid: config.hostname.as_str().try_into().unwrap_or_default(),
            auth_method: AuthMethod::None,
            ..Default::default()
        }))?;
        wifi.start()?;
        wifi.wait_netif_up()?;
        let ip_info = wifi.wifi().ap_netif().get_ip_info()?;
        info!("Access point up, configure at http://{}", ip_info.ip);
        return Ok(Arc::new(Mutex::new(wifi)));
    }

    let password = config.wifi.password.clone().unwrap_or_default();
    let auth_method = if password.is_empty() { AuthMethod::None } else { AuthMethod::WPA2Personal };
    info!("Starting WiFi station for '{}'", config.wifi.ssid);
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: config.wifi.ssid.as_str().try_into().unwrap_or_default(),
        password: password.as_str().try_into().unwrap_or_default(),
        auth_method,
        ..Default::default()
    }))?;
    wifi.start()?;

    // A failed first connect is retried by the connection manager
    match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
        Ok(()) => {
            let ip_info = wifi.wifi().sta_netif().get_ip_info()?;
            info!("WiFi connected to '{}' with IP: {}", config.wifi.ssid, ip_info.ip);
        }
        Err(e) => warn!("Initial WiFi connect failed: {e:?}"),
    }

    let wifi = Arc::new(Mutex::new(wifi));
    let wifi_clone = wifi.clone();
    let ssid = config.wifi.ssid.clone();
    spawn_task(c"wifi_mgr", None, move || wifi_connection_manager(&wifi_clone, &ssid))?;

    Ok(wifi)
}

/// Reconnect the station link whenever it drops
fn wifi_connection_manager(wifi: &SharedWifi, ssid: &str) {
    let watchdog = WatchdogHandle::register(c"wifi_mgr")
        .map_err(|e| warn!("WiFi manager running without watchdog: {e}"))
        .ok();
    let feed = || {
        if let Some(watchdog) = &watchdog {
            watchdog.feed();
        }
    };

    loop {
        for _ in 0..RECONNECT_INTERVAL_S {
            FreeRtos::delay_ms(1000);
            feed();
        }

        let mut wifi = wifi.lock().unwrap_or_else(PoisonError::into_inner);
        if wifi.is_connected().unwrap_or(false) {
            continue;
        }

        warn!("WiFi disconnected from '{ssid}', reconnecting");
        let _ = wifi.disconnect();
        feed();
        match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
            Ok(()) => match wifi.wifi().sta_netif().get_ip_info() {
                Ok(ip_info) => info!("WiFi reconnected to '{ssid}' with IP: {}", ip_info.ip),
                Err(e) => debug!("Reconnected but no IP info: {e:?}"),
            },
            Err(e) => warn!("WiFi reconnect failed: {e:?}"),
        }
        feed();
    }
}

fn main() -> Result<()> {
    // It is necessary to call this function once. Otherwise some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_svc::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("Starting LumeLoad firmware {}...", env!("GIT_VERSION"));
    let started = Instant::now();

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    config::init_nvs(nvs.clone())?;
    let config = Config::load_or_default();

    let level = config.log_level.as_level_filter();
    // Set for all targets (use "*" for global)
    if let Err(e) = esp_idf_svc::log::set_target_level("*", level) {
        warn!("Failed to set log level: {e}");
    } else {
        info!("Log level set to {:?}", config.log_level);
    }

    let strip = Arc::new(SharedStripState::new(config.num_pixels));

    info!("Initializing {} pixel strip on GPIO {}...", config.num_pixels, config.led_gpio);
    // SAFETY: We trust the user-configured GPIO pin number is valid for this board
    let led_pin = unsafe { AnyIOPin::new(i32::from(config.led_gpio)) };
    let driver = StripDriver::new(led_pin, peripherals.rmt.channel0, config.num_pixels)?;
    render_task::start_render_task(strip.clone(), driver, config.frame_interval(), started)?;

    let _wifi = start_wifi(&config, peripherals.modem, sys_loop, nvs)?;
    let _mdns = setup_mdns(&config.hostname);

    let sync = ws_hub::start_ws_hub(strip.clone())?;
    let state = Arc::new(State {
        config: Mutex::new(config),
        strip,
        sync,
    });
    web_server::start_server(&state)?;

    info!("All systems running!");

    // Keep WiFi and mDNS alive
    loop {
        FreeRtos::delay_ms(1000);
    }
}
