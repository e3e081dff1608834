use anyhow::Result;
use embedded_svc::http::Method;
use embedded_svc::io::Write;
use embedded_svc::ws::FrameType;
use esp_idf_svc::http::server::{Configuration, EspHttpServer};
use esp_idf_svc::sys::EspError;
use log::{debug, info, warn};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use crate::config::Config;
use crate::thread_util::spawn_task;
use crate::State;

const HTML_INDEX_START: &str = include_str!(concat!(env!("OUT_DIR"), "/index_start.html"));
const HTML_INDEX_END: &str = include_str!(concat!(env!("OUT_DIR"), "/index_end.html"));

/// Largest control message accepted on the WebSocket
const MAX_WS_MESSAGE_LEN: usize = 512;

/// Restart the device after `delay`, from a separate task so the current
/// response can still go out.
fn schedule_restart(delay: Duration) {
    let spawned = spawn_task(c"restart", None, move || {
        std::thread::sleep(delay);
        info!("Restarting device now...");
        unsafe {
            esp_idf_svc::sys::esp_restart();
        }
    });
    if let Err(e) = spawned {
        warn!("Failed to schedule restart: {e}");
    }
}

pub fn start_server(state: &Arc<State>) -> Result<()> {
    info!("Web server starting...");

    let server_config = Configuration {
        max_open_sockets: 6,
        lru_purge_enable: true,
        ..Default::default()
    };
    let mut server = EspHttpServer::new(&server_config)?;

    // Control page with the strip length injected as the LED slider maximum
    let num_pixels = state.strip.strip_len();
    server.fn_handler("/", Method::Get, move |req| -> Result<(), esp_idf_svc::io::EspIOError> {
        let mut response = req.into_ok_response()?;
        response.write_all(HTML_INDEX_START.as_bytes())?;
        response.write_all(num_pixels.to_string().as_bytes())?;
        response.write_all(HTML_INDEX_END.as_bytes())?;
        Ok(())
    })?;

    let state_clone = state.clone();
    server.fn_handler("/api/config", Method::Get, move |req| -> Result<(), esp_idf_svc::io::EspIOError> {
        info!("HTTP: GET /api/config");
        let json = {
            let cfg = state_clone.config.lock().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_string(&*cfg).unwrap_or_else(|_| "{}".to_string())
        };

        let mut response = req.into_ok_response()?;
        response.write_all(json.as_bytes())?;
        Ok(())
    })?;

    // Config changes take effect after a restart
    let state_clone = state.clone();
    server.fn_handler("/api/config", Method::Post, move |mut req| -> Result<(), esp_idf_svc::io::EspIOError> {
        info!("HTTP: POST /api/config");
        let mut buf = vec![0u8; 2048];
        let bytes_read = req.read(&mut buf)?;

        let Ok(mut new_config) = serde_json::from_slice::<Config>(&buf[..bytes_read]) else {
            warn!("Invalid config JSON received");
            req.into_status_response(400)?;
            return Ok(());
        };
        new_config.validate();
        debug!(
            "Config update: num_pixels={}, led_gpio={}, log_level={:?}",
            new_config.num_pixels, new_config.led_gpio, new_config.log_level
        );

        {
            let mut cfg = state_clone.config.lock().unwrap_or_else(PoisonError::into_inner);
            *cfg = new_config;
            if let Err(e) = cfg.save() {
                warn!("Failed to save config: {e}");
                drop(cfg);
                req.into_status_response(500)?;
                return Ok(());
            }
        }

        let mut response = req.into_ok_response()?;
        response.write_all(b"{\"restart\":true}")?;
        info!("Config saved, restarting in 2 seconds...");
        schedule_restart(Duration::from_secs(2));
        Ok(())
    })?;

    // Snapshot for clients that don't speak WebSocket
    let state_clone = state.clone();
    server.fn_handler("/api/state", Method::Get, move |req| -> Result<(), esp_idf_svc::io::EspIOError> {
        debug!("HTTP: GET /api/state");
        let json = state_clone.sync.snapshot_message();
        let mut response = req.into_ok_response()?;
        response.write_all(json.as_bytes())?;
        Ok(())
    })?;

    let state_clone = state.clone();
    server.ws_handler("/ws", move |ws| -> Result<(), EspError> {
        if ws.is_new() {
            info!("WS: session {} connected", ws.session());
            state_clone.sync.observer().join(ws.create_detached_sender()?);
            return Ok(());
        }
        if ws.is_closed() {
            info!("WS: session {} closed", ws.session());
            return Ok(());
        }

        let (frame_type, len) = ws.recv(&mut [])?;
        if !matches!(frame_type, FrameType::Text(_) | FrameType::Binary(_)) {
            return Ok(());
        }
        if len > MAX_WS_MESSAGE_LEN {
            warn!("WS: dropping {len} byte message from session {}", ws.session());
            ws.send(FrameType::Close, &[])?;
            return Ok(());
        }

        let mut buf = [0u8; MAX_WS_MESSAGE_LEN];
        ws.recv(&mut buf)?;
        // Text frames arrive null-terminated
        let payload = &buf[..len];
        let payload = payload.strip_suffix(&[0]).unwrap_or(payload);
        state_clone.sync.on_message(payload);
        Ok(())
    })?;

    info!("Web server started on http://0.0.0.0:80");

    // Keep server alive
    std::mem::forget(server);

    Ok(())
}
