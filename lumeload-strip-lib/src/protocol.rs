//! JSON control protocol for remote clients
//!
//! Clients send a flat JSON object with any subset of the wire keys. Values
//! arrive in user-facing units (percent, degrees) and are converted to the
//! strip's 8-bit units and clamped before being applied. After every applied
//! update the full state is serialized once and handed to the
//! [`StateObserver`], which pushes it to every connected client.
//!
//! | key          | wire unit    | internal            |
//! |--------------|--------------|---------------------|
//! | `mode`       | 1-5          | [`Mode`]            |
//! | `ledIndex`   | 0..N         | active pixel count  |
//! | `brightness` | 0-100 %      | 0-255               |
//! | `freq`       | 0.1-2.0 Hz   | same                |
//! | `duty`       | 0-100 %      | same                |
//! | `hue`        | 0-360 °      | 0-255               |
//! | `sat`        | 0-100 %      | 0-255               |
//! | `ledEnabled` | bool or int  | bool                |

use std::sync::{Arc, Mutex, PoisonError};

use derive_more::{Display, Error, From};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::{SharedStripState, StripState, StripUpdate, MAX_DUTY, MAX_FREQUENCY, MIN_DUTY, MIN_FREQUENCY};
use crate::waveform::Mode;

/// Why an inbound control message was dropped.
#[derive(Debug, Display, Error, From)]
pub enum ProtocolError {
    #[display("malformed JSON: {_0}")]
    #[from]
    Json(serde_json::Error),
    #[display("control message is not a JSON object")]
    NotAnObject,
}

/// Receives the serialized full state after every applied update.
///
/// Implemented by the transport (WebSocket client registry, console, ...).
/// Called synchronously from [`StateSync::on_message`].
pub trait StateObserver {
    fn broadcast(&self, message: &str);
}

impl<T: StateObserver + ?Sized> StateObserver for Arc<T> {
    fn broadcast(&self, message: &str) {
        (**self).broadcast(message);
    }
}

/// Full state in wire units. Always serialized with all eight keys.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireState {
    pub mode: u8,
    pub led_index: usize,
    /// Percent (0-100)
    pub brightness: u8,
    pub freq: f32,
    /// Percent, rounded to a whole number on the wire
    pub duty: u8,
    /// Degrees (0-360)
    pub hue: u16,
    /// Percent (0-100)
    pub sat: u8,
    pub led_enabled: bool,
}

impl From<&StripState> for WireState {
    fn from(state: &StripState) -> Self {
        Self {
            mode: state.mode.to_wire(),
            led_index: state.active_count,
            brightness: rescale_to_u8(state.brightness, 100.0),
            freq: state.frequency,
            duty: round_to_u8(f64::from(state.duty)),
            hue: rescale_to_u16(state.hue, 360.0),
            sat: rescale_to_u8(state.saturation, 100.0),
            led_enabled: state.enabled,
        }
    }
}

impl WireState {
    /// Serialize to the JSON message sent to clients.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Parse a raw control message into a sparse update in internal units.
///
/// Unknown keys, recognized keys holding a value of the wrong JSON type and
/// out-of-range mode codes are ignored. Every accepted value is clamped.
///
/// # Errors
/// Returns [`ProtocolError`] if the payload is not JSON or not a JSON object.
pub fn parse_update(raw: &[u8], strip_len: usize) -> Result<StripUpdate, ProtocolError> {
    let Value::Object(fields) = serde_json::from_slice::<Value>(raw)? else {
        return Err(ProtocolError::NotAnObject);
    };

    let mut update = StripUpdate::default();
    for (key, value) in &fields {
        match key.as_str() {
            "mode" => update.mode = value.as_f64().and_then(mode_from_wire),
            "ledIndex" => update.active_count = value.as_f64().map(|w| led_index_from_wire(w, strip_len)),
            "brightness" => update.brightness = value.as_f64().map(|w| percent_to_u8(w, 100.0)),
            "freq" => update.frequency = value.as_f64().map(|w| clamp_to_f32(w, MIN_FREQUENCY, MAX_FREQUENCY)),
            "duty" => update.duty = value.as_f64().map(|w| clamp_to_f32(w, MIN_DUTY, MAX_DUTY)),
            "hue" => update.hue = value.as_f64().map(|w| percent_to_u8(w, 360.0)),
            "sat" => update.saturation = value.as_f64().map(|w| percent_to_u8(w, 100.0)),
            "ledEnabled" => update.enabled = enabled_from_wire(value),
            _ => debug!("Ignoring unknown control key {key:?}"),
        }
    }

    Ok(update)
}

/// `true`/`false`, or an integer where any non-zero value means on.
fn enabled_from_wire(value: &Value) -> Option<bool> {
    value
        .as_bool()
        .or_else(|| value.as_i64().map(|n| n != 0))
        .or_else(|| value.as_u64().map(|n| n != 0))
}

/// Accepts only whole numbers 1-5.
fn mode_from_wire(code: f64) -> Option<Mode> {
    if code.fract() != 0.0 || !(1.0..=5.0).contains(&code) {
        debug!("Rejecting mode code {code}");
        return None;
    }
    // Range-checked above
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Mode::from_wire(code as u8)
}

fn led_index_from_wire(wire: f64, strip_len: usize) -> usize {
    // Float-to-int casts saturate, negative values land on 0
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = wire.round() as usize;
    index.min(strip_len)
}

/// `round(wire * 255 / full_scale)`, clamped to `0..=255`.
fn percent_to_u8(wire: f64, full_scale: f64) -> u8 {
    round_to_u8(wire * 255.0 / full_scale)
}

fn round_to_u8(x: f64) -> u8 {
    // Clamped to the u8 range first
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let v = x.round().clamp(0.0, 255.0) as u8;
    v
}

/// Clamp in `f64` before narrowing so huge inputs don't become infinity.
fn clamp_to_f32(wire: f64, min: f32, max: f32) -> f32 {
    #[allow(clippy::cast_possible_truncation)]
    let v = wire.clamp(f64::from(min), f64::from(max)) as f32;
    v
}

/// `round(internal * full_scale / 255)` for 0-100 scales.
fn rescale_to_u8(internal: u8, full_scale: f64) -> u8 {
    round_to_u8(f64::from(internal) * full_scale / 255.0)
}

/// `round(internal * full_scale / 255)` for the 0-360 hue scale.
fn rescale_to_u16(internal: u8, full_scale: f64) -> u16 {
    // At most full_scale (360), fits in u16
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let v = (f64::from(internal) * full_scale / 255.0).round() as u16;
    v
}

/// Control protocol endpoint bound to the shared strip state.
///
/// The transport calls [`on_client_connect`](Self::on_client_connect) for
/// every new client and [`on_message`](Self::on_message) for every inbound
/// frame; broadcasts go out through the observer.
pub struct StateSync<O> {
    state: Arc<SharedStripState>,
    observer: O,
    /// Held from apply until the broadcast is handed off, so broadcasts
    /// leave in the same order the updates were applied.
    publish: Mutex<()>,
}

impl<O: StateObserver> StateSync<O> {
    pub fn new(state: Arc<SharedStripState>, observer: O) -> Self {
        Self {
            state,
            observer,
            publish: Mutex::new(()),
        }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Current full state as a wire message.
    #[must_use]
    pub fn snapshot_message(&self) -> String {
        WireState::from(&self.state.read()).to_json()
    }

    /// Message to deliver to a newly connected client before anything else.
    #[must_use]
    pub fn on_client_connect(&self) -> String {
        debug!("Control client connected, sending snapshot");
        self.snapshot_message()
    }

    /// Handle one inbound control message.
    ///
    /// Malformed messages and messages that carry no applicable field are
    /// dropped without touching the state or broadcasting. Otherwise the
    /// update is applied and the resulting snapshot is broadcast to every
    /// observer and returned.
    pub fn on_message(&self, raw: &[u8]) -> Option<StripState> {
        let update = match parse_update(raw, self.state.strip_len()) {
            Ok(update) => update,
            Err(e) => {
                debug!("Dropping control message: {e}");
                return None;
            }
        };
        if update.is_empty() {
            debug!("Control message carried no applicable field");
            return None;
        }

        let _publish = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.state.apply(&update);
        debug!("Applied control update: {update:?}");
        self.observer.broadcast(&WireState::from(&snapshot).to_json());
        Some(snapshot)
    }
}
