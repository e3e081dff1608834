//! Waveform strip rendering logic for LumeLoad
//!
//! This library holds everything that decides what the LED strip shows and
//! how remote clients change it: HSV color conversion, the waveform
//! brightness engine, the shared strip parameters, the per-tick frame
//! renderer, the JSON control protocol and the bounded client list
//! the broadcaster serves. It is hardware-agnostic; the
//! firmware plugs in a WS2812 pixel sink and a WebSocket observer, the host
//! preview tool plugs in a terminal sink.

pub use rgb::RGB8;

pub mod clients;
pub mod color;
pub mod protocol;
pub mod renderer;
pub mod state;
pub mod waveform;

pub use clients::{ClientList, ControlClient};
pub use color::hsv_to_rgb;
pub use protocol::{ProtocolError, StateObserver, StateSync, WireState};
pub use renderer::{render_frame, FrameRenderer, PixelSink, Tick, DEFAULT_FRAME_INTERVAL};
pub use state::{SharedStripState, StripState, StripUpdate};
pub use waveform::{brightness, Mode};
