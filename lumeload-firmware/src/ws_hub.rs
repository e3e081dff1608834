//! WebSocket client registry and broadcaster
//!
//! A detached sender queues its frame on the HTTP server task and blocks
//! until that task has sent it, so it must never be used from inside a
//! request handler. All sends therefore happen on a dedicated hub task that
//! owns the client list and is fed through a channel.

use anyhow::Result;
use embedded_svc::ws::FrameType;
use esp_idf_svc::http::server::ws::EspHttpWsDetachedSender;
use esp_idf_svc::sys::EspError;
use log::{info, warn};
use lumeload_strip_lib::{ClientList, ControlClient, SharedStripState, StateObserver, StateSync};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use crate::thread_util::spawn_task;

/// Connected control clients kept at once; the oldest is closed beyond this.
pub const MAX_WS_CLIENTS: usize = 4;

struct WsClient(EspHttpWsDetachedSender);

impl ControlClient for WsClient {
    type Error = EspError;

    fn send_text(&mut self, text: &str) -> Result<(), EspError> {
        self.0.send(FrameType::Text(false), text.as_bytes())
    }

    fn close(&mut self) -> Result<(), EspError> {
        self.0.send(FrameType::Close, &[])
    }
}

enum HubMessage {
    /// New client, gets the current snapshot before any later broadcast
    Join(EspHttpWsDetachedSender),
    /// Serialized state for every client
    Broadcast(String),
}

/// Observer side of the hub, owned by the [`StateSync`].
pub struct WsHub {
    tx: Sender<HubMessage>,
}

impl WsHub {
    /// Hand a freshly connected client to the hub task.
    pub fn join(&self, sender: EspHttpWsDetachedSender) {
        if self.tx.send(HubMessage::Join(sender)).is_err() {
            warn!("WS: hub task is gone, dropping new client");
        }
    }
}

impl StateObserver for WsHub {
    fn broadcast(&self, message: &str) {
        if self.tx.send(HubMessage::Broadcast(message.to_owned())).is_err() {
            warn!("WS: hub task is gone, broadcast lost");
        }
    }
}

/// Create the control protocol endpoint and start the hub task serving it.
pub fn start_ws_hub(strip: Arc<SharedStripState>) -> Result<Arc<StateSync<WsHub>>> {
    let (tx, rx) = mpsc::channel();
    let sync = Arc::new(StateSync::new(strip, WsHub { tx }));

    let sync_clone = Arc::clone(&sync);
    spawn_task(c"ws_hub", None, move || hub_task(&sync_clone, &rx))?;

    Ok(sync)
}

fn hub_task(sync: &StateSync<WsHub>, rx: &Receiver<HubMessage>) {
    info!("WS hub started");
    let mut clients = ClientList::new(MAX_WS_CLIENTS);

    for message in rx {
        match message {
            HubMessage::Join(sender) => {
                // Snapshot taken here so it is ordered with queued broadcasts
                let snapshot = sync.on_client_connect();
                clients.join(WsClient(sender), &snapshot);
            }
            HubMessage::Broadcast(text) => {
                clients.broadcast(&text);
            }
        }
    }

    warn!("WS: hub channel closed, stopping");
}
