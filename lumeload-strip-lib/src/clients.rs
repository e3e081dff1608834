//! Bounded list of connected control clients
//!
//! New clients receive the current snapshot before they are listed. When the
//! list is full the oldest client is closed and dropped to make room, so its
//! page notices and reconnects.

use std::fmt::Display;

use log::{debug, info, warn};
use smallvec::SmallVec;

/// One connected control client as seen by the broadcaster.
pub trait ControlClient {
    type Error: Display;

    /// Send one text frame.
    fn send_text(&mut self, text: &str) -> Result<(), Self::Error>;

    /// Send a close frame. The client is dropped right after.
    fn close(&mut self) -> Result<(), Self::Error>;
}

/// Clients held without a heap allocation.
const INLINE_CLIENTS: usize = 4;

pub struct ClientList<C> {
    clients: SmallVec<C, INLINE_CLIENTS>,
    max: usize,
}

impl<C: ControlClient> ClientList<C> {
    /// `max` is raised to 1 if zero.
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            clients: SmallVec::new(),
            max,
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Send `snapshot` to a new client and list it.
    ///
    /// Returns `false` if the snapshot could not be sent; the client is not
    /// listed then.
    pub fn join(&mut self, mut client: C, snapshot: &str) -> bool {
        if self.clients.len() >= self.max {
            info!("WS: max clients reached ({}), closing oldest", self.max);
            let mut oldest = self.clients.remove(0);
            if let Err(e) = oldest.close() {
                debug!("WS: close frame to evicted client failed: {e}");
            }
        }

        match client.send_text(snapshot) {
            Ok(()) => {
                self.clients.push(client);
                info!("WS: client joined (total={})", self.clients.len());
                true
            }
            Err(e) => {
                warn!("WS: failed to send snapshot to new client: {e}");
                false
            }
        }
    }

    /// Send `text` to every client, dropping the ones that fail.
    ///
    /// Returns how many clients were dropped.
    pub fn broadcast(&mut self, text: &str) -> usize {
        let before = self.clients.len();
        self.clients.retain_mut(|client| client.send_text(text).is_ok());
        let removed = before - self.clients.len();
        if removed > 0 {
            debug!("WS: removed {removed} dead clients during broadcast, {} remaining", self.clients.len());
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(u8, String)>>>;

    struct FakeClient {
        id: u8,
        log: Log,
        broken: bool,
    }

    impl ControlClient for FakeClient {
        type Error = &'static str;

        fn send_text(&mut self, text: &str) -> Result<(), Self::Error> {
            if self.broken {
                return Err("socket closed");
            }
            self.log.borrow_mut().push((self.id, text.to_string()));
            Ok(())
        }

        fn close(&mut self) -> Result<(), Self::Error> {
            self.log.borrow_mut().push((self.id, "<close>".to_string()));
            Ok(())
        }
    }

    fn client(id: u8, log: &Log) -> FakeClient {
        FakeClient {
            id,
            log: Rc::clone(log),
            broken: false,
        }
    }

    fn frames_for(log: &Log, id: u8) -> Vec<String> {
        log.borrow().iter().filter(|(i, _)| *i == id).map(|(_, f)| f.clone()).collect()
    }

    #[test]
    fn test_join_sends_snapshot_first() {
        let log = Log::default();
        let mut list = ClientList::new(4);
        assert!(list.join(client(1, &log), "snap"));
        list.broadcast("update");
        assert_eq!(frames_for(&log, 1), ["snap", "update"]);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_full_list_closes_oldest() {
        let log = Log::default();
        let mut list = ClientList::new(2);
        assert!(list.join(client(1, &log), "s1"));
        assert!(list.join(client(2, &log), "s2"));
        assert!(list.join(client(3, &log), "s3"));
        assert_eq!(list.len(), 2);

        list.broadcast("update");
        assert_eq!(frames_for(&log, 1), ["s1", "<close>"]);
        assert_eq!(frames_for(&log, 2), ["s2", "update"]);
        assert_eq!(frames_for(&log, 3), ["s3", "update"]);

        // Close goes out before the newcomer's snapshot
        let order: Vec<u8> = log.borrow().iter().map(|(i, _)| *i).collect();
        assert_eq!(order, [1, 2, 1, 3, 2, 3]);
    }

    #[test]
    fn test_failed_snapshot_not_listed() {
        let log = Log::default();
        let mut list = ClientList::new(4);
        let mut dead = client(1, &log);
        dead.broken = true;
        assert!(!list.join(dead, "snap"));
        assert!(list.is_empty());
    }

    #[test]
    fn test_broadcast_drops_failing_clients() {
        let log = Log::default();
        let mut list = ClientList::new(4);
        list.join(client(1, &log), "s");
        list.join(client(2, &log), "s");
        list.clients[0].broken = true;

        assert_eq!(list.broadcast("a"), 1);
        assert_eq!(list.len(), 1);
        assert_eq!(list.broadcast("b"), 0);
        assert_eq!(frames_for(&log, 2), ["s", "a", "b"]);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let log = Log::default();
        let mut list = ClientList::new(0);
        list.join(client(1, &log), "s");
        list.join(client(2, &log), "s");
        assert_eq!(list.len(), 1);
        assert_eq!(frames_for(&log, 1), ["s", "<close>"]);
    }
}
