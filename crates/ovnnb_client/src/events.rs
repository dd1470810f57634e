//! Typed change events for ports and ACLs.
//!
//! Events are produced only for `Logical_Switch_Port` and `ACL` rows.
//! Switch, address set and DHCP option changes update the cache silently.
//!
//! Handlers run synchronously while the synchronizer holds the cache write
//! lock. They must not block and must not query the client's cache.
//!
//! # Usage
//!
//! ```rust,ignore
//! let receiver = client.subscribe();
//! std::thread::spawn(move || {
//!     while let Ok(event) = receiver.recv() {
//!         println!("{event:?}");
//!     }
//! });
//! ```

use crate::projection::{Acl, LogicalSwitchPort};
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

/// A change to a port or ACL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NbEvent {
    /// A port was created or updated.
    PortCreated(LogicalSwitchPort),
    /// A port was deleted. Carries the port as last cached.
    PortDeleted(LogicalSwitchPort),
    /// An ACL was created or updated.
    AclCreated(Acl),
    /// An ACL was deleted. Carries the ACL as last cached.
    AclDeleted(Acl),
}

/// Receives change events.
///
/// Every method defaults to doing nothing. Handlers run while the cache
/// write lock is held: they must not block or query the cache. They may
/// register further handlers, which receive events from the next batch.
pub trait EventHandler: Send + Sync {
    /// A port was created or updated.
    fn on_logical_port_create(&self, _port: &LogicalSwitchPort) {}

    /// A port was deleted.
    fn on_logical_port_delete(&self, _port: &LogicalSwitchPort) {}

    /// An ACL was created or updated.
    fn on_acl_create(&self, _acl: &Acl) {}

    /// An ACL was deleted.
    fn on_acl_delete(&self, _acl: &Acl) {}

    /// Dispatches an event to the matching method.
    fn handle(&self, event: &NbEvent) {
        match event {
            NbEvent::PortCreated(port) => self.on_logical_port_create(port),
            NbEvent::PortDeleted(port) => self.on_logical_port_delete(port),
            NbEvent::AclCreated(acl) => self.on_acl_create(acl),
            NbEvent::AclDeleted(acl) => self.on_acl_delete(acl),
        }
    }
}

/// Forwards events into channels.
///
/// Subscribers whose receiver was dropped are removed on the next send.
#[derive(Debug, Default)]
pub struct EventChannel {
    subscribers: Mutex<Vec<Sender<NbEvent>>>,
}

impl EventChannel {
    /// Creates a channel with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber and returns its receiving end.
    pub fn subscribe(&self) -> Receiver<NbEvent> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.lock().push(sender);
        receiver
    }

    /// Number of live subscribers, as of the last send.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl EventHandler for EventChannel {
    fn handle(&self, event: &NbEvent) {
        self.subscribers
            .lock()
            .retain(|sender| sender.send(event.clone()).is_ok());
    }
}
