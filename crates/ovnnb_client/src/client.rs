//! The client object and its lifecycle.

use crate::api::{
    AclApi, AddressSetApi, DhcpOptionsApi, LogicalPortApi, LogicalSwitchApi,
};
use crate::cache::Cache;
use crate::command::{Command, CommandReply};
use crate::config::ClientConfig;
use crate::error::{NbError, NbResult};
use crate::events::{EventChannel, EventHandler, NbEvent};
use crate::executor::Executor;
use crate::sync::Synchronizer;
use crate::transport::{Transport, UpdateListener};
use parking_lot::RwLock;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::info;

/// Lifecycle state of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Loading the initial snapshot.
    Synchronizing,
    /// Cache seeded and listening for updates.
    Ready,
    /// Closed; builders and `execute` fail.
    Closed,
}

impl ClientState {
    /// Returns true if the client accepts commands.
    pub fn is_ready(&self) -> bool {
        matches!(self, ClientState::Ready)
    }
}

/// A client of one Northbound database.
///
/// Owns the cache, the synchronizer feeding it and the executor. Several
/// clients can coexist in one process.
pub struct NbClient<T: Transport> {
    config: ClientConfig,
    transport: Arc<T>,
    cache: Arc<Cache>,
    synchronizer: Arc<Synchronizer>,
    events: Arc<EventChannel>,
    executor: Executor<T>,
    state: RwLock<ClientState>,
}

impl<T: Transport> NbClient<T> {
    /// Opens a client: registers for update notifications, then loads the
    /// initial snapshot into the cache. Notifications that arrive before
    /// the snapshot is loaded are applied right after it.
    ///
    /// The snapshot produces no events.
    pub fn open(config: ClientConfig, transport: T) -> NbResult<Self> {
        let transport = Arc::new(transport);
        let cache = Arc::new(Cache::new());
        let synchronizer = Arc::new(Synchronizer::new(Arc::clone(&cache)));
        let events = Arc::new(EventChannel::new());
        synchronizer.add_handler(Arc::clone(&events) as Arc<dyn EventHandler>);

        let client = Self {
            executor: Executor::new(Arc::clone(&transport), config.database.clone()),
            config,
            transport,
            cache,
            synchronizer,
            events,
            state: RwLock::new(ClientState::Synchronizing),
        };

        info!(database = %client.config.database, endpoint = %client.config.endpoint, "opening client");
        client
            .transport
            .register_listener(Arc::clone(&client.synchronizer) as Arc<dyn UpdateListener>)?;
        let snapshot = client.transport.monitor_all(&client.config.database)?;
        let stats = client.synchronizer.seed(&snapshot);
        *client.state.write() = ClientState::Ready;
        info!(rows = stats.upserted, "client ready");

        Ok(client)
    }

    /// Returns the current state.
    pub fn state(&self) -> ClientState {
        *self.state.read()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the cache for direct queries.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Subscribes to port and ACL events from later update batches.
    pub fn subscribe(&self) -> Receiver<NbEvent> {
        self.events.subscribe()
    }

    /// Adds a handler for port and ACL events.
    ///
    /// The handler runs inside the synchronizer's locked section and must
    /// not block or query the cache. It may add further handlers; those
    /// see events from the next batch on.
    pub fn add_handler(&self, handler: Arc<dyn EventHandler>) {
        self.synchronizer.add_handler(handler);
    }

    /// Runs `commands` as one transaction.
    ///
    /// Returns one reply per command. The cache is not updated here; it
    /// reflects the transaction once the server's update notification has
    /// been applied.
    pub fn execute(&self, commands: impl IntoIterator<Item = Command>) -> NbResult<Vec<CommandReply>> {
        self.ensure_open()?;
        self.executor.execute(commands.into_iter().collect())
    }

    /// Closes the transport. Later builders and executions fail with
    /// [`NbError::Closed`].
    pub fn close(&self) -> NbResult<()> {
        let mut state = self.state.write();
        if *state == ClientState::Closed {
            return Ok(());
        }
        *state = ClientState::Closed;
        drop(state);
        info!(database = %self.config.database, "closing client");
        self.transport.close()
    }

    /// Logical switch commands and queries.
    pub fn logical_switch(&self) -> LogicalSwitchApi<'_, T> {
        LogicalSwitchApi::new(self)
    }

    /// Logical switch port commands and queries.
    pub fn logical_port(&self) -> LogicalPortApi<'_, T> {
        LogicalPortApi::new(self)
    }

    /// ACL commands and queries.
    pub fn acl(&self) -> AclApi<'_, T> {
        AclApi::new(self)
    }

    /// Address set commands and queries.
    pub fn address_set(&self) -> AddressSetApi<'_, T> {
        AddressSetApi::new(self)
    }

    /// DHCP options queries.
    pub fn dhcp_options(&self) -> DhcpOptionsApi<'_, T> {
        DhcpOptionsApi::new(self)
    }

    pub(crate) fn ensure_open(&self) -> NbResult<()> {
        match self.state() {
            ClientState::Closed => Err(NbError::Closed),
            _ => Ok(()),
        }
    }
}
