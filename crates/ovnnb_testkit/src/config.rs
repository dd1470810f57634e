//! Configuration for the in-memory database.

/// When update notifications reach subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Before `transact` returns.
    #[default]
    Immediate,
    /// Only when [`MemoryDatabase::flush`](crate::MemoryDatabase::flush) is
    /// called, so tests can observe the cache lagging behind a write.
    Deferred,
}

/// Configuration for [`MemoryDatabase`](crate::MemoryDatabase).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDatabaseConfig {
    /// Update delivery mode.
    pub delivery: Delivery,
    /// Send one-element sets as bare atoms in snapshots and updates, the
    /// way OVSDB encodes them on the wire.
    pub bare_singletons: bool,
}

impl MemoryDatabaseConfig {
    /// Creates the default configuration: immediate delivery, bare
    /// singletons.
    pub fn new() -> Self {
        Self {
            delivery: Delivery::Immediate,
            bare_singletons: true,
        }
    }

    /// Sets the delivery mode.
    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Sets whether one-element sets are sent as bare atoms.
    pub fn with_bare_singletons(mut self, bare: bool) -> Self {
        self.bare_singletons = bare;
        self
    }
}

impl Default for MemoryDatabaseConfig {
    fn default() -> Self {
        Self::new()
    }
}
