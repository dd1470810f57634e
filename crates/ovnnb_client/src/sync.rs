//! Applies server update batches to the cache.

use crate::cache::{Cache, Tables};
use crate::events::{EventHandler, NbEvent};
use crate::projection::{Acl, FromRow, LogicalSwitchPort};
use crate::transport::UpdateListener;
use ovnnb_protocol::schema::{acl, logical_switch_port};
use ovnnb_protocol::{Row, RowId, TableUpdates};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, warn};

/// Counts from applying one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Rows inserted or replaced.
    pub upserted: usize,
    /// Rows removed.
    pub deleted: usize,
    /// Deletions of rows the cache did not hold.
    pub unknown_deletes: usize,
    /// Events dispatched to handlers.
    pub events: usize,
}

/// Keeps the cache in step with the server.
///
/// Each batch is applied under one acquisition of the cache write lock, so
/// readers never see part of a batch. Batches delivered to the listener
/// before [`Synchronizer::seed`] are held back and applied, in order, right
/// after the snapshot.
pub struct Synchronizer {
    cache: Arc<Cache>,
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
    backlog: Mutex<Option<Vec<TableUpdates>>>,
}

impl Synchronizer {
    /// Creates a synchronizer writing into `cache`.
    pub fn new(cache: Arc<Cache>) -> Self {
        Self {
            cache,
            handlers: RwLock::new(Vec::new()),
            backlog: Mutex::new(Some(Vec::new())),
        }
    }

    /// Adds a handler that receives events from later batches.
    pub fn add_handler(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().push(handler);
    }

    /// Loads the initial snapshot, then applies any batches the listener
    /// received before it. The snapshot dispatches no events.
    pub fn seed(&self, snapshot: &TableUpdates) -> BatchStats {
        let mut backlog = self.backlog.lock();
        let stats = self.cache.write(|tables| apply_batch(tables, snapshot, &[]));
        debug!(rows = stats.upserted, "seeded cache from snapshot");
        let held = backlog.take().unwrap_or_default();
        if !held.is_empty() {
            debug!(batches = held.len(), "applying batches received before the snapshot");
        }
        for updates in &held {
            self.apply(updates);
        }
        stats
    }

    /// Applies one update batch and dispatches port and ACL events.
    pub fn apply(&self, updates: &TableUpdates) -> BatchStats {
        let handlers = self.handlers.read().clone();
        let stats = self
            .cache
            .write(|tables| apply_batch(tables, updates, &handlers));
        debug!(
            upserted = stats.upserted,
            deleted = stats.deleted,
            events = stats.events,
            "applied update batch"
        );
        stats
    }
}

impl UpdateListener for Synchronizer {
    fn on_update(&self, updates: &TableUpdates) {
        {
            let mut backlog = self.backlog.lock();
            if let Some(held) = backlog.as_mut() {
                held.push(updates.clone());
                return;
            }
        }
        self.apply(updates);
    }
}

fn apply_batch(
    tables: &mut Tables,
    updates: &TableUpdates,
    handlers: &[Arc<dyn EventHandler>],
) -> BatchStats {
    let mut stats = BatchStats::default();

    for (table, rows) in updates {
        for (id, update) in rows {
            if update.is_delete() {
                let Some(previous) = tables.row(table, id) else {
                    debug!(table = %table, row = %id, "delete for uncached row ignored");
                    stats.unknown_deletes += 1;
                    continue;
                };
                if !handlers.is_empty() {
                    if let Some(event) = deletion_event(table, id, previous) {
                        dispatch(handlers, &event);
                        stats.events += 1;
                    }
                }
                tables.delete_row(table, id);
                stats.deleted += 1;
            } else if let Some(new) = &update.new {
                let mut row = new.clone();
                row.normalize_integral();
                let event = if handlers.is_empty() {
                    None
                } else {
                    creation_event(table, id, &row)
                };
                tables.put_row(table, id.clone(), row);
                stats.upserted += 1;
                if let Some(event) = event {
                    dispatch(handlers, &event);
                    stats.events += 1;
                }
            }
        }
    }

    stats
}

fn dispatch(handlers: &[Arc<dyn EventHandler>], event: &NbEvent) {
    for handler in handlers {
        handler.handle(event);
    }
}

fn creation_event(table: &str, id: &RowId, row: &Row) -> Option<NbEvent> {
    match table {
        logical_switch_port::TABLE => project::<LogicalSwitchPort>(id, row).map(NbEvent::PortCreated),
        acl::TABLE => project::<Acl>(id, row).map(NbEvent::AclCreated),
        _ => None,
    }
}

fn deletion_event(table: &str, id: &RowId, row: &Row) -> Option<NbEvent> {
    match table {
        logical_switch_port::TABLE => project::<LogicalSwitchPort>(id, row).map(NbEvent::PortDeleted),
        acl::TABLE => project::<Acl>(id, row).map(NbEvent::AclDeleted),
        _ => None,
    }
}

fn project<T: FromRow>(id: &RowId, row: &Row) -> Option<T> {
    match T::from_row(id, row) {
        Ok(entity) => Some(entity),
        Err(e) => {
            warn!(table = T::TABLE, row = %id, error = %e, "event skipped");
            None
        }
    }
}
