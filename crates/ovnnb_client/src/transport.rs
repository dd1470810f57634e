//! Transport layer abstraction for talking to the database server.

use crate::error::{NbError, NbResult};
use ovnnb_protocol::{OpKind, Operation, OperationResult, RowId, TableUpdates};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Receives update batches pushed by the server.
pub trait UpdateListener: Send + Sync {
    /// Called once per `update` notification, in delivery order.
    fn on_update(&self, updates: &TableUpdates);
}

/// A transport owns the connection to the database server.
///
/// This trait abstracts the network layer, JSON-RPC framing and monitor
/// bookkeeping, allowing for different implementations (a socket client,
/// an in-memory database for testing, or a mock).
pub trait Transport: Send + Sync {
    /// Starts monitoring every column of every table and returns the
    /// initial snapshot.
    fn monitor_all(&self, database: &str) -> NbResult<TableUpdates>;

    /// Runs one transaction and returns the raw results in reply order.
    fn transact(&self, database: &str, operations: &[Operation])
        -> NbResult<Vec<OperationResult>>;

    /// Registers the listener that receives every later update batch.
    ///
    /// Called before [`Transport::monitor_all`]; batches may reach the
    /// listener before the snapshot has been returned.
    fn register_listener(&self, listener: Arc<dyn UpdateListener>) -> NbResult<()>;

    /// Checks if the transport is connected.
    fn is_connected(&self) -> bool;

    /// Closes the transport connection.
    fn close(&self) -> NbResult<()>;
}

/// A mock transport for testing.
///
/// Transactions are recorded. Replies come from a queue; when the queue is
/// empty every operation succeeds.
#[derive(Default)]
pub struct MockTransport {
    connected: AtomicBool,
    snapshot: Mutex<TableUpdates>,
    replies: Mutex<VecDeque<NbResult<Vec<OperationResult>>>>,
    transactions: Mutex<Vec<Vec<Operation>>>,
    listener: Mutex<Option<Arc<dyn UpdateListener>>>,
    next_uuid: AtomicU64,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Sets the snapshot returned by `monitor_all`.
    pub fn set_snapshot(&self, snapshot: TableUpdates) {
        *self.snapshot.lock() = snapshot;
    }

    /// Queues the reply for the next transaction.
    pub fn push_reply(&self, reply: Vec<OperationResult>) {
        self.replies.lock().push_back(Ok(reply));
    }

    /// Queues an error for the next transaction.
    pub fn push_error(&self, error: NbError) {
        self.replies.lock().push_back(Err(error));
    }

    /// Returns every transaction sent so far.
    pub fn transactions(&self) -> Vec<Vec<Operation>> {
        self.transactions.lock().clone()
    }

    /// Returns the number of transactions sent so far.
    pub fn transaction_count(&self) -> usize {
        self.transactions.lock().len()
    }

    /// Delivers an update batch to the registered listener, as the server
    /// would after a commit. Returns false if nothing is registered.
    pub fn deliver(&self, updates: &TableUpdates) -> bool {
        let listener = self.listener.lock().clone();
        match listener {
            Some(listener) => {
                listener.on_update(updates);
                true
            }
            None => false,
        }
    }

    /// Returns true if a listener is registered.
    pub fn has_listener(&self) -> bool {
        self.listener.lock().is_some()
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    fn success_for(&self, operation: &Operation) -> OperationResult {
        match operation.op {
            OpKind::Insert => {
                let n = self.next_uuid.fetch_add(1, Ordering::SeqCst);
                OperationResult::inserted(RowId::new(format!("mock-{n}")))
            }
            OpKind::Select => OperationResult::selected(Vec::new()),
            _ => OperationResult::counted(1),
        }
    }
}

impl Transport for MockTransport {
    fn monitor_all(&self, _database: &str) -> NbResult<TableUpdates> {
        if !self.is_connected() {
            return Err(NbError::transport_fatal("not connected"));
        }
        Ok(self.snapshot.lock().clone())
    }

    fn transact(
        &self,
        _database: &str,
        operations: &[Operation],
    ) -> NbResult<Vec<OperationResult>> {
        if !self.is_connected() {
            return Err(NbError::transport_retryable("not connected"));
        }
        self.transactions.lock().push(operations.to_vec());
        let queued = self.replies.lock().pop_front();
        match queued {
            Some(reply) => reply,
            None => Ok(operations.iter().map(|op| self.success_for(op)).collect()),
        }
    }

    fn register_listener(&self, listener: Arc<dyn UpdateListener>) -> NbResult<()> {
        *self.listener.lock() = Some(listener);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> NbResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        *self.listener.lock() = None;
        Ok(())
    }
}
