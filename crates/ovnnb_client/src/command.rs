//! Commands: ordered operations produced by the entity builders.

use ovnnb_protocol::{Operation, OperationResult, RowId};

/// An ordered list of operations expressing one caller intent.
///
/// Built from the cache at construction time; nothing is sent until the
/// command is passed to [`NbClient::execute`](crate::NbClient::execute).
#[derive(Debug, Clone, PartialEq)]
#[must_use = "a command does nothing until executed"]
pub struct Command {
    operations: Vec<Operation>,
}

impl Command {
    /// Creates a command from raw operations.
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    /// Returns the operations in submission order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if the command has no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Consumes the command, returning its operations.
    pub fn into_operations(self) -> Vec<Operation> {
        self.operations
    }
}

impl From<Operation> for Command {
    fn from(operation: Operation) -> Self {
        Self::new(vec![operation])
    }
}

/// The results belonging to one executed command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandReply {
    /// One result per operation of the command.
    pub results: Vec<OperationResult>,
}

impl CommandReply {
    /// Returns the id assigned to the first row the command inserted.
    pub fn inserted(&self) -> Option<&RowId> {
        self.results.iter().find_map(|r| r.uuid.as_ref())
    }

    /// Total rows affected by the command's delete, update and mutate
    /// operations.
    pub fn affected(&self) -> u64 {
        self.results.iter().filter_map(|r| r.count).sum()
    }
}
