//! Submits commands as one transaction and validates the reply.

use crate::command::{Command, CommandReply};
use crate::error::{NbError, NbResult, OperationFailure, TransactionFailure};
use crate::transport::Transport;
use ovnnb_protocol::{Operation, OperationResult};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Serializes transactions against one transport.
///
/// Only one transaction is in flight at a time. The cache lock is never
/// taken here; the cache catches up through update notifications.
pub(crate) struct Executor<T: Transport> {
    transport: Arc<T>,
    database: String,
    lock: Mutex<()>,
}

impl<T: Transport> Executor<T> {
    pub(crate) fn new(transport: Arc<T>, database: impl Into<String>) -> Self {
        Self {
            transport,
            database: database.into(),
            lock: Mutex::new(()),
        }
    }

    /// Flattens `commands` into one transaction and runs it.
    ///
    /// A batch without operations returns without contacting the server.
    /// On success each command gets the slice of results for its
    /// operations, so there is always one reply per command.
    pub(crate) fn execute(&self, commands: Vec<Command>) -> NbResult<Vec<CommandReply>> {
        let sizes: Vec<usize> = commands.iter().map(Command::len).collect();
        let operations: Vec<Operation> = commands
            .into_iter()
            .flat_map(Command::into_operations)
            .collect();
        if operations.is_empty() {
            return Ok(sizes.iter().map(|_| CommandReply::default()).collect());
        }

        let results = {
            let _guard = self.lock.lock();
            debug!(operations = operations.len(), "submitting transaction");
            self.transport.transact(&self.database, &operations)?
        };

        if let Err(failure) = validate_reply(&operations, &results) {
            warn!(error = %failure, "transaction failed");
            return Err(NbError::TransactionFailed(failure));
        }
        Ok(split_reply(&sizes, results))
    }
}

/// Checks a reply against the operations that produced it.
///
/// Every result carrying an error is reported, including results beyond
/// the last operation (commit failures). A reply with fewer results than
/// operations fails even when no result carries an error.
pub fn validate_reply(
    operations: &[Operation],
    results: &[OperationResult],
) -> Result<(), TransactionFailure> {
    let failures: Vec<OperationFailure> = results
        .iter()
        .enumerate()
        .filter(|(_, result)| result.is_error())
        .map(|(index, result)| {
            let operation = operations.get(index);
            OperationFailure {
                index,
                op: operation.map(|o| o.op),
                table: operation.map(|o| o.table.clone()),
                error: result.error.clone().unwrap_or_default(),
                details: result.details.clone(),
            }
        })
        .collect();

    if failures.is_empty() && results.len() >= operations.len() {
        return Ok(());
    }
    Err(TransactionFailure {
        expected: operations.len(),
        received: results.len(),
        failures,
    })
}

fn split_reply(sizes: &[usize], results: Vec<OperationResult>) -> Vec<CommandReply> {
    let mut results = results.into_iter();
    sizes
        .iter()
        .map(|&n| CommandReply {
            results: results.by_ref().take(n).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use ovnnb_protocol::{OpKind, Row, RowId};

    fn ops() -> Vec<Operation> {
        vec![
            Operation::insert("Logical_Switch_Port", Row::new().with("name", "p1")),
            Operation::mutate("Logical_Switch"),
        ]
    }

    #[test]
    fn complete_reply_is_accepted() {
        let results = vec![
            OperationResult::inserted(RowId::new("u-1")),
            OperationResult::counted(1),
        ];
        assert!(validate_reply(&ops(), &results).is_ok());
    }

    #[test]
    fn short_reply_fails_without_errors() {
        let failure = validate_reply(&ops(), &[OperationResult::inserted(RowId::new("u"))])
            .unwrap_err();
        assert!(failure.is_short_reply());
        assert!(failure.failures.is_empty());
    }

    #[test]
    fn every_error_is_reported() {
        let results = vec![
            OperationResult::inserted(RowId::new("u-1")),
            OperationResult::error("constraint violation", "referential integrity"),
            OperationResult::error("commit failed", "aborted"),
        ];
        let failure = validate_reply(&ops(), &results).unwrap_err();
        assert_eq!(failure.failures.len(), 2);

        let first = failure.first().unwrap();
        assert_eq!(first.index, 1);
        assert_eq!(first.op, Some(OpKind::Mutate));
        assert_eq!(first.table.as_deref(), Some("Logical_Switch"));

        let trailing = &failure.failures[1];
        assert_eq!(trailing.index, 2);
        assert!(trailing.op.is_none());
        assert_eq!(trailing.error, "commit failed");
    }

    #[test]
    fn empty_batch_skips_transport() {
        let transport = Arc::new(MockTransport::new());
        let executor = Executor::new(Arc::clone(&transport), "OVN_Northbound");

        let replies = executor.execute(Vec::new()).unwrap();
        assert!(replies.is_empty());
        let replies = executor
            .execute(vec![Command::new(Vec::new()), Command::new(Vec::new())])
            .unwrap();
        assert_eq!(replies, vec![CommandReply::default(), CommandReply::default()]);
        assert_eq!(transport.transaction_count(), 0);
    }

    #[test]
    fn commands_are_flattened_into_one_transaction() {
        let transport = Arc::new(MockTransport::new());
        let executor = Executor::new(Arc::clone(&transport), "OVN_Northbound");

        let replies = executor
            .execute(vec![
                Command::new(ops()),
                Command::from(Operation::delete("Address_Set")),
            ])
            .unwrap();

        assert_eq!(transport.transaction_count(), 1);
        assert_eq!(transport.transactions()[0].len(), 3);
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].results.len(), 2);
        assert!(replies[0].inserted().is_some());
        assert_eq!(replies[1].affected(), 1);
    }

    #[test]
    fn server_errors_surface_as_transaction_failed() {
        let transport = Arc::new(MockTransport::new());
        transport.push_reply(vec![
            OperationResult::error("constraint violation", "duplicate"),
            OperationResult::default(),
        ]);
        let executor = Executor::new(Arc::clone(&transport), "OVN_Northbound");

        let err = executor.execute(vec![Command::new(ops())]).unwrap_err();
        assert!(matches!(err, NbError::TransactionFailed(_)));
    }
}
