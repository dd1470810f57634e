//! Ready-made rows and topologies.

use crate::database::MemoryDatabase;
use ovnnb_protocol::schema::{acl, logical_switch as ls, logical_switch_port as lsp, NAME_COLUMN};
use ovnnb_protocol::{Condition, Mutation, Operation, OperationResult, RefSet, Row, RowId};

/// MAC and IPv4 address string for port number `n`, as stored in
/// `Logical_Switch_Port.addresses`.
pub fn port_address(n: u8) -> String {
    format!("00:00:00:00:00:{n:02x} 10.0.0.{n}")
}

/// An ACL row with logging off and no external ids.
pub fn acl_row(direction: &str, match_expr: &str, priority: i64, action: &str) -> Row {
    Row::new()
        .with(acl::DIRECTION, direction)
        .with(acl::MATCH, match_expr)
        .with(acl::PRIORITY, priority)
        .with(acl::ACTION, action)
        .with(acl::LOG, false)
}

/// Creates switch `name` with one port per entry of `ports`, in a single
/// transaction. Returns the switch's row id.
pub fn seed_switch(db: &MemoryDatabase, name: &str, ports: &[&str]) -> Option<RowId> {
    let switch = RowId::placeholder("seed_ls");
    let mut refs = RefSet::new();
    let mut operations = Vec::with_capacity(ports.len() + 1);
    for (n, port) in ports.iter().enumerate() {
        let id = RowId::placeholder("seed_lsp");
        let address = port_address(u8::try_from(n + 1).unwrap_or(u8::MAX));
        operations.push(
            Operation::insert(
                lsp::TABLE,
                Row::new()
                    .with(NAME_COLUMN, *port)
                    .with(lsp::ADDRESSES, address),
            )
            .with_uuid_name(&id),
        );
        refs.insert(id);
    }
    operations.push(
        Operation::insert(ls::TABLE, Row::new().with(NAME_COLUMN, name).with(ls::PORTS, refs))
            .with_uuid_name(&switch),
    );
    let results = db.transact(&operations);
    results.last().and_then(|result| result.uuid.clone())
}

/// Attaches an ACL to switch `switch`. Returns `None` if the switch does
/// not exist, in which case the ACL is not kept.
pub fn seed_acl(db: &MemoryDatabase, switch: &str, row: Row) -> Option<RowId> {
    let id = RowId::placeholder("seed_acl");
    let results = db.transact(&[
        Operation::insert(acl::TABLE, row).with_uuid_name(&id),
        Operation::mutate(ls::TABLE)
            .filter(Condition::equals(NAME_COLUMN, switch))
            .mutation(Mutation::insert(ls::ACLS, RefSet::single(id))),
    ]);
    let attached = results.get(1).and_then(|result| result.count) == Some(1);
    if !attached || results.iter().any(OperationResult::is_error) {
        return None;
    }
    results.first().and_then(|result| result.uuid.clone())
}
