//! ACL commands.

use super::{project_ids, string_map, switch_id};
use crate::client::NbClient;
use crate::command::Command;
use crate::error::{NbError, NbResult};
use crate::matcher::Criteria;
use crate::projection::Acl;
use crate::transport::Transport;
use ovnnb_protocol::schema::{acl, logical_switch as ls, EXTERNAL_IDS, NAME_COLUMN, UUID_COLUMN};
use ovnnb_protocol::{Condition, Mutation, Operation, RefSet, Row, RowId};
use std::collections::BTreeMap;
use tracing::debug;

/// Description of an ACL to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclSpec {
    /// `from-lport` or `to-lport`.
    pub direction: String,
    /// Match expression.
    pub match_expr: String,
    /// `allow`, `allow-related`, `drop` or `reject`.
    pub action: String,
    /// Priority.
    pub priority: i64,
    /// External ids. Also used, by containment, when checking for an
    /// existing equivalent ACL.
    pub external_ids: Option<BTreeMap<String, String>>,
    /// Whether matching packets are logged.
    pub log: bool,
}

impl AclSpec {
    /// Creates a spec with no external ids and logging off.
    pub fn new(
        direction: impl Into<String>,
        match_expr: impl Into<String>,
        action: impl Into<String>,
        priority: i64,
    ) -> Self {
        Self {
            direction: direction.into(),
            match_expr: match_expr.into(),
            action: action.into(),
            priority,
            external_ids: None,
            log: false,
        }
    }

    /// Sets the external ids.
    pub fn with_external_ids(mut self, external_ids: BTreeMap<String, String>) -> Self {
        self.external_ids = Some(external_ids);
        self
    }

    /// Sets the log flag.
    pub fn with_log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }
}

/// Criteria naming exactly one ACL: direction, match and priority are all
/// constrained, external ids by containment when given.
fn exact_acl_criteria(spec: &AclSpec) -> Criteria {
    let mut criteria = Criteria::new()
        .equals(acl::DIRECTION, spec.direction.as_str())
        .equals(acl::MATCH, spec.match_expr.as_str())
        .equals(acl::PRIORITY, spec.priority);
    if let Some(ids) = spec.external_ids.as_ref().filter(|ids| !ids.is_empty()) {
        criteria = criteria.contains(EXTERNAL_IDS, ids.clone());
    }
    criteria
}

/// Builds ACL deletion criteria, leaving out unset fields.
///
/// An empty direction or match and a negative priority are not
/// constrained. Empty external ids are not constrained either.
fn acl_criteria(
    direction: &str,
    match_expr: &str,
    priority: i64,
    external_ids: Option<&BTreeMap<String, String>>,
) -> Criteria {
    let mut criteria = Criteria::new();
    if !direction.is_empty() {
        criteria = criteria.equals(acl::DIRECTION, direction);
    }
    if !match_expr.is_empty() {
        criteria = criteria.equals(acl::MATCH, match_expr);
    }
    if priority >= 0 {
        criteria = criteria.equals(acl::PRIORITY, priority);
    }
    if let Some(ids) = external_ids.filter(|ids| !ids.is_empty()) {
        criteria = criteria.contains(EXTERNAL_IDS, ids.clone());
    }
    criteria
}

/// ACL commands and queries, borrowed from a client.
pub struct AclApi<'a, T: Transport> {
    client: &'a NbClient<T>,
}

impl<'a, T: Transport> AclApi<'a, T> {
    pub(crate) fn new(client: &'a NbClient<T>) -> Self {
        Self { client }
    }

    /// Creates an ACL and attaches it to switch `switch`.
    ///
    /// Fails with `AlreadyExists` if an ACL on the switch already has the
    /// same direction, match and priority and holds the given external ids.
    /// A negative priority is an `InvalidArgument`.
    pub fn add(&self, switch: &str, spec: &AclSpec) -> NbResult<Command> {
        self.client.ensure_open()?;
        if spec.priority < 0 {
            return Err(NbError::invalid_argument(format!(
                "acl priority {} is negative",
                spec.priority
            )));
        }
        let criteria = exact_acl_criteria(spec);
        self.client.cache().read(|tables| {
            switch_id(tables, switch)?;
            if crate::matcher::find_acl(tables, switch, &criteria).is_some() {
                return Err(NbError::already_exists(
                    "acl",
                    format!("{} {} {} on {switch}", spec.direction, spec.priority, spec.match_expr),
                ));
            }
            Ok(())
        })?;

        let mut row = Row::new()
            .with(acl::DIRECTION, spec.direction.as_str())
            .with(acl::MATCH, spec.match_expr.as_str())
            .with(acl::PRIORITY, spec.priority)
            .with(acl::ACTION, spec.action.as_str())
            .with(acl::LOG, spec.log);
        if let Some(ids) = &spec.external_ids {
            row.insert(EXTERNAL_IDS, string_map(ids));
        }

        let id = RowId::placeholder("acl_add");
        let insert = Operation::insert(acl::TABLE, row).with_uuid_name(&id);
        let attach = Operation::mutate(ls::TABLE)
            .filter(Condition::equals(NAME_COLUMN, switch))
            .mutation(Mutation::insert(ls::ACLS, RefSet::single(id)));
        debug!(switch, priority = spec.priority, "built acl add");
        Ok(Command::new(vec![insert, attach]))
    }

    /// Deletes the ACLs on switch `switch` matching the description.
    ///
    /// Empty `direction` or `match_expr` and a negative `priority` leave
    /// that field unconstrained, so one call may remove several ACLs.
    /// Fails with `NotFound` if none match.
    pub fn del(
        &self,
        switch: &str,
        direction: &str,
        match_expr: &str,
        priority: i64,
        external_ids: Option<&BTreeMap<String, String>>,
    ) -> NbResult<Command> {
        self.client.ensure_open()?;
        let criteria = acl_criteria(direction, match_expr, priority, external_ids);
        let targets = self.client.cache().read(|tables| {
            switch_id(tables, switch)?;
            let targets = crate::matcher::find_acls(tables, switch, &criteria);
            if targets.is_empty() {
                return Err(NbError::not_found(
                    "acl",
                    format!("{direction} {priority} {match_expr} on {switch}"),
                ));
            }
            Ok(targets)
        })?;

        let mut operations = vec![Operation::mutate(ls::TABLE)
            .filter(Condition::equals(NAME_COLUMN, switch))
            .mutation(Mutation::delete(ls::ACLS, targets.clone()))];
        operations.extend(
            targets
                .iter()
                .map(|id| Operation::delete(acl::TABLE).filter(Condition::equals(UUID_COLUMN, id.clone()))),
        );
        debug!(switch, acls = targets.len(), "built acl delete");
        Ok(Command::new(operations))
    }

    /// Returns the cached ACLs of switch `switch`.
    pub fn list_by_switch(&self, switch: &str) -> NbResult<Vec<Acl>> {
        self.client.cache().read(|tables| {
            let id = switch_id(tables, switch)?;
            let acls = match tables.row(ls::TABLE, &id).and_then(|row| row.get(ls::ACLS)) {
                Some(value) => value.references().ok_or_else(|| {
                    NbError::malformed(ls::TABLE, &id, ls::ACLS, "expected references")
                })?,
                None => RefSet::new(),
            };
            project_ids(tables, &acls)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::transport::MockTransport;
    use ovnnb_protocol::{FieldValue, OpKind, RowUpdate, TableUpdates};

    fn acl_row(priority: i64, owner: &str) -> Row {
        Row::new()
            .with("direction", "to-lport")
            .with("match", "ip4")
            .with("action", "allow")
            .with("priority", priority)
            .with("log", false)
            .with(
                "external_ids",
                BTreeMap::from([("owner".to_string(), owner.to_string())]),
            )
    }

    /// Switch "ls1" with ACLs at priorities 100 and 200; "ls2" with a
    /// single ACL referenced in the bare shape.
    fn client() -> NbClient<MockTransport> {
        let transport = MockTransport::new();
        transport.set_snapshot(
            TableUpdates::new()
                .with(
                    "Logical_Switch",
                    RowId::new("s-1"),
                    RowUpdate::upsert(Row::new().with("name", "ls1").with(
                        "acls",
                        RefSet::from_iter([RowId::new("a-1"), RowId::new("a-2")]),
                    )),
                )
                .with(
                    "Logical_Switch",
                    RowId::new("s-2"),
                    RowUpdate::upsert(
                        Row::new()
                            .with("name", "ls2")
                            .with("acls", FieldValue::Reference(RowId::new("a-3"))),
                    ),
                )
                .with("ACL", RowId::new("a-1"), RowUpdate::upsert(acl_row(100, "x")))
                .with("ACL", RowId::new("a-2"), RowUpdate::upsert(acl_row(200, "y")))
                .with("ACL", RowId::new("a-3"), RowUpdate::upsert(acl_row(100, "z"))),
        );
        NbClient::open(ClientConfig::default(), transport).unwrap()
    }

    #[test]
    fn add_detects_equivalent_acl() {
        let client = client();
        let spec = AclSpec::new("to-lport", "ip4", "drop", 100);
        assert!(client.acl().add("ls1", &spec).unwrap_err().is_already_exists());

        let other_owner = spec
            .clone()
            .with_external_ids(BTreeMap::from([("owner".to_string(), "w".to_string())]));
        assert!(client.acl().add("ls1", &other_owner).is_ok());
    }

    #[test]
    fn add_constrains_every_field() {
        let client = client();
        let empty_match = AclSpec::new("to-lport", "", "drop", 100);
        assert!(client.acl().add("ls1", &empty_match).is_ok());
        let empty_direction = AclSpec::new("", "ip4", "drop", 100);
        assert!(client.acl().add("ls1", &empty_direction).is_ok());
        let other_priority = AclSpec::new("to-lport", "ip4", "drop", 300);
        assert!(client.acl().add("ls1", &other_priority).is_ok());
    }

    #[test]
    fn add_rejects_negative_priority() {
        let client = client();
        let spec = AclSpec::new("to-lport", "ip4", "drop", -1);
        let err = client.acl().add("ls1", &spec).unwrap_err();
        assert!(matches!(err, NbError::InvalidArgument(_)));
    }

    #[test]
    fn add_sees_bare_shaped_acls() {
        let client = client();
        let spec = AclSpec::new("to-lport", "ip4", "allow", 100);
        assert!(client.acl().add("ls2", &spec).unwrap_err().is_already_exists());
    }

    #[test]
    fn add_requires_switch() {
        let client = client();
        let spec = AclSpec::new("to-lport", "ip6", "allow", 1);
        assert!(client.acl().add("ls9", &spec).unwrap_err().is_not_found());

        let command = client.acl().add("ls1", &spec.with_log(true)).unwrap();
        let row = command.operations()[0].row.as_ref().unwrap();
        assert_eq!(row.get("log"), Some(&FieldValue::Boolean(true)));
        assert_eq!(command.operations()[1].mutations[0].column, "acls");
    }

    #[test]
    fn scoped_delete_targets_one_priority() {
        let client = client();
        let command = client.acl().del("ls1", "to-lport", "ip4", 200, None).unwrap();
        let ops = command.operations();

        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].op, OpKind::Mutate);
        assert_eq!(ops[1].op, OpKind::Delete);
        assert_eq!(ops[1].conditions[0].value, FieldValue::Reference(RowId::new("a-2")));
    }

    #[test]
    fn negative_priority_widens_delete() {
        let client = client();
        let command = client.acl().del("ls1", "to-lport", "ip4", -1, None).unwrap();
        assert_eq!(command.len(), 3);
        assert_eq!(
            command.operations()[0].mutations[0].value,
            FieldValue::ReferenceSet(RefSet::from_iter([RowId::new("a-1"), RowId::new("a-2")]))
        );
    }

    #[test]
    fn delete_without_match_is_not_found() {
        let client = client();
        let err = client.acl().del("ls1", "from-lport", "", -1, None).unwrap_err();
        assert!(err.is_not_found());
        let owner = BTreeMap::from([("owner".to_string(), "z".to_string())]);
        assert!(client.acl().del("ls1", "", "", -1, Some(&owner)).is_err());
        assert!(client.acl().del("ls2", "", "", -1, Some(&owner)).is_ok());
    }

    #[test]
    fn list_by_switch_handles_both_shapes() {
        let client = client();
        assert_eq!(client.acl().list_by_switch("ls1").unwrap().len(), 2);
        let single = client.acl().list_by_switch("ls2").unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].external_ids["owner"], "z");
    }
}
