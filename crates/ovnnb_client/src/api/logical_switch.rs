//! Logical switch commands.

use super::{project_named, project_table, string_map};
use crate::client::NbClient;
use crate::command::Command;
use crate::error::{NbError, NbResult};
use crate::matcher::Criteria;
use crate::projection::LogicalSwitch;
use crate::transport::Transport;
use ovnnb_protocol::schema::{logical_switch as ls, EXTERNAL_IDS, NAME_COLUMN};
use ovnnb_protocol::{Condition, Mutation, Mutator, Operation, Row, RowId};
use std::collections::BTreeMap;
use tracing::debug;

/// Logical switch commands and queries, borrowed from a client.
pub struct LogicalSwitchApi<'a, T: Transport> {
    client: &'a NbClient<T>,
}

impl<'a, T: Transport> LogicalSwitchApi<'a, T> {
    pub(crate) fn new(client: &'a NbClient<T>) -> Self {
        Self { client }
    }

    /// Creates a switch named `name`.
    ///
    /// Fails with `AlreadyExists` if a switch of that name is cached.
    pub fn add(&self, name: &str) -> NbResult<Command> {
        self.client.ensure_open()?;
        if self
            .client
            .cache()
            .row_id(ls::TABLE, &Criteria::named(name))
            .is_some()
        {
            return Err(NbError::already_exists("logical switch", name));
        }

        let id = RowId::placeholder("lsw_add");
        let insert =
            Operation::insert(ls::TABLE, Row::new().with(NAME_COLUMN, name)).with_uuid_name(&id);
        debug!(switch = name, "built logical switch add");
        Ok(Command::from(insert))
    }

    /// Deletes the switch named `name`. Its ports and ACLs are removed by
    /// the server once nothing references them.
    pub fn del(&self, name: &str) -> NbResult<Command> {
        self.client.ensure_open()?;
        let delete = Operation::delete(ls::TABLE).filter(Condition::equals(NAME_COLUMN, name));
        debug!(switch = name, "built logical switch delete");
        Ok(Command::from(delete))
    }

    /// Adds `external_ids` pairs to the switch. Keys already present keep
    /// their value.
    pub fn set_external_ids(
        &self,
        name: &str,
        external_ids: &BTreeMap<String, String>,
    ) -> NbResult<Command> {
        self.external_ids_mutation(name, external_ids, Mutator::Insert)
    }

    /// Removes `external_ids` pairs from the switch.
    pub fn del_external_ids(
        &self,
        name: &str,
        external_ids: &BTreeMap<String, String>,
    ) -> NbResult<Command> {
        self.external_ids_mutation(name, external_ids, Mutator::Delete)
    }

    fn external_ids_mutation(
        &self,
        name: &str,
        external_ids: &BTreeMap<String, String>,
        mutator: Mutator,
    ) -> NbResult<Command> {
        self.client.ensure_open()?;
        if external_ids.is_empty() {
            return Err(NbError::invalid_argument(format!(
                "external_ids for logical switch {name} must not be empty"
            )));
        }
        let mutate = Operation::mutate(ls::TABLE)
            .filter(Condition::equals(NAME_COLUMN, name))
            .mutation(Mutation {
                column: EXTERNAL_IDS.to_string(),
                mutator,
                value: string_map(external_ids),
            });
        Ok(Command::from(mutate))
    }

    /// Returns every cached switch.
    pub fn list(&self) -> NbResult<Vec<LogicalSwitch>> {
        self.client.cache().read(project_table)
    }

    /// Returns the cached switch named `name`.
    pub fn get(&self, name: &str) -> NbResult<LogicalSwitch> {
        self.client
            .cache()
            .read(|tables| project_named(tables, "logical switch", name))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ClientConfig;
    use crate::transport::MockTransport;
    use crate::NbClient;
    use ovnnb_protocol::{FieldValue, Mutator, OpKind, Row, RowId, RowUpdate, TableUpdates};
    use std::collections::BTreeMap;

    fn client_with_switch(name: &str) -> NbClient<MockTransport> {
        let transport = MockTransport::new();
        transport.set_snapshot(TableUpdates::new().with(
            "Logical_Switch",
            RowId::new("s-1"),
            RowUpdate::upsert(Row::new().with("name", name)),
        ));
        NbClient::open(ClientConfig::default(), transport).unwrap()
    }

    #[test]
    fn add_builds_named_insert() {
        let client = client_with_switch("ls1");
        let command = client.logical_switch().add("ls2").unwrap();

        let op = &command.operations()[0];
        assert_eq!(command.len(), 1);
        assert_eq!(op.op, OpKind::Insert);
        assert!(op.uuid_name.as_deref().unwrap().starts_with("lsw_add_"));
        assert_eq!(op.row.as_ref().unwrap().get("name"), Some(&FieldValue::from("ls2")));
    }

    #[test]
    fn add_existing_switch_fails() {
        let client = client_with_switch("ls1");
        let err = client.logical_switch().add("ls1").unwrap_err();
        assert!(err.is_already_exists());
    }

    #[test]
    fn empty_external_ids_are_rejected() {
        let client = client_with_switch("ls1");
        let empty = BTreeMap::new();
        assert!(matches!(
            client.logical_switch().set_external_ids("ls1", &empty),
            Err(crate::NbError::InvalidArgument(_))
        ));
        assert!(client.logical_switch().del_external_ids("ls1", &empty).is_err());
    }

    #[test]
    fn external_id_mutations() {
        let client = client_with_switch("ls1");
        let ids = BTreeMap::from([("foo".to_string(), "bar".to_string())]);

        let set = client.logical_switch().set_external_ids("ls1", &ids).unwrap();
        let del = client.logical_switch().del_external_ids("ls1", &ids).unwrap();
        assert_eq!(set.operations()[0].mutations[0].mutator, Mutator::Insert);
        assert_eq!(del.operations()[0].mutations[0].mutator, Mutator::Delete);
        assert_eq!(set.operations()[0].conditions[0].column, "name");
    }

    #[test]
    fn queries() {
        let client = client_with_switch("ls1");
        assert_eq!(client.logical_switch().list().unwrap().len(), 1);
        assert_eq!(client.logical_switch().get("ls1").unwrap().name, "ls1");
        assert!(client.logical_switch().get("nope").unwrap_err().is_not_found());
    }
}
