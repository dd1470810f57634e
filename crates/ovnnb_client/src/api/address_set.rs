//! Address set commands.

use super::{project_named, project_table, string_map, string_set};
use crate::client::NbClient;
use crate::command::Command;
use crate::error::{NbError, NbResult};
use crate::matcher::Criteria;
use crate::projection::AddressSet;
use crate::transport::Transport;
use ovnnb_protocol::schema::{address_set, EXTERNAL_IDS, NAME_COLUMN};
use ovnnb_protocol::{Condition, Operation, Row, RowId};
use std::collections::BTreeMap;
use tracing::debug;

/// Address set commands and queries, borrowed from a client.
pub struct AddressSetApi<'a, T: Transport> {
    client: &'a NbClient<T>,
}

impl<'a, T: Transport> AddressSetApi<'a, T> {
    pub(crate) fn new(client: &'a NbClient<T>) -> Self {
        Self { client }
    }

    /// Creates address set `name` holding `addresses`.
    pub fn add(
        &self,
        name: &str,
        addresses: &[&str],
        external_ids: Option<&BTreeMap<String, String>>,
    ) -> NbResult<Command> {
        self.client.ensure_open()?;
        if self
            .client
            .cache()
            .row_id(address_set::TABLE, &Criteria::named(name))
            .is_some()
        {
            return Err(NbError::already_exists("address set", name));
        }

        let row = address_set_row(addresses, external_ids).with(NAME_COLUMN, name);
        let id = RowId::placeholder("as_add");
        debug!(address_set = name, addresses = addresses.len(), "built address set add");
        Ok(Command::from(
            Operation::insert(address_set::TABLE, row).with_uuid_name(&id),
        ))
    }

    /// Replaces the addresses of set `name`, and its external ids when
    /// given.
    pub fn update(
        &self,
        name: &str,
        addresses: &[&str],
        external_ids: Option<&BTreeMap<String, String>>,
    ) -> NbResult<Command> {
        self.client.ensure_open()?;
        let update = Operation::update(address_set::TABLE, address_set_row(addresses, external_ids))
            .filter(Condition::equals(NAME_COLUMN, name));
        debug!(address_set = name, addresses = addresses.len(), "built address set update");
        Ok(Command::from(update))
    }

    /// Deletes address set `name`.
    pub fn del(&self, name: &str) -> NbResult<Command> {
        self.client.ensure_open()?;
        let delete =
            Operation::delete(address_set::TABLE).filter(Condition::equals(NAME_COLUMN, name));
        Ok(Command::from(delete))
    }

    /// Returns every cached address set.
    pub fn list(&self) -> NbResult<Vec<AddressSet>> {
        self.client.cache().read(project_table)
    }

    /// Returns the cached address set named `name`.
    pub fn get(&self, name: &str) -> NbResult<AddressSet> {
        self.client
            .cache()
            .read(|tables| project_named(tables, "address set", name))
    }
}

fn address_set_row(addresses: &[&str], external_ids: Option<&BTreeMap<String, String>>) -> Row {
    let mut row = Row::new().with(address_set::ADDRESSES, string_set(addresses));
    if let Some(ids) = external_ids {
        row.insert(EXTERNAL_IDS, string_map(ids));
    }
    row
}

#[cfg(test)]
mod tests {
    use crate::config::ClientConfig;
    use crate::transport::MockTransport;
    use crate::NbClient;
    use ovnnb_protocol::{FieldValue, OpKind, Row, RowId, RowUpdate, TableUpdates};
    use std::collections::BTreeMap;

    fn client() -> NbClient<MockTransport> {
        let transport = MockTransport::new();
        transport.set_snapshot(TableUpdates::new().with(
            "Address_Set",
            RowId::new("as-1"),
            RowUpdate::upsert(
                Row::new()
                    .with("name", "web")
                    .with("addresses", "10.0.0.5"),
            ),
        ));
        NbClient::open(ClientConfig::default(), transport).unwrap()
    }

    #[test]
    fn add_rejects_duplicate_names() {
        let client = client();
        assert!(client
            .address_set()
            .add("web", &["10.0.0.1"], None)
            .unwrap_err()
            .is_already_exists());

        let ids = BTreeMap::from([("owner".to_string(), "me".to_string())]);
        let command = client
            .address_set()
            .add("db", &["10.0.1.1", "10.0.1.2"], Some(&ids))
            .unwrap();
        let row = command.operations()[0].row.as_ref().unwrap();
        assert_eq!(row.get("name"), Some(&FieldValue::from("db")));
        assert_eq!(row.get("external_ids"), Some(&FieldValue::Map(ids)));
    }

    #[test]
    fn update_and_delete_filter_by_name() {
        let client = client();
        let update = client.address_set().update("web", &[], None).unwrap();
        let op = &update.operations()[0];
        assert_eq!(op.op, OpKind::Update);
        assert_eq!(op.conditions[0].value, FieldValue::from("web"));
        assert!(op.row.as_ref().unwrap().get("external_ids").is_none());

        let delete = client.address_set().del("unknown").unwrap();
        assert_eq!(delete.operations()[0].op, OpKind::Delete);
    }

    #[test]
    fn queries_collapse_single_address() {
        let client = client();
        let set = client.address_set().get("web").unwrap();
        assert_eq!(set.addresses, vec!["10.0.0.5".to_string()]);
        assert_eq!(client.address_set().list().unwrap().len(), 1);
        assert!(client.address_set().get("db").unwrap_err().is_not_found());
    }
}
