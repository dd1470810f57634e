//! Logical switch port commands.

use super::{project_ids, project_named, string_map, string_set, switch_id};
use crate::client::NbClient;
use crate::command::Command;
use crate::error::{NbError, NbResult};
use crate::matcher::Criteria;
use crate::projection::LogicalSwitchPort;
use crate::transport::Transport;
use ovnnb_protocol::schema::{
    dhcp_options, logical_switch as ls, logical_switch_port as lsp, EXTERNAL_IDS, NAME_COLUMN,
    UUID_COLUMN,
};
use ovnnb_protocol::{Condition, Mutation, Operation, RefSet, Row, RowId};
use std::collections::BTreeMap;
use tracing::debug;

/// Logical switch port commands and queries, borrowed from a client.
pub struct LogicalPortApi<'a, T: Transport> {
    client: &'a NbClient<T>,
}

impl<'a, T: Transport> LogicalPortApi<'a, T> {
    pub(crate) fn new(client: &'a NbClient<T>) -> Self {
        Self { client }
    }

    /// Creates port `port` and attaches it to switch `switch`.
    ///
    /// The command inserts the port, then adds it to the switch's `ports`.
    pub fn add(&self, switch: &str, port: &str) -> NbResult<Command> {
        self.client.ensure_open()?;
        self.client.cache().read(|tables| {
            if tables.row_id(lsp::TABLE, &Criteria::named(port)).is_some() {
                return Err(NbError::already_exists("logical switch port", port));
            }
            switch_id(tables, switch).map(|_| ())
        })?;

        let id = RowId::placeholder("lsp_add");
        let insert =
            Operation::insert(lsp::TABLE, Row::new().with(NAME_COLUMN, port)).with_uuid_name(&id);
        let attach = Operation::mutate(ls::TABLE)
            .filter(Condition::equals(NAME_COLUMN, switch))
            .mutation(Mutation::insert(ls::PORTS, RefSet::single(id)));
        debug!(switch, port, "built logical switch port add");
        Ok(Command::new(vec![insert, attach]))
    }

    /// Deletes port `port` and removes it from its owning switch.
    pub fn del(&self, port: &str) -> NbResult<Command> {
        self.client.ensure_open()?;
        let (port_id, owner) = self.client.cache().read(|tables| {
            let port_id = tables
                .row_id(lsp::TABLE, &Criteria::named(port))
                .ok_or_else(|| NbError::not_found("logical switch port", port))?;
            let owner = tables.row_id_referencing(ls::TABLE, ls::PORTS, &port_id);
            Ok::<_, NbError>((port_id, owner))
        })?;

        let mut operations =
            vec![Operation::delete(lsp::TABLE).filter(Condition::equals(NAME_COLUMN, port))];
        if let Some(owner) = owner {
            operations.push(
                Operation::mutate(ls::TABLE)
                    .filter(Condition::equals(UUID_COLUMN, owner))
                    .mutation(Mutation::delete(ls::PORTS, RefSet::single(port_id))),
            );
        }
        debug!(port, "built logical switch port delete");
        Ok(Command::new(operations))
    }

    /// Replaces the port's addresses. An empty list clears them.
    pub fn set_addresses(&self, port: &str, addresses: &[&str]) -> NbResult<Command> {
        self.update_column(port, lsp::ADDRESSES, Row::new().with(lsp::ADDRESSES, string_set(addresses)))
    }

    /// Replaces the port's security addresses. An empty list clears them.
    pub fn set_port_security(&self, port: &str, addresses: &[&str]) -> NbResult<Command> {
        self.update_column(
            port,
            lsp::PORT_SECURITY,
            Row::new().with(lsp::PORT_SECURITY, string_set(addresses)),
        )
    }

    /// Adds `options` pairs to the port.
    pub fn set_options(&self, port: &str, options: &BTreeMap<String, String>) -> NbResult<Command> {
        self.client.ensure_open()?;
        let mutate = Operation::mutate(lsp::TABLE)
            .filter(Condition::equals(NAME_COLUMN, port))
            .mutation(Mutation::insert(lsp::OPTIONS, string_map(options)));
        Ok(Command::from(mutate))
    }

    /// Creates a `DHCP_Options` row for `cidr` and makes it the port's
    /// DHCPv4 options, replacing any previous attachment.
    pub fn set_dhcpv4_options(
        &self,
        port: &str,
        cidr: &str,
        options: &BTreeMap<String, String>,
        external_ids: Option<&BTreeMap<String, String>>,
    ) -> NbResult<Command> {
        self.client.ensure_open()?;
        if self
            .client
            .cache()
            .row_id(lsp::TABLE, &Criteria::named(port))
            .is_none()
        {
            return Err(NbError::not_found("logical switch port", port));
        }

        let mut row = Row::new()
            .with(dhcp_options::CIDR, cidr)
            .with(dhcp_options::OPTIONS, string_map(options));
        if let Some(external_ids) = external_ids {
            row.insert(EXTERNAL_IDS, string_map(external_ids));
        }

        let id = RowId::placeholder("dhcp_add");
        let insert = Operation::insert(dhcp_options::TABLE, row).with_uuid_name(&id);
        let attach = Operation::update(
            lsp::TABLE,
            Row::new().with(lsp::DHCPV4_OPTIONS, RefSet::single(id)),
        )
        .filter(Condition::equals(NAME_COLUMN, port));
        debug!(port, cidr, "built dhcpv4 options attach");
        Ok(Command::new(vec![insert, attach]))
    }

    /// Returns the cached ports of switch `switch`.
    pub fn list_by_switch(&self, switch: &str) -> NbResult<Vec<LogicalSwitchPort>> {
        self.client.cache().read(|tables| {
            let id = switch_id(tables, switch)?;
            let ports = match tables.row(ls::TABLE, &id).and_then(|row| row.get(ls::PORTS)) {
                Some(value) => value.references().ok_or_else(|| {
                    NbError::malformed(ls::TABLE, &id, ls::PORTS, "expected references")
                })?,
                None => RefSet::new(),
            };
            project_ids(tables, &ports)
        })
    }

    /// Returns the cached port named `port`.
    pub fn get(&self, port: &str) -> NbResult<LogicalSwitchPort> {
        self.client
            .cache()
            .read(|tables| project_named(tables, "logical switch port", port))
    }

    fn update_column(&self, port: &str, column: &str, row: Row) -> NbResult<Command> {
        self.client.ensure_open()?;
        let update = Operation::update(lsp::TABLE, row).filter(Condition::equals(NAME_COLUMN, port));
        debug!(port, column, "built logical switch port update");
        Ok(Command::from(update))
    }
}
