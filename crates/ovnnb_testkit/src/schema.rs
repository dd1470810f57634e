//! Column types and defaults of the modelled tables.

use crate::error::{DatabaseError, DatabaseResult};
use ovnnb_protocol::schema::{
    acl, address_set, dhcp_options, logical_switch as ls, logical_switch_port as lsp,
    EXTERNAL_IDS,
};
use ovnnb_protocol::{FieldValue, RefSet, Row, Table};
use std::collections::BTreeMap;

/// Type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// A string atom.
    String,
    /// An integer atom.
    Integer,
    /// A boolean atom.
    Boolean,
    /// A set of strings.
    StringSet,
    /// A string to string map.
    Map,
    /// A set of strong references into a table.
    References(Table),
}

impl ColumnKind {
    /// Value a column holds when an insert leaves it out.
    pub fn default_value(&self) -> FieldValue {
        match self {
            ColumnKind::String => FieldValue::String(String::new()),
            ColumnKind::Integer => FieldValue::Integer(0),
            ColumnKind::Boolean => FieldValue::Boolean(false),
            ColumnKind::StringSet => FieldValue::StringSet(Vec::new()),
            ColumnKind::Map => FieldValue::Map(BTreeMap::new()),
            ColumnKind::References(_) => FieldValue::ReferenceSet(RefSet::new()),
        }
    }
}

/// Columns of `table`, excluding `_uuid`.
pub fn columns(table: Table) -> &'static [(&'static str, ColumnKind)] {
    match table {
        Table::LogicalSwitch => &[
            (ls::NAME, ColumnKind::String),
            (ls::PORTS, ColumnKind::References(Table::LogicalSwitchPort)),
            (ls::ACLS, ColumnKind::References(Table::Acl)),
            (ls::OTHER_CONFIG, ColumnKind::Map),
            (EXTERNAL_IDS, ColumnKind::Map),
        ],
        Table::LogicalSwitchPort => &[
            (lsp::NAME, ColumnKind::String),
            (lsp::ADDRESSES, ColumnKind::StringSet),
            (lsp::PORT_SECURITY, ColumnKind::StringSet),
            (lsp::OPTIONS, ColumnKind::Map),
            (lsp::DHCPV4_OPTIONS, ColumnKind::References(Table::DhcpOptions)),
            (lsp::DHCPV6_OPTIONS, ColumnKind::References(Table::DhcpOptions)),
            (EXTERNAL_IDS, ColumnKind::Map),
        ],
        Table::Acl => &[
            (acl::ACTION, ColumnKind::String),
            (acl::DIRECTION, ColumnKind::String),
            (acl::MATCH, ColumnKind::String),
            (acl::PRIORITY, ColumnKind::Integer),
            (acl::LOG, ColumnKind::Boolean),
            (EXTERNAL_IDS, ColumnKind::Map),
        ],
        Table::AddressSet => &[
            (address_set::NAME, ColumnKind::String),
            (address_set::ADDRESSES, ColumnKind::StringSet),
            (EXTERNAL_IDS, ColumnKind::Map),
        ],
        Table::DhcpOptions => &[
            (dhcp_options::CIDR, ColumnKind::String),
            (dhcp_options::OPTIONS, ColumnKind::Map),
            (EXTERNAL_IDS, ColumnKind::Map),
        ],
    }
}

/// Looks up the type of `column` in `table`.
pub fn column_kind(table: Table, column: &str) -> DatabaseResult<ColumnKind> {
    columns(table)
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| DatabaseError::UnknownColumn {
            table: table.name().to_string(),
            column: column.to_string(),
        })
}

/// Upper bound on the number of references `column` of `table` may hold,
/// or `None` when the column is unbounded.
pub fn max_references(table: Table, column: &str) -> Option<usize> {
    match (table, column) {
        (Table::LogicalSwitchPort, lsp::DHCPV4_OPTIONS | lsp::DHCPV6_OPTIONS) => Some(1),
        _ => None,
    }
}

/// A row of `table` with every column at its default.
pub fn default_row(table: Table) -> Row {
    columns(table)
        .iter()
        .map(|(name, kind)| (name.to_string(), kind.default_value()))
        .collect()
}
