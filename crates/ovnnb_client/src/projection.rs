//! Typed views of cached rows.

use crate::error::{NbError, NbResult};
use ovnnb_protocol::schema::{
    acl, address_set, dhcp_options, logical_switch, logical_switch_port, EXTERNAL_IDS,
    NAME_COLUMN,
};
use ovnnb_protocol::{FieldValue, RefSet, Row, RowId};
use std::collections::BTreeMap;

/// Builds a domain entity from a cached row.
pub trait FromRow: Sized {
    /// Table the entity lives in.
    const TABLE: &'static str;

    /// Projects `row`, whose id is `id`.
    ///
    /// Fails with [`NbError::MalformedRow`] if a required scalar column is
    /// missing or of the wrong shape, or if a set, reference or map column
    /// is present with the wrong shape. Absent set, reference and map
    /// columns project as empty.
    fn from_row(id: &RowId, row: &Row) -> NbResult<Self>;
}

/// A logical switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalSwitch {
    /// Row id.
    pub uuid: RowId,
    /// Switch name.
    pub name: String,
    /// Attached ports.
    pub ports: RefSet,
    /// Attached ACLs.
    pub acls: RefSet,
    /// External ids.
    pub external_ids: BTreeMap<String, String>,
}

/// A logical switch port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalSwitchPort {
    /// Row id.
    pub uuid: RowId,
    /// Port name.
    pub name: String,
    /// Addresses, e.g. `"00:00:00:00:00:01 10.0.0.1"`.
    pub addresses: Vec<String>,
    /// Port security addresses.
    pub port_security: Vec<String>,
    /// Port options.
    pub options: BTreeMap<String, String>,
    /// Attached DHCPv4 options row.
    pub dhcpv4_options: Option<RowId>,
    /// External ids.
    pub external_ids: BTreeMap<String, String>,
}

/// An access control list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    /// Row id.
    pub uuid: RowId,
    /// `allow`, `allow-related`, `drop` or `reject`.
    pub action: String,
    /// `from-lport` or `to-lport`.
    pub direction: String,
    /// Match expression.
    pub match_expr: String,
    /// Priority.
    pub priority: i64,
    /// Whether matching packets are logged.
    pub log: bool,
    /// External ids.
    pub external_ids: BTreeMap<String, String>,
}

/// A named set of addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSet {
    /// Row id.
    pub uuid: RowId,
    /// Set name.
    pub name: String,
    /// Member addresses.
    pub addresses: Vec<String>,
    /// External ids.
    pub external_ids: BTreeMap<String, String>,
}

/// DHCP options for a subnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpOptions {
    /// Row id.
    pub uuid: RowId,
    /// Subnet.
    pub cidr: String,
    /// Option values.
    pub options: BTreeMap<String, String>,
    /// External ids.
    pub external_ids: BTreeMap<String, String>,
}

impl FromRow for LogicalSwitch {
    const TABLE: &'static str = logical_switch::TABLE;

    fn from_row(id: &RowId, row: &Row) -> NbResult<Self> {
        let r = RowReader::new(Self::TABLE, id, row);
        Ok(Self {
            uuid: id.clone(),
            name: r.string(NAME_COLUMN)?,
            ports: r.references(logical_switch::PORTS)?,
            acls: r.references(logical_switch::ACLS)?,
            external_ids: r.map(EXTERNAL_IDS)?,
        })
    }
}

impl FromRow for LogicalSwitchPort {
    const TABLE: &'static str = logical_switch_port::TABLE;

    fn from_row(id: &RowId, row: &Row) -> NbResult<Self> {
        let r = RowReader::new(Self::TABLE, id, row);
        Ok(Self {
            uuid: id.clone(),
            name: r.string(NAME_COLUMN)?,
            addresses: r.strings(logical_switch_port::ADDRESSES)?,
            port_security: r.strings(logical_switch_port::PORT_SECURITY)?,
            options: r.map(logical_switch_port::OPTIONS)?,
            dhcpv4_options: r.optional_reference(logical_switch_port::DHCPV4_OPTIONS)?,
            external_ids: r.map(EXTERNAL_IDS)?,
        })
    }
}

impl FromRow for Acl {
    const TABLE: &'static str = acl::TABLE;

    fn from_row(id: &RowId, row: &Row) -> NbResult<Self> {
        let r = RowReader::new(Self::TABLE, id, row);
        Ok(Self {
            uuid: id.clone(),
            action: r.string(acl::ACTION)?,
            direction: r.string(acl::DIRECTION)?,
            match_expr: r.string(acl::MATCH)?,
            priority: r.integer(acl::PRIORITY)?,
            log: r.boolean(acl::LOG)?,
            external_ids: r.map(EXTERNAL_IDS)?,
        })
    }
}

impl FromRow for AddressSet {
    const TABLE: &'static str = address_set::TABLE;

    fn from_row(id: &RowId, row: &Row) -> NbResult<Self> {
        let r = RowReader::new(Self::TABLE, id, row);
        Ok(Self {
            uuid: id.clone(),
            name: r.string(NAME_COLUMN)?,
            addresses: r.strings(address_set::ADDRESSES)?,
            external_ids: r.map(EXTERNAL_IDS)?,
        })
    }
}

impl FromRow for DhcpOptions {
    const TABLE: &'static str = dhcp_options::TABLE;

    fn from_row(id: &RowId, row: &Row) -> NbResult<Self> {
        let r = RowReader::new(Self::TABLE, id, row);
        Ok(Self {
            uuid: id.clone(),
            cidr: r.string(dhcp_options::CIDR)?,
            options: r.map(dhcp_options::OPTIONS)?,
            external_ids: r.map(EXTERNAL_IDS)?,
        })
    }
}

struct RowReader<'a> {
    table: &'static str,
    id: &'a RowId,
    row: &'a Row,
}

impl<'a> RowReader<'a> {
    fn new(table: &'static str, id: &'a RowId, row: &'a Row) -> Self {
        Self { table, id, row }
    }

    fn malformed(&self, column: &str, reason: impl Into<String>) -> NbError {
        NbError::malformed(self.table, self.id, column, reason)
    }

    fn required(&self, column: &str) -> NbResult<&'a FieldValue> {
        self.row
            .get(column)
            .ok_or_else(|| self.malformed(column, "missing"))
    }

    fn string(&self, column: &str) -> NbResult<String> {
        self.required(column)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.malformed(column, "expected a string"))
    }

    fn integer(&self, column: &str) -> NbResult<i64> {
        let mut value = self.required(column)?.clone();
        value.normalize_integral();
        value
            .as_integer()
            .ok_or_else(|| self.malformed(column, "expected an integer"))
    }

    fn boolean(&self, column: &str) -> NbResult<bool> {
        self.required(column)?
            .as_bool()
            .ok_or_else(|| self.malformed(column, "expected a boolean"))
    }

    fn strings(&self, column: &str) -> NbResult<Vec<String>> {
        match self.row.get(column) {
            None => Ok(Vec::new()),
            Some(value) => value
                .strings()
                .ok_or_else(|| self.malformed(column, "expected a set of strings")),
        }
    }

    fn references(&self, column: &str) -> NbResult<RefSet> {
        match self.row.get(column) {
            None => Ok(RefSet::new()),
            Some(value) => value
                .references()
                .ok_or_else(|| self.malformed(column, "expected references")),
        }
    }

    fn optional_reference(&self, column: &str) -> NbResult<Option<RowId>> {
        let refs = self.references(column)?;
        if refs.len() > 1 {
            return Err(self.malformed(column, "expected at most one reference"));
        }
        Ok(refs.into_iter().next())
    }

    fn map(&self, column: &str) -> NbResult<BTreeMap<String, String>> {
        match self.row.get(column) {
            None => Ok(BTreeMap::new()),
            Some(FieldValue::Map(map)) => Ok(map.clone()),
            Some(_) => Err(self.malformed(column, "expected a map")),
        }
    }
}
