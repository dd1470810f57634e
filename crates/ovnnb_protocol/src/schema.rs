//! Names and relationships of the Northbound tables this client models.

/// Name of the Northbound database.
pub const NB_DATABASE: &str = "OVN_Northbound";

/// Column holding a row's id in `where` clauses and `select` results.
pub const UUID_COLUMN: &str = "_uuid";

/// Natural key column of switches, ports and address sets.
pub const NAME_COLUMN: &str = "name";

/// Column shared by most tables.
pub const EXTERNAL_IDS: &str = "external_ids";

/// `Logical_Switch` columns.
pub mod logical_switch {
    /// Table name.
    pub const TABLE: &str = "Logical_Switch";
    /// Natural key.
    pub const NAME: &str = "name";
    /// References to `Logical_Switch_Port`.
    pub const PORTS: &str = "ports";
    /// References to `ACL`.
    pub const ACLS: &str = "acls";
    /// Free-form configuration.
    pub const OTHER_CONFIG: &str = "other_config";
}

/// `Logical_Switch_Port` columns.
pub mod logical_switch_port {
    /// Table name.
    pub const TABLE: &str = "Logical_Switch_Port";
    /// Natural key.
    pub const NAME: &str = "name";
    /// MAC and IP addresses.
    pub const ADDRESSES: &str = "addresses";
    /// Allowed source addresses.
    pub const PORT_SECURITY: &str = "port_security";
    /// Port options.
    pub const OPTIONS: &str = "options";
    /// Reference to `DHCP_Options`.
    pub const DHCPV4_OPTIONS: &str = "dhcpv4_options";
    /// Reference to `DHCP_Options`.
    pub const DHCPV6_OPTIONS: &str = "dhcpv6_options";
}

/// `ACL` columns.
pub mod acl {
    /// Table name.
    pub const TABLE: &str = "ACL";
    /// `allow`, `allow-related`, `drop` or `reject`.
    pub const ACTION: &str = "action";
    /// `from-lport` or `to-lport`.
    pub const DIRECTION: &str = "direction";
    /// Match expression.
    pub const MATCH: &str = "match";
    /// Priority, 0 to 32767.
    pub const PRIORITY: &str = "priority";
    /// Whether matches are logged.
    pub const LOG: &str = "log";
}

/// `Address_Set` columns.
pub mod address_set {
    /// Table name.
    pub const TABLE: &str = "Address_Set";
    /// Natural key.
    pub const NAME: &str = "name";
    /// Member addresses.
    pub const ADDRESSES: &str = "addresses";
}

/// `DHCP_Options` columns.
pub mod dhcp_options {
    /// Table name.
    pub const TABLE: &str = "DHCP_Options";
    /// Subnet the options apply to.
    pub const CIDR: &str = "cidr";
    /// DHCP option values.
    pub const OPTIONS: &str = "options";
}

/// A table this client models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// `Logical_Switch`.
    LogicalSwitch,
    /// `Logical_Switch_Port`.
    LogicalSwitchPort,
    /// `ACL`.
    Acl,
    /// `Address_Set`.
    AddressSet,
    /// `DHCP_Options`.
    DhcpOptions,
}

impl Table {
    /// Every modelled table.
    pub const ALL: [Table; 5] = [
        Table::LogicalSwitch,
        Table::LogicalSwitchPort,
        Table::Acl,
        Table::AddressSet,
        Table::DhcpOptions,
    ];

    /// Returns the wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Table::LogicalSwitch => logical_switch::TABLE,
            Table::LogicalSwitchPort => logical_switch_port::TABLE,
            Table::Acl => acl::TABLE,
            Table::AddressSet => address_set::TABLE,
            Table::DhcpOptions => dhcp_options::TABLE,
        }
    }

    /// Looks a table up by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Root tables keep their rows alive on their own. Rows of non-root
    /// tables are removed by the server once nothing references them.
    pub fn is_root(&self) -> bool {
        !matches!(self, Table::LogicalSwitchPort | Table::Acl)
    }

    /// Strong reference columns of this table and the table they point to.
    pub fn references(&self) -> &'static [(&'static str, Table)] {
        match self {
            Table::LogicalSwitch => &[
                (logical_switch::PORTS, Table::LogicalSwitchPort),
                (logical_switch::ACLS, Table::Acl),
            ],
            Table::LogicalSwitchPort => &[
                (logical_switch_port::DHCPV4_OPTIONS, Table::DhcpOptions),
                (logical_switch_port::DHCPV6_OPTIONS, Table::DhcpOptions),
            ],
            Table::Acl | Table::AddressSet | Table::DhcpOptions => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for table in Table::ALL {
            assert_eq!(Table::from_name(table.name()), Some(table));
        }
        assert_eq!(Table::from_name("Logical_Router"), None);
    }

    #[test]
    fn ports_and_acls_are_owned_by_switches() {
        assert!(!Table::LogicalSwitchPort.is_root());
        assert!(!Table::Acl.is_root());
        assert!(Table::LogicalSwitch.is_root());
        assert!(Table::AddressSet.is_root());

        let owners: Vec<_> = Table::ALL
            .into_iter()
            .filter(|t| t.references().iter().any(|(_, target)| *target == Table::Acl))
            .collect();
        assert_eq!(owners, vec![Table::LogicalSwitch]);
    }
}
