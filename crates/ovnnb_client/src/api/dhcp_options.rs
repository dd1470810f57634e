//! DHCP options queries.
//!
//! Rows are created through
//! [`LogicalPortApi::set_dhcpv4_options`](super::LogicalPortApi::set_dhcpv4_options).

use super::project_table;
use crate::client::NbClient;
use crate::error::{NbError, NbResult};
use crate::projection::{DhcpOptions, FromRow};
use crate::transport::Transport;
use ovnnb_protocol::schema::dhcp_options;
use ovnnb_protocol::RowId;

/// DHCP options queries, borrowed from a client.
pub struct DhcpOptionsApi<'a, T: Transport> {
    client: &'a NbClient<T>,
}

impl<'a, T: Transport> DhcpOptionsApi<'a, T> {
    pub(crate) fn new(client: &'a NbClient<T>) -> Self {
        Self { client }
    }

    /// Returns every cached DHCP options row.
    pub fn list(&self) -> NbResult<Vec<DhcpOptions>> {
        self.client.cache().read(project_table)
    }

    /// Returns the cached DHCP options row `id`.
    pub fn get(&self, id: &RowId) -> NbResult<DhcpOptions> {
        self.client.cache().read(|tables| {
            match tables.row(dhcp_options::TABLE, id) {
                Some(row) => DhcpOptions::from_row(id, row),
                None => Err(NbError::not_found("dhcp options", id.as_str())),
            }
        })
    }
}
