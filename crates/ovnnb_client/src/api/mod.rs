//! Per-entity command builders and cache queries.
//!
//! Builders read the cache under its read lock, fail fast with no command
//! on error, and never write the cache.

mod acl;
mod address_set;
mod dhcp_options;
mod logical_port;
mod logical_switch;

pub use acl::{AclApi, AclSpec};
pub use address_set::AddressSetApi;
pub use dhcp_options::DhcpOptionsApi;
pub use logical_port::LogicalPortApi;
pub use logical_switch::LogicalSwitchApi;

use crate::cache::Tables;
use crate::error::{NbError, NbResult};
use crate::matcher::Criteria;
use crate::projection::FromRow;
use ovnnb_protocol::schema::logical_switch as ls;
use ovnnb_protocol::{FieldValue, RowId};
use std::collections::BTreeMap;

fn switch_id(tables: &Tables, name: &str) -> NbResult<RowId> {
    tables
        .row_id(ls::TABLE, &Criteria::named(name))
        .ok_or_else(|| NbError::not_found("logical switch", name))
}

/// Projects the rows `ids` of `E`'s table. References to rows not (yet)
/// cached are skipped.
fn project_ids<'a, E: FromRow>(
    tables: &Tables,
    ids: impl IntoIterator<Item = &'a RowId>,
) -> NbResult<Vec<E>> {
    ids.into_iter()
        .filter_map(|id| tables.row(E::TABLE, id).map(|row| E::from_row(id, row)))
        .collect()
}

fn project_table<E: FromRow>(tables: &Tables) -> NbResult<Vec<E>> {
    tables
        .rows(E::TABLE)
        .map(|(id, row)| E::from_row(id, row))
        .collect()
}

fn project_named<E: FromRow>(tables: &Tables, entity: &'static str, name: &str) -> NbResult<E> {
    let id = tables
        .row_id(E::TABLE, &Criteria::named(name))
        .ok_or_else(|| NbError::not_found(entity, name))?;
    match tables.row(E::TABLE, &id) {
        Some(row) => E::from_row(&id, row),
        None => Err(NbError::not_found(entity, name)),
    }
}

fn string_map(map: &BTreeMap<String, String>) -> FieldValue {
    FieldValue::Map(map.clone())
}

fn string_set(items: &[&str]) -> FieldValue {
    FieldValue::StringSet(items.iter().map(|s| s.to_string()).collect())
}
