//! Local mirror of the server's tables.
//!
//! The cache is written only by the synchronizer, one update batch at a
//! time under the write lock, so readers observe either none or all of a
//! batch. Queries are linear scans.

use crate::matcher::{references_contain, Criteria};
use ovnnb_protocol::{Row, RowId};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Rows of one table, keyed by row id.
pub type TableRows = BTreeMap<RowId, Row>;

/// Every cached table.
///
/// Obtained through [`Cache::read`] for queries that touch several rows
/// and must see one consistent state.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    tables: BTreeMap<String, TableRows>,
}

impl Tables {
    /// Returns the rows of one table.
    pub fn table(&self, name: &str) -> Option<&TableRows> {
        self.tables.get(name)
    }

    /// Iterates the rows of one table in row id order. An unknown table
    /// yields nothing.
    pub fn rows<'a>(&'a self, table: &str) -> impl Iterator<Item = (&'a RowId, &'a Row)> + 'a {
        self.tables.get(table).into_iter().flat_map(BTreeMap::iter)
    }

    /// Returns one row.
    pub fn row(&self, table: &str, id: &RowId) -> Option<&Row> {
        self.tables.get(table)?.get(id)
    }

    /// Returns the id of the first row matching `criteria`.
    pub fn row_id(&self, table: &str, criteria: &Criteria) -> Option<RowId> {
        self.rows(table)
            .find(|(_, row)| criteria.matches(row))
            .map(|(id, _)| id.clone())
    }

    /// Returns the id of the first row whose relationship column `field`
    /// references `target`.
    pub fn row_id_referencing(&self, table: &str, field: &str, target: &RowId) -> Option<RowId> {
        self.rows(table)
            .find(|(_, row)| {
                row.get(field)
                    .is_some_and(|value| references_contain(value, target))
            })
            .map(|(id, _)| id.clone())
    }

    /// Number of rows in a table.
    pub fn table_len(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, BTreeMap::len)
    }

    /// Total number of cached rows.
    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn put_row(&mut self, table: &str, id: RowId, row: Row) -> Option<Row> {
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(id, row)
    }

    pub(crate) fn delete_row(&mut self, table: &str, id: &RowId) -> Option<Row> {
        self.tables.get_mut(table)?.remove(id)
    }
}

/// The cache store.
///
/// Guarded by its own lock, separate from the one serializing
/// transactions.
#[derive(Debug, Default)]
pub struct Cache {
    tables: RwLock<Tables>,
}

impl Cache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with the read lock held.
    ///
    /// Multi-row queries should go through here so they take the lock once.
    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&self.tables.read())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        f(&mut self.tables.write())
    }

    /// Returns a copy of every row of a table.
    pub fn table(&self, name: &str) -> Vec<(RowId, Row)> {
        self.read(|tables| {
            tables
                .rows(name)
                .map(|(id, row)| (id.clone(), row.clone()))
                .collect()
        })
    }

    /// Returns a copy of one row.
    pub fn row(&self, table: &str, id: &RowId) -> Option<Row> {
        self.read(|tables| tables.row(table, id).cloned())
    }

    /// Returns the id of the first row matching `criteria`.
    pub fn row_id(&self, table: &str, criteria: &Criteria) -> Option<RowId> {
        self.read(|tables| tables.row_id(table, criteria))
    }

    /// Returns the id of the first row whose column `field` references
    /// `target`.
    pub fn row_id_referencing(&self, table: &str, field: &str, target: &RowId) -> Option<RowId> {
        self.read(|tables| tables.row_id_referencing(table, field, target))
    }

    /// Number of rows in a table.
    pub fn table_len(&self, table: &str) -> usize {
        self.read(|tables| tables.table_len(table))
    }
}
