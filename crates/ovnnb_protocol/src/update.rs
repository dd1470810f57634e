//! Update batches pushed by the server.

use crate::error::{ProtocolError, ProtocolResult};
use crate::value::{Row, RowId};
use serde_json::Value as Json;
use std::collections::{btree_map, BTreeMap};

/// The change to one row.
///
/// An absent or empty `new` means the row was deleted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowUpdate {
    /// Content before the change, when the server sends it.
    pub old: Option<Row>,
    /// Content after the change.
    pub new: Option<Row>,
}

impl RowUpdate {
    /// A row that now exists with `row` as its content.
    pub fn upsert(row: Row) -> Self {
        Self {
            old: None,
            new: Some(row),
        }
    }

    /// A deleted row.
    pub fn delete() -> Self {
        Self::default()
    }

    /// Returns true if this update removes the row.
    pub fn is_delete(&self) -> bool {
        self.new.as_ref().map_or(true, Row::is_empty)
    }

    fn from_json(value: &Json) -> ProtocolResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| ProtocolError::invalid_notation("row update must be an object"))?;
        let old = object.get("old").map(Row::from_json).transpose()?;
        let new = object.get("new").map(Row::from_json).transpose()?;
        Ok(Self { old, new })
    }

    fn to_json(&self) -> Json {
        let mut object = serde_json::Map::new();
        if let Some(old) = &self.old {
            object.insert("old".into(), old.to_json());
        }
        if let Some(new) = &self.new {
            object.insert("new".into(), new.to_json());
        }
        Json::Object(object)
    }
}

/// Row changes for one table, keyed by row id.
pub type TableUpdate = BTreeMap<RowId, RowUpdate>;

/// A batch of row changes across tables.
///
/// Also used for the initial monitor snapshot, where every update is an
/// upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableUpdates {
    tables: BTreeMap<String, TableUpdate>,
}

impl TableUpdates {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a change to one row, replacing any earlier change to it.
    pub fn push(&mut self, table: impl Into<String>, id: RowId, update: RowUpdate) {
        self.tables.entry(table.into()).or_default().insert(id, update);
    }

    /// Builder-style [`TableUpdates::push`].
    #[must_use]
    pub fn with(mut self, table: impl Into<String>, id: RowId, update: RowUpdate) -> Self {
        self.push(table, id, update);
        self
    }

    /// Returns the changes for one table.
    pub fn table(&self, name: &str) -> Option<&TableUpdate> {
        self.tables.get(name)
    }

    /// Iterates tables in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, TableUpdate> {
        self.tables.iter()
    }

    /// Returns true if the batch carries no row changes.
    pub fn is_empty(&self) -> bool {
        self.tables.values().all(BTreeMap::is_empty)
    }

    /// Total number of row changes.
    pub fn row_count(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    /// Decodes the `table-updates` object of a monitor reply or `update`
    /// notification.
    pub fn from_json(value: &Json) -> ProtocolResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| ProtocolError::invalid_notation("table updates must be an object"))?;

        let mut updates = Self::new();
        for (table, rows) in object {
            let rows = rows.as_object().ok_or_else(|| {
                ProtocolError::invalid_notation(format!("updates for {table} must be an object"))
            })?;
            let entry = updates.tables.entry(table.clone()).or_default();
            for (id, change) in rows {
                entry.insert(RowId::new(id.as_str()), RowUpdate::from_json(change)?);
            }
        }
        Ok(updates)
    }

    /// Encodes as a `table-updates` object.
    pub fn to_json(&self) -> Json {
        let object: serde_json::Map<String, Json> = self
            .tables
            .iter()
            .map(|(table, rows)| {
                let rows: serde_json::Map<String, Json> = rows
                    .iter()
                    .map(|(id, change)| (id.as_str().to_string(), change.to_json()))
                    .collect();
                (table.clone(), Json::Object(rows))
            })
            .collect();
        Json::Object(object)
    }
}

impl<'a> IntoIterator for &'a TableUpdates {
    type Item = (&'a String, &'a TableUpdate);
    type IntoIter = btree_map::Iter<'a, String, TableUpdate>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.iter()
    }
}
