//! Partial matching of cached rows.
//!
//! A [`Criteria`] names a subset of columns with an expectation for each.
//! Columns the criteria do not name are ignored; a named column the row
//! lacks fails the match.

use crate::cache::Tables;
use ovnnb_protocol::schema::{acl, logical_switch, NAME_COLUMN};
use ovnnb_protocol::{FieldValue, RefSet, Row, RowId};
use std::collections::BTreeMap;

/// What a criteria column must hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Expect {
    /// The column equals the value, modulo wire shape.
    Equals(FieldValue),
    /// The column is a map holding every given pair.
    Contains(BTreeMap<String, String>),
}

impl Expect {
    fn accepts(&self, value: &FieldValue) -> bool {
        match self {
            Expect::Equals(expected) => value.equivalent(expected),
            Expect::Contains(pairs) => value.as_map().is_some_and(|map| {
                pairs
                    .iter()
                    .all(|(k, v)| map.get(k).is_some_and(|actual| actual == v))
            }),
        }
    }
}

/// A partial row used to locate rows in the cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    fields: BTreeMap<String, Expect>,
}

impl Criteria {
    /// Creates empty criteria, which match every row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for criteria on the `name` column.
    pub fn named(name: &str) -> Self {
        Self::new().equals(NAME_COLUMN, name)
    }

    /// Requires `column` to equal `value`.
    #[must_use]
    pub fn equals(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields
            .insert(column.into(), Expect::Equals(value.into()));
        self
    }

    /// Requires the map in `column` to hold every pair of `pairs`.
    #[must_use]
    pub fn contains(mut self, column: impl Into<String>, pairs: BTreeMap<String, String>) -> Self {
        self.fields.insert(column.into(), Expect::Contains(pairs));
        self
    }

    /// Returns true if no column is constrained.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of constrained columns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns the expectation for `column`.
    pub fn get(&self, column: &str) -> Option<&Expect> {
        self.fields.get(column)
    }

    /// Returns true if `row` satisfies every expectation.
    pub fn matches(&self, row: &Row) -> bool {
        self.fields.iter().all(|(column, expect)| {
            row.get(column)
                .is_some_and(|value| expect.accepts(value))
        })
    }
}

/// Returns true if a relationship column references `id`, whichever wire
/// shape it arrived in.
pub fn references_contain(value: &FieldValue, id: &RowId) -> bool {
    value.references().is_some_and(|refs| refs.contains(id))
}

/// Finds the first ACL attached to the switch named `switch` that satisfies
/// `criteria`.
///
/// Only ACLs referenced from the switch's `acls` column are considered. A
/// reference to a row missing from the ACL table is skipped.
pub fn find_acl(tables: &Tables, switch: &str, criteria: &Criteria) -> Option<RowId> {
    switch_acls(tables, switch)?.into_iter().find(|id| {
        tables
            .row(acl::TABLE, id)
            .is_some_and(|row| criteria.matches(row))
    })
}

/// Finds every ACL attached to the switch named `switch` that satisfies
/// `criteria`. Empty if the switch is not cached.
pub fn find_acls(tables: &Tables, switch: &str, criteria: &Criteria) -> RefSet {
    switch_acls(tables, switch)
        .map(|acls| {
            acls.into_iter()
                .filter(|id| {
                    tables
                        .row(acl::TABLE, id)
                        .is_some_and(|row| criteria.matches(row))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn switch_acls(tables: &Tables, switch: &str) -> Option<RefSet> {
    let switch_id = tables.row_id(logical_switch::TABLE, &Criteria::named(switch))?;
    tables
        .row(logical_switch::TABLE, &switch_id)?
        .get(logical_switch::ACLS)?
        .references()
}
