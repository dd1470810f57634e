//! In-memory Northbound database.
//!
//! Executes transactions the way an OVSDB server does: operations run in
//! order against a working copy, placeholders resolve to fresh row ids,
//! and the commit checks unique indexes, removes unreferenced rows of
//! non-root tables and rejects dangling strong references. A failed
//! operation or commit discards the whole transaction.
//!
//! Committed changes are published to subscribers as one [`TableUpdates`]
//! batch per transaction.

use crate::config::{Delivery, MemoryDatabaseConfig};
use crate::error::{DatabaseError, DatabaseResult};
use crate::schema::{column_kind, default_row, max_references, ColumnKind};
use ovnnb_protocol::schema::{address_set, NAME_COLUMN, UUID_COLUMN};
use ovnnb_protocol::{
    Condition, FieldValue, Function, Mutation, Mutator, OpKind, Operation, OperationResult,
    RefSet, Row, RowId, RowUpdate, Table, TableUpdates,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;
use uuid::Uuid;

/// Receives committed update batches.
///
/// Subscribers run on the committing thread and must not call back into
/// the database.
pub type Subscriber = Box<dyn Fn(&TableUpdates) + Send + Sync>;

type Store = BTreeMap<String, BTreeMap<RowId, Row>>;

#[derive(Debug)]
enum Fault {
    Fail { error: String, details: String },
    Truncate(usize),
}

#[derive(Default)]
struct State {
    tables: Store,
    faults: VecDeque<Fault>,
    pending: Vec<TableUpdates>,
    transactions: usize,
}

/// An in-memory Northbound database.
pub struct MemoryDatabase {
    config: MemoryDatabaseConfig,
    state: Mutex<State>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl MemoryDatabase {
    /// Creates an empty database with the default configuration.
    pub fn new() -> Self {
        Self::with_config(MemoryDatabaseConfig::default())
    }

    /// Creates an empty database.
    pub fn with_config(config: MemoryDatabaseConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::default()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MemoryDatabaseConfig {
        &self.config
    }

    /// Returns every row as an insertion batch.
    pub fn monitor_all(&self) -> TableUpdates {
        let state = self.state.lock();
        let mut snapshot = TableUpdates::new();
        for (table, rows) in &state.tables {
            for (id, row) in rows {
                snapshot.push(table.as_str(), id.clone(), RowUpdate::upsert(self.encode(row)));
            }
        }
        snapshot
    }

    /// Registers `subscriber` for every later committed batch.
    pub fn subscribe(&self, subscriber: impl Fn(&TableUpdates) + Send + Sync + 'static) {
        self.subscribers.lock().push(Box::new(subscriber));
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Executes `operations` as one transaction.
    ///
    /// The reply holds one result per operation. When an operation fails,
    /// its result carries the error and the following results are empty.
    /// A commit failure is reported as one extra result after the last
    /// operation's.
    pub fn transact(&self, operations: &[Operation]) -> Vec<OperationResult> {
        let mut state = self.state.lock();
        state.transactions += 1;

        let mut truncate = None;
        match state.faults.pop_front() {
            Some(Fault::Fail { error, details }) => {
                debug!(%error, "injected transaction failure");
                let mut results = vec![DatabaseError::Injected { error, details }.to_result()];
                results.resize(operations.len().max(1), OperationResult::default());
                return results;
            }
            Some(Fault::Truncate(len)) => truncate = Some(len),
            None => {}
        }

        let mut txn = Transaction {
            tables: state.tables.clone(),
            names: BTreeMap::new(),
        };
        let mut results = Vec::with_capacity(operations.len());
        for (index, operation) in operations.iter().enumerate() {
            match txn.execute(operation) {
                Ok(result) => results.push(result),
                Err(err) => {
                    debug!(index, error = %err, "operation failed, transaction aborted");
                    results.push(err.to_result());
                    results.resize(operations.len(), OperationResult::default());
                    return results;
                }
            }
        }
        if let Err(err) = txn.commit() {
            debug!(error = %err, "commit failed, transaction aborted");
            results.push(err.to_result());
            return results;
        }

        let updates = self.diff(&state.tables, &txn.tables);
        state.tables = txn.tables;
        debug!(
            operations = operations.len(),
            rows = updates.row_count(),
            "transaction committed"
        );

        if let Some(len) = truncate {
            results.truncate(len);
        }
        if updates.is_empty() {
            return results;
        }
        match self.config.delivery {
            Delivery::Immediate => {
                let subscribers = self.subscribers.lock();
                drop(state);
                for subscriber in subscribers.iter() {
                    subscriber(&updates);
                }
            }
            Delivery::Deferred => state.pending.push(updates),
        }
        results
    }

    /// Delivers every held-back batch in commit order. Returns the number
    /// of batches delivered.
    pub fn flush(&self) -> usize {
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);
        let subscribers = self.subscribers.lock();
        drop(state);
        for batch in &pending {
            for subscriber in subscribers.iter() {
                subscriber(batch);
            }
        }
        pending.len()
    }

    /// Number of batches waiting for [`flush`](Self::flush).
    pub fn pending_batches(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Makes the next transaction fail at its first operation with the
    /// OVSDB error string `error`. Nothing is committed.
    pub fn fail_next(&self, error: impl Into<String>, details: impl Into<String>) {
        self.state.lock().faults.push_back(Fault::Fail {
            error: error.into(),
            details: details.into(),
        });
    }

    /// Makes the next transaction commit normally but reply with only the
    /// first `len` results.
    pub fn truncate_next(&self, len: usize) {
        self.state.lock().faults.push_back(Fault::Truncate(len));
    }

    /// Number of transactions received, including failed ones.
    pub fn transaction_count(&self) -> usize {
        self.state.lock().transactions
    }

    /// Rows of `table`, with sets in their canonical form.
    pub fn rows(&self, table: &str) -> Vec<(RowId, Row)> {
        self.state
            .lock()
            .tables
            .get(table)
            .map(|rows| rows.iter().map(|(id, row)| (id.clone(), row.clone())).collect())
            .unwrap_or_default()
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.state.lock().tables.get(table).map_or(0, BTreeMap::len)
    }

    /// Returns the id of the first row of `table` whose name is `name`.
    pub fn find_named(&self, table: &str, name: &str) -> Option<RowId> {
        let wanted = FieldValue::from(name);
        self.state.lock().tables.get(table).and_then(|rows| {
            rows.iter()
                .find(|(_, row)| row.get(NAME_COLUMN) == Some(&wanted))
                .map(|(id, _)| id.clone())
        })
    }

    fn diff(&self, before: &Store, after: &Store) -> TableUpdates {
        let mut updates = TableUpdates::new();
        let names: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
        let empty = BTreeMap::new();
        for table in names {
            let old = before.get(table).unwrap_or(&empty);
            let new = after.get(table).unwrap_or(&empty);
            for (id, row) in old {
                if !new.contains_key(id) {
                    let update = RowUpdate {
                        old: Some(self.encode(row)),
                        new: None,
                    };
                    updates.push(table.as_str(), id.clone(), update);
                }
            }
            for (id, row) in new {
                match old.get(id) {
                    None => updates.push(table.as_str(), id.clone(), RowUpdate::upsert(self.encode(row))),
                    Some(previous) if previous != row => {
                        let update = RowUpdate {
                            old: Some(self.encode(previous)),
                            new: Some(self.encode(row)),
                        };
                        updates.push(table.as_str(), id.clone(), update);
                    }
                    Some(_) => {}
                }
            }
        }
        updates
    }

    /// Applies the configured wire shape to a stored row.
    fn encode(&self, row: &Row) -> Row {
        if !self.config.bare_singletons {
            return row.clone();
        }
        row.iter()
            .map(|(column, value)| {
                let value = match value {
                    FieldValue::ReferenceSet(set) if set.len() == 1 => set
                        .iter()
                        .next()
                        .map_or_else(|| value.clone(), |id| FieldValue::Reference(id.clone())),
                    FieldValue::StringSet(items) if items.len() == 1 => {
                        FieldValue::String(items[0].clone())
                    }
                    other => other.clone(),
                };
                (column.clone(), value)
            })
            .collect()
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Working copy of one transaction.
struct Transaction {
    tables: Store,
    names: BTreeMap<String, RowId>,
}

impl Transaction {
    fn execute(&mut self, operation: &Operation) -> DatabaseResult<OperationResult> {
        let table = Table::from_name(&operation.table)
            .ok_or_else(|| DatabaseError::UnknownTable(operation.table.clone()))?;
        match operation.op {
            OpKind::Insert => self.insert(table, operation),
            OpKind::Select => self.select(table, operation),
            OpKind::Update => self.update(table, operation),
            OpKind::Mutate => self.mutate(table, operation),
            OpKind::Delete => self.delete(table, operation),
        }
    }

    fn insert(&mut self, table: Table, operation: &Operation) -> DatabaseResult<OperationResult> {
        let row = operation
            .row
            .as_ref()
            .ok_or_else(|| DatabaseError::Syntax("insert requires a row".into()))?;
        let mut full = default_row(table);
        for (column, value) in row {
            let kind = column_kind(table, column)?;
            full.insert(column.as_str(), self.canonical(kind, column, value)?);
        }

        let id = RowId::new(Uuid::new_v4().to_string());
        if let Some(name) = &operation.uuid_name {
            if self.names.contains_key(name) {
                return Err(DatabaseError::DuplicateUuidName(name.clone()));
            }
            self.names.insert(name.clone(), id.clone());
        }
        self.tables
            .entry(table.name().to_string())
            .or_default()
            .insert(id.clone(), full);
        Ok(OperationResult::inserted(id))
    }

    fn select(&self, table: Table, operation: &Operation) -> DatabaseResult<OperationResult> {
        let rows = self
            .matching(table, &operation.conditions)?
            .into_iter()
            .filter_map(|id| {
                self.rows(table)
                    .get(&id)
                    .map(|row| row.clone().with(UUID_COLUMN, id))
            })
            .collect();
        Ok(OperationResult::selected(rows))
    }

    fn update(&mut self, table: Table, operation: &Operation) -> DatabaseResult<OperationResult> {
        let row = operation
            .row
            .as_ref()
            .ok_or_else(|| DatabaseError::Syntax("update requires a row".into()))?;
        let mut changes = Vec::with_capacity(row.len());
        for (column, value) in row {
            let kind = column_kind(table, column)?;
            changes.push((column.clone(), self.canonical(kind, column, value)?));
        }

        let ids = self.matching(table, &operation.conditions)?;
        let rows = self.rows_mut(table);
        for id in &ids {
            if let Some(target) = rows.get_mut(id) {
                for (column, value) in &changes {
                    target.insert(column.as_str(), value.clone());
                }
            }
        }
        Ok(OperationResult::counted(ids.len() as u64))
    }

    fn mutate(&mut self, table: Table, operation: &Operation) -> DatabaseResult<OperationResult> {
        let mut mutations = Vec::with_capacity(operation.mutations.len());
        for mutation in &operation.mutations {
            let kind = column_kind(table, &mutation.column)?;
            let value = self.canonical(kind, &mutation.column, &mutation.value)?;
            mutations.push((mutation, value));
        }

        let ids = self.matching(table, &operation.conditions)?;
        let rows = self.rows_mut(table);
        for id in &ids {
            if let Some(target) = rows.get_mut(id) {
                for (mutation, value) in &mutations {
                    apply_mutation(target, mutation, value)?;
                }
            }
        }
        Ok(OperationResult::counted(ids.len() as u64))
    }

    fn delete(&mut self, table: Table, operation: &Operation) -> DatabaseResult<OperationResult> {
        let ids = self.matching(table, &operation.conditions)?;
        let rows = self.rows_mut(table);
        for id in &ids {
            rows.remove(id);
        }
        Ok(OperationResult::counted(ids.len() as u64))
    }

    fn commit(&mut self) -> DatabaseResult<()> {
        self.check_indexes()?;
        self.check_cardinality()?;
        self.collect_garbage();
        self.check_references()
    }

    /// `Address_Set.name` is unique.
    fn check_indexes(&self) -> DatabaseResult<()> {
        let mut seen = BTreeSet::new();
        for row in self.rows(Table::AddressSet).values() {
            if let Some(name) = row.get(address_set::NAME).and_then(FieldValue::as_str) {
                if !seen.insert(name) {
                    return Err(DatabaseError::ConstraintViolation {
                        table: address_set::TABLE.to_string(),
                        column: address_set::NAME.to_string(),
                        value: name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Bounded reference columns hold no more than their maximum.
    fn check_cardinality(&self) -> DatabaseResult<()> {
        for table in Table::ALL {
            for (column, _) in table.references() {
                let Some(max) = max_references(table, column) else {
                    continue;
                };
                for row in self.rows(table).values() {
                    let held = row
                        .get(column)
                        .and_then(FieldValue::references)
                        .map_or(0, |refs| refs.len());
                    if held > max {
                        return Err(DatabaseError::ConstraintViolation {
                            table: table.name().to_string(),
                            column: column.to_string(),
                            value: format!("{held} references"),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Removes rows of non-root tables that nothing references, until no
    /// more rows become orphaned.
    fn collect_garbage(&mut self) {
        loop {
            let referenced = self.referenced();
            let mut removed = 0;
            for table in Table::ALL.into_iter().filter(|t| !t.is_root()) {
                let rows = self.rows_mut(table);
                let before = rows.len();
                rows.retain(|id, _| referenced.contains(id));
                removed += before - rows.len();
            }
            if removed == 0 {
                return;
            }
            debug!(rows = removed, "removed unreferenced rows");
        }
    }

    fn referenced(&self) -> BTreeSet<RowId> {
        let mut referenced = BTreeSet::new();
        for table in Table::ALL {
            for row in self.rows(table).values() {
                for (column, _) in table.references() {
                    if let Some(refs) = row.get(column).and_then(FieldValue::references) {
                        referenced.extend(refs);
                    }
                }
            }
        }
        referenced
    }

    fn check_references(&self) -> DatabaseResult<()> {
        for table in Table::ALL {
            for row in self.rows(table).values() {
                for (column, target) in table.references() {
                    let refs = row
                        .get(column)
                        .and_then(FieldValue::references)
                        .unwrap_or_default();
                    let targets = self.rows(*target);
                    if let Some(missing) = refs.into_iter().find(|id| !targets.contains_key(id)) {
                        return Err(DatabaseError::ReferentialIntegrity {
                            table: table.name().to_string(),
                            column: column.to_string(),
                            target: missing,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn rows(&self, table: Table) -> &BTreeMap<RowId, Row> {
        static EMPTY: BTreeMap<RowId, Row> = BTreeMap::new();
        self.tables.get(table.name()).unwrap_or(&EMPTY)
    }

    fn rows_mut(&mut self, table: Table) -> &mut BTreeMap<RowId, Row> {
        self.tables.entry(table.name().to_string()).or_default()
    }

    fn matching(&self, table: Table, conditions: &[Condition]) -> DatabaseResult<Vec<RowId>> {
        let mut ids = Vec::new();
        for (id, row) in self.rows(table) {
            let mut all = true;
            for condition in conditions {
                if !self.evaluate(table, id, row, condition)? {
                    all = false;
                    break;
                }
            }
            if all {
                ids.push(id.clone());
            }
        }
        Ok(ids)
    }

    fn evaluate(
        &self,
        table: Table,
        id: &RowId,
        row: &Row,
        condition: &Condition,
    ) -> DatabaseResult<bool> {
        let actual = if condition.column == UUID_COLUMN {
            FieldValue::Reference(id.clone())
        } else {
            column_kind(table, &condition.column)?;
            row.get(&condition.column)
                .cloned()
                .unwrap_or(FieldValue::StringSet(Vec::new()))
        };
        let expected = self.resolve_value(&condition.value)?;
        Ok(match condition.function {
            Function::Equal => actual.equivalent(&expected),
            Function::NotEqual => !actual.equivalent(&expected),
            Function::Includes => includes(&actual, &expected),
            Function::Excludes => excludes(&actual, &expected),
        })
    }

    /// Converts an incoming value to the stored form of a `kind` column.
    fn canonical(
        &self,
        kind: ColumnKind,
        column: &str,
        value: &FieldValue,
    ) -> DatabaseResult<FieldValue> {
        let mut value = value.clone();
        value.normalize_integral();
        let shape_error = |expected: &str| {
            DatabaseError::Syntax(format!("column {column} expects {expected}, got {value:?}"))
        };
        match kind {
            ColumnKind::References(_) => {
                let refs = value.references().ok_or_else(|| shape_error("references"))?;
                refs.iter()
                    .map(|id| self.resolve(id))
                    .collect::<DatabaseResult<RefSet>>()
                    .map(FieldValue::ReferenceSet)
            }
            ColumnKind::StringSet => {
                let mut items = value.strings().ok_or_else(|| shape_error("a string set"))?;
                items.sort();
                items.dedup();
                Ok(FieldValue::StringSet(items))
            }
            ColumnKind::Map => match &value {
                FieldValue::Map(_) => Ok(value.clone()),
                FieldValue::StringSet(items) if items.is_empty() => {
                    Ok(FieldValue::Map(BTreeMap::new()))
                }
                _ => Err(shape_error("a map")),
            },
            ColumnKind::String if value.as_str().is_some() => Ok(value.clone()),
            ColumnKind::Integer if value.as_integer().is_some() => Ok(value.clone()),
            ColumnKind::Boolean if value.as_bool().is_some() => Ok(value.clone()),
            ColumnKind::String => Err(shape_error("a string")),
            ColumnKind::Integer => Err(shape_error("an integer")),
            ColumnKind::Boolean => Err(shape_error("a boolean")),
        }
    }

    fn resolve(&self, id: &RowId) -> DatabaseResult<RowId> {
        if !id.is_named() {
            return Ok(id.clone());
        }
        self.names
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| DatabaseError::UnknownUuidName(id.as_str().to_string()))
    }

    fn resolve_value(&self, value: &FieldValue) -> DatabaseResult<FieldValue> {
        match value {
            FieldValue::Reference(id) => Ok(FieldValue::Reference(self.resolve(id)?)),
            FieldValue::ReferenceSet(set) => set
                .iter()
                .map(|id| self.resolve(id))
                .collect::<DatabaseResult<RefSet>>()
                .map(FieldValue::ReferenceSet),
            other => Ok(other.clone()),
        }
    }
}

fn apply_mutation(row: &mut Row, mutation: &Mutation, value: &FieldValue) -> DatabaseResult<()> {
    let current = row
        .get_mut(&mutation.column)
        .ok_or_else(|| DatabaseError::Syntax(format!("missing column {}", mutation.column)))?;
    match (current, value) {
        (FieldValue::ReferenceSet(set), FieldValue::ReferenceSet(delta)) => {
            for id in delta {
                match mutation.mutator {
                    Mutator::Insert => set.insert(id.clone()),
                    Mutator::Delete => set.remove(id),
                };
            }
        }
        (FieldValue::StringSet(items), FieldValue::StringSet(delta)) => {
            match mutation.mutator {
                Mutator::Insert => items.extend(delta.iter().cloned()),
                Mutator::Delete => items.retain(|item| !delta.contains(item)),
            }
            items.sort();
            items.dedup();
        }
        (FieldValue::Map(map), FieldValue::Map(delta)) => {
            for (key, wanted) in delta {
                match mutation.mutator {
                    Mutator::Insert => {
                        map.entry(key.clone()).or_insert_with(|| wanted.clone());
                    }
                    Mutator::Delete => {
                        if map.get(key) == Some(wanted) {
                            map.remove(key);
                        }
                    }
                }
            }
        }
        _ => {
            return Err(DatabaseError::Syntax(format!(
                "column {} cannot be mutated with {}",
                mutation.column,
                mutation.mutator.as_str()
            )))
        }
    }
    Ok(())
}

/// Every element (or pair) of `expected` is in `actual`.
fn includes(actual: &FieldValue, expected: &FieldValue) -> bool {
    if let (Some(have), Some(want)) = (actual.as_map(), expected.as_map()) {
        return want.iter().all(|(k, v)| have.get(k) == Some(v));
    }
    if let (Some(have), Some(want)) = (actual.references(), expected.references()) {
        return want.iter().all(|id| have.contains(id));
    }
    if let (Some(have), Some(want)) = (actual.strings(), expected.strings()) {
        return want.iter().all(|s| have.contains(s));
    }
    actual.equivalent(expected)
}

/// No element (or pair) of `expected` is in `actual`.
fn excludes(actual: &FieldValue, expected: &FieldValue) -> bool {
    if let (Some(have), Some(want)) = (actual.as_map(), expected.as_map()) {
        return !want.iter().any(|(k, v)| have.get(k) == Some(v));
    }
    if let (Some(have), Some(want)) = (actual.references(), expected.references()) {
        return !want.iter().any(|id| have.contains(id));
    }
    if let (Some(have), Some(want)) = (actual.strings(), expected.strings()) {
        return !want.iter().any(|s| have.contains(s));
    }
    !actual.equivalent(expected)
}
