//! Transaction operations and their results.

use crate::error::{ProtocolError, ProtocolResult};
use crate::value::{FieldValue, Row, RowId};
use serde::de::{value::Error as NameError, IntoDeserializer};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};

/// Kind of database operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    /// Insert a new row.
    Insert,
    /// Delete rows matching the conditions.
    Delete,
    /// Overwrite columns of rows matching the conditions.
    Update,
    /// Apply mutations to rows matching the conditions.
    Mutate,
    /// Read rows matching the conditions.
    Select,
}

impl OpKind {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Insert => "insert",
            OpKind::Delete => "delete",
            OpKind::Update => "update",
            OpKind::Mutate => "mutate",
            OpKind::Select => "select",
        }
    }

    /// Parses a wire name.
    pub fn from_name(name: &str) -> ProtocolResult<Self> {
        Self::deserialize(name.into_deserializer())
            .map_err(|_: NameError| ProtocolError::UnknownOperation(name.to_string()))
    }
}

/// Comparison used in a `where` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Function {
    /// Column equals value.
    #[serde(rename = "==")]
    Equal,
    /// Column differs from value.
    #[serde(rename = "!=")]
    NotEqual,
    /// Column (a set or map) includes value.
    #[serde(rename = "includes")]
    Includes,
    /// Column (a set or map) excludes value.
    #[serde(rename = "excludes")]
    Excludes,
}

impl Function {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Function::Equal => "==",
            Function::NotEqual => "!=",
            Function::Includes => "includes",
            Function::Excludes => "excludes",
        }
    }

    fn from_name(name: &str) -> ProtocolResult<Self> {
        Self::deserialize(name.into_deserializer()).map_err(|_: NameError| {
            ProtocolError::invalid_notation(format!("unknown function {name}"))
        })
    }
}

/// One clause of a `where` filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column name.
    pub column: String,
    /// Comparison.
    pub function: Function,
    /// Value compared against.
    pub value: FieldValue,
}

impl Condition {
    /// `column == value`.
    pub fn equals(column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            column: column.into(),
            function: Function::Equal,
            value: value.into(),
        }
    }

    /// `column != value`.
    pub fn not_equals(column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            column: column.into(),
            function: Function::NotEqual,
            value: value.into(),
        }
    }

    /// `column includes value`.
    pub fn includes(column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            column: column.into(),
            function: Function::Includes,
            value: value.into(),
        }
    }

    /// Encodes as `[column, function, value]`.
    pub fn to_json(&self) -> Json {
        json!([self.column, self.function, self.value.to_json()])
    }

    /// Decodes from `[column, function, value]`.
    pub fn from_json(value: &Json) -> ProtocolResult<Self> {
        match value.as_array().map(Vec::as_slice) {
            Some([Json::String(column), Json::String(function), operand]) => Ok(Self {
                column: column.clone(),
                function: Function::from_name(function)?,
                value: FieldValue::from_json(operand)?,
            }),
            _ => Err(ProtocolError::invalid_notation(format!(
                "condition must be [column, function, value], got {value}"
            ))),
        }
    }
}

/// How a mutation changes a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutator {
    /// Add elements to a set or pairs to a map. Existing map keys are kept.
    Insert,
    /// Remove elements from a set, or keys (or matching pairs) from a map.
    Delete,
}

impl Mutator {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mutator::Insert => "insert",
            Mutator::Delete => "delete",
        }
    }

    fn from_name(name: &str) -> ProtocolResult<Self> {
        Self::deserialize(name.into_deserializer())
            .map_err(|_: NameError| ProtocolError::unsupported_value(format!("mutator {name}")))
    }
}

/// One mutation of a `mutate` operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// Column name.
    pub column: String,
    /// Mutator.
    pub mutator: Mutator,
    /// Operand.
    pub value: FieldValue,
}

impl Mutation {
    /// Creates an insert mutation.
    pub fn insert(column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            column: column.into(),
            mutator: Mutator::Insert,
            value: value.into(),
        }
    }

    /// Creates a delete mutation.
    pub fn delete(column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            column: column.into(),
            mutator: Mutator::Delete,
            value: value.into(),
        }
    }

    /// Encodes as `[column, mutator, value]`.
    pub fn to_json(&self) -> Json {
        json!([self.column, self.mutator, self.value.to_json()])
    }

    /// Decodes from `[column, mutator, value]`.
    pub fn from_json(value: &Json) -> ProtocolResult<Self> {
        match value.as_array().map(Vec::as_slice) {
            Some([Json::String(column), Json::String(mutator), operand]) => Ok(Self {
                column: column.clone(),
                mutator: Mutator::from_name(mutator)?,
                value: FieldValue::from_json(operand)?,
            }),
            _ => Err(ProtocolError::invalid_notation(format!(
                "mutation must be [column, mutator, value], got {value}"
            ))),
        }
    }
}

/// One operation of a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Operation kind.
    pub op: OpKind,
    /// Target table.
    pub table: String,
    /// Row payload (insert, update).
    pub row: Option<Row>,
    /// Filter (delete, update, mutate, select).
    pub conditions: Vec<Condition>,
    /// Mutations (mutate).
    pub mutations: Vec<Mutation>,
    /// Placeholder name for an inserted row.
    pub uuid_name: Option<String>,
}

impl Operation {
    fn bare(op: OpKind, table: impl Into<String>) -> Self {
        Self {
            op,
            table: table.into(),
            row: None,
            conditions: Vec::new(),
            mutations: Vec::new(),
            uuid_name: None,
        }
    }

    /// Creates an insert.
    pub fn insert(table: impl Into<String>, row: Row) -> Self {
        let mut op = Self::bare(OpKind::Insert, table);
        op.row = Some(row);
        op
    }

    /// Creates a delete. Add conditions with [`Operation::filter`].
    pub fn delete(table: impl Into<String>) -> Self {
        Self::bare(OpKind::Delete, table)
    }

    /// Creates an update.
    pub fn update(table: impl Into<String>, row: Row) -> Self {
        let mut op = Self::bare(OpKind::Update, table);
        op.row = Some(row);
        op
    }

    /// Creates a mutate. Add mutations with [`Operation::mutation`].
    pub fn mutate(table: impl Into<String>) -> Self {
        Self::bare(OpKind::Mutate, table)
    }

    /// Creates a select.
    pub fn select(table: impl Into<String>) -> Self {
        Self::bare(OpKind::Select, table)
    }

    /// Adds a `where` clause.
    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Adds a mutation.
    #[must_use]
    pub fn mutation(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    /// Names the inserted row so later operations can reference it.
    ///
    /// Only placeholder ids carry a name; a server id is ignored.
    #[must_use]
    pub fn with_uuid_name(mut self, id: &RowId) -> Self {
        if id.is_named() {
            self.uuid_name = Some(id.as_str().to_string());
        }
        self
    }

    /// Encodes as an RFC 7047 operation object.
    pub fn to_json(&self) -> Json {
        let mut object = serde_json::Map::new();
        object.insert("op".into(), json!(self.op));
        object.insert("table".into(), json!(self.table));
        if let Some(row) = &self.row {
            object.insert("row".into(), row.to_json());
        }
        if self.op != OpKind::Insert {
            let conditions: Vec<Json> = self.conditions.iter().map(Condition::to_json).collect();
            object.insert("where".into(), Json::Array(conditions));
        }
        if self.op == OpKind::Mutate {
            let mutations: Vec<Json> = self.mutations.iter().map(Mutation::to_json).collect();
            object.insert("mutations".into(), Json::Array(mutations));
        }
        if let Some(name) = &self.uuid_name {
            object.insert("uuid-name".into(), json!(name));
        }
        Json::Object(object)
    }

    /// Decodes an RFC 7047 operation object.
    pub fn from_json(value: &Json) -> ProtocolResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| ProtocolError::invalid_notation("operation must be an object"))?;

        let op = object
            .get("op")
            .and_then(Json::as_str)
            .ok_or_else(|| ProtocolError::missing_field("op"))
            .and_then(OpKind::from_name)?;
        let table = object
            .get("table")
            .and_then(Json::as_str)
            .ok_or_else(|| ProtocolError::missing_field("table"))?;

        let mut operation = Self::bare(op, table);
        if let Some(row) = object.get("row") {
            operation.row = Some(Row::from_json(row)?);
        }
        if let Some(conditions) = object.get("where").and_then(Json::as_array) {
            operation.conditions = conditions
                .iter()
                .map(Condition::from_json)
                .collect::<ProtocolResult<_>>()?;
        }
        if let Some(mutations) = object.get("mutations").and_then(Json::as_array) {
            operation.mutations = mutations
                .iter()
                .map(Mutation::from_json)
                .collect::<ProtocolResult<_>>()?;
        }
        operation.uuid_name = object
            .get("uuid-name")
            .and_then(Json::as_str)
            .map(str::to_string);
        Ok(operation)
    }
}

/// Builds the `params` array of a `transact` request.
pub fn transact_params(database: &str, operations: &[Operation]) -> Json {
    let mut params = Vec::with_capacity(operations.len() + 1);
    params.push(json!(database));
    params.extend(operations.iter().map(Operation::to_json));
    Json::Array(params)
}

/// Result of one operation, in reply order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationResult {
    /// Id of the inserted row.
    pub uuid: Option<RowId>,
    /// Number of rows affected.
    pub count: Option<u64>,
    /// Rows returned by a select.
    pub rows: Vec<Row>,
    /// Error name, if the operation failed.
    pub error: Option<String>,
    /// Error details.
    pub details: Option<String>,
}

impl OperationResult {
    /// Result of a successful insert.
    pub fn inserted(uuid: RowId) -> Self {
        Self {
            uuid: Some(uuid),
            ..Self::default()
        }
    }

    /// Result of a successful delete, update or mutate.
    pub fn counted(count: u64) -> Self {
        Self {
            count: Some(count),
            ..Self::default()
        }
    }

    /// Result of a successful select.
    pub fn selected(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// A failed operation.
    pub fn error(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            details: Some(details.into()),
            ..Self::default()
        }
    }

    /// Returns true if this result reports an error.
    pub fn is_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// Decodes one element of a `transact` reply.
    ///
    /// A JSON `null` (used by servers for operations skipped after an
    /// earlier failure) decodes as an empty result.
    pub fn from_json(value: &Json) -> ProtocolResult<Self> {
        let object = match value {
            Json::Null => return Ok(Self::default()),
            Json::Object(object) => object,
            other => {
                return Err(ProtocolError::invalid_notation(format!(
                    "operation result must be an object, got {other}"
                )))
            }
        };

        let uuid = match object.get("uuid") {
            Some(raw) => Some(RowId::from_json(raw).ok_or_else(|| {
                ProtocolError::invalid_notation(format!("bad uuid in result: {raw}"))
            })?),
            None => None,
        };
        let rows = match object.get("rows").and_then(Json::as_array) {
            Some(rows) => rows
                .iter()
                .map(Row::from_json)
                .collect::<ProtocolResult<_>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            uuid,
            count: object.get("count").and_then(Json::as_u64),
            rows,
            error: object
                .get("error")
                .and_then(Json::as_str)
                .map(str::to_string),
            details: object
                .get("details")
                .and_then(Json::as_str)
                .map(str::to_string),
        })
    }

    /// Encodes as a reply element.
    pub fn to_json(&self) -> Json {
        let mut object = serde_json::Map::new();
        if let Some(uuid) = &self.uuid {
            object.insert("uuid".into(), uuid.to_json());
        }
        if let Some(count) = self.count {
            object.insert("count".into(), json!(count));
        }
        if !self.rows.is_empty() {
            let rows: Vec<Json> = self.rows.iter().map(Row::to_json).collect();
            object.insert("rows".into(), Json::Array(rows));
        }
        if let Some(error) = &self.error {
            object.insert("error".into(), json!(error));
        }
        if let Some(details) = &self.details {
            object.insert("details".into(), json!(details));
        }
        Json::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RefSet;

    #[test]
    fn insert_then_mutate_wire_shape() {
        let placeholder = RowId::named("lsp_add_1");
        let insert = Operation::insert("Logical_Switch_Port", Row::new().with("name", "p1"))
            .with_uuid_name(&placeholder);
        let mutate = Operation::mutate("Logical_Switch")
            .filter(Condition::equals("name", "ls1"))
            .mutation(Mutation::insert("ports", RefSet::single(placeholder.clone())));

        let params = transact_params("OVN_Northbound", &[insert, mutate]);
        assert_eq!(params[0], "OVN_Northbound");
        assert_eq!(params[1]["op"], "insert");
        assert_eq!(params[1]["uuid-name"], "lsp_add_1");
        assert!(params[1].get("where").is_none());
        assert_eq!(params[2]["where"], json!([["name", "==", "ls1"]]));
        assert_eq!(
            params[2]["mutations"],
            json!([["ports", "insert", ["set", [["named-uuid", "lsp_add_1"]]]]])
        );
    }

    #[test]
    fn server_ids_never_become_uuid_names() {
        let op = Operation::insert("ACL", Row::new()).with_uuid_name(&RowId::new("abc"));
        assert!(op.uuid_name.is_none());
    }

    #[test]
    fn operation_decodes_from_json() {
        let raw = json!({
            "op": "delete",
            "table": "ACL",
            "where": [["_uuid", "==", ["uuid", "u-1"]]]
        });
        let op = Operation::from_json(&raw).unwrap();
        assert_eq!(op.op, OpKind::Delete);
        assert_eq!(op.conditions.len(), 1);
        assert_eq!(op.conditions[0].value, FieldValue::Reference(RowId::new("u-1")));

        assert!(Operation::from_json(&json!({"op": "wait", "table": "ACL"})).is_err());
        assert!(Operation::from_json(&json!({"table": "ACL"})).is_err());
    }

    #[test]
    fn result_errors() {
        let ok = OperationResult::from_json(&json!({"uuid": ["uuid", "u-9"]})).unwrap();
        assert!(!ok.is_error());
        assert_eq!(ok.uuid, Some(RowId::new("u-9")));

        let failed = OperationResult::from_json(
            &json!({"error": "constraint violation", "details": "duplicate name"}),
        )
        .unwrap();
        assert!(failed.is_error());
        assert_eq!(failed.details.as_deref(), Some("duplicate name"));

        let skipped = OperationResult::from_json(&Json::Null).unwrap();
        assert!(!skipped.is_error());
    }

    #[test]
    fn serde_names_match_wire_names() {
        for op in [OpKind::Insert, OpKind::Delete, OpKind::Update, OpKind::Mutate, OpKind::Select] {
            assert_eq!(serde_json::to_value(op).unwrap(), op.as_str());
            assert_eq!(OpKind::from_name(op.as_str()).unwrap(), op);
        }
        for function in [Function::Equal, Function::NotEqual, Function::Includes, Function::Excludes] {
            assert_eq!(serde_json::to_value(function).unwrap(), function.as_str());
            assert_eq!(Function::from_name(function.as_str()).unwrap(), function);
        }
        for mutator in [Mutator::Insert, Mutator::Delete] {
            assert_eq!(serde_json::to_value(mutator).unwrap(), mutator.as_str());
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(matches!(
            OpKind::from_name("wait"),
            Err(ProtocolError::UnknownOperation(name)) if name == "wait"
        ));
        assert!(Condition::from_json(&json!(["name", "<=", "x"])).is_err());
        assert!(Mutation::from_json(&json!(["ports", "sum", ["set", []]])).is_err());
    }
}
