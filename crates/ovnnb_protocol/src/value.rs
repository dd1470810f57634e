//! Row and field values in OVSDB notation.
//!
//! OVSDB encodes a column holding zero or one element as the bare atom and a
//! column holding several elements as `["set", [...]]`. This module keeps the
//! wire shape visible in [`FieldValue`] but offers accessors
//! ([`FieldValue::references`], [`FieldValue::strings`]) that collapse both
//! shapes, so readers never branch on cardinality.

use crate::error::{ProtocolError, ProtocolResult};
use serde_json::{json, Value as Json};
use std::collections::{btree_map, btree_set, BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Identifier of a row within its table.
///
/// A row id is either assigned by the server (`["uuid", ...]`) or a
/// placeholder name (`["named-uuid", ...]`) that is only meaningful inside
/// the transaction that declares it.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId {
    id: String,
    named: bool,
}

impl RowId {
    /// Creates a server-assigned row id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            named: false,
        }
    }

    /// Creates a placeholder row id from an explicit name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: name.into(),
            named: true,
        }
    }

    /// Generates a fresh placeholder name starting with `prefix`.
    ///
    /// The suffix comes from a random v4 UUID, so two placeholders never
    /// collide, even across transactions.
    pub fn placeholder(prefix: &str) -> Self {
        Self::named(format!("{}_{}", prefix, Uuid::new_v4().simple()))
    }

    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.id
    }

    /// Returns true if this is a transaction-scoped placeholder.
    pub fn is_named(&self) -> bool {
        self.named
    }

    /// Encodes to `["uuid", id]` or `["named-uuid", name]`.
    pub fn to_json(&self) -> Json {
        let tag = if self.named { "named-uuid" } else { "uuid" };
        json!([tag, self.id])
    }

    /// Decodes a `uuid` or `named-uuid` pair, returning `None` for any
    /// other JSON.
    pub fn from_json(value: &Json) -> Option<Self> {
        let pair = value.as_array()?;
        if pair.len() != 2 {
            return None;
        }
        let id = pair[1].as_str()?;
        match pair[0].as_str()? {
            "uuid" => Some(Self::new(id)),
            "named-uuid" => Some(Self::named(id)),
            _ => None,
        }
    }
}

impl fmt::Debug for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.named {
            write!(f, "RowId(named:{})", self.id)
        } else {
            write!(f, "RowId({})", self.id)
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl From<&str> for RowId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RowId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Ordered set of row references.
///
/// Both wire shapes of a relationship column end up here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RefSet(BTreeSet<RowId>);

impl RefSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Creates a set holding one reference.
    pub fn single(id: RowId) -> Self {
        let mut set = Self::new();
        set.insert(id);
        set
    }

    /// Adds a reference. Returns false if it was already present.
    pub fn insert(&mut self, id: RowId) -> bool {
        self.0.insert(id)
    }

    /// Removes a reference. Returns true if it was present.
    pub fn remove(&mut self, id: &RowId) -> bool {
        self.0.remove(id)
    }

    /// Returns true if the set contains `id`.
    pub fn contains(&self, id: &RowId) -> bool {
        self.0.contains(id)
    }

    /// Number of references.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in order.
    pub fn iter(&self) -> btree_set::Iter<'_, RowId> {
        self.0.iter()
    }
}

impl FromIterator<RowId> for RefSet {
    fn from_iter<I: IntoIterator<Item = RowId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for RefSet {
    type Item = RowId;
    type IntoIter = btree_set::IntoIter<RowId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a RefSet {
    type Item = &'a RowId;
    type IntoIter = btree_set::Iter<'a, RowId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The value of one column in a row.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A string atom.
    String(String),
    /// An integer atom.
    Integer(i64),
    /// A real atom. Integral reals are rewritten to `Integer` when rows
    /// enter the cache.
    Real(f64),
    /// A boolean atom.
    Boolean(bool),
    /// A single reference (bare wire shape).
    Reference(RowId),
    /// A set of references (set wire shape).
    ReferenceSet(RefSet),
    /// A set of scalar atoms, kept as strings.
    StringSet(Vec<String>),
    /// A string to string map.
    Map(BTreeMap<String, String>),
}

impl FieldValue {
    /// Returns the string if this is a string atom.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is an integer atom.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean if this is a boolean atom.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the map if this is a map.
    pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            FieldValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Collapses a relationship column to a reference set.
    ///
    /// A bare reference and a one-element set produce the same result. An
    /// empty set decodes as an empty `StringSet` on the wire, so that shape
    /// is accepted as an empty reference set too.
    pub fn references(&self) -> Option<RefSet> {
        match self {
            FieldValue::Reference(id) => Some(RefSet::single(id.clone())),
            FieldValue::ReferenceSet(set) => Some(set.clone()),
            FieldValue::StringSet(v) if v.is_empty() => Some(RefSet::new()),
            _ => None,
        }
    }

    /// Collapses a string column to a sequence of strings.
    ///
    /// A bare string and a one-element set produce the same result.
    pub fn strings(&self) -> Option<Vec<String>> {
        match self {
            FieldValue::String(s) => Some(vec![s.clone()]),
            FieldValue::StringSet(v) => Some(v.clone()),
            FieldValue::ReferenceSet(set) if set.is_empty() => Some(Vec::new()),
            _ => None,
        }
    }

    /// Compares two values modulo wire shape.
    ///
    /// Values are equivalent when they are equal, or when both collapse to
    /// the same reference set, or both collapse to the same string
    /// sequence, or an integer equals an integral real.
    pub fn equivalent(&self, other: &FieldValue) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (FieldValue::Integer(n), FieldValue::Real(r))
            | (FieldValue::Real(r), FieldValue::Integer(n)) => *r == *n as f64,
            _ => {
                if let (Some(a), Some(b)) = (self.references(), other.references()) {
                    return a == b;
                }
                if let (Some(mut a), Some(mut b)) = (self.strings(), other.strings()) {
                    a.sort();
                    b.sort();
                    return a == b;
                }
                false
            }
        }
    }

    /// Rewrites an integral real as an integer in place.
    ///
    /// JSON decoders report `5.0` as a real; typed accessors downstream
    /// assume integer semantics for such columns.
    pub fn normalize_integral(&mut self) {
        if let FieldValue::Real(r) = *self {
            if r.is_finite() && r.fract() == 0.0 && r >= i64::MIN as f64 && r <= i64::MAX as f64 {
                *self = FieldValue::Integer(r as i64);
            }
        }
    }

    /// Encodes in OVSDB notation.
    pub fn to_json(&self) -> Json {
        match self {
            FieldValue::String(s) => json!(s),
            FieldValue::Integer(n) => json!(n),
            FieldValue::Real(r) => json!(r),
            FieldValue::Boolean(b) => json!(b),
            FieldValue::Reference(id) => id.to_json(),
            FieldValue::ReferenceSet(set) => {
                let ids: Vec<Json> = set.iter().map(RowId::to_json).collect();
                json!(["set", ids])
            }
            FieldValue::StringSet(v) => json!(["set", v]),
            FieldValue::Map(m) => {
                let pairs: Vec<Json> = m.iter().map(|(k, v)| json!([k, v])).collect();
                json!(["map", pairs])
            }
        }
    }

    /// Decodes from OVSDB notation.
    ///
    /// Sets whose members are all references become `ReferenceSet`; any
    /// other set becomes a `StringSet` with scalar members rendered as
    /// text. Map keys and values are rendered the same way.
    pub fn from_json(value: &Json) -> ProtocolResult<Self> {
        match value {
            Json::String(s) => Ok(FieldValue::String(s.clone())),
            Json::Bool(b) => Ok(FieldValue::Boolean(*b)),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Ok(FieldValue::Integer(i)),
                None => n.as_f64().map(FieldValue::Real).ok_or_else(|| {
                    ProtocolError::unsupported_value(format!("number {n}"))
                }),
            },
            Json::Array(items) => {
                if let Some(id) = RowId::from_json(value) {
                    return Ok(FieldValue::Reference(id));
                }
                let (tag, body) = match items.as_slice() {
                    [Json::String(tag), body] => (tag.as_str(), body),
                    _ => {
                        return Err(ProtocolError::invalid_notation(format!(
                            "expected tagged pair, got {value}"
                        )))
                    }
                };
                let members = body.as_array().ok_or_else(|| {
                    ProtocolError::invalid_notation(format!("{tag} body must be an array"))
                })?;
                match tag {
                    "set" => Self::decode_set(members),
                    "map" => Self::decode_map(members),
                    other => Err(ProtocolError::invalid_notation(format!(
                        "unknown tag {other}"
                    ))),
                }
            }
            Json::Null | Json::Object(_) => Err(ProtocolError::invalid_notation(format!(
                "unexpected value {value}"
            ))),
        }
    }

    fn decode_set(members: &[Json]) -> ProtocolResult<Self> {
        if members.is_empty() {
            return Ok(FieldValue::StringSet(Vec::new()));
        }
        let refs: Option<RefSet> = members.iter().map(RowId::from_json).collect();
        if let Some(refs) = refs {
            return Ok(FieldValue::ReferenceSet(refs));
        }
        members
            .iter()
            .map(atom_to_string)
            .collect::<ProtocolResult<Vec<_>>>()
            .map(FieldValue::StringSet)
    }

    fn decode_map(members: &[Json]) -> ProtocolResult<Self> {
        let mut map = BTreeMap::new();
        for pair in members {
            match pair.as_array().map(Vec::as_slice) {
                Some([k, v]) => {
                    map.insert(atom_to_string(k)?, atom_to_string(v)?);
                }
                _ => {
                    return Err(ProtocolError::invalid_notation(format!(
                        "map entry must be a pair, got {pair}"
                    )))
                }
            }
        }
        Ok(FieldValue::Map(map))
    }
}

fn atom_to_string(atom: &Json) -> ProtocolResult<String> {
    match atom {
        Json::String(s) => Ok(s.clone()),
        Json::Number(n) => Ok(n.to_string()),
        Json::Bool(b) => Ok(b.to_string()),
        other => RowId::from_json(other)
            .map(|id| id.as_str().to_string())
            .ok_or_else(|| ProtocolError::unsupported_value(format!("atom {other}"))),
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl From<RowId> for FieldValue {
    fn from(id: RowId) -> Self {
        FieldValue::Reference(id)
    }
}

impl From<RefSet> for FieldValue {
    fn from(set: RefSet) -> Self {
        FieldValue::ReferenceSet(set)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(v: Vec<String>) -> Self {
        FieldValue::StringSet(v)
    }
}

impl From<BTreeMap<String, String>> for FieldValue {
    fn from(m: BTreeMap<String, String>) -> Self {
        FieldValue::Map(m)
    }
}

/// A row: column name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(BTreeMap<String, FieldValue>);

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    /// Sets a column, returning the previous value.
    pub fn insert(
        &mut self,
        column: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        self.0.insert(column.into(), value.into())
    }

    /// Returns a column value.
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.0.get(column)
    }

    /// Returns a mutable column value.
    pub fn get_mut(&mut self, column: &str) -> Option<&mut FieldValue> {
        self.0.get_mut(column)
    }

    /// Removes a column.
    pub fn remove(&mut self, column: &str) -> Option<FieldValue> {
        self.0.remove(column)
    }

    /// Returns true if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates columns in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, FieldValue> {
        self.0.iter()
    }

    /// Rewrites every integral real column as an integer.
    pub fn normalize_integral(&mut self) {
        for value in self.0.values_mut() {
            value.normalize_integral();
        }
    }

    /// Encodes as a JSON object.
    pub fn to_json(&self) -> Json {
        let object: serde_json::Map<String, Json> = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        Json::Object(object)
    }

    /// Decodes from a JSON object.
    pub fn from_json(value: &Json) -> ProtocolResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| ProtocolError::invalid_notation("row must be an object"))?;
        object
            .iter()
            .map(|(k, v)| -> ProtocolResult<(String, FieldValue)> {
                Ok((k.clone(), FieldValue::from_json(v)?))
            })
            .collect()
    }
}

impl FromIterator<(String, FieldValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = btree_map::Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
