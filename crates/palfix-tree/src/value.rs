//! Closed value tree for decoded save documents.
//!
//! Every node is one of four variants. Structs keep their fields in declared
//! order and may carry the declared type name the codec read from the save.
//!
//! ```text
//! Value
//!   ├─ Scalar(Bool | Int | Float | Str | Uuid)
//!   ├─ Struct { type_name?, fields: [(name, Value)] }
//!   ├─ Array [Value]
//!   └─ Map [{ key: Value, value: Value }]
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors raised by typed accessors when the tree does not have the
/// expected shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("structural mismatch at `{path}`: expected {expected}, found {found}")]
    StructuralMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("structural mismatch: missing field `{path}`")]
    MissingField { path: String },
}

impl TreeError {
    fn mismatch(path: &[&str], expected: &'static str, found: &Value) -> Self {
        Self::StructuralMismatch {
            path: join_path(path),
            expected,
            found: found.kind(),
        }
    }

    fn missing(path: &[&str]) -> Self {
        Self::MissingField {
            path: join_path(path),
        }
    }
}

fn join_path(path: &[&str]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}

/// Leaf value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Uuid(Uuid),
}

/// Ordered struct node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructValue {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub fields: Vec<(String, Value)>,
}

impl StructValue {
    pub fn new(type_name: Option<&str>) -> Self {
        Self {
            type_name: type_name.map(str::to_string),
            fields: Vec::new(),
        }
    }

    /// Builder-style insert used by fixtures and synthesized records.
    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.set(name, value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Insert or replace a field. Replacement keeps the field's position.
    pub fn set(&mut self, name: &str, value: Value) {
        match self.field_mut(name) {
            Some(slot) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let position = self.fields.iter().position(|(key, _)| key == name)?;
        Some(self.fields.remove(position).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

/// One entry of a keyed collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapEntry {
    pub key: Value,
    pub value: Value,
}

impl MapEntry {
    pub fn new(key: Value, value: Value) -> Self {
        Self { key, value }
    }
}

/// A node of the decoded document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Scalar(Scalar),
    Struct(StructValue),
    Array(Vec<Value>),
    Map(Vec<MapEntry>),
}

impl Value {
    pub fn uuid(id: Uuid) -> Self {
        Value::Scalar(Scalar::Uuid(id))
    }

    pub fn str(text: impl Into<String>) -> Self {
        Value::Scalar(Scalar::Str(text.into()))
    }

    pub fn int(number: i64) -> Self {
        Value::Scalar(Scalar::Int(number))
    }

    pub fn bool(flag: bool) -> Self {
        Value::Scalar(Scalar::Bool(flag))
    }

    pub fn float(number: f64) -> Self {
        Value::Scalar(Scalar::Float(number))
    }

    /// An untyped struct with the given fields, in order.
    pub fn record(fields: Vec<(&str, Value)>) -> Self {
        Self::typed_record(None, fields)
    }

    pub fn typed_record(type_name: Option<&str>, fields: Vec<(&str, Value)>) -> Self {
        let mut node = StructValue::new(type_name);
        for (name, value) in fields {
            node.set(name, value);
        }
        Value::Struct(node)
    }

    /// Short variant name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(Scalar::Bool(_)) => "bool",
            Value::Scalar(Scalar::Int(_)) => "int",
            Value::Scalar(Scalar::Float(_)) => "float",
            Value::Scalar(Scalar::Str(_)) => "string",
            Value::Scalar(Scalar::Uuid(_)) => "uuid",
            Value::Struct(_) => "struct",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        match self {
            Value::Struct(node) => node.type_name.as_deref(),
            _ => None,
        }
    }

    /// Optional field lookup. Non-struct nodes have no fields.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(node) => node.field(name),
            _ => None,
        }
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Value> {
        match self {
            Value::Struct(node) => node.field_mut(name),
            _ => None,
        }
    }

    /// Optional nested lookup; `None` as soon as any segment is absent.
    pub fn field_path(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(self, |node, name| node.field(name))
    }

    /// Required nested lookup.
    pub fn at_path(&self, path: &[&str]) -> Result<&Value, TreeError> {
        let mut node = self;
        for (depth, name) in path.iter().enumerate() {
            let Value::Struct(inner) = node else {
                return Err(TreeError::mismatch(&path[..depth], "struct", node));
            };
            node = inner
                .field(name)
                .ok_or_else(|| TreeError::missing(&path[..=depth]))?;
        }
        Ok(node)
    }

    pub fn at_path_mut(&mut self, path: &[&str]) -> Result<&mut Value, TreeError> {
        let mut node = self;
        for (depth, name) in path.iter().enumerate() {
            let found = node.kind();
            let Value::Struct(inner) = node else {
                return Err(TreeError::StructuralMismatch {
                    path: join_path(&path[..depth]),
                    expected: "struct",
                    found,
                });
            };
            node = inner
                .field_mut(name)
                .ok_or_else(|| TreeError::missing(&path[..=depth]))?;
        }
        Ok(node)
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_struct_mut(&mut self) -> Option<&mut StructValue> {
        match self {
            Value::Struct(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Scalar(Scalar::Uuid(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::Str(text)) => Some(text),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Scalar(Scalar::Int(number)) => Some(*number),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Vec<MapEntry>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Vec<MapEntry>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn uuid_at(&self, path: &[&str]) -> Result<Uuid, TreeError> {
        let node = self.at_path(path)?;
        node.as_uuid()
            .ok_or_else(|| TreeError::mismatch(path, "uuid", node))
    }

    pub fn str_at(&self, path: &[&str]) -> Result<&str, TreeError> {
        let node = self.at_path(path)?;
        node.as_str()
            .ok_or_else(|| TreeError::mismatch(path, "string", node))
    }

    pub fn int_at(&self, path: &[&str]) -> Result<i64, TreeError> {
        let node = self.at_path(path)?;
        node.as_int()
            .ok_or_else(|| TreeError::mismatch(path, "int", node))
    }

    pub fn array_at(&self, path: &[&str]) -> Result<&Vec<Value>, TreeError> {
        let node = self.at_path(path)?;
        node.as_array()
            .ok_or_else(|| TreeError::mismatch(path, "array", node))
    }

    pub fn array_at_mut(&mut self, path: &[&str]) -> Result<&mut Vec<Value>, TreeError> {
        let node = self.at_path_mut(path)?;
        let found = node.kind();
        node.as_array_mut()
            .ok_or_else(|| TreeError::StructuralMismatch {
                path: join_path(path),
                expected: "array",
                found,
            })
    }

    pub fn map_at(&self, path: &[&str]) -> Result<&Vec<MapEntry>, TreeError> {
        let node = self.at_path(path)?;
        node.as_map()
            .ok_or_else(|| TreeError::mismatch(path, "map", node))
    }

    pub fn map_at_mut(&mut self, path: &[&str]) -> Result<&mut Vec<MapEntry>, TreeError> {
        let node = self.at_path_mut(path)?;
        let found = node.kind();
        node.as_map_mut()
            .ok_or_else(|| TreeError::StructuralMismatch {
                path: join_path(path),
                expected: "map",
                found,
            })
    }

    /// Replace (or insert) the value at `path`. Every parent must already
    /// exist and be a struct.
    pub fn set_at(&mut self, path: &[&str], value: Value) -> Result<(), TreeError> {
        let Some((last, parents)) = path.split_last() else {
            *self = value;
            return Ok(());
        };
        let parent = self.at_path_mut(parents)?;
        let found = parent.kind();
        match parent.as_struct_mut() {
            Some(node) => {
                node.set(last, value);
                Ok(())
            }
            None => Err(TreeError::StructuralMismatch {
                path: join_path(parents),
                expected: "struct",
                found,
            }),
        }
    }
}
