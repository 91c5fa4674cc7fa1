//! Identifier substitution over whole subtrees.

use palfix_tree::{MapEntry, Scalar, StructValue, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Old id → new id table threaded through one clone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remap {
    table: BTreeMap<Uuid, Uuid>,
}

impl Remap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity pairs are ignored.
    pub fn insert(&mut self, from: Uuid, to: Uuid) {
        if from != to {
            self.table.insert(from, to);
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Uuid> {
        self.table.get(id).copied()
    }

    pub fn apply(&self, id: Uuid) -> Uuid {
        self.get(&id).unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Deep clone of `node` with every UUID scalar passed through `remap`.
pub fn clone_with_remap(node: &Value, remap: &Remap) -> Value {
    match node {
        Value::Scalar(Scalar::Uuid(id)) => Value::uuid(remap.apply(*id)),
        Value::Scalar(scalar) => Value::Scalar(scalar.clone()),
        Value::Struct(inner) => Value::Struct(StructValue {
            type_name: inner.type_name.clone(),
            fields: inner
                .fields
                .iter()
                .map(|(name, child)| (name.clone(), clone_with_remap(child, remap)))
                .collect(),
        }),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|child| clone_with_remap(child, remap))
                .collect(),
        ),
        Value::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|entry| clone_entry_with_remap(entry, remap))
                .collect(),
        ),
    }
}

pub fn clone_entry_with_remap(entry: &MapEntry, remap: &Remap) -> MapEntry {
    MapEntry {
        key: clone_with_remap(&entry.key, remap),
        value: clone_with_remap(&entry.value, remap),
    }
}

pub fn clone_struct_with_remap(node: &StructValue, remap: &Remap) -> StructValue {
    StructValue {
        type_name: node.type_name.clone(),
        fields: node
            .fields
            .iter()
            .map(|(name, child)| (name.clone(), clone_with_remap(child, remap)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn substitutes_every_occurrence_including_map_keys() {
        let mut remap = Remap::new();
        remap.insert(id(1), id(100));

        let node = Value::Map(vec![MapEntry::new(
            Value::record(vec![("ID", Value::uuid(id(1)))]),
            Value::record(vec![
                ("Owner", Value::uuid(id(1))),
                ("Other", Value::uuid(id(2))),
                ("History", Value::Array(vec![Value::uuid(id(1)), Value::str("x")])),
            ]),
        )]);

        let cloned = clone_with_remap(&node, &remap);
        let entry = &cloned.as_map().expect("map")[0];
        assert_eq!(entry.key.uuid_at(&["ID"]).expect("key id"), id(100));
        assert_eq!(entry.value.uuid_at(&["Owner"]).expect("owner"), id(100));
        assert_eq!(entry.value.uuid_at(&["Other"]).expect("other"), id(2));
        let history = entry.value.array_at(&["History"]).expect("history");
        assert_eq!(history[0], Value::uuid(id(100)));
        assert_eq!(history[1], Value::str("x"));
    }

    #[test]
    fn source_is_left_untouched() {
        let mut remap = Remap::new();
        remap.insert(id(1), id(2));
        let node = Value::typed_record(Some("Guid"), vec![("ID", Value::uuid(id(1)))]);
        let cloned = clone_with_remap(&node, &remap);
        assert_eq!(node.uuid_at(&["ID"]).expect("id"), id(1));
        assert_eq!(cloned.type_name(), Some("Guid"));
    }

    #[test]
    fn identity_pairs_are_not_recorded() {
        let mut remap = Remap::new();
        remap.insert(id(5), id(5));
        assert!(remap.is_empty());
        assert_eq!(remap.apply(id(5)), id(5));
    }
}
