//! Ad-hoc search over the whole tree: where does a key occur, where does a
//! value occur, and what sits at a given path.
//!
//! Paths use `->` between struct fields and `[n]` for array items and map
//! entries, with `->key` / `->value` selecting a side of a map entry:
//! `worldSaveData->CharacterSaveParameterMap[0]->key->PlayerUId`.
//! `resolve_path` accepts that form and also `.` as the field separator.

use crate::error::SessionError;
use crate::events::{Event, EventKind};
use crate::session::WorldSession;
use palfix_tree::{Document, MapEntry, Scalar, StructValue, Value};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueScan {
    pub found: bool,
    pub paths: Vec<String>,
}

/// A search term, tried as text, UUID, integer, and boolean.
#[derive(Debug, Clone)]
pub struct Needle {
    text: String,
    uuid: Option<Uuid>,
    int: Option<i64>,
    boolean: Option<bool>,
}

impl Needle {
    pub fn parse(text: &str) -> Self {
        Self {
            text: text.to_string(),
            uuid: Uuid::parse_str(text).ok(),
            int: text.parse().ok(),
            boolean: text.parse().ok(),
        }
    }

    fn matches(&self, scalar: &Scalar) -> bool {
        match scalar {
            Scalar::Str(text) => *text == self.text,
            Scalar::Uuid(id) => self.uuid == Some(*id),
            Scalar::Int(number) => self.int == Some(*number),
            Scalar::Bool(flag) => self.boolean == Some(*flag),
            Scalar::Float(_) => false,
        }
    }
}

fn child_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}->{name}")
    }
}

/// Every path at which `key` is a struct field name.
pub fn find_key(root: &Value, key: &str) -> Vec<String> {
    let mut paths = Vec::new();
    visit_key(root, key, "", &mut paths);
    paths
}

pub fn find_key_in_document(document: &Document, key: &str) -> Vec<String> {
    let mut paths = Vec::new();
    visit_struct_key(&document.properties, key, "", &mut paths);
    paths
}

fn visit_struct_key(node: &StructValue, key: &str, path: &str, paths: &mut Vec<String>) {
    for (name, child) in &node.fields {
        let here = child_path(path, name);
        if name == key {
            paths.push(here.clone());
        }
        visit_key(child, key, &here, paths);
    }
}

fn visit_key(node: &Value, key: &str, path: &str, paths: &mut Vec<String>) {
    match node {
        Value::Scalar(_) => {}
        Value::Struct(inner) => visit_struct_key(inner, key, path, paths),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                visit_key(item, key, &format!("{path}[{index}]"), paths);
            }
        }
        Value::Map(entries) => {
            for (index, entry) in entries.iter().enumerate() {
                visit_key(&entry.key, key, &format!("{path}[{index}]->key"), paths);
                visit_key(&entry.value, key, &format!("{path}[{index}]->value"), paths);
            }
        }
    }
}

/// Every scalar equal to `needle` (as text, UUID, integer or boolean).
pub fn find_value(root: &Value, needle: &str) -> ValueScan {
    let needle = Needle::parse(needle);
    let mut paths = Vec::new();
    visit_value(root, &needle, "", &mut paths);
    ValueScan {
        found: !paths.is_empty(),
        paths,
    }
}

pub fn find_value_in_document(document: &Document, needle: &str) -> ValueScan {
    let needle = Needle::parse(needle);
    let mut paths = Vec::new();
    for (name, child) in &document.properties.fields {
        visit_value(child, &needle, name, &mut paths);
    }
    ValueScan {
        found: !paths.is_empty(),
        paths,
    }
}

fn visit_value(node: &Value, needle: &Needle, path: &str, paths: &mut Vec<String>) {
    match node {
        Value::Scalar(scalar) => {
            if needle.matches(scalar) {
                paths.push(path.to_string());
            }
        }
        Value::Struct(inner) => {
            for (name, child) in &inner.fields {
                visit_value(child, needle, &child_path(path, name), paths);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                visit_value(item, needle, &format!("{path}[{index}]"), paths);
            }
        }
        Value::Map(entries) => {
            for (index, entry) in entries.iter().enumerate() {
                visit_value(&entry.key, needle, &format!("{path}[{index}]->key"), paths);
                visit_value(&entry.value, needle, &format!("{path}[{index}]->value"), paths);
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Cursor<'a> {
    Root(&'a StructValue),
    Node(&'a Value),
    Entry(&'a MapEntry),
}

impl<'a> Cursor<'a> {
    fn field(self, name: &str) -> Option<Self> {
        match self {
            Cursor::Root(node) => node.field(name).map(Cursor::Node),
            Cursor::Node(node) => node.field(name).map(Cursor::Node),
            Cursor::Entry(entry) => match name {
                "key" => Some(Cursor::Node(&entry.key)),
                "value" => Some(Cursor::Node(&entry.value)),
                _ => None,
            },
        }
    }

    fn index(self, position: usize) -> Option<Self> {
        match self {
            Cursor::Node(Value::Array(items)) => items.get(position).map(Cursor::Node),
            Cursor::Node(Value::Map(entries)) => entries.get(position).map(Cursor::Entry),
            _ => None,
        }
    }

    fn to_value(self) -> Value {
        match self {
            Cursor::Root(node) => Value::Struct(node.clone()),
            Cursor::Node(node) => node.clone(),
            Cursor::Entry(entry) => Value::record(vec![
                ("key", entry.key.clone()),
                ("value", entry.value.clone()),
            ]),
        }
    }
}

/// Split `Name[1][2]` into `Name` and `[1, 2]`.
fn split_segment(segment: &str) -> Option<(&str, Vec<usize>)> {
    let (name, mut rest) = match segment.find('[') {
        Some(at) => segment.split_at(at),
        None => return Some((segment, Vec::new())),
    };
    let mut indices = Vec::new();
    while let Some(body) = rest.strip_prefix('[') {
        let close = body.find(']')?;
        indices.push(body[..close].trim().parse().ok()?);
        rest = &body[close + 1..];
    }
    rest.is_empty().then_some((name, indices))
}

fn resolve(mut cursor: Cursor<'_>, path: &str) -> Option<Value> {
    let normalized = path.replace("->", ".");
    for segment in normalized.split('.').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, indices) = split_segment(segment)?;
        if !name.is_empty() {
            cursor = cursor.field(name)?;
        }
        for position in indices {
            cursor = cursor.index(position)?;
        }
    }
    Some(cursor.to_value())
}

/// Copy of the node at `path` under `root`. Map entries resolve to a
/// `{key, value}` record.
pub fn resolve_path(root: &Value, path: &str) -> Option<Value> {
    resolve(Cursor::Node(root), path)
}

pub fn resolve_document_path(document: &Document, path: &str) -> Option<Value> {
    resolve(Cursor::Root(&document.properties), path)
}

impl WorldSession {
    pub fn find_key(&mut self, key: &str) -> Vec<String> {
        let paths = find_key_in_document(&self.document, key);
        for path in &paths {
            self.events
                .push(Event::new(EventKind::KeyFound, key).attr("path", path));
        }
        paths
    }

    pub fn find_value(&mut self, needle: &str) -> ValueScan {
        let scan = find_value_in_document(&self.document, needle);
        for path in &scan.paths {
            self.events
                .push(Event::new(EventKind::ValueFound, needle).attr("path", path));
        }
        scan
    }

    /// Subtree at `path`, or the whole document when `path` is `None`.
    pub fn subtree(&self, path: Option<&str>) -> Result<Value, SessionError> {
        let path = path.unwrap_or("");
        resolve_document_path(&self.document, path)
            .ok_or_else(|| SessionError::PathNotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toy::{ALICE, sample_session, uid};

    #[test]
    fn find_key_reports_arrow_paths_through_maps() {
        let (mut session, _) = sample_session();
        let paths = session.find_key("NickName");
        assert_eq!(paths.len(), 2);
        assert_eq!(
            paths[0],
            "worldSaveData->CharacterSaveParameterMap[0]->value->RawData->object->SaveParameter->NickName"
        );
        assert_eq!(session.events().count(EventKind::KeyFound), 2);
    }

    #[test]
    fn find_value_matches_uuid_text_and_int() {
        let (session, _) = sample_session();
        let doc = session.document();

        let by_uuid = find_value_in_document(doc, &ALICE.to_string());
        assert!(by_uuid.found);
        assert!(
            by_uuid
                .paths
                .contains(&"worldSaveData->CharacterSaveParameterMap[0]->key->PlayerUId".to_string())
        );

        let by_text = find_value_in_document(doc, "Kitsunebi");
        assert_eq!(by_text.paths.len(), 1);

        let by_int = find_value_in_document(doc, "12");
        assert!(by_int.paths.iter().any(|path| path.ends_with("->Level")));

        let missing = find_value_in_document(doc, "no such value");
        assert_eq!(missing, ValueScan::default());
    }

    #[test]
    fn resolve_path_accepts_scanner_output_and_dotted_form() {
        let (session, _) = sample_session();
        let arrow = session
            .subtree(Some("worldSaveData->CharacterSaveParameterMap[0]->key->PlayerUId"))
            .expect("arrow path resolves");
        assert_eq!(arrow, Value::uuid(ALICE));

        let dotted = session
            .subtree(Some("worldSaveData.CharacterSaveParameterMap[1].key.InstanceId"))
            .expect("dotted path resolves");
        assert_eq!(dotted, Value::uuid(uid(21)));

        let entry = session
            .subtree(Some("worldSaveData.GroupSaveDataMap[0]"))
            .expect("entry resolves");
        assert_eq!(entry.field("key"), Some(&Value::uuid(crate::toy::ALPHA_GUILD)));

        assert!(matches!(
            session.subtree(Some("worldSaveData.Nope")),
            Err(SessionError::PathNotFound(path)) if path == "worldSaveData.Nope"
        ));
        assert!(session.subtree(Some("worldSaveData.GroupSaveDataMap[x]")).is_err());
    }

    #[test]
    fn find_key_on_a_bare_value() {
        let node = Value::Array(vec![Value::record(vec![("ID", Value::int(1))])]);
        assert_eq!(find_key(&node, "ID"), vec!["[0]->ID".to_string()]);
        assert!(find_value(&node, "1").found);
        assert_eq!(resolve_path(&node, "[0].ID"), Some(Value::int(1)));
    }
}
