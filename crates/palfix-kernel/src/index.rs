//! Instance and player lookup tables built from the character collection.

use crate::schema::{CHARACTER_MAP, CharacterView, collection};
use palfix_tree::{Document, TreeError, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Where one character record sits in the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterRef {
    pub position: usize,
    pub player_uid: Uuid,
    pub instance_id: Uuid,
}

/// Flattened metadata of one player row.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerMeta {
    pub player_uid: Uuid,
    pub instance_id: Uuid,
    pub level: i64,
    pub nickname: String,
    pub fields: BTreeMap<String, Value>,
}

/// Built once per loaded document. Positions go stale as soon as the
/// character collection is edited; the session rebuilds after every commit.
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    instances: BTreeMap<Uuid, CharacterRef>,
    players: BTreeMap<Uuid, PlayerMeta>,
}

impl EntityIndex {
    pub fn build(document: &Document) -> Result<Self, TreeError> {
        let mut index = Self::default();
        for (position, entry) in collection(document, CHARACTER_MAP)?.iter().enumerate() {
            let character = CharacterView::read(entry)?;
            index.instances.insert(
                character.instance_id,
                CharacterRef {
                    position,
                    player_uid: character.player_uid,
                    instance_id: character.instance_id,
                },
            );

            if character.is_pal() || !character.is_player_parameter() {
                continue;
            }
            let fields = character
                .parameter
                .as_struct()
                .map(|node| {
                    node.fields
                        .iter()
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect()
                })
                .unwrap_or_default();
            index.players.insert(
                character.player_uid,
                PlayerMeta {
                    player_uid: character.player_uid,
                    instance_id: character.instance_id,
                    level: character.level(),
                    nickname: character.nickname().to_string(),
                    fields,
                },
            );
        }
        Ok(index)
    }

    pub fn instance(&self, instance_id: &Uuid) -> Option<&CharacterRef> {
        self.instances.get(instance_id)
    }

    pub fn contains_instance(&self, instance_id: &Uuid) -> bool {
        self.instances.contains_key(instance_id)
    }

    pub fn player(&self, player_uid: &Uuid) -> Option<&PlayerMeta> {
        self.players.get(player_uid)
    }

    pub fn contains_player(&self, player_uid: &Uuid) -> bool {
        self.players.contains_key(player_uid)
    }

    /// Players in position order of their rows.
    pub fn players(&self) -> Vec<&PlayerMeta> {
        let mut players: Vec<&PlayerMeta> = self.players.values().collect();
        players.sort_by_key(|meta| {
            self.instances
                .get(&meta.instance_id)
                .map(|character| character.position)
                .unwrap_or(usize::MAX)
        });
        players
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toy::{self, uid};

    #[test]
    fn empty_collection_yields_empty_index() {
        let doc = toy::world_document(vec![], vec![], vec![], vec![]);
        let index = EntityIndex::build(&doc).expect("index builds");
        assert_eq!(index.instance_count(), 0);
        assert_eq!(index.player_count(), 0);
    }

    #[test]
    fn pals_are_instances_but_not_players() {
        let doc = toy::world_document(
            vec![
                toy::player_entry(uid(1), uid(11), "Alice", Some(12)),
                toy::pal_entry(uid(21), Some(uid(1)), "SheepBall", None),
                toy::player_entry(uid(2), uid(12), "Bob", None),
            ],
            vec![],
            vec![],
            vec![],
        );
        let index = EntityIndex::build(&doc).expect("index builds");

        assert_eq!(index.instance_count(), 3);
        assert_eq!(index.player_count(), 2);
        assert!(index.contains_instance(&uid(21)));
        assert!(!index.contains_player(&toy::SENTINEL));

        let alice = index.player(&uid(1)).expect("alice indexed");
        assert_eq!(alice.instance_id, uid(11));
        assert_eq!(alice.level, 12);
        assert_eq!(alice.nickname, "Alice");
        assert!(alice.fields.contains_key("NickName"));

        let bob = index.player(&uid(2)).expect("bob indexed");
        assert_eq!(bob.level, -1);

        let order: Vec<Uuid> = index.players().iter().map(|p| p.player_uid).collect();
        assert_eq!(order, vec![uid(1), uid(2)]);
    }

    #[test]
    fn missing_collection_is_structural_mismatch() {
        let doc = Document::with_section(
            toy::WORLD_CLASS,
            palfix_tree::WORLD_SECTION,
            Value::record(vec![]),
        );
        let err = EntityIndex::build(&doc).expect_err("no character map");
        assert!(matches!(err, TreeError::MissingField { ref path } if path == CHARACTER_MAP));
    }
}
