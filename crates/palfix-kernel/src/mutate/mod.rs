//! Graph mutations: rename, delete, move (relink), migrate.
//!
//! Every operation runs in two phases. The planning phase walks the live
//! document read-only, emits every event, and records the edits it would
//! make in a `Plan`. The apply phase runs only in `RunMode::Commit`. A
//! simulated run therefore logs exactly what a committed run logs and leaves
//! the document untouched.

mod delete;
mod migrate;
mod relink;
mod rename;

use crate::companion::CompanionStore;
use crate::error::SessionError;
use crate::events::{Event, EventKind};
use crate::ids::RunMode;
use crate::index::EntityIndex;
use crate::schema::{SENTINEL_UID, collection_mut};
use crate::session::WorldSession;
use palfix_tree::{CodecError, Document, MapEntry, TreeError, Value};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use uuid::Uuid;

/// How an operation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum Outcome {
    Committed,
    Simulated,
    /// Nothing was changed.
    Aborted { reason: AbortReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum AbortReason {
    MissingCompanionFile { player_uid: Uuid, path: PathBuf },
}

impl Outcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Outcome::Aborted { .. })
    }
}

/// Edits against the collections of one document, addressed by the
/// positions they had when planning started.
#[derive(Debug, Default)]
pub(crate) struct Plan {
    replacements: Vec<(&'static str, usize, MapEntry)>,
    appends: Vec<(&'static str, MapEntry)>,
    removals: BTreeMap<&'static str, BTreeSet<usize>>,
}

impl Plan {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns false when `position` was already scheduled.
    pub(crate) fn remove(&mut self, collection: &'static str, position: usize) -> bool {
        self.removals.entry(collection).or_default().insert(position)
    }

    pub(crate) fn is_removed(&self, collection: &'static str, position: usize) -> bool {
        self.removals
            .get(collection)
            .is_some_and(|positions| positions.contains(&position))
    }

    pub(crate) fn replace(&mut self, collection: &'static str, position: usize, entry: MapEntry) {
        self.replacements.push((collection, position, entry));
    }

    pub(crate) fn append(&mut self, collection: &'static str, entry: MapEntry) {
        self.appends.push((collection, entry));
    }

    /// Replacements first, then appends, then removals in descending
    /// position order so earlier positions stay valid.
    pub(crate) fn apply(self, document: &mut Document) -> Result<(), TreeError> {
        for (collection, position, entry) in self.replacements {
            let entries = collection_mut(document, collection)?;
            let slot = entries
                .get_mut(position)
                .ok_or_else(|| TreeError::MissingField {
                    path: format!("{collection}[{position}]"),
                })?;
            *slot = entry;
        }
        for (collection, entry) in self.appends {
            collection_mut(document, collection)?.push(entry);
        }
        for (collection, positions) in self.removals {
            let entries = collection_mut(document, collection)?;
            for position in positions.into_iter().rev() {
                if position < entries.len() {
                    entries.remove(position);
                }
            }
        }
        Ok(())
    }
}

/// The all-zero uid keys every pal; no operation may target it.
pub(crate) fn ensure_player_uid(player_uid: Uuid) -> Result<(), SessionError> {
    if player_uid == SENTINEL_UID {
        return Err(SessionError::InvalidIdentifier(player_uid.to_string()));
    }
    Ok(())
}

/// Drop the array items at `positions`.
pub(crate) fn drop_positions(items: &mut Vec<Value>, positions: &BTreeSet<usize>) {
    let mut position = 0;
    items.retain(|_| {
        let keep = !positions.contains(&position);
        position += 1;
        keep
    });
}

impl WorldSession {
    /// Apply `plan` when committing and bring the index back in sync.
    pub(crate) fn finish(&mut self, plan: Plan, mode: RunMode) -> Result<Outcome, SessionError> {
        if !mode.is_commit() {
            return Ok(Outcome::Simulated);
        }
        plan.apply(&mut self.document)?;
        self.reindex()?;
        Ok(Outcome::Committed)
    }

    /// Like `finish`, for operations that also write a companion file.
    /// The plan is applied to a staged copy and indexed first; `write` runs
    /// only once that succeeded, and the copy replaces the live document
    /// only once `write` succeeded. A failure at any step leaves both the
    /// document and the companion store as they were.
    pub(crate) fn finish_with<F>(
        &mut self,
        plan: Plan,
        mode: RunMode,
        write: F,
    ) -> Result<Outcome, SessionError>
    where
        F: FnOnce(&mut dyn CompanionStore) -> Result<(), CodecError>,
    {
        if !mode.is_commit() {
            return Ok(Outcome::Simulated);
        }
        let mut staged = self.document.clone();
        plan.apply(&mut staged)?;
        let index = EntityIndex::build(&staged)?;
        write(self.companions.as_mut())?;
        self.document = staged;
        self.index = index;
        Ok(Outcome::Committed)
    }

    pub(crate) fn abort_missing_companion(&mut self, player_uid: Uuid) -> Outcome {
        let path = self.companions.path_for(player_uid);
        self.events.push(
            Event::new(EventKind::CompanionMissing, player_uid)
                .attr("path", path.display()),
        );
        Outcome::Aborted {
            reason: AbortReason::MissingCompanionFile { player_uid, path },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CHARACTER_MAP, collection};
    use crate::toy::{self, uid};

    fn three_pals() -> Document {
        toy::world_document(
            vec![
                toy::pal_entry(uid(1), None, "A", None),
                toy::pal_entry(uid(2), None, "B", None),
                toy::pal_entry(uid(3), None, "C", None),
            ],
            vec![],
            vec![],
            vec![],
        )
    }

    fn instance_order(doc: &Document) -> Vec<Uuid> {
        collection(doc, CHARACTER_MAP)
            .expect("characters")
            .iter()
            .map(|entry| entry.key.uuid_at(&["InstanceId"]).expect("instance"))
            .collect()
    }

    #[test]
    fn plan_positions_refer_to_the_original_order() {
        let mut doc = three_pals();
        let mut plan = Plan::new();
        assert!(plan.remove(CHARACTER_MAP, 0));
        assert!(!plan.remove(CHARACTER_MAP, 0));
        plan.remove(CHARACTER_MAP, 2);
        plan.replace(CHARACTER_MAP, 1, toy::pal_entry(uid(20), None, "B2", None));
        plan.append(CHARACTER_MAP, toy::pal_entry(uid(4), None, "D", None));
        plan.apply(&mut doc).expect("plan applies");

        assert_eq!(instance_order(&doc), vec![uid(20), uid(4)]);
    }

    #[test]
    fn drop_positions_keeps_the_rest_in_order() {
        let mut items = vec![Value::int(0), Value::int(1), Value::int(2), Value::int(3)];
        drop_positions(&mut items, &BTreeSet::from([1, 3]));
        assert_eq!(items, vec![Value::int(0), Value::int(2)]);
    }

    #[test]
    fn sentinel_uid_is_not_a_player() {
        assert!(ensure_player_uid(Uuid::nil()).is_err());
        assert!(ensure_player_uid(uid(1)).is_ok());
    }

    #[test]
    fn outcome_serializes_with_reason() {
        let outcome = Outcome::Aborted {
            reason: AbortReason::MissingCompanionFile {
                player_uid: uid(1),
                path: PathBuf::from("Players/X.sav"),
            },
        };
        let json = serde_json::to_value(&outcome).expect("outcome serializes");
        assert_eq!(json["outcome"], "aborted");
        assert_eq!(json["reason"]["kind"], "missingCompanionFile");
        assert_eq!(json["reason"]["path"], "Players/X.sav");
    }
}
