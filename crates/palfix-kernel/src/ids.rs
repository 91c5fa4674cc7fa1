//! Identifier helpers: run mode, fresh-id sources, uid parsing.

use crate::error::SessionError;
use uuid::Uuid;

/// Two-state fork selected once per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Run detection and logging; leave the document and files untouched.
    Simulate,
    #[default]
    Commit,
}

impl RunMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            RunMode::Simulate
        } else {
            RunMode::Commit
        }
    }

    pub fn is_commit(self) -> bool {
        self == RunMode::Commit
    }
}

/// Source of fresh identifiers for regenerated containers and instances.
pub trait IdSource {
    fn next_id(&mut self) -> Uuid;
}

/// Random v4 identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&mut self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Deterministic counter, for tests and reproducible runs.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    next: u128,
}

impl SequentialIds {
    pub fn starting_at(first: u128) -> Self {
        Self { next: first }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&mut self) -> Uuid {
        let id = Uuid::from_u128(self.next);
        self.next += 1;
        id
    }
}

/// Namespace for identifiers previewed during a dry run.
const PREVIEW_NAMESPACE: Uuid = Uuid::from_u128(0x6a3f_51c2_9d0e_4b7a_8e15_2f90_c4d6_7b31);

/// Stable stand-in for the id that would replace `replacing` on commit.
pub fn preview_id(replacing: Uuid) -> Uuid {
    Uuid::new_v5(&PREVIEW_NAMESPACE, replacing.as_bytes())
}

/// Identifier that replaces `replacing`. Commit draws from `ids`; Simulate
/// previews without consuming the source.
pub fn fresh_id(ids: &mut dyn IdSource, mode: RunMode, replacing: Uuid) -> Uuid {
    match mode {
        RunMode::Commit => ids.next_id(),
        RunMode::Simulate => preview_id(replacing),
    }
}

pub fn parse_uid(text: &str) -> Result<Uuid, SessionError> {
    Uuid::parse_str(text.trim()).map_err(|_| SessionError::InvalidIdentifier(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uid_accepts_dashed_and_simple_forms() {
        let dashed = parse_uid("a1b2c3d4-0000-0000-0000-000000000001").expect("dashed uid");
        let simple = parse_uid("A1B2C3D4000000000000000000000001").expect("simple uid");
        assert_eq!(dashed, simple);
        assert!(matches!(
            parse_uid("not-a-uid"),
            Err(SessionError::InvalidIdentifier(text)) if text == "not-a-uid"
        ));
    }

    #[test]
    fn preview_ids_are_stable_and_distinct_from_input() {
        let id = Uuid::from_u128(42);
        assert_eq!(preview_id(id), preview_id(id));
        assert_ne!(preview_id(id), id);
        assert_ne!(preview_id(id), preview_id(Uuid::from_u128(43)));
    }

    #[test]
    fn simulate_does_not_consume_the_id_source() {
        let mut ids = SequentialIds::starting_at(10);
        let replacing = Uuid::from_u128(7);
        assert_eq!(fresh_id(&mut ids, RunMode::Simulate, replacing), preview_id(replacing));
        assert_eq!(fresh_id(&mut ids, RunMode::Commit, replacing), Uuid::from_u128(10));
    }

    #[test]
    fn sequential_ids_count_up() {
        let mut ids = SequentialIds::starting_at(10);
        assert_eq!(ids.next_id(), Uuid::from_u128(10));
        assert_eq!(ids.next_id(), Uuid::from_u128(11));
    }
}
