use super::{Outcome, Plan};
use crate::error::SessionError;
use crate::events::{Event, EventKind};
use crate::ids::RunMode;
use crate::schema::{
    CHARACTER_MAP, CharacterView, NICKNAME_FIELD, SENTINEL_UID, collection, save_parameter_mut,
};
use crate::session::WorldSession;
use palfix_tree::Value;
use uuid::Uuid;

impl WorldSession {
    /// Set `NickName` on every row keyed by `player_uid`. Unknown players
    /// are a silent no-op.
    pub fn rename_player(
        &mut self,
        player_uid: Uuid,
        new_name: &str,
        mode: RunMode,
    ) -> Result<Outcome, SessionError> {
        let mut plan = Plan::new();
        if player_uid != SENTINEL_UID {
            for (position, entry) in collection(&self.document, CHARACTER_MAP)?.iter().enumerate() {
                let character = CharacterView::read(entry)?;
                if character.player_uid != player_uid {
                    continue;
                }
                self.events.push(
                    Event::new(EventKind::PlayerRenamed, player_uid)
                        .from_value(character.nickname())
                        .to_value(new_name)
                        .attr("instance", character.instance_id),
                );
                let mut renamed = entry.clone();
                save_parameter_mut(&mut renamed)?.set_at(&[NICKNAME_FIELD], Value::str(new_name))?;
                plan.replace(CHARACTER_MAP, position, renamed);
            }
        }
        self.finish(plan, mode)
    }
}

#[cfg(test)]
mod tests {
    use crate::events::EventKind;
    use crate::ids::RunMode;
    use crate::mutate::Outcome;
    use crate::toy::{ALICE, sample_session, uid};

    #[test]
    fn rename_sets_nickname_and_logs_old_and_new() {
        let (mut session, _) = sample_session();
        let outcome = session
            .rename_player(ALICE, "Alicia", RunMode::Commit)
            .expect("rename succeeds");
        assert_eq!(outcome, Outcome::Committed);

        let events = session.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::PlayerRenamed);
        assert_eq!(events[0].from_value.as_deref(), Some("Alice"));
        assert_eq!(events[0].to_value.as_deref(), Some("Alicia"));
        assert_eq!(
            session.index().player(&ALICE).expect("alice indexed").nickname,
            "Alicia"
        );
    }

    #[test]
    fn rename_unknown_player_is_a_no_op() {
        let (mut session, _) = sample_session();
        let before = session.document().clone();
        session
            .rename_player(uid(404), "Nobody", RunMode::Commit)
            .expect("rename of unknown uid succeeds");
        assert!(session.events().is_empty());
        assert_eq!(session.document(), &before);
    }
}
