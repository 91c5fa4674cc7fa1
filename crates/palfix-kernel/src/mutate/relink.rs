use super::{Outcome, Plan, ensure_player_uid};
use crate::error::SessionError;
use crate::events::{Event, EventKind};
use crate::ids::RunMode;
use crate::schema::{
    CHARACTER_MAP, CharacterView, ContainerKind, GROUP_MAP, GUILD_HANDLES, GUILD_MEMBERS,
    GuildView, collection, guild_raw_mut, is_guild, set_character_key, transfer_owner,
};
use crate::session::WorldSession;
use palfix_tree::Value;
use uuid::Uuid;

impl WorldSession {
    /// Hand a player's identity over to `new_uid`.
    ///
    /// Both companion files must exist; if either is missing nothing is
    /// changed. The `new_uid` companion takes over the old Otomo container,
    /// rows keyed by `old_uid` are re-keyed, owned pals change owner, and
    /// guild rosters, admins and handles are rewritten. The stale `old_uid`
    /// companion is left for the operator to remove.
    pub fn move_player(
        &mut self,
        old_uid: Uuid,
        new_uid: Uuid,
        mode: RunMode,
    ) -> Result<Outcome, SessionError> {
        ensure_player_uid(old_uid)?;
        ensure_player_uid(new_uid)?;
        if old_uid == new_uid {
            return Err(SessionError::InvalidIdentifier(format!(
                "{new_uid} (same as the player being moved)"
            )));
        }

        let Some(old_companion) = self.companions.load(old_uid)? else {
            return Ok(self.abort_missing_companion(old_uid));
        };
        let Some(mut new_companion) = self.companions.load(new_uid)? else {
            return Ok(self.abort_missing_companion(new_uid));
        };

        let otomo_path = ContainerKind::Otomo.companion_path();
        let otomo = old_companion.save_data()?.uuid_at(&otomo_path)?;
        new_companion
            .save_data_mut()?
            .set_at(&otomo_path, Value::uuid(otomo))?;

        let mut plan = Plan::new();
        for (position, entry) in collection(&self.document, CHARACTER_MAP)?.iter().enumerate() {
            let character = CharacterView::read(entry)?;
            if character.player_uid == old_uid {
                self.events.push(
                    Event::new(EventKind::PlayerMoved, character.instance_id)
                        .from_value(old_uid)
                        .to_value(new_uid)
                        .attr("level", character.level())
                        .attr("nickname", character.nickname()),
                );
                let mut moved = entry.clone();
                set_character_key(&mut moved, new_uid, character.instance_id)?;
                plan.replace(CHARACTER_MAP, position, moved);
            } else if character.is_pal() && character.owner() == Some(old_uid) {
                self.events.push(
                    Event::new(EventKind::PalMoved, character.instance_id)
                        .from_value(old_uid)
                        .to_value(new_uid)
                        .attr("characterId", character.character_id()),
                );
                let mut moved = entry.clone();
                transfer_owner(&mut moved, new_uid)?;
                plan.replace(CHARACTER_MAP, position, moved);
            }
        }

        for (position, entry) in collection(&self.document, GROUP_MAP)?.iter().enumerate() {
            if !is_guild(entry) {
                continue;
            }
            let guild = GuildView::read(entry)?;
            let mut updated = entry.clone();
            let raw = guild_raw_mut(&mut updated)?;
            let mut changed = false;

            if let Some(index) = guild.member_position(old_uid) {
                self.events.push(
                    Event::new(EventKind::GuildMemberMoved, guild.group_id)
                        .from_value(old_uid)
                        .to_value(new_uid)
                        .attr("guild", &guild.name)
                        .attr("name", &guild.members[index].name),
                );
                if let Some(member) = raw.array_at_mut(&[GUILD_MEMBERS])?.get_mut(index) {
                    member.set_at(&["player_uid"], Value::uuid(new_uid))?;
                }
                changed = true;
            }

            if guild.admin_uid == Some(old_uid) {
                self.events.push(
                    Event::new(EventKind::GuildAdminMoved, guild.group_id)
                        .from_value(old_uid)
                        .to_value(new_uid)
                        .attr("guild", &guild.name),
                );
                raw.set_at(&["admin_player_uid"], Value::uuid(new_uid))?;
                changed = true;
            }

            let handles = raw.array_at_mut(&[GUILD_HANDLES])?;
            for (index, handle) in guild.handles.iter().enumerate() {
                if handle.guid != old_uid {
                    continue;
                }
                self.events.push(
                    Event::new(EventKind::GuildHandleMoved, handle.instance_id)
                        .from_value(old_uid)
                        .to_value(new_uid)
                        .attr("guild", &guild.name),
                );
                if let Some(value) = handles.get_mut(index) {
                    value.set_at(&["guid"], Value::uuid(new_uid))?;
                }
                changed = true;
            }

            if changed {
                plan.replace(GROUP_MAP, position, updated);
            }
        }

        self.events.push(
            Event::new(EventKind::CompanionSaved, new_uid)
                .attr("path", self.companions.path_for(new_uid).display())
                .attr("otomoContainer", otomo),
        );
        self.events.push(
            Event::new(EventKind::StaleCompanionReminder, old_uid)
                .attr("path", self.companions.path_for(old_uid).display()),
        );

        self.finish_with(plan, mode, |companions| companions.save(new_uid, &new_companion))
    }
}
