use super::{Outcome, Plan, drop_positions, ensure_player_uid};
use crate::error::SessionError;
use crate::events::{Event, EventKind};
use crate::ids::RunMode;
use crate::schema::{
    CHARACTER_CONTAINERS, CHARACTER_MAP, CharacterView, CompanionIds, GROUP_MAP, GuildView,
    ITEM_CONTAINERS, collection, container_id, guild_handles_mut, guild_members_mut, is_guild,
};
use crate::session::WorldSession;
use std::collections::BTreeSet;
use uuid::Uuid;

impl WorldSession {
    /// Remove a player and everything it owns.
    ///
    /// With `instance_id` only the row keyed `(player_uid, instance_id)` is
    /// removed, along with guild handles pointing at it. Without it the whole
    /// player goes: every row keyed by the uid, every pal it owns or that
    /// sits in one of its containers, the containers themselves, its guild
    /// roster entries and handles. A missing companion file only hides the
    /// containers; everything else is still removed.
    pub fn delete_player(
        &mut self,
        player_uid: Uuid,
        instance_id: Option<Uuid>,
        mode: RunMode,
    ) -> Result<Outcome, SessionError> {
        ensure_player_uid(player_uid)?;
        let whole = instance_id.is_none();

        let mut owned_containers = BTreeSet::new();
        let mut player_instance = instance_id;
        if whole {
            match self.companions.load(player_uid)? {
                Some(companion) => {
                    let ids = CompanionIds::read(&companion)?;
                    player_instance = Some(ids.instance_id);
                    owned_containers = ids.container_set();
                }
                None => {
                    self.events.push(
                        Event::new(EventKind::CompanionMissing, player_uid)
                            .attr("path", self.companions.path_for(player_uid).display()),
                    );
                    player_instance = self.index.player(&player_uid).map(|meta| meta.instance_id);
                }
            }
        }

        let mut plan = Plan::new();
        let mut removed_instances = BTreeSet::new();

        let characters = collection(&self.document, CHARACTER_MAP)?;
        for (position, entry) in characters.iter().enumerate() {
            let character = CharacterView::read(entry)?;
            let keyed = character.player_uid == player_uid
                && instance_id.is_none_or(|target| character.instance_id == target);
            let event = if keyed {
                Event::new(EventKind::PlayerDeleted, character.instance_id)
                    .attr("player", player_uid)
                    .attr("level", character.level())
                    .attr("nickname", character.nickname())
            } else if whole && character.is_pal() && character.owner() == Some(player_uid) {
                Event::new(EventKind::PalDeleted, character.instance_id)
                    .attr("owner", player_uid)
                    .attr("characterId", character.character_id())
            } else if whole
                && character.is_pal()
                && character
                    .slot_container()
                    .is_some_and(|slot| owned_containers.contains(&slot))
            {
                let slot = character.slot_container().unwrap_or_default();
                Event::new(EventKind::PalDeleted, character.instance_id)
                    .attr("slot", slot)
                    .attr("characterId", character.character_id())
            } else {
                continue;
            };
            self.events.push(event);
            plan.remove(CHARACTER_MAP, position);
            removed_instances.insert(character.instance_id);
        }

        for (name, kind) in [
            (CHARACTER_CONTAINERS, EventKind::CharacterContainerDeleted),
            (ITEM_CONTAINERS, EventKind::ItemContainerDeleted),
        ] {
            for (position, entry) in collection(&self.document, name)?.iter().enumerate() {
                let id = container_id(entry)?;
                if owned_containers.contains(&id) {
                    self.events.push(Event::new(kind, id));
                    plan.remove(name, position);
                }
            }
        }

        if let Some(target) = player_instance {
            for (position, entry) in characters.iter().enumerate() {
                let character = CharacterView::read(entry)?;
                if character.instance_id == target && !plan.is_removed(CHARACTER_MAP, position) {
                    self.events
                        .push(Event::new(EventKind::CharacterRecordDeleted, character.instance_id));
                    plan.remove(CHARACTER_MAP, position);
                    removed_instances.insert(character.instance_id);
                }
            }
        }

        for (position, entry) in collection(&self.document, GROUP_MAP)?.iter().enumerate() {
            if !is_guild(entry) {
                continue;
            }
            let guild = GuildView::read(entry)?;

            let member = if whole {
                guild.member_position(player_uid)
            } else {
                None
            };
            if let Some(index) = member {
                let removed = &guild.members[index];
                self.events.push(
                    Event::new(EventKind::GuildMemberRemoved, player_uid)
                        .attr("guild", &guild.name)
                        .attr("name", &removed.name)
                        .attr("lastOnline", removed.last_online),
                );
            }

            let mut stale_handles = BTreeSet::new();
            for (index, handle) in guild.handles.iter().enumerate() {
                if removed_instances.contains(&handle.instance_id)
                    || (whole && handle.guid == player_uid)
                {
                    self.events.push(
                        Event::new(EventKind::GuildHandleRemoved, handle.instance_id)
                            .attr("guild", &guild.name)
                            .attr("guid", handle.guid),
                    );
                    stale_handles.insert(index);
                }
            }

            if member.is_none() && stale_handles.is_empty() {
                continue;
            }
            let mut updated = entry.clone();
            if let Some(index) = member {
                guild_members_mut(&mut updated)?.remove(index);
            }
            drop_positions(guild_handles_mut(&mut updated)?, &stale_handles);
            plan.replace(GROUP_MAP, position, updated);
        }

        if whole {
            self.events.push(
                Event::new(EventKind::StaleCompanionReminder, player_uid)
                    .attr("path", self.companions.path_for(player_uid).display()),
            );
        }

        self.finish(plan, mode)
    }
}
