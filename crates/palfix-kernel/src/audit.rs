//! Integrity audit: orphaned pals and dangling guild handles.

use crate::error::SessionError;
use crate::events::{Event, EventKind};
use crate::ids::RunMode;
use crate::index::EntityIndex;
use crate::mutate::{Plan, drop_positions};
use crate::schema::{
    CHARACTER_MAP, CharacterView, GROUP_MAP, GuildView, SENTINEL_UID, collection,
    guild_handles_mut, is_guild,
};
use crate::session::WorldSession;
use palfix_tree::{Document, TreeError};
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

/// A pal whose owner is not a known player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanPal {
    pub instance_id: Uuid,
    pub owner: Uuid,
    pub character_id: String,
}

/// Per-guild audit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildAudit {
    pub group_id: Uuid,
    pub name: String,
    pub admin_uid: Option<Uuid>,
    pub member_count: usize,
    pub invalid_instances: Vec<Uuid>,
    pub handles_before: usize,
    pub handles_after: usize,
}

/// Pals (sentinel-keyed rows) whose owner is set, is not the sentinel, and
/// is missing from `index`, with their collection positions.
pub fn find_orphan_pals(
    document: &Document,
    index: &EntityIndex,
) -> Result<Vec<(usize, OrphanPal)>, TreeError> {
    let mut orphans = Vec::new();
    for (position, entry) in collection(document, CHARACTER_MAP)?.iter().enumerate() {
        let character = CharacterView::read(entry)?;
        if !character.is_pal() {
            continue;
        }
        let Some(owner) = character.owner() else {
            continue;
        };
        if owner == SENTINEL_UID || index.contains_player(&owner) {
            continue;
        }
        orphans.push((
            position,
            OrphanPal {
                instance_id: character.instance_id,
                owner,
                character_id: character.character_id().to_string(),
            },
        ));
    }
    Ok(orphans)
}

impl WorldSession {
    /// Report orphaned pals; remove them when committing. Both modes report
    /// the same set.
    pub fn audit_orphan_pals(&mut self, mode: RunMode) -> Result<Vec<OrphanPal>, SessionError> {
        let mut plan = Plan::new();
        let mut orphans = Vec::new();
        for (position, orphan) in find_orphan_pals(&self.document, &self.index)? {
            self.events.push(
                Event::new(EventKind::OrphanPal, orphan.instance_id)
                    .attr("owner", orphan.owner)
                    .attr("characterId", &orphan.character_id),
            );
            plan.remove(CHARACTER_MAP, position);
            orphans.push(orphan);
        }
        self.finish(plan, mode)?;
        Ok(orphans)
    }

    /// List every guild with its roster and flag handles whose instance is
    /// not in the world. With `repair` those handles are pruned.
    pub fn audit_guilds(&mut self, repair: bool) -> Result<Vec<GuildAudit>, SessionError> {
        let mut plan = Plan::new();
        let mut reports = Vec::new();
        for (position, entry) in collection(&self.document, GROUP_MAP)?.iter().enumerate() {
            if !is_guild(entry) {
                continue;
            }
            let guild = GuildView::read(entry)?;
            self.events.push(
                Event::new(EventKind::GuildListed, guild.group_id)
                    .attr("guild", &guild.name)
                    .attr(
                        "admin",
                        guild.admin_uid.map(|uid| uid.to_string()).unwrap_or_default(),
                    )
                    .attr("handles", guild.handles.len()),
            );
            for member in &guild.members {
                self.events.push(
                    Event::new(EventKind::GuildMemberListed, member.player_uid)
                        .attr("guild", &guild.name)
                        .attr("name", &member.name)
                        .attr("lastOnline", member.last_online),
                );
            }

            let mut invalid = BTreeSet::new();
            let mut invalid_instances = Vec::new();
            for (index, handle) in guild.handles.iter().enumerate() {
                if self.index.contains_instance(&handle.instance_id) {
                    continue;
                }
                self.events.push(
                    Event::new(EventKind::InvalidGuildHandle, handle.instance_id)
                        .attr("guild", &guild.name)
                        .attr("guid", handle.guid),
                );
                invalid.insert(index);
                invalid_instances.push(handle.instance_id);
            }

            let handles_before = guild.handles.len();
            let handles_after = if repair {
                handles_before - invalid.len()
            } else {
                handles_before
            };
            self.events.push(
                Event::new(EventKind::GuildHandlesCounted, guild.group_id)
                    .from_value(handles_before)
                    .to_value(handles_after)
                    .attr("guild", &guild.name),
            );

            if repair && !invalid.is_empty() {
                let mut updated = entry.clone();
                drop_positions(guild_handles_mut(&mut updated)?, &invalid);
                plan.replace(GROUP_MAP, position, updated);
            }

            reports.push(GuildAudit {
                group_id: guild.group_id,
                name: guild.name.clone(),
                admin_uid: guild.admin_uid,
                member_count: guild.members.len(),
                invalid_instances,
                handles_before,
                handles_after,
            });
        }

        let mode = if repair {
            RunMode::Commit
        } else {
            RunMode::Simulate
        };
        self.finish(plan, mode)?;
        Ok(reports)
    }
}
