use super::{Outcome, Plan, ensure_player_uid};
use crate::error::SessionError;
use crate::events::{Event, EventKind, EventLog};
use crate::ids::{RunMode, fresh_id};
use crate::remap::{Remap, clone_entry_with_remap, clone_struct_with_remap, clone_with_remap};
use crate::schema::{
    self, CHARACTER_CONTAINERS, CHARACTER_MAP, CharacterView, CompanionIds, ContainerKind,
    GROUP_MAP, GUILD_HANDLES, GUILD_MEMBERS, GuildView, Handle, ITEM_CONTAINERS,
    OWNER_HISTORY_FIELD, collection, container_id, container_ids, group_id_of,
    guild_handles_mut, guild_member_value, guild_members_mut, guild_raw_mut, instance_ids,
    is_guild, save_parameter_mut, set_character_key, set_slot_container,
};
use crate::session::WorldSession;
use palfix_tree::{Document, MapEntry, TreeError, Value};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

impl WorldSession {
    /// Copy `old_uid` and its dependents out of the backup opened with
    /// `open_source`, landing them under `new_uid`.
    pub fn migrate_player(
        &mut self,
        old_uid: Uuid,
        new_uid: Uuid,
        mode: RunMode,
    ) -> Result<Outcome, SessionError> {
        let source = self.source.take().ok_or(SessionError::NoSourceDocument)?;
        let result = self.migrate_from(&source, old_uid, new_uid, mode);
        self.source = Some(source);
        result
    }

    /// Merge a player, its containers, its pals and its guild membership
    /// from `source` into the live world.
    ///
    /// Every identifier substitution is decided up front into one `Remap`:
    /// `old_uid → new_uid`, the player instance to a fresh id, and each
    /// copied container or pal instance that already exists live to a fresh
    /// id. Each copied subtree is then cloned through that table, so
    /// references between copies (pal slots, container contents, guild
    /// handles) stay consistent. Collisions are only checked against the
    /// live world; `source` is never modified.
    pub fn migrate_from(
        &mut self,
        source: &Document,
        old_uid: Uuid,
        new_uid: Uuid,
        mode: RunMode,
    ) -> Result<Outcome, SessionError> {
        ensure_player_uid(old_uid)?;
        ensure_player_uid(new_uid)?;
        let Some(companion) = self.companions.load(old_uid)? else {
            return Ok(self.abort_missing_companion(old_uid));
        };
        let owned = CompanionIds::read(&companion)?;
        schema::validate_world(source)?;

        let mut source_player = None;
        let mut source_pals = Vec::new();
        for entry in collection(source, CHARACTER_MAP)? {
            let character = CharacterView::read(entry)?;
            if character.player_uid == old_uid {
                if source_player.is_none() {
                    source_player = Some((entry, character.instance_id));
                }
            } else if character.is_pal() && character.owner() == Some(old_uid) {
                source_pals.push((entry, character));
            }
        }

        // Plan every substitution before cloning anything.
        let live_instances = instance_ids(&self.document)?;
        let live_character_containers = container_ids(&self.document, CHARACTER_CONTAINERS)?;
        let live_item_containers = container_ids(&self.document, ITEM_CONTAINERS)?;

        let mut remap = Remap::new();
        remap.insert(old_uid, new_uid);
        let new_instance = fresh_id(self.ids.as_mut(), mode, owned.instance_id);
        remap.insert(owned.instance_id, new_instance);
        if let Some((_, instance)) = source_player {
            remap.insert(instance, new_instance);
        }

        // A container missing from the backup is not copied, so it keeps the
        // id the companion already names.
        let mut containers = Vec::new();
        for (kind, id) in &owned.containers {
            let name = kind.collection();
            let Some(entry) = find_container(source, name, *id)? else {
                self.events.push(
                    Event::new(EventKind::UnresolvedReference, id)
                        .attr("container", kind.field())
                        .attr("collection", name),
                );
                continue;
            };
            let live = if name == CHARACTER_CONTAINERS {
                &live_character_containers
            } else {
                &live_item_containers
            };
            if live.contains(id) {
                let fresh = fresh_id(self.ids.as_mut(), mode, *id);
                remap.insert(*id, fresh);
                self.events.push(
                    Event::new(EventKind::IdRegenerated, id)
                        .from_value(id)
                        .to_value(fresh)
                        .attr("container", kind.field()),
                );
            }
            containers.push((*kind, *id, entry));
        }
        for (_, pal) in &source_pals {
            if live_instances.contains(&pal.instance_id) {
                let fresh = fresh_id(self.ids.as_mut(), mode, pal.instance_id);
                remap.insert(pal.instance_id, fresh);
                self.events.push(
                    Event::new(EventKind::IdRegenerated, pal.instance_id)
                        .from_value(pal.instance_id)
                        .to_value(fresh)
                        .attr("characterId", pal.character_id()),
                );
            }
        }

        let mut plan = Plan::new();

        for (kind, id, entry) in &containers {
            self.events.push(
                Event::new(EventKind::ContainerCopied, id)
                    .to_value(remap.apply(*id))
                    .attr("container", kind.field()),
            );
            plan.append(kind.collection(), clone_entry_with_remap(entry, &remap));
        }

        let mut instances = Vec::new();
        let mut retarget = None;
        match source_player {
            Some((entry, source_instance)) => {
                let mut copied = clone_entry_with_remap(entry, &remap);
                set_character_key(&mut copied, new_uid, new_instance)?;
                let character = CharacterView::read(&copied)?;
                let kind = match self.live_row_of(new_uid)? {
                    Some((position, replaced)) => {
                        plan.replace(CHARACTER_MAP, position, copied.clone());
                        retarget = Some((replaced, new_instance));
                        EventKind::PlayerUpdated
                    }
                    None => {
                        plan.append(CHARACTER_MAP, copied.clone());
                        EventKind::PlayerCopied
                    }
                };
                self.events.push(
                    Event::new(kind, new_uid)
                        .from_value(source_instance)
                        .to_value(new_instance)
                        .attr("level", character.level())
                        .attr("nickname", character.nickname()),
                );
                instances.push(Handle::new(new_uid, new_instance));
            }
            None => self.events.push(
                Event::new(EventKind::UnresolvedReference, old_uid)
                    .attr("collection", CHARACTER_MAP),
            ),
        }

        // Pals whose slot container was not copied move to the copied pal
        // storage.
        let copied: BTreeSet<Uuid> = containers.iter().map(|(_, id, _)| *id).collect();
        let pal_storage = containers
            .iter()
            .find(|(kind, _, _)| *kind == ContainerKind::PalStorage)
            .map(|(_, id, _)| remap.apply(*id));
        for (entry, pal) in &source_pals {
            let mut copied_entry = clone_entry_with_remap(entry, &remap);
            if let Some(history) = pal.parameter.field(OWNER_HISTORY_FIELD) {
                save_parameter_mut(&mut copied_entry)?
                    .set_at(&[OWNER_HISTORY_FIELD], history.clone())?;
            }
            if let (Some(slot), Some(storage)) = (pal.slot_container(), pal_storage)
                && !copied.contains(&slot)
            {
                set_slot_container(&mut copied_entry, storage)?;
            }
            let copied_instance = remap.apply(pal.instance_id);
            self.events.push(
                Event::new(EventKind::PalCopied, copied_instance)
                    .from_value(pal.instance_id)
                    .attr("owner", new_uid)
                    .attr("characterId", pal.character_id()),
            );
            plan.append(CHARACTER_MAP, copied_entry);
            instances.push(Handle::new(new_uid, copied_instance));
        }

        self.plan_guild_merge(
            source,
            GuildMerge {
                old_uid,
                new_uid,
                remap: &remap,
                instances: &instances,
                retarget,
            },
            &mut plan,
        )?;

        let mut migrated = Document {
            header: companion.header.clone(),
            properties: clone_struct_with_remap(&companion.properties, &remap),
        };
        let save_data = migrated.save_data_mut()?;
        save_data.set_at(&["PlayerUId"], Value::uuid(new_uid))?;
        save_data.set_at(&["IndividualId", "PlayerUId"], Value::uuid(new_uid))?;
        save_data.set_at(&["IndividualId", "InstanceId"], Value::uuid(new_instance))?;
        self.events.push(
            Event::new(EventKind::CompanionSaved, new_uid)
                .attr("path", self.companions.path_for(new_uid).display())
                .attr("instance", new_instance),
        );

        self.finish_with(plan, mode, |companions| companions.save(new_uid, &migrated))
    }

    /// Position and instance of the live row keyed by `player_uid`.
    fn live_row_of(&self, player_uid: Uuid) -> Result<Option<(usize, Uuid)>, TreeError> {
        for (position, entry) in collection(&self.document, CHARACTER_MAP)?.iter().enumerate() {
            if entry.key.uuid_at(&["PlayerUId"])? == player_uid {
                return Ok(Some((position, entry.key.uuid_at(&["InstanceId"])?)));
            }
        }
        Ok(None)
    }

    /// Join a live guild that already lists `new_uid`; otherwise bring the
    /// source guild of `old_uid` across, either as a copy or merged into the
    /// live guild with the same id. Handles to a replaced player row follow
    /// it to its new instance first.
    fn plan_guild_merge(
        &mut self,
        source: &Document,
        merge: GuildMerge<'_>,
        plan: &mut Plan,
    ) -> Result<(), SessionError> {
        let live_groups = collection(&self.document, GROUP_MAP)?;
        let mut updated: BTreeMap<usize, MapEntry> = BTreeMap::new();

        if let Some((from, to)) = merge.retarget {
            for (position, entry) in live_groups.iter().enumerate() {
                if !is_guild(entry) {
                    continue;
                }
                let guild = GuildView::read(entry)?;
                for (index, handle) in guild.handles.iter().enumerate() {
                    if handle.instance_id != from {
                        continue;
                    }
                    self.events.push(
                        Event::new(EventKind::GuildHandleMoved, handle.guid)
                            .from_value(from)
                            .to_value(to)
                            .attr("guild", &guild.name),
                    );
                    let copy = updated.entry(position).or_insert_with(|| entry.clone());
                    if let Some(value) = guild_handles_mut(copy)?.get_mut(index) {
                        value.set_at(&["instance_id"], Value::uuid(to))?;
                    }
                }
            }
        }

        let mut joined = None;
        for (position, entry) in live_groups.iter().enumerate() {
            if !is_guild(entry) {
                continue;
            }
            let guild = GuildView::read(entry)?;
            if guild.member_position(merge.new_uid).is_some() {
                joined = Some((position, entry, guild));
                break;
            }
        }
        match joined {
            Some((position, entry, guild)) => {
                let copy = updated.entry(position).or_insert_with(|| entry.clone());
                let added = extend_handles(copy, merge.instances)?;
                self.events.push(
                    Event::new(EventKind::GuildJoined, guild.group_id)
                        .attr("guild", &guild.name)
                        .attr("player", merge.new_uid)
                        .attr("handlesAdded", added),
                );
            }
            None => plan_source_guild(
                &mut self.events,
                source,
                &merge,
                live_groups,
                &mut updated,
                plan,
            )?,
        }

        for (position, entry) in updated {
            plan.replace(GROUP_MAP, position, entry);
        }
        Ok(())
    }
}

/// Bring the backup guild of `merge.old_uid` across: merged into the live
/// guild with the same id, or copied with `new_uid` as its only member.
fn plan_source_guild(
    events: &mut EventLog,
    source: &Document,
    merge: &GuildMerge<'_>,
    live_groups: &[MapEntry],
    updated: &mut BTreeMap<usize, MapEntry>,
    plan: &mut Plan,
) -> Result<(), SessionError> {
    let mut source_guild = None;
    for entry in collection(source, GROUP_MAP)? {
        if !is_guild(entry) {
            continue;
        }
        let guild = GuildView::read(entry)?;
        if let Some(index) = guild.member_position(merge.old_uid) {
            source_guild = Some((entry, guild, index));
            break;
        }
    }
    let Some((source_entry, source_view, member_index)) = source_guild else {
        return Ok(());
    };
    let member = clone_with_remap(guild_member_value(source_entry, member_index)?, merge.remap);
    let member_name = &source_view.members[member_index].name;

    let existing = live_groups
        .iter()
        .position(|entry| group_id_of(entry) == Some(source_view.group_id));
    let Some(position) = existing else {
        let mut copied = clone_entry_with_remap(source_entry, merge.remap);
        let raw = guild_raw_mut(&mut copied)?;
        raw.set_at(&[GUILD_MEMBERS], Value::Array(vec![member]))?;
        raw.set_at(
            &[GUILD_HANDLES],
            Value::Array(merge.instances.iter().map(|handle| handle.to_value()).collect()),
        )?;
        events.push(
            Event::new(EventKind::GuildCopied, source_view.group_id)
                .attr("guild", &source_view.name)
                .attr("player", merge.new_uid)
                .attr("name", member_name)
                .attr("handles", merge.instances.len()),
        );
        plan.append(GROUP_MAP, copied);
        return Ok(());
    };

    // No live guild lists `new_uid` at this point, so the member is new.
    let live_entry = &live_groups[position];
    let live_view = GuildView::read(live_entry)?;
    let copy = updated.entry(position).or_insert_with(|| live_entry.clone());
    guild_members_mut(copy)?.push(member);
    let added = extend_handles(copy, merge.instances)?;
    events.push(
        Event::new(EventKind::GuildMemberAdded, live_view.group_id)
            .attr("guild", &live_view.name)
            .attr("player", merge.new_uid)
            .attr("name", member_name)
            .attr("handlesAdded", added),
    );
    Ok(())
}

/// What the guild step needs to know about one migration.
struct GuildMerge<'a> {
    old_uid: Uuid,
    new_uid: Uuid,
    remap: &'a Remap,
    instances: &'a [Handle],
    /// Live player instance replaced by the copy, and its replacement.
    retarget: Option<(Uuid, Uuid)>,
}

fn find_container<'a>(
    document: &'a Document,
    name: &str,
    id: Uuid,
) -> Result<Option<&'a MapEntry>, TreeError> {
    for entry in collection(document, name)? {
        if container_id(entry)? == id {
            return Ok(Some(entry));
        }
    }
    Ok(None)
}

/// Append the `instances` the guild does not list yet. Returns how many
/// were added.
fn extend_handles(entry: &mut MapEntry, instances: &[Handle]) -> Result<usize, TreeError> {
    let present = GuildView::read(entry)?.handles;
    let handles = guild_handles_mut(entry)?;
    let mut added = 0;
    for handle in instances {
        if !present.contains(handle) {
            handles.push(handle.to_value());
            added += 1;
        }
    }
    Ok(added)
}
