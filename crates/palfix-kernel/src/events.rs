//! Structured event log.
//!
//! Operations never print. Each per-entity action becomes one `Event`; the
//! CLI renders them, tests assert on them directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    // roster / audit
    PlayerListed,
    OrphanPal,
    GuildListed,
    GuildMemberListed,
    InvalidGuildHandle,
    GuildHandlesCounted,
    // companion files
    CompanionMissing,
    CompanionSaved,
    StaleCompanionReminder,
    // rename
    PlayerRenamed,
    // delete
    PlayerDeleted,
    PalDeleted,
    CharacterContainerDeleted,
    ItemContainerDeleted,
    CharacterRecordDeleted,
    GuildMemberRemoved,
    GuildHandleRemoved,
    // move
    PlayerMoved,
    PalMoved,
    GuildMemberMoved,
    GuildAdminMoved,
    GuildHandleMoved,
    // migrate
    ContainerCopied,
    IdRegenerated,
    UnresolvedReference,
    PlayerCopied,
    PlayerUpdated,
    PalCopied,
    GuildJoined,
    GuildCopied,
    GuildMemberAdded,
    // scanner
    KeyFound,
    ValueFound,
    // session
    BackupOpened,
    DocumentSaved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
}

impl EventKind {
    pub fn severity(self) -> Severity {
        match self {
            EventKind::OrphanPal
            | EventKind::InvalidGuildHandle
            | EventKind::CompanionMissing
            | EventKind::StaleCompanionReminder
            | EventKind::UnresolvedReference => Severity::Warning,
            _ => Severity::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::PlayerListed => "player_listed",
            EventKind::OrphanPal => "orphan_pal",
            EventKind::GuildListed => "guild_listed",
            EventKind::GuildMemberListed => "guild_member_listed",
            EventKind::InvalidGuildHandle => "invalid_guild_handle",
            EventKind::GuildHandlesCounted => "guild_handles_counted",
            EventKind::CompanionMissing => "companion_missing",
            EventKind::CompanionSaved => "companion_saved",
            EventKind::StaleCompanionReminder => "stale_companion_reminder",
            EventKind::PlayerRenamed => "player_renamed",
            EventKind::PlayerDeleted => "player_deleted",
            EventKind::PalDeleted => "pal_deleted",
            EventKind::CharacterContainerDeleted => "character_container_deleted",
            EventKind::ItemContainerDeleted => "item_container_deleted",
            EventKind::CharacterRecordDeleted => "character_record_deleted",
            EventKind::GuildMemberRemoved => "guild_member_removed",
            EventKind::GuildHandleRemoved => "guild_handle_removed",
            EventKind::PlayerMoved => "player_moved",
            EventKind::PalMoved => "pal_moved",
            EventKind::GuildMemberMoved => "guild_member_moved",
            EventKind::GuildAdminMoved => "guild_admin_moved",
            EventKind::GuildHandleMoved => "guild_handle_moved",
            EventKind::ContainerCopied => "container_copied",
            EventKind::IdRegenerated => "id_regenerated",
            EventKind::UnresolvedReference => "unresolved_reference",
            EventKind::PlayerCopied => "player_copied",
            EventKind::PlayerUpdated => "player_updated",
            EventKind::PalCopied => "pal_copied",
            EventKind::GuildJoined => "guild_joined",
            EventKind::GuildCopied => "guild_copied",
            EventKind::GuildMemberAdded => "guild_member_added",
            EventKind::KeyFound => "key_found",
            EventKind::ValueFound => "value_found",
            EventKind::BackupOpened => "backup_opened",
            EventKind::DocumentSaved => "document_saved",
        }
    }
}

/// One logged action: `{kind, subjectId, fromValue, toValue}` plus display
/// attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub kind: EventKind,
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_value: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
}

impl Event {
    pub fn new(kind: EventKind, subject_id: impl ToString) -> Self {
        Self {
            kind,
            subject_id: subject_id.to_string(),
            from_value: None,
            to_value: None,
            attrs: BTreeMap::new(),
        }
    }

    pub fn from_value(mut self, value: impl ToString) -> Self {
        self.from_value = Some(value.to_string());
        self
    }

    pub fn to_value(mut self, value: impl ToString) -> Self {
        self.to_value = Some(value.to_string());
        self
    }

    pub fn attr(mut self, key: &str, value: impl ToString) -> Self {
        self.attrs.insert(key.to_string(), value.to_string());
        self
    }

    pub fn attr_str(&self, key: &str) -> &str {
        self.attrs.get(key).map(String::as_str).unwrap_or("")
    }
}

/// Append-only sink shared by every session operation.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        match event.kind.severity() {
            Severity::Warning => log::warn!("{} {}", event.kind.as_str(), event.subject_id),
            Severity::Info => log::debug!("{} {}", event.kind.as_str(), event.subject_id),
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|event| event.kind == kind).count()
    }
}
