//! Typed views over the save layout.
//!
//! The codec hands us a generic tree; this module is the one place that knows
//! where players, pals, containers, and guilds live inside it.

use palfix_tree::{Document, MapEntry, TreeError, Value};
use std::collections::BTreeSet;
use uuid::Uuid;

pub const CHARACTER_MAP: &str = "CharacterSaveParameterMap";
pub const CHARACTER_CONTAINERS: &str = "CharacterContainerSaveData";
pub const ITEM_CONTAINERS: &str = "ItemContainerSaveData";
pub const GROUP_MAP: &str = "GroupSaveDataMap";

/// Collections a world document must carry.
pub const REQUIRED_COLLECTIONS: [&str; 4] =
    [CHARACTER_MAP, CHARACTER_CONTAINERS, ITEM_CONTAINERS, GROUP_MAP];

pub const PLAYER_PARAMETER_TYPE: &str = "PalIndividualCharacterSaveParameter";
pub const GUILD_GROUP_TYPE: &str = "EPalGroupType::Guild";

/// `PlayerUId` carried by every pal record.
pub const SENTINEL_UID: Uuid = Uuid::nil();

pub const SAVE_PARAMETER: [&str; 3] = ["RawData", "object", "SaveParameter"];
pub const OWNER_FIELD: &str = "OwnerPlayerUId";
pub const OWNER_HISTORY_FIELD: &str = "OldOwnerPlayerUIds";
pub const NICKNAME_FIELD: &str = "NickName";
const SLOT_CONTAINER: [&str; 3] = ["SlotID", "ContainerId", "ID"];

const GUILD_RAW: &str = "RawData";
pub const GUILD_MEMBERS: &str = "players";
pub const GUILD_HANDLES: &str = "individual_character_handle_ids";

/// Fail early when a world document lacks one of its keyed collections.
pub fn validate_world(document: &Document) -> Result<(), TreeError> {
    let world = document.world()?;
    for collection in REQUIRED_COLLECTIONS {
        world.map_at(&[collection])?;
    }
    Ok(())
}

pub fn collection<'a>(document: &'a Document, name: &str) -> Result<&'a Vec<MapEntry>, TreeError> {
    document.world()?.map_at(&[name])
}

pub fn collection_mut<'a>(
    document: &'a mut Document,
    name: &str,
) -> Result<&'a mut Vec<MapEntry>, TreeError> {
    document.world_mut()?.map_at_mut(&[name])
}

// ── Characters ──

/// Read-only projection of one `CharacterSaveParameterMap` entry.
#[derive(Debug, Clone, Copy)]
pub struct CharacterView<'a> {
    pub player_uid: Uuid,
    pub instance_id: Uuid,
    pub parameter: &'a Value,
}

impl<'a> CharacterView<'a> {
    pub fn read(entry: &'a MapEntry) -> Result<Self, TreeError> {
        Ok(Self {
            player_uid: entry.key.uuid_at(&["PlayerUId"])?,
            instance_id: entry.key.uuid_at(&["InstanceId"])?,
            parameter: entry.value.at_path(&SAVE_PARAMETER)?,
        })
    }

    pub fn is_pal(&self) -> bool {
        self.player_uid == SENTINEL_UID
    }

    pub fn is_player_parameter(&self) -> bool {
        self.parameter.type_name() == Some(PLAYER_PARAMETER_TYPE)
    }

    pub fn owner(&self) -> Option<Uuid> {
        self.parameter.field(OWNER_FIELD).and_then(Value::as_uuid)
    }

    pub fn slot_container(&self) -> Option<Uuid> {
        self.parameter
            .field_path(&SLOT_CONTAINER)
            .and_then(Value::as_uuid)
    }

    pub fn character_id(&self) -> &'a str {
        self.parameter
            .field("CharacterID")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn nickname(&self) -> &'a str {
        self.parameter
            .field(NICKNAME_FIELD)
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// `-1` when the record has no level, matching the roster display.
    pub fn level(&self) -> i64 {
        self.parameter
            .field("Level")
            .and_then(Value::as_int)
            .unwrap_or(-1)
    }
}

pub fn set_character_key(
    entry: &mut MapEntry,
    player_uid: Uuid,
    instance_id: Uuid,
) -> Result<(), TreeError> {
    entry.key.set_at(&["PlayerUId"], Value::uuid(player_uid))?;
    entry.key.set_at(&["InstanceId"], Value::uuid(instance_id))
}

pub fn save_parameter_mut(entry: &mut MapEntry) -> Result<&mut Value, TreeError> {
    entry.value.at_path_mut(&SAVE_PARAMETER)
}

/// Point a pal at another container, keeping its slot index.
pub fn set_slot_container(entry: &mut MapEntry, container_id: Uuid) -> Result<(), TreeError> {
    save_parameter_mut(entry)?.set_at(&SLOT_CONTAINER, Value::uuid(container_id))
}

/// Set the owner and push it to the front of the owner history.
pub fn transfer_owner(entry: &mut MapEntry, owner: Uuid) -> Result<(), TreeError> {
    let parameter = save_parameter_mut(entry)?;
    parameter.set_at(&[OWNER_FIELD], Value::uuid(owner))?;
    match parameter.field_mut(OWNER_HISTORY_FIELD) {
        Some(history) => {
            let found = history.kind();
            let items = history
                .as_array_mut()
                .ok_or_else(|| TreeError::StructuralMismatch {
                    path: OWNER_HISTORY_FIELD.to_string(),
                    expected: "array",
                    found,
                })?;
            items.insert(0, Value::uuid(owner));
            Ok(())
        }
        None => parameter.set_at(&[OWNER_HISTORY_FIELD], Value::Array(vec![Value::uuid(owner)])),
    }
}

pub fn instance_ids(document: &Document) -> Result<BTreeSet<Uuid>, TreeError> {
    collection(document, CHARACTER_MAP)?
        .iter()
        .map(|entry| entry.key.uuid_at(&["InstanceId"]))
        .collect()
}

// ── Containers ──

pub fn container_id(entry: &MapEntry) -> Result<Uuid, TreeError> {
    entry.key.uuid_at(&["ID"])
}

pub fn container_ids(document: &Document, name: &str) -> Result<BTreeSet<Uuid>, TreeError> {
    collection(document, name)?.iter().map(container_id).collect()
}

/// The eight containers a player owns, as listed in the companion file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContainerKind {
    Otomo,
    PalStorage,
    Common,
    DropSlot,
    Essential,
    FoodEquip,
    PlayerEquipArmor,
    WeaponLoadOut,
}

impl ContainerKind {
    pub const ALL: [ContainerKind; 8] = [
        ContainerKind::Otomo,
        ContainerKind::PalStorage,
        ContainerKind::Common,
        ContainerKind::DropSlot,
        ContainerKind::Essential,
        ContainerKind::FoodEquip,
        ContainerKind::PlayerEquipArmor,
        ContainerKind::WeaponLoadOut,
    ];

    pub fn field(self) -> &'static str {
        match self {
            ContainerKind::Otomo => "OtomoCharacterContainerId",
            ContainerKind::PalStorage => "PalStorageContainerId",
            ContainerKind::Common => "CommonContainerId",
            ContainerKind::DropSlot => "DropSlotContainerId",
            ContainerKind::Essential => "EssentialContainerId",
            ContainerKind::FoodEquip => "FoodEquipContainerId",
            ContainerKind::PlayerEquipArmor => "PlayerEquipArmorContainerId",
            ContainerKind::WeaponLoadOut => "WeaponLoadOutContainerId",
        }
    }

    /// Location of this container id inside a companion `SaveData`.
    pub fn companion_path(self) -> Vec<&'static str> {
        match self {
            ContainerKind::Otomo | ContainerKind::PalStorage => vec![self.field(), "ID"],
            _ => vec!["inventoryInfo", self.field(), "ID"],
        }
    }

    /// World collection holding containers of this kind.
    pub fn collection(self) -> &'static str {
        match self {
            ContainerKind::Otomo | ContainerKind::PalStorage => CHARACTER_CONTAINERS,
            _ => ITEM_CONTAINERS,
        }
    }
}

/// Identity and owned containers read from a companion document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionIds {
    pub player_uid: Uuid,
    pub instance_id: Uuid,
    pub containers: Vec<(ContainerKind, Uuid)>,
}

impl CompanionIds {
    pub fn read(document: &Document) -> Result<Self, TreeError> {
        let save_data = document.save_data()?;
        let mut containers = Vec::with_capacity(ContainerKind::ALL.len());
        for kind in ContainerKind::ALL {
            containers.push((kind, save_data.uuid_at(&kind.companion_path())?));
        }
        Ok(Self {
            player_uid: save_data.uuid_at(&["PlayerUId"])?,
            instance_id: save_data.uuid_at(&["IndividualId", "InstanceId"])?,
            containers,
        })
    }

    pub fn container(&self, kind: ContainerKind) -> Option<Uuid> {
        self.containers
            .iter()
            .find(|(candidate, _)| *candidate == kind)
            .map(|(_, id)| *id)
    }

    pub fn container_set(&self) -> BTreeSet<Uuid> {
        self.containers.iter().map(|(_, id)| *id).collect()
    }
}

// ── Guilds ──

/// Group id from the entry key, or from `RawData.group_id` when the key is
/// not a bare UUID.
pub fn group_id_of(entry: &MapEntry) -> Option<Uuid> {
    entry.key.as_uuid().or_else(|| {
        entry
            .value
            .field_path(&[GUILD_RAW, "group_id"])
            .and_then(Value::as_uuid)
    })
}

pub fn is_guild(entry: &MapEntry) -> bool {
    entry
        .value
        .field("GroupType")
        .and_then(Value::as_str)
        .is_some_and(|group_type| group_type == GUILD_GROUP_TYPE)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildMember {
    pub player_uid: Uuid,
    pub name: String,
    pub last_online: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Handle {
    pub guid: Uuid,
    pub instance_id: Uuid,
}

impl Handle {
    pub fn new(guid: Uuid, instance_id: Uuid) -> Self {
        Self { guid, instance_id }
    }

    pub fn to_value(self) -> Value {
        Value::record(vec![
            ("guid", Value::uuid(self.guid)),
            ("instance_id", Value::uuid(self.instance_id)),
        ])
    }
}

/// Read-only projection of one guild in `GroupSaveDataMap`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildView {
    pub group_id: Uuid,
    pub name: String,
    pub admin_uid: Option<Uuid>,
    pub members: Vec<GuildMember>,
    pub handles: Vec<Handle>,
}

impl GuildView {
    pub fn read(entry: &MapEntry) -> Result<Self, TreeError> {
        let raw = entry.value.at_path(&[GUILD_RAW])?;
        let group_id = match group_id_of(entry) {
            Some(id) => id,
            None => raw.uuid_at(&["group_id"])?,
        };

        let mut members = Vec::new();
        for member in raw.array_at(&[GUILD_MEMBERS])? {
            members.push(GuildMember {
                player_uid: member.uuid_at(&["player_uid"])?,
                name: member
                    .field_path(&["player_info", "player_name"])
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                last_online: member
                    .field_path(&["player_info", "last_online_real_time"])
                    .and_then(Value::as_int)
                    .unwrap_or(0),
            });
        }

        let mut handles = Vec::new();
        for handle in raw.array_at(&[GUILD_HANDLES])? {
            handles.push(Handle {
                guid: handle.uuid_at(&["guid"])?,
                instance_id: handle.uuid_at(&["instance_id"])?,
            });
        }

        Ok(Self {
            group_id,
            name: raw
                .field("guild_name")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            admin_uid: raw.field("admin_player_uid").and_then(Value::as_uuid),
            members,
            handles,
        })
    }

    pub fn member_position(&self, player_uid: Uuid) -> Option<usize> {
        self.members
            .iter()
            .position(|member| member.player_uid == player_uid)
    }
}

pub fn guild_raw_mut(entry: &mut MapEntry) -> Result<&mut Value, TreeError> {
    entry.value.at_path_mut(&[GUILD_RAW])
}

pub fn guild_members_mut(entry: &mut MapEntry) -> Result<&mut Vec<Value>, TreeError> {
    guild_raw_mut(entry)?.array_at_mut(&[GUILD_MEMBERS])
}

pub fn guild_handles_mut(entry: &mut MapEntry) -> Result<&mut Vec<Value>, TreeError> {
    guild_raw_mut(entry)?.array_at_mut(&[GUILD_HANDLES])
}

/// Roster entry value at `position`.
pub fn guild_member_value(entry: &MapEntry, position: usize) -> Result<&Value, TreeError> {
    let members = entry.value.at_path(&[GUILD_RAW])?.array_at(&[GUILD_MEMBERS])?;
    members.get(position).ok_or_else(|| TreeError::MissingField {
        path: format!("{GUILD_RAW}.{GUILD_MEMBERS}[{position}]"),
    })
}

pub fn build_member(player_uid: Uuid, player_info: Value) -> Value {
    Value::record(vec![
        ("player_uid", Value::uuid(player_uid)),
        ("player_info", player_info),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toy::{self, uid};

    #[test]
    fn character_view_distinguishes_players_and_pals() {
        let player = toy::player_entry(uid(1), uid(11), "Alice", None);
        let pal = toy::pal_entry(uid(21), Some(uid(1)), "SheepBall", Some(uid(100)));

        let player = CharacterView::read(&player).expect("player view");
        assert!(!player.is_pal());
        assert!(player.is_player_parameter());
        assert_eq!(player.level(), -1);

        let pal = CharacterView::read(&pal).expect("pal view");
        assert!(pal.is_pal());
        assert_eq!(pal.owner(), Some(uid(1)));
        assert_eq!(pal.slot_container(), Some(uid(100)));
        assert_eq!(pal.character_id(), "SheepBall");
    }

    #[test]
    fn transfer_owner_prepends_history() {
        let mut pal = toy::pal_entry(uid(21), Some(uid(1)), "SheepBall", None);
        transfer_owner(&mut pal, uid(2)).expect("first transfer");
        transfer_owner(&mut pal, uid(3)).expect("second transfer");

        let view = CharacterView::read(&pal).expect("pal view");
        assert_eq!(view.owner(), Some(uid(3)));
        assert_eq!(
            view.parameter.array_at(&[OWNER_HISTORY_FIELD]).expect("history"),
            &vec![Value::uuid(uid(3)), Value::uuid(uid(2))]
        );
    }

    #[test]
    fn transfer_owner_rejects_malformed_history() {
        let mut pal = toy::pal_entry(uid(21), Some(uid(1)), "SheepBall", None);
        save_parameter_mut(&mut pal)
            .expect("parameter")
            .set_at(&[OWNER_HISTORY_FIELD], Value::str("oops"))
            .expect("set history");
        let err = transfer_owner(&mut pal, uid(2)).expect_err("string is not a history");
        assert!(matches!(
            err,
            TreeError::StructuralMismatch { expected: "array", found: "string", .. }
        ));
    }

    #[test]
    fn companion_paths_split_by_container_kind() {
        assert_eq!(
            ContainerKind::Otomo.companion_path(),
            vec!["OtomoCharacterContainerId", "ID"]
        );
        assert_eq!(
            ContainerKind::FoodEquip.companion_path(),
            vec!["inventoryInfo", "FoodEquipContainerId", "ID"]
        );
        assert_eq!(ContainerKind::PalStorage.collection(), CHARACTER_CONTAINERS);
        assert_eq!(ContainerKind::Common.collection(), ITEM_CONTAINERS);
    }

    #[test]
    fn non_guild_groups_are_skipped() {
        assert!(!is_guild(&toy::neutral_group_entry(uid(60))));
        let guild = toy::guild_entry(uid(50), "Alpha", uid(1), &[], &[]);
        assert!(is_guild(&guild));
        assert_eq!(group_id_of(&guild), Some(uid(50)));
    }
}
