//! Toy worlds for tests and demos.
//!
//! Builders produce records with the same field layout the game writes, but
//! only the fields the kernel reads. Identifiers are small integers wrapped
//! in UUIDs (`uid(n)`) so assertions stay readable.
//!
//! ## Sample world
//!
//! ```text
//! Alice (1, inst 11)  containers 100..=107   pals 21 (slot 101), 22 (slot 100)
//! Bob   (2, inst 12)  containers 200..=207   pal  23 (slot 201)
//! orphan pal 29 owned by missing player 9
//! wild pal 30 (no owner)
//! guild 50 "Alpha": members Alice, Bob
//!   handles (1,11) (1,21) (1,22) (2,12) (2,23) (9,99)   ← last one dangling
//! group 60: non-guild group
//! ```

use crate::companion::MemoryCompanionStore;
use crate::ids::SequentialIds;
use crate::schema::{
    CHARACTER_CONTAINERS, CHARACTER_MAP, ContainerKind, GROUP_MAP, GUILD_GROUP_TYPE, Handle,
    ITEM_CONTAINERS, PLAYER_PARAMETER_TYPE, build_member,
};
use crate::session::{SessionOptions, WorldSession};
use palfix_tree::{COMPANION_SECTION, Document, MapEntry, Value, WORLD_SECTION};
use uuid::Uuid;

pub const WORLD_CLASS: &str = "/Script/Pal.PalWorldSaveGame";
pub const PLAYER_CLASS: &str = "/Script/Pal.PalWorldPlayerSaveGame";

pub const SENTINEL: Uuid = Uuid::nil();
pub const ALICE: Uuid = Uuid::from_u128(1);
pub const BOB: Uuid = Uuid::from_u128(2);
pub const ALICE_INSTANCE: Uuid = Uuid::from_u128(11);
pub const BOB_INSTANCE: Uuid = Uuid::from_u128(12);
pub const MISSING_PLAYER: Uuid = Uuid::from_u128(9);
pub const ORPHAN_PAL: Uuid = Uuid::from_u128(29);
pub const WILD_PAL: Uuid = Uuid::from_u128(30);
pub const DANGLING_INSTANCE: Uuid = Uuid::from_u128(99);
pub const ALPHA_GUILD: Uuid = Uuid::from_u128(50);
pub const NEUTRAL_GROUP: Uuid = Uuid::from_u128(60);

pub fn uid(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

/// The eight container ids of a player whose companion was built with
/// `container_seed`, in `ContainerKind::ALL` order.
pub fn owned_containers(container_seed: u128) -> Vec<Uuid> {
    (0..ContainerKind::ALL.len() as u128)
        .map(|offset| uid(container_seed + offset))
        .collect()
}

fn character_key(player_uid: Uuid, instance_id: Uuid) -> Value {
    Value::record(vec![
        ("PlayerUId", Value::uuid(player_uid)),
        ("InstanceId", Value::uuid(instance_id)),
        ("DebugName", Value::str("")),
    ])
}

fn character_value(parameter: Value) -> Value {
    Value::record(vec![(
        "RawData",
        Value::record(vec![(
            "object",
            Value::record(vec![("SaveParameter", parameter)]),
        )]),
    )])
}

pub fn player_entry(
    player_uid: Uuid,
    instance_id: Uuid,
    name: &str,
    level: Option<i64>,
) -> MapEntry {
    let mut fields = Vec::new();
    if let Some(level) = level {
        fields.push(("Level", Value::int(level)));
    }
    fields.push(("NickName", Value::str(name)));
    fields.push(("IsPlayer", Value::bool(true)));
    MapEntry::new(
        character_key(player_uid, instance_id),
        character_value(Value::typed_record(Some(PLAYER_PARAMETER_TYPE), fields)),
    )
}

pub fn pal_entry(
    instance_id: Uuid,
    owner: Option<Uuid>,
    character_id: &str,
    slot_container: Option<Uuid>,
) -> MapEntry {
    let mut fields = vec![
        ("CharacterID", Value::str(character_id)),
        ("Level", Value::int(5)),
    ];
    if let Some(owner) = owner {
        fields.push(("OwnerPlayerUId", Value::uuid(owner)));
    }
    if let Some(container) = slot_container {
        fields.push((
            "SlotID",
            Value::record(vec![
                (
                    "ContainerId",
                    Value::record(vec![("ID", Value::uuid(container))]),
                ),
                ("SlotIndex", Value::int(0)),
            ]),
        ));
    }
    MapEntry::new(
        character_key(SENTINEL, instance_id),
        character_value(Value::typed_record(Some(PLAYER_PARAMETER_TYPE), fields)),
    )
}

/// Container whose slots reference `contents` (pal instance ids).
pub fn container_entry(id: Uuid, contents: &[Uuid]) -> MapEntry {
    let slots = contents
        .iter()
        .enumerate()
        .map(|(index, instance)| {
            Value::record(vec![
                ("SlotIndex", Value::int(index as i64)),
                ("InstanceId", Value::uuid(*instance)),
            ])
        })
        .collect();
    MapEntry::new(
        Value::record(vec![("ID", Value::uuid(id))]),
        Value::record(vec![("Slots", Value::Array(slots))]),
    )
}

pub fn guild_entry(
    group_id: Uuid,
    name: &str,
    admin: Uuid,
    members: &[(Uuid, &str)],
    handles: &[Handle],
) -> MapEntry {
    let roster = members
        .iter()
        .enumerate()
        .map(|(index, (player_uid, player_name))| {
            build_member(
                *player_uid,
                Value::record(vec![
                    ("last_online_real_time", Value::int(1_700_000_000 + index as i64)),
                    ("player_name", Value::str(*player_name)),
                ]),
            )
        })
        .collect();
    let raw = Value::record(vec![
        ("group_type", Value::str(GUILD_GROUP_TYPE)),
        ("group_id", Value::uuid(group_id)),
        ("group_name", Value::str(group_id.to_string())),
        (
            "individual_character_handle_ids",
            Value::Array(handles.iter().map(|handle| handle.to_value()).collect()),
        ),
        ("admin_player_uid", Value::uuid(admin)),
        ("guild_name", Value::str(name)),
        ("players", Value::Array(roster)),
    ]);
    MapEntry::new(
        Value::uuid(group_id),
        Value::record(vec![
            ("GroupType", Value::str(GUILD_GROUP_TYPE)),
            ("RawData", raw),
        ]),
    )
}

/// A group the auditor must skip (no roster, no handles).
pub fn neutral_group_entry(group_id: Uuid) -> MapEntry {
    MapEntry::new(
        Value::uuid(group_id),
        Value::record(vec![
            ("GroupType", Value::str("EPalGroupType::Neutral")),
            (
                "RawData",
                Value::record(vec![("group_id", Value::uuid(group_id))]),
            ),
        ]),
    )
}

pub fn world_document(
    characters: Vec<MapEntry>,
    character_containers: Vec<MapEntry>,
    item_containers: Vec<MapEntry>,
    groups: Vec<MapEntry>,
) -> Document {
    Document::with_section(
        WORLD_CLASS,
        WORLD_SECTION,
        Value::record(vec![
            (CHARACTER_MAP, Value::Map(characters)),
            (CHARACTER_CONTAINERS, Value::Map(character_containers)),
            (ITEM_CONTAINERS, Value::Map(item_containers)),
            (GROUP_MAP, Value::Map(groups)),
        ]),
    )
}

/// Companion document whose containers are `owned_containers(container_seed)`.
pub fn companion_document(player_uid: Uuid, instance_id: Uuid, container_seed: u128) -> Document {
    let ids = owned_containers(container_seed);
    let container = |kind: ContainerKind| {
        let position = ContainerKind::ALL
            .iter()
            .position(|candidate| *candidate == kind)
            .unwrap_or(0);
        Value::record(vec![("ID", Value::uuid(ids[position]))])
    };

    let mut inventory = Vec::new();
    for kind in &ContainerKind::ALL[2..] {
        inventory.push((kind.field(), container(*kind)));
    }

    Document::with_section(
        PLAYER_CLASS,
        COMPANION_SECTION,
        Value::record(vec![
            ("PlayerUId", Value::uuid(player_uid)),
            (
                "IndividualId",
                Value::record(vec![
                    ("PlayerUId", Value::uuid(player_uid)),
                    ("InstanceId", Value::uuid(instance_id)),
                ]),
            ),
            (
                ContainerKind::Otomo.field(),
                container(ContainerKind::Otomo),
            ),
            (
                ContainerKind::PalStorage.field(),
                container(ContainerKind::PalStorage),
            ),
            ("inventoryInfo", Value::record(inventory)),
        ]),
    )
}

fn player_containers(
    container_seed: u128,
    pals: &[(u128, Uuid)],
) -> (Vec<MapEntry>, Vec<MapEntry>) {
    let ids = owned_containers(container_seed);
    let contents_of = |container: Uuid| -> Vec<Uuid> {
        pals.iter()
            .filter(|(_, slot)| *slot == container)
            .map(|(instance, _)| uid(*instance))
            .collect()
    };
    let character = ids[..2]
        .iter()
        .map(|id| container_entry(*id, &contents_of(*id)))
        .collect();
    let item = ids[2..].iter().map(|id| container_entry(*id, &[])).collect();
    (character, item)
}

/// The sample world above plus companions for Alice and Bob.
pub struct SampleWorld {
    pub document: Document,
    pub companions: MemoryCompanionStore,
}

pub fn sample_world() -> SampleWorld {
    let characters = vec![
        player_entry(ALICE, ALICE_INSTANCE, "Alice", Some(12)),
        pal_entry(uid(21), Some(ALICE), "SheepBall", Some(uid(101))),
        pal_entry(uid(22), Some(ALICE), "PinkCat", Some(uid(100))),
        player_entry(BOB, BOB_INSTANCE, "Bob", None),
        pal_entry(uid(23), Some(BOB), "ChickenPal", Some(uid(201))),
        pal_entry(ORPHAN_PAL, Some(MISSING_PLAYER), "Kitsunebi", None),
        pal_entry(WILD_PAL, None, "Lamball", None),
    ];

    let (mut character_containers, mut item_containers) =
        player_containers(100, &[(21, uid(101)), (22, uid(100))]);
    let (bob_character, bob_item) = player_containers(200, &[(23, uid(201))]);
    character_containers.extend(bob_character);
    item_containers.extend(bob_item);

    let groups = vec![
        guild_entry(
            ALPHA_GUILD,
            "Alpha",
            ALICE,
            &[(ALICE, "Alice"), (BOB, "Bob")],
            &[
                Handle::new(ALICE, ALICE_INSTANCE),
                Handle::new(ALICE, uid(21)),
                Handle::new(ALICE, uid(22)),
                Handle::new(BOB, BOB_INSTANCE),
                Handle::new(BOB, uid(23)),
                Handle::new(MISSING_PLAYER, DANGLING_INSTANCE),
            ],
        ),
        neutral_group_entry(NEUTRAL_GROUP),
    ];

    let companions = MemoryCompanionStore::new();
    companions.insert(ALICE, companion_document(ALICE, ALICE_INSTANCE, 100));
    companions.insert(BOB, companion_document(BOB, BOB_INSTANCE, 200));

    SampleWorld {
        document: world_document(characters, character_containers, item_containers, groups),
        companions,
    }
}

/// Session over the sample world with in-memory companions and sequential
/// fresh ids starting at 1000. The returned store shares state with the
/// session's.
pub fn sample_session() -> (WorldSession, MemoryCompanionStore) {
    let sample = sample_world();
    let session = session_over(sample.document, sample.companions.clone());
    (session, sample.companions)
}

pub fn session_over(document: Document, companions: MemoryCompanionStore) -> WorldSession {
    match WorldSession::new(document, SessionOptions::for_input("Level.sav")) {
        Ok(session) => session
            .with_companions(Box::new(companions))
            .with_ids(Box::new(SequentialIds::starting_at(1000))),
        Err(error) => panic!("toy world must be well formed: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CompanionIds, GuildView, container_ids, validate_world};

    #[test]
    fn sample_world_is_well_formed() {
        let sample = sample_world();
        validate_world(&sample.document).expect("sample world validates");

        let alice = sample.companions.get(ALICE).expect("alice companion");
        let ids = CompanionIds::read(&alice).expect("companion ids");
        assert_eq!(ids.player_uid, ALICE);
        assert_eq!(ids.container(ContainerKind::Otomo), Some(uid(100)));
        assert_eq!(ids.container(ContainerKind::WeaponLoadOut), Some(uid(107)));

        let character = container_ids(&sample.document, CHARACTER_CONTAINERS).expect("ids");
        assert!(character.contains(&uid(101)) && character.contains(&uid(201)));
        let item = container_ids(&sample.document, ITEM_CONTAINERS).expect("ids");
        assert_eq!(item.len(), 12);
    }

    #[test]
    fn guild_reads_back_roster_and_handles() {
        let entry = guild_entry(
            uid(5),
            "Solo",
            uid(1),
            &[(uid(1), "One")],
            &[Handle::new(uid(1), uid(11))],
        );
        let guild = GuildView::read(&entry).expect("guild view");
        assert_eq!(guild.name, "Solo");
        assert_eq!(guild.admin_uid, Some(uid(1)));
        assert_eq!(guild.members[0].name, "One");
        assert_eq!(guild.handles, vec![Handle::new(uid(1), uid(11))]);
    }
}
