//! Shell commands: parsing a line into a `Command` and dispatching it to the
//! session.
//!
//! `OPERATIONS` is the single table of command names, usage lines and
//! summaries. The parser, `help`, and the CLI's `--exec` flag all read it.

use crate::audit::{GuildAudit, OrphanPal};
use crate::error::SessionError;
use crate::ids::{RunMode, parse_uid};
use crate::index::PlayerMeta;
use crate::mutate::Outcome;
use crate::scan::ValueScan;
use crate::session::WorldSession;
use palfix_tree::{SectionFootprint, Value};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationId {
    ShowPlayers,
    FixMissing,
    ShowGuilds,
    RenamePlayer,
    InspectPlayer,
    DeletePlayer,
    MovePlayer,
    OpenBackup,
    MigratePlayer,
    FindKey,
    FindValue,
    PrettyPrint,
    Statistics,
    Save,
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy)]
pub struct OperationSpec {
    pub id: OperationId,
    pub name: &'static str,
    pub usage: &'static str,
    pub summary: &'static str,
    /// The one `--flag` the command accepts, if any.
    pub flag: Option<&'static str>,
}

const DRY_RUN: Option<&str> = Some("--dry-run");

/// In `OperationId` declaration order.
pub const OPERATIONS: [OperationSpec; 16] = [
    OperationSpec {
        id: OperationId::ShowPlayers,
        name: "show-players",
        usage: "show-players",
        summary: "List every player with level and nickname",
        flag: None,
    },
    OperationSpec {
        id: OperationId::FixMissing,
        name: "fix-missing",
        usage: "fix-missing [--dry-run]",
        summary: "Delete pals whose owner is not a player in this world",
        flag: DRY_RUN,
    },
    OperationSpec {
        id: OperationId::ShowGuilds,
        name: "show-guilds",
        usage: "show-guilds [--fix]",
        summary: "List guilds and members; --fix prunes handles to missing characters",
        flag: Some("--fix"),
    },
    OperationSpec {
        id: OperationId::RenamePlayer,
        name: "rename-player",
        usage: "rename-player <uid> <name>",
        summary: "Set a player's nickname",
        flag: None,
    },
    OperationSpec {
        id: OperationId::InspectPlayer,
        name: "inspect-player",
        usage: "inspect-player <uid>",
        summary: "Print a player's parameter tree",
        flag: None,
    },
    OperationSpec {
        id: OperationId::DeletePlayer,
        name: "delete-player",
        usage: "delete-player <uid> [<instance>] [--dry-run]",
        summary: "Delete a player with its pals, containers and guild entries",
        flag: DRY_RUN,
    },
    OperationSpec {
        id: OperationId::MovePlayer,
        name: "move-player",
        usage: "move-player <old-uid> <new-uid> [--dry-run]",
        summary: "Give a player's character, pals and guild seat to another uid",
        flag: DRY_RUN,
    },
    OperationSpec {
        id: OperationId::OpenBackup,
        name: "open-backup",
        usage: "open-backup <path>",
        summary: "Load a backup world to migrate players from",
        flag: None,
    },
    OperationSpec {
        id: OperationId::MigratePlayer,
        name: "migrate-player",
        usage: "migrate-player <old-uid> <new-uid> [--dry-run]",
        summary: "Copy a player and everything it owns from the backup world",
        flag: DRY_RUN,
    },
    OperationSpec {
        id: OperationId::FindKey,
        name: "find-key",
        usage: "find-key <key>",
        summary: "Print every path where a field with this name occurs",
        flag: None,
    },
    OperationSpec {
        id: OperationId::FindValue,
        name: "find-value",
        usage: "find-value <value>",
        summary: "Print every path holding this value (text, uuid or number)",
        flag: None,
    },
    OperationSpec {
        id: OperationId::PrettyPrint,
        name: "pretty-print",
        usage: "pretty-print [<path>]",
        summary: "Print the tree at a path such as worldSaveData.GroupSaveDataMap[0]",
        flag: None,
    },
    OperationSpec {
        id: OperationId::Statistics,
        name: "statistics",
        usage: "statistics",
        summary: "Approximate size of each world section",
        flag: None,
    },
    OperationSpec {
        id: OperationId::Save,
        name: "save",
        usage: "save",
        summary: "Write the world to the output path",
        flag: None,
    },
    OperationSpec {
        id: OperationId::Help,
        name: "help",
        usage: "help",
        summary: "List commands",
        flag: None,
    },
    OperationSpec {
        id: OperationId::Quit,
        name: "quit",
        usage: "quit",
        summary: "Leave the shell without saving",
        flag: None,
    },
];

impl OperationId {
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        OPERATIONS
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.id)
    }

    pub fn spec(self) -> &'static OperationSpec {
        &OPERATIONS[self as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ShowPlayers,
    FixMissing {
        mode: RunMode,
    },
    ShowGuilds {
        repair: bool,
    },
    RenamePlayer {
        player_uid: Uuid,
        name: String,
    },
    InspectPlayer {
        player_uid: Uuid,
    },
    DeletePlayer {
        player_uid: Uuid,
        instance_id: Option<Uuid>,
        mode: RunMode,
    },
    MovePlayer {
        old_uid: Uuid,
        new_uid: Uuid,
        mode: RunMode,
    },
    OpenBackup {
        path: PathBuf,
    },
    MigratePlayer {
        old_uid: Uuid,
        new_uid: Uuid,
        mode: RunMode,
    },
    FindKey {
        key: String,
    },
    FindValue {
        needle: String,
    },
    PrettyPrint {
        path: Option<String>,
    },
    Statistics,
    Save,
    Help,
    Quit,
}

/// Split a shell line on whitespace. Single or double quotes group words.
pub fn split_words(line: &str) -> Result<Vec<String>, SessionError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_word = true;
            }
            None if ch.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(ch);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(SessionError::UnterminatedQuote(line.to_string()));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

impl Command {
    /// Parse one shell line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, SessionError> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }
        let mut words = split_words(trimmed)?;
        if words.is_empty() {
            return Ok(None);
        }
        let name = words.remove(0);
        let id = OperationId::from_name(&name).ok_or(SessionError::UnknownCommand(name))?;
        Self::from_words(id.spec(), words).map(Some)
    }

    fn from_words(spec: &OperationSpec, words: Vec<String>) -> Result<Self, SessionError> {
        let usage = || SessionError::Usage(spec.usage);

        let mut flagged = false;
        let mut positional = Vec::new();
        for word in words {
            if word.len() > 2 && word.starts_with("--") {
                if spec.flag != Some(word.as_str()) {
                    return Err(usage());
                }
                flagged = true;
            } else {
                positional.push(word);
            }
        }
        let mode = RunMode::from_dry_run(flagged);

        let command = match (spec.id, positional.as_slice()) {
            (OperationId::ShowPlayers, []) => Command::ShowPlayers,
            (OperationId::FixMissing, []) => Command::FixMissing { mode },
            (OperationId::ShowGuilds, []) => Command::ShowGuilds { repair: flagged },
            (OperationId::RenamePlayer, [uid, name @ ..]) if !name.is_empty() => {
                Command::RenamePlayer {
                    player_uid: parse_uid(uid)?,
                    name: name.join(" "),
                }
            }
            (OperationId::InspectPlayer, [uid]) => Command::InspectPlayer {
                player_uid: parse_uid(uid)?,
            },
            (OperationId::DeletePlayer, [uid]) => Command::DeletePlayer {
                player_uid: parse_uid(uid)?,
                instance_id: None,
                mode,
            },
            (OperationId::DeletePlayer, [uid, instance]) => Command::DeletePlayer {
                player_uid: parse_uid(uid)?,
                instance_id: Some(parse_uid(instance)?),
                mode,
            },
            (OperationId::MovePlayer, [old, new]) => Command::MovePlayer {
                old_uid: parse_uid(old)?,
                new_uid: parse_uid(new)?,
                mode,
            },
            (OperationId::OpenBackup, [path]) => Command::OpenBackup {
                path: PathBuf::from(path),
            },
            (OperationId::MigratePlayer, [old, new]) => Command::MigratePlayer {
                old_uid: parse_uid(old)?,
                new_uid: parse_uid(new)?,
                mode,
            },
            (OperationId::FindKey, [key]) => Command::FindKey { key: key.clone() },
            (OperationId::FindValue, [needle]) => Command::FindValue {
                needle: needle.clone(),
            },
            (OperationId::PrettyPrint, []) => Command::PrettyPrint { path: None },
            (OperationId::PrettyPrint, [path]) => Command::PrettyPrint {
                path: Some(path.clone()),
            },
            (OperationId::Statistics, []) => Command::Statistics,
            (OperationId::Save, []) => Command::Save,
            (OperationId::Help, []) => Command::Help,
            (OperationId::Quit, []) => Command::Quit,
            _ => return Err(usage()),
        };
        Ok(command)
    }
}

/// What a command produced besides its events.
#[derive(Debug, Clone)]
pub enum Reply {
    Players(Vec<PlayerMeta>),
    Orphans(Vec<OrphanPal>),
    Guilds(Vec<GuildAudit>),
    Outcome(Outcome),
    Tree(Value),
    PlayerNotFound(Uuid),
    BackupOpened(PathBuf),
    Keys(Vec<String>),
    Found(ValueScan),
    Statistics(Vec<SectionFootprint>),
    Saved(PathBuf),
    Help(&'static [OperationSpec]),
    Quit,
}

impl WorldSession {
    pub fn execute(&mut self, command: Command) -> Result<Reply, SessionError> {
        log::debug!("execute {command:?}");
        let reply = match command {
            Command::ShowPlayers => Reply::Players(self.show_players()),
            Command::FixMissing { mode } => Reply::Orphans(self.audit_orphan_pals(mode)?),
            Command::ShowGuilds { repair } => Reply::Guilds(self.audit_guilds(repair)?),
            Command::RenamePlayer { player_uid, name } => {
                Reply::Outcome(self.rename_player(player_uid, &name, RunMode::Commit)?)
            }
            Command::InspectPlayer { player_uid } => match self.inspect_player(player_uid)? {
                Some(tree) => Reply::Tree(tree),
                None => Reply::PlayerNotFound(player_uid),
            },
            Command::DeletePlayer {
                player_uid,
                instance_id,
                mode,
            } => Reply::Outcome(self.delete_player(player_uid, instance_id, mode)?),
            Command::MovePlayer {
                old_uid,
                new_uid,
                mode,
            } => Reply::Outcome(self.move_player(old_uid, new_uid, mode)?),
            Command::OpenBackup { path } => {
                self.open_source(&path)?;
                Reply::BackupOpened(path)
            }
            Command::MigratePlayer {
                old_uid,
                new_uid,
                mode,
            } => Reply::Outcome(self.migrate_player(old_uid, new_uid, mode)?),
            Command::FindKey { key } => Reply::Keys(self.find_key(&key)),
            Command::FindValue { needle } => Reply::Found(self.find_value(&needle)),
            Command::PrettyPrint { path } => Reply::Tree(self.subtree(path.as_deref())?),
            Command::Statistics => Reply::Statistics(self.statistics()?),
            Command::Save => Reply::Saved(self.save()?),
            Command::Help => Reply::Help(&OPERATIONS),
            Command::Quit => Reply::Quit,
        };
        Ok(reply)
    }

    /// Parse and execute one shell line. Blank lines yield `None`.
    pub fn execute_line(&mut self, line: &str) -> Result<Option<Reply>, SessionError> {
        match Command::parse(line)? {
            Some(command) => self.execute(command).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::toy::{ALICE, BOB, sample_session};

    fn parse(line: &str) -> Command {
        Command::parse(line)
            .expect("line should parse")
            .expect("line should hold a command")
    }

    #[test]
    fn operations_table_follows_id_order() {
        for (position, spec) in OPERATIONS.iter().enumerate() {
            assert_eq!(spec.id as usize, position, "{} out of order", spec.name);
            assert_eq!(OperationId::from_name(spec.name), Some(spec.id));
            assert!(spec.usage.starts_with(spec.name));
        }
    }

    #[test]
    fn split_words_groups_quoted_text() {
        assert_eq!(
            split_words(r#"rename-player 1 "Sir Alice"  'x y'"#).expect("quotes balance"),
            vec!["rename-player", "1", "Sir Alice", "x y"]
        );
        assert_eq!(split_words(r#"find-value """#).expect("empty quote"), vec!["find-value", ""]);
        assert!(matches!(
            split_words(r#"rename-player 1 "Alice"#),
            Err(SessionError::UnterminatedQuote(_))
        ));
    }

    #[test]
    fn parse_reads_typed_arguments_and_flags() {
        let alice = ALICE.to_string();
        let bob = BOB.simple().to_string();

        assert_eq!(parse("show-players"), Command::ShowPlayers);
        assert_eq!(
            parse("fix-missing --dry-run"),
            Command::FixMissing {
                mode: RunMode::Simulate
            }
        );
        assert_eq!(parse("show-guilds --fix"), Command::ShowGuilds { repair: true });
        assert_eq!(
            parse(&format!("rename-player {alice} New Name")),
            Command::RenamePlayer {
                player_uid: ALICE,
                name: "New Name".to_string()
            }
        );
        assert_eq!(
            parse(&format!("delete-player {alice} {bob} --dry-run")),
            Command::DeletePlayer {
                player_uid: ALICE,
                instance_id: Some(BOB),
                mode: RunMode::Simulate
            }
        );
        assert_eq!(
            parse(&format!("migrate-player {alice} {bob}")),
            Command::MigratePlayer {
                old_uid: ALICE,
                new_uid: BOB,
                mode: RunMode::Commit
            }
        );
        assert_eq!(
            parse("pretty-print worldSaveData.GroupSaveDataMap[0]"),
            Command::PrettyPrint {
                path: Some("worldSaveData.GroupSaveDataMap[0]".to_string())
            }
        );
        assert!(Command::parse("   ").expect("blank parses").is_none());
        assert!(Command::parse("# note").expect("comment parses").is_none());
    }

    #[test]
    fn parse_rejects_bad_lines() {
        assert!(matches!(
            Command::parse("explode"),
            Err(SessionError::UnknownCommand(name)) if name == "explode"
        ));
        assert!(matches!(
            Command::parse("show-players --dry-run"),
            Err(SessionError::Usage("show-players"))
        ));
        assert!(matches!(
            Command::parse("move-player 1"),
            Err(SessionError::Usage(_))
        ));
        assert!(matches!(
            Command::parse("inspect-player bob"),
            Err(SessionError::InvalidIdentifier(text)) if text == "bob"
        ));
    }

    #[test]
    fn execute_dispatches_to_session_operations() {
        let (mut session, _) = sample_session();
        let before = session.document().clone();

        let reply = session
            .execute_line(&format!("delete-player {ALICE} --dry-run"))
            .expect("delete runs")
            .expect("reply");
        assert!(matches!(reply, Reply::Outcome(Outcome::Simulated)));
        assert_eq!(session.document(), &before);
        assert!(session.events().count(EventKind::PlayerDeleted) > 0);

        let reply = session.execute(Command::Help).expect("help runs");
        assert!(matches!(reply, Reply::Help(ops) if ops.len() == OPERATIONS.len()));

        let reply = session
            .execute(Command::InspectPlayer {
                player_uid: crate::toy::uid(77),
            })
            .expect("inspect runs");
        assert!(matches!(reply, Reply::PlayerNotFound(_)));

        let reply = session
            .execute(Command::FindKey {
                key: "guild_name".to_string(),
            })
            .expect("find-key runs");
        assert!(matches!(reply, Reply::Keys(paths) if paths.len() == 1));
    }

    #[test]
    fn execute_surfaces_session_errors() {
        let (mut session, _) = sample_session();
        assert!(matches!(
            session.execute_line(&format!("migrate-player {ALICE} {BOB}")),
            Err(SessionError::NoSourceDocument)
        ));
        assert!(matches!(
            session.execute_line("pretty-print worldSaveData.Missing"),
            Err(SessionError::PathNotFound(_))
        ));
        assert!(matches!(session.execute_line("quit"), Ok(Some(Reply::Quit))));
    }
}
