//! Presentation of events and replies: plain text or JSON lines.

use palfix_kernel::{AbortReason, Event, EventKind, OperationSpec, Outcome, Reply, WorldSession};
use palfix_tree::{Scalar, Value};
use serde::Serialize;
use std::io::{self, Write};

pub struct Printer<W: Write> {
    out: W,
    json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HelpRow<'a> {
    name: &'a str,
    usage: &'a str,
    summary: &'a str,
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self { out, json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")
    }

    pub fn prompt(&mut self, prompt: &str) -> io::Result<()> {
        write!(self.out, "{prompt}")?;
        self.out.flush()
    }

    fn json_line(&mut self, value: &impl Serialize) -> io::Result<()> {
        let rendered = serde_json::to_string(value).map_err(io::Error::other)?;
        writeln!(self.out, "{rendered}")
    }

    pub fn events(&mut self, events: &[Event]) -> io::Result<()> {
        for event in events {
            if self.json {
                self.json_line(event)?;
            } else {
                writeln!(self.out, "{}", event_text(event))?;
            }
        }
        Ok(())
    }

    /// Print and clear everything the session logged so far.
    pub fn drain(&mut self, session: &mut WorldSession) -> io::Result<()> {
        let events = session.take_events();
        self.events(&events)
    }

    /// Print the part of a reply that is not already covered by events.
    pub fn reply(&mut self, reply: &Reply) -> io::Result<()> {
        match reply {
            Reply::Outcome(outcome) => self.outcome(outcome),
            Reply::Tree(tree) => {
                if self.json {
                    self.json_line(tree)
                } else {
                    write!(self.out, "{}", pretty_tree(tree))
                }
            }
            Reply::PlayerNotFound(player_uid) => {
                if self.json {
                    self.json_line(&serde_json::json!({ "playerNotFound": player_uid }))
                } else {
                    writeln!(self.out, "No player {player_uid}")
                }
            }
            Reply::Found(scan) if !scan.found => {
                if self.json {
                    self.json_line(scan)
                } else {
                    writeln!(self.out, "Not found")
                }
            }
            Reply::Statistics(rows) => {
                for row in rows {
                    if self.json {
                        self.json_line(row)?;
                    } else {
                        writeln!(self.out, "{:>40}\t{:.3} MB", row.name, row.megabytes())?;
                    }
                }
                Ok(())
            }
            Reply::Help(operations) => self.help(operations),
            Reply::Players(_)
            | Reply::Orphans(_)
            | Reply::Guilds(_)
            | Reply::BackupOpened(_)
            | Reply::Keys(_)
            | Reply::Found(_)
            | Reply::Saved(_)
            | Reply::Quit => Ok(()),
        }
    }

    fn outcome(&mut self, outcome: &Outcome) -> io::Result<()> {
        if self.json {
            return self.json_line(outcome);
        }
        match outcome {
            Outcome::Committed => writeln!(self.out, "Done."),
            Outcome::Simulated => writeln!(self.out, "Dry run: nothing was changed."),
            Outcome::Aborted {
                reason: AbortReason::MissingCompanionFile { path, .. },
            } => writeln!(
                self.out,
                "Aborted: player save file does not exist: {}",
                path.display()
            ),
        }
    }

    fn help(&mut self, operations: &[OperationSpec]) -> io::Result<()> {
        for spec in operations {
            if self.json {
                self.json_line(&HelpRow {
                    name: spec.name,
                    usage: spec.usage,
                    summary: spec.summary,
                })?;
            } else {
                writeln!(self.out, "  {:<50} {}", spec.usage, spec.summary)?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// One line of text per event. Listings keep the layout operators know from
/// the game's community tools; everything else is `kind subject from -> to
/// key=value ...`.
pub fn event_text(event: &Event) -> String {
    let attr = |key: &str| event.attr_str(key);
    let from = event.from_value.as_deref().unwrap_or("");
    let to = event.to_value.as_deref().unwrap_or("");
    match event.kind {
        EventKind::PlayerListed => format!(
            "{} [{}] -> Level {:>2}  {}",
            event.subject_id,
            attr("instance"),
            attr("level"),
            attr("nickname")
        ),
        EventKind::OrphanPal => format!(
            "Invalid item on CharacterSaveParameterMap  UUID: {}  Owner: {}  CharacterID: {}",
            event.subject_id,
            attr("owner"),
            attr("characterId")
        ),
        EventKind::GuildListed => format!(
            "Guild {}   Admin {}  Group ID {}  Character Count: {}",
            attr("guild"),
            attr("admin"),
            event.subject_id,
            attr("handles")
        ),
        EventKind::GuildMemberListed => format!(
            "    Player {} [{}] Last Online: {}",
            attr("name"),
            event.subject_id,
            attr("lastOnline")
        ),
        EventKind::InvalidGuildHandle => format!("    Invalid Character {}", event.subject_id),
        EventKind::GuildHandlesCounted => format!("After remove character count: {to}\n"),
        EventKind::CompanionMissing => {
            format!("Warning: player save file does not exist: {}", attr("path"))
        }
        EventKind::StaleCompanionReminder => format!(
            "Please delete this file manually: {}",
            attr("path")
        ),
        EventKind::PlayerRenamed => {
            format!("Rename {} from {from} to {to}", event.subject_id)
        }
        EventKind::KeyFound => format!("Found at {}", attr("path")),
        EventKind::ValueFound => format!("Found value at {}", attr("path")),
        EventKind::DocumentSaved => format!(
            "Saved {} (save type {})",
            event.subject_id,
            attr("saveType")
        ),
        _ => generic_text(event),
    }
}

fn generic_text(event: &Event) -> String {
    let mut text = format!("{} {}", event.kind.as_str(), event.subject_id);
    match (&event.from_value, &event.to_value) {
        (Some(from), Some(to)) => text.push_str(&format!(" {from} -> {to}")),
        (None, Some(to)) => text.push_str(&format!(" -> {to}")),
        (Some(from), None) => text.push_str(&format!(" {from} ->")),
        (None, None) => {}
    }
    for (key, value) in &event.attrs {
        text.push_str(&format!(" {key}={value}"));
    }
    text
}

/// XML-like rendering of a subtree, two spaces per level.
pub fn pretty_tree(value: &Value) -> String {
    let mut lines = Vec::new();
    write_node(&mut lines, "value", value, 0);
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn open_tag(name: &str, value: &Value) -> String {
    match value.type_name() {
        Some(type_name) => format!("<{name} kind='{}' type='{type_name}'>", value.kind()),
        None => format!("<{name} kind='{}'>", value.kind()),
    }
}

fn scalar_text(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Bool(flag) => flag.to_string(),
        Scalar::Int(number) => number.to_string(),
        Scalar::Float(number) => number.to_string(),
        Scalar::Str(text) => text.clone(),
        Scalar::Uuid(id) => id.to_string(),
    }
}

fn write_node(lines: &mut Vec<String>, name: &str, value: &Value, level: usize) {
    let indent = "  ".repeat(level);
    let open = open_tag(name, value);
    match value {
        Value::Scalar(scalar) => {
            lines.push(format!("{indent}{open}{}</{name}>", scalar_text(scalar)));
        }
        Value::Struct(node) => {
            lines.push(format!("{indent}{open}"));
            for (field, child) in &node.fields {
                write_node(lines, field, child, level + 1);
            }
            lines.push(format!("{indent}</{name}>"));
        }
        Value::Array(items) => {
            lines.push(format!("{indent}{open}"));
            for item in items {
                write_node(lines, "item", item, level + 1);
            }
            lines.push(format!("{indent}</{name}>"));
        }
        Value::Map(entries) => {
            lines.push(format!("{indent}{open}"));
            for entry in entries {
                lines.push(format!("{indent}  <entry>"));
                write_node(lines, "key", &entry.key, level + 2);
                write_node(lines, "value", &entry.value, level + 2);
                lines.push(format!("{indent}  </entry>"));
            }
            lines.push(format!("{indent}</{name}>"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palfix_kernel::toy::sample_session;
    use palfix_kernel::{Command, RunMode};
    use palfix_tree::MapEntry;

    fn printed(json: bool, run: impl FnOnce(&mut Printer<Vec<u8>>)) -> String {
        let mut printer = Printer::new(Vec::new(), json);
        run(&mut printer);
        String::from_utf8(printer.into_inner()).expect("output is utf-8")
    }

    #[test]
    fn player_and_guild_listings_use_tabular_layout() {
        let (mut session, _) = sample_session();
        session.show_players();
        session.audit_guilds(false).expect("guild audit");
        let events = session.take_events();
        let text = printed(false, |printer| printer.events(&events).expect("write"));

        assert!(text.contains(
            "00000000-0000-0000-0000-000000000001 [00000000-0000-0000-0000-00000000000b] \
             -> Level 12  Alice"
        ));
        assert!(text.contains("-> Level -1  Bob"));
        assert!(text.contains("Guild Alpha   Admin 00000000-0000-0000-0000-000000000001"));
        assert!(text.contains("    Invalid Character 00000000-0000-0000-0000-000000000063"));
        assert!(text.contains("After remove character count: 6"));
    }

    #[test]
    fn json_mode_prints_one_event_per_line() {
        let (mut session, _) = sample_session();
        session
            .audit_orphan_pals(RunMode::Simulate)
            .expect("orphan audit");
        let events = session.take_events();
        let text = printed(true, |printer| printer.events(&events).expect("write"));

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).expect("valid json line");
        assert_eq!(parsed["kind"], "orphan_pal");
        assert_eq!(parsed["attrs"]["characterId"], "Kitsunebi");
    }

    #[test]
    fn generic_events_show_values_and_attrs() {
        let event = Event::new(EventKind::PalMoved, "p")
            .from_value("a")
            .to_value("b")
            .attr("slot", "s");
        assert_eq!(event_text(&event), "pal_moved p a -> b slot=s");
    }

    #[test]
    fn pretty_tree_nests_structs_arrays_and_maps() {
        let tree = Value::typed_record(
            Some("Param"),
            vec![
                ("Level", Value::int(3)),
                ("Tags", Value::Array(vec![Value::str("a")])),
                (
                    "Lookup",
                    Value::Map(vec![MapEntry::new(Value::int(1), Value::bool(true))]),
                ),
            ],
        );
        let expected = "\
<value kind='struct' type='Param'>
  <Level kind='int'>3</Level>
  <Tags kind='array'>
    <item kind='string'>a</item>
  </Tags>
  <Lookup kind='map'>
    <entry>
      <key kind='int'>1</key>
      <value kind='bool'>true</value>
    </entry>
  </Lookup>
</value>
";
        assert_eq!(pretty_tree(&tree), expected);
    }

    #[test]
    fn replies_render_outcomes_and_help() {
        let (mut session, _) = sample_session();
        let reply = session
            .execute(Command::FixMissing {
                mode: RunMode::Simulate,
            })
            .expect("fix-missing runs");
        let text = printed(false, |printer| printer.reply(&reply).expect("write"));
        assert_eq!(text, "");

        let text = printed(false, |printer| {
            printer
                .reply(&Reply::Outcome(Outcome::Simulated))
                .expect("write")
        });
        assert_eq!(text, "Dry run: nothing was changed.\n");

        let help = session.execute(Command::Help).expect("help runs");
        let text = printed(true, |printer| printer.reply(&help).expect("write"));
        assert_eq!(text.lines().count(), palfix_kernel::OPERATIONS.len());
        assert!(text.contains("\"usage\":\"fix-missing [--dry-run]\""));
    }
}
