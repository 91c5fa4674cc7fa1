use palfix_kernel::schema::{CHARACTER_MAP, GROUP_MAP, GuildView, collection};
use palfix_kernel::toy::{self, ALICE, ALICE_INSTANCE, DANGLING_INSTANCE, ORPHAN_PAL};
use palfix_kernel::{EntityIndex, companion_file_name};
use palfix_tree::{
    Document, JsonCodec, SaveFormat, read_document_from_path, write_document_to_path,
};
use serde_json::Value;
use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "palfix-cli-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn run_palfix<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = env!("CARGO_BIN_EXE_palfix");
    Command::new(bin)
        .args(args)
        .output()
        .expect("palfix command should execute")
}

fn assert_success(output: &Output) {
    if !output.status.success() {
        panic!(
            "command failed with status {:?}\nstdout:\n{}\nstderr:\n{}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn assert_failure(output: &Output) {
    if output.status.success() {
        panic!(
            "command unexpectedly succeeded\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
    assert_eq!(output.status.code(), Some(1));
}

fn stdout_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write_doc(path: &Path, document: &Document) {
    write_document_to_path(
        path,
        document,
        SaveFormat::for_document(document),
        &JsonCodec::default(),
    )
    .expect("fixture document should be written");
}

/// Sample world as `<dir>/Level.sav` with both companion files under
/// `<dir>/Players/`.
fn write_sample_world(dir: &Path) -> PathBuf {
    let sample = toy::sample_world();
    let level = dir.join("Level.sav");
    write_doc(&level, &sample.document);
    for player_uid in [toy::ALICE, toy::BOB] {
        let companion = sample
            .companions
            .get(player_uid)
            .expect("sample companion exists");
        write_doc(
            &dir.join("Players").join(companion_file_name(player_uid)),
            &companion,
        );
    }
    level
}

fn read_doc(path: &Path) -> Document {
    read_document_from_path(path, &JsonCodec::default()).expect("output should load")
}

fn parse_json_lines(output: &Output) -> Vec<Value> {
    stdout_text(output)
        .lines()
        .map(|line| {
            serde_json::from_str::<Value>(line)
                .unwrap_or_else(|e| panic!("expected JSON line, got error: {e}\nline: {line}"))
        })
        .collect()
}

#[test]
fn missing_input_exits_with_error() {
    let tmp = TempDirGuard::new("missing");
    let output = run_palfix([tmp.path().join("Level.sav")]);
    assert_failure(&output);
    assert!(stderr_text(&output).contains("does not exist"));

    let output = run_palfix([tmp.path()]);
    assert_failure(&output);
    assert!(stderr_text(&output).contains("is not a file"));
}

#[test]
fn unparseable_input_exits_with_error() {
    let tmp = TempDirGuard::new("garbage");
    let level = tmp.path().join("Level.sav");
    fs::write(&level, "not a save").expect("garbage should be written");

    let output = run_palfix([&level]);
    assert_failure(&output);
    assert!(stderr_text(&output).contains("error: failed to load"));
}

#[test]
fn report_only_run_lists_players_and_guilds_without_saving() {
    let tmp = TempDirGuard::new("report");
    let level = write_sample_world(tmp.path());

    let output = run_palfix([&level]);
    assert_success(&output);
    let stdout = stdout_text(&output);
    assert!(stdout.contains("-> Level 12  Alice"));
    assert!(stdout.contains("Guild Alpha"));
    assert!(stdout.contains(&format!("Invalid Character {DANGLING_INSTANCE}")));
    assert!(!tmp.path().join("Level_fixed.sav").exists());
}

#[test]
fn fix_flags_repair_and_save_to_default_output() {
    let tmp = TempDirGuard::new("fix");
    let level = write_sample_world(tmp.path());

    let output = run_palfix([
        level.as_os_str(),
        OsStr::new("--fix-missing"),
        OsStr::new("--fix-capture"),
        OsStr::new("--statistics"),
    ]);
    assert_success(&output);
    let stdout = stdout_text(&output);
    assert!(stdout.contains("CharacterSaveParameterMap\t"));
    assert!(stdout.contains("Invalid item on CharacterSaveParameterMap"));
    assert!(stdout.contains("After remove character count: 5"));

    let fixed = tmp.path().join("Level_fixed.sav");
    let document = read_doc(&fixed);
    let index = EntityIndex::build(&document).expect("fixed world indexes");
    assert!(!index.contains_instance(&ORPHAN_PAL));
    assert!(index.contains_player(&ALICE));

    let groups = collection(&document, GROUP_MAP).expect("groups");
    let guild = GuildView::read(&groups[0]).expect("guild reads");
    assert!(
        guild
            .handles
            .iter()
            .all(|handle| handle.instance_id != DANGLING_INSTANCE)
    );

    let raw: Value = serde_json::from_slice(&fs::read(&fixed).expect("fixed file reads"))
        .expect("fixed file is json");
    assert_eq!(raw["saveType"], serde_json::json!(0x32));

    // input untouched
    let original = read_doc(&level);
    assert!(
        EntityIndex::build(&original)
            .expect("original indexes")
            .contains_instance(&ORPHAN_PAL)
    );
}

#[test]
fn exec_runs_dispatcher_commands_with_json_events() {
    let tmp = TempDirGuard::new("exec");
    let level = write_sample_world(tmp.path());
    let out = tmp.path().join("out.sav");

    let output = run_palfix([
        level.as_os_str(),
        OsStr::new("--json"),
        OsStr::new("-o"),
        out.as_os_str(),
        OsStr::new("--exec"),
        OsStr::new(&format!("delete-player {ALICE}")),
        OsStr::new("--exec"),
        OsStr::new("save"),
    ]);
    assert_success(&output);

    let lines = parse_json_lines(&output);
    let kinds: Vec<&str> = lines
        .iter()
        .filter_map(|line| line["kind"].as_str())
        .collect();
    assert!(kinds.contains(&"player_listed"));
    assert!(kinds.contains(&"player_deleted"));
    assert!(kinds.contains(&"stale_companion_reminder"));
    assert!(kinds.contains(&"document_saved"));
    assert!(
        lines
            .iter()
            .any(|line| line["outcome"] == serde_json::json!("committed"))
    );

    let document = read_doc(&out);
    let index = EntityIndex::build(&document).expect("output indexes");
    assert!(!index.contains_player(&ALICE));
    assert!(!index.contains_instance(&ALICE_INSTANCE));
    let characters = collection(&document, CHARACTER_MAP).expect("characters");
    assert_eq!(characters.len(), 4);
}

#[test]
fn exec_dry_run_leaves_nothing_to_save() {
    let tmp = TempDirGuard::new("dry");
    let level = write_sample_world(tmp.path());

    let output = run_palfix([
        level.as_os_str(),
        OsStr::new("--exec"),
        OsStr::new(&format!("delete-player {ALICE} --dry-run")),
    ]);
    assert_success(&output);
    assert!(stdout_text(&output).contains("Dry run: nothing was changed."));
    assert!(!tmp.path().join("Level_fixed.sav").exists());
}

#[test]
fn bad_exec_command_exits_with_error() {
    let tmp = TempDirGuard::new("bad-exec");
    let level = write_sample_world(tmp.path());

    let output = run_palfix([level.as_os_str(), OsStr::new("--exec"), OsStr::new("explode")]);
    assert_failure(&output);
    assert!(stderr_text(&output).contains("unknown command `explode`"));

    let output = run_palfix([
        level.as_os_str(),
        OsStr::new("--exec"),
        OsStr::new("migrate-player 1 2"),
    ]);
    assert_failure(&output);
}

#[test]
fn interactive_shell_reads_stdin_and_does_not_auto_save() {
    let tmp = TempDirGuard::new("shell");
    let level = write_sample_world(tmp.path());

    let mut child = Command::new(env!("CARGO_BIN_EXE_palfix"))
        .arg(&level)
        .arg("--fix-missing")
        .arg("-i")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("palfix should start");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(format!("inspect-player {ALICE}\nexplode\nquit\n").as_bytes())
        .expect("script should be written");
    let output = child.wait_with_output().expect("palfix should exit");

    assert_success(&output);
    let stdout = stdout_text(&output);
    assert!(stdout.contains("Interactive mode"));
    assert!(stdout.contains("<NickName kind='string'>Alice</NickName>"));
    assert!(stderr_text(&output).contains("error: unknown command `explode`"));
    assert!(!tmp.path().join("Level_fixed.sav").exists());
}
