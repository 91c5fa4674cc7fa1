//! palfix CLI: the `palfix` command.

mod cli;
mod render;
mod shell;
mod support;

use clap::Parser;
use cli::Cli;
use palfix_kernel::{Command, Reply, RunMode, SessionError, SessionOptions, WorldSession};
use render::Printer;
use std::io::{self, Write};
use support::exit_with;

fn main() {
    support::init_logging();
    let cli = Cli::parse();

    support::ensure_input_file_or_exit(&cli.filename);
    let mut options = SessionOptions::for_input(&cli.filename);
    if let Some(output) = &cli.output {
        options = options.with_output(output);
    }
    let mut session = support::open_session_or_exit(options);

    let stdout = io::stdout();
    let mut printer = Printer::new(stdout.lock(), cli.json);

    if cli.statistics {
        run_or_exit(&mut session, &mut printer, Command::Statistics);
    }
    run_or_exit(&mut session, &mut printer, Command::ShowPlayers);
    if cli.fix_missing {
        run_or_exit(
            &mut session,
            &mut printer,
            Command::FixMissing {
                mode: RunMode::Commit,
            },
        );
    }
    run_or_exit(
        &mut session,
        &mut printer,
        Command::ShowGuilds {
            repair: cli.fix_capture,
        },
    );

    for line in &cli.exec {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => exit_with(format!("--exec `{line}`: {e}")),
        };
        if run_or_exit(&mut session, &mut printer, command) {
            break;
        }
    }

    if cli.interactive {
        let stdin = io::stdin();
        let mut stderr = io::stderr();
        shell::run(&mut session, stdin.lock(), &mut printer, &mut stderr)
            .unwrap_or_else(|e| exit_with(format!("shell: {e}")));
        return;
    }

    if cli.saves_on_exit() {
        run_or_exit(&mut session, &mut printer, Command::Save);
    }
    printer
        .flush()
        .unwrap_or_else(|e| exit_with(format!("failed to write output: {e}")));
}

/// Execute one command and print what it produced. Returns true on `quit`.
fn run_or_exit<W: Write>(
    session: &mut WorldSession,
    printer: &mut Printer<W>,
    command: Command,
) -> bool {
    let result: Result<Reply, SessionError> = session.execute(command);
    let printed = printer.drain(session).and_then(|()| match &result {
        Ok(reply) => printer.reply(reply),
        Err(_) => printer.flush(),
    });
    if let Err(e) = printed {
        exit_with(format!("failed to write output: {e}"));
    }
    match result {
        Ok(reply) => matches!(reply, Reply::Quit),
        Err(e) => exit_with(e),
    }
}
