//! Interactive shell over the command dispatcher.

use crate::render::Printer;
use palfix_kernel::{Reply, WorldSession};
use std::io::{self, BufRead, Write};

const PROMPT: &str = "palfix> ";

/// Read commands from `input` until `quit` or end of input. Command errors
/// go to `errors` and the shell keeps running; nothing is saved unless the
/// operator runs `save`.
pub fn run<R, W, E>(
    session: &mut WorldSession,
    input: R,
    printer: &mut Printer<W>,
    errors: &mut E,
) -> io::Result<()>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    if !printer.is_json() {
        printer.line("Interactive mode (no auto save). Type `help` for commands.")?;
    }
    let mut lines = input.lines();
    loop {
        if !printer.is_json() {
            printer.prompt(PROMPT)?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let result = session.execute_line(&line?);
        printer.drain(session)?;
        match result {
            Ok(Some(Reply::Quit)) => break,
            Ok(Some(reply)) => printer.reply(&reply)?,
            Ok(None) => {}
            Err(error) => writeln!(errors, "error: {error}")?,
        }
    }
    printer.flush()
}
