use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "palfix",
    about = "palfix: repair dangling references and migrate players in a world save",
    version
)]
pub struct Cli {
    /// World save to load (usually Level.sav)
    pub filename: PathBuf,

    /// Delete pals whose owner is not a player in this world
    #[arg(long)]
    pub fix_missing: bool,

    /// Show the approximate size of each world section
    #[arg(long)]
    pub statistics: bool,

    /// Remove guild handles that point at characters no longer in the world
    #[arg(long)]
    pub fix_capture: bool,

    /// Output file (default: <filename>_fixed.sav)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Enter the interactive shell after the batch steps (no auto save)
    #[arg(short, long)]
    pub interactive: bool,

    /// Shell command to run after the batch steps; repeatable
    #[arg(long = "exec", value_name = "COMMAND")]
    pub exec: Vec<String>,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// A fix flag makes the batch flow write the output file.
    pub fn saves_on_exit(&self) -> bool {
        (self.fix_missing || self.fix_capture) && !self.interactive
    }
}
