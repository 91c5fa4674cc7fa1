use palfix_kernel::{SessionOptions, WorldSession};
use palfix_tree::JsonCodec;
use std::fmt::Display;
use std::path::Path;

pub fn exit_with(message: impl Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

pub fn ensure_input_file_or_exit(path: &Path) {
    if !path.exists() {
        exit_with(format!("{} does not exist", path.display()));
    }
    if !path.is_file() {
        exit_with(format!("{} is not a file", path.display()));
    }
}

pub fn open_session_or_exit(options: SessionOptions) -> WorldSession {
    let input = options.input_path.clone();
    WorldSession::open(options, JsonCodec::default()).unwrap_or_else(|e| {
        exit_with(format!("failed to load {}: {e}", input.display()))
    })
}

pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();
}
