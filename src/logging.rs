use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "savextube-cli.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Log to stderr. Used by the line-oriented modes.
pub fn init_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Log to `<data_dir>/savextube-cli.log` so the TUI owns the terminal. If the file
/// cannot be opened, logging is disabled rather than drawn over the screen.
pub fn init_file(data_dir: &Path) {
    let file = std::fs::create_dir_all(data_dir).and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(data_dir.join(LOG_FILE))
    });
    match file {
        Ok(file) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init();
        }
        Err(_) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(std::io::sink)
                .try_init();
        }
    }
}
