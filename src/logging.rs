use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};

/// Batch tools: log to stderr, `info` unless `RUST_LOG` says otherwise.
pub fn init_stderr() {
    let _ = Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

/// The interactive binary owns the terminal, so records go to a file or
/// nowhere.
pub fn init_for_tui(log_file: Option<&Path>) -> Result<()> {
    let target = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            Target::Pipe(Box::new(file))
        }
        None => Target::Pipe(Box::new(io::sink())),
    };
    let _ = Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .target(target)
        .try_init();
    Ok(())
}
