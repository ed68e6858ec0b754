use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cfg = stylewave::config::Config::parse();
    stylewave::logging::init_for_tui(cfg.log_file.as_deref())?;
    stylewave::app::run(cfg)
}
