use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cfg = stage_music::config::Config::parse();
    if cfg.list_devices {
        stage_music::output::list_output_devices()?;
        return Ok(());
    }

    stage_music::logging::init_logging(&cfg.log_file)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "stage_music starting");
    let result = stage_music::app::run(cfg);
    if let Err(err) = &result {
        tracing::error!(error = %err, "stage_music exited with error");
    }
    result
}
