use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use ytdlp_queue::commands::{self, Cli};
use ytdlp_queue::core::config::AppConfig;
use ytdlp_queue::utils::logging::init_tracing;
use ytdlp_queue::{NAME, VERSION};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging depends on the loaded config, so a fallback is reported after init
    let (app_config, fallback) = AppConfig::load_or_fallback(cli.config.as_deref());

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| app_config.logging.level.clone());
    let log_dir = if app_config.logging.log_to_file {
        AppConfig::get_logs_dir().ok()
    } else {
        None
    };
    init_tracing(&level, log_dir.as_deref());
    info!("{} v{} starting", NAME, VERSION);
    if let Some(reason) = fallback {
        warn!("{}", reason);
    }

    match commands::run(cli, app_config).await {
        Ok(code) => code,
        Err(err) => {
            error!("Command failed: {:#}", err);
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
