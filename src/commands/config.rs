//! `config` command

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Subcommand;

use crate::core::config::AppConfig;
use crate::core::engine::{locate_program, YtDlpEngine};
use crate::core::options::EngineConfig;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as JSON
    Show,

    /// Print where the configuration file lives
    Path,

    /// Overwrite the configuration file with defaults
    Reset,

    /// Print the engine arguments the download defaults translate to
    Options,

    /// Print the engine program in use and its version
    Engine,
}

fn resolve_path(config_path: Option<&Path>) -> anyhow::Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.to_path_buf()),
        None => AppConfig::get_config_path(),
    }
}

/// The command line the engine would be started with for `url`
pub fn engine_command_line(app_config: &AppConfig, url: &str) -> Vec<String> {
    let record = EngineConfig::from_options(&app_config.defaults, app_config.engine.retry_policy());
    let mut line = vec![locate_program(app_config.engine.program.as_deref())];
    line.extend(app_config.engine.args_prefix.iter().cloned());
    line.extend(record.to_args());
    line.push("--".to_string());
    line.push(url.to_string());
    line
}

pub async fn run(
    command: ConfigCommand,
    app_config: &AppConfig,
    config_path: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    match command {
        ConfigCommand::Show => println!("{}", app_config.export()?),
        ConfigCommand::Path => println!("{}", resolve_path(config_path)?.display()),
        ConfigCommand::Reset => {
            let path = resolve_path(config_path)?;
            AppConfig::reset(&path)?;
            println!("Configuration reset: {}", path.display());
        }
        ConfigCommand::Options => {
            let record =
                EngineConfig::from_options(&app_config.defaults, app_config.engine.retry_policy());
            println!("{}", serde_json::to_string_pretty(&record)?);
            println!("{}", engine_command_line(app_config, "<URL>").join(" "));
        }
        ConfigCommand::Engine => {
            let engine = YtDlpEngine::new(&app_config.engine);
            let version = engine.version().await?;
            println!("{} {}", engine.program(), version);
        }
    }
    Ok(ExitCode::SUCCESS)
}
