//! `formats` command

use std::process::ExitCode;

use clap::Args;

use super::display::TerminalDisplay;
use super::{build_session, pump_events};
use crate::core::config::AppConfig;

#[derive(Args, Debug)]
pub struct FormatsArgs {
    /// Media page URL
    pub url: String,
}

pub async fn run(args: FormatsArgs, app_config: &AppConfig) -> anyhow::Result<ExitCode> {
    let (mut session, mut events) = build_session(app_config, app_config.defaults.clone())?;
    let mut display = TerminalDisplay::new(false);

    session
        .list_formats_for_first_url(&args.url, &mut display)
        .await?;
    pump_events(&mut session, &mut events, &mut display).await?;

    if session.summary().errors > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
