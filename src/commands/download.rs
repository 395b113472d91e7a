//! `download` command

use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::Context;
use clap::Args;
use tracing::info;

use super::display::TerminalDisplay;
use super::{build_session, pump_events};
use crate::core::config::AppConfig;
use crate::core::manager::RunSummary;
use crate::core::options::{AudioBitrate, AudioFormat, DownloadOptions};
use crate::utils::file_utils::{expand_home, read_batch_file};

#[derive(Args, Debug, Default)]
pub struct DownloadArgs {
    /// URLs to queue, one per argument
    pub urls: Vec<String>,

    /// File with one URL per line ('-' for stdin); '#' starts a comment line
    #[arg(short = 'a', long)]
    pub batch_file: Option<String>,

    /// Output folder
    #[arg(short, long)]
    pub output: Option<String>,

    /// Format id from `formats`, or "best"
    #[arg(short, long)]
    pub format: Option<String>,

    /// Keep only the audio track
    #[arg(short = 'x', long)]
    pub extract_audio: bool,

    #[arg(long)]
    pub audio_format: Option<AudioFormat>,

    /// 192K, 256K or 320K
    #[arg(long)]
    pub audio_bitrate: Option<AudioBitrate>,

    /// Write uploaded subtitles
    #[arg(long)]
    pub subs: bool,

    /// Write automatic subtitles
    #[arg(long)]
    pub auto_subs: bool,

    /// Comma-separated subtitle languages, e.g. "en,de"
    #[arg(long)]
    pub sub_langs: Option<String>,

    #[arg(long)]
    pub embed_metadata: bool,

    #[arg(long)]
    pub embed_thumbnail: bool,

    #[arg(long)]
    pub write_info_json: bool,

    /// Download only the video when the URL also names a playlist
    #[arg(long, conflicts_with = "yes_playlist")]
    pub no_playlist: bool,

    /// Download the whole playlist
    #[arg(long)]
    pub yes_playlist: bool,

    /// Maximum download rate, e.g. 500K or 1.5M
    #[arg(short = 'r', long)]
    pub rate_limit: Option<String>,

    /// Netscape-format cookies file
    #[arg(long)]
    pub cookies: Option<String>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl DownloadArgs {
    /// Overlay the flags given on the command line onto `options`
    pub fn apply_to(&self, options: &mut DownloadOptions) {
        if let Some(output) = &self.output {
            options.output_dir = expand_home(output);
        }
        if let Some(format) = &self.format {
            options.format = format.clone();
        }
        if self.extract_audio {
            options.extract_audio = true;
        }
        if let Some(audio_format) = self.audio_format {
            options.audio_format = audio_format;
        }
        if let Some(bitrate) = self.audio_bitrate {
            options.audio_bitrate = bitrate;
        }
        options.subtitles |= self.subs;
        options.auto_subtitles |= self.auto_subs;
        if let Some(langs) = &self.sub_langs {
            options.subtitle_langs = langs.clone();
        }
        options.embed_metadata |= self.embed_metadata;
        options.embed_thumbnail |= self.embed_thumbnail;
        options.write_info_json |= self.write_info_json;
        if self.no_playlist {
            options.allow_playlists = false;
        }
        if self.yes_playlist {
            options.allow_playlists = true;
        }
        if let Some(rate) = &self.rate_limit {
            options.rate_limit = rate.clone();
        }
        if let Some(cookies) = &self.cookies {
            options.cookies_path = expand_home(cookies).to_string_lossy().into_owned();
        }
    }
}

/// Drop batch-file comment lines
pub fn strip_comments(text: &str) -> String {
    text.split(|c| c == '\n' || c == '\r')
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Exit status for a finished run
pub fn exit_status(summary: &RunSummary) -> u8 {
    if summary.cancelled {
        130
    } else if summary.failed() > 0 {
        1
    } else {
        0
    }
}

pub async fn run(args: DownloadArgs, app_config: &AppConfig) -> anyhow::Result<ExitCode> {
    let mut options = app_config.defaults.clone();
    args.apply_to(&mut options);

    let (mut session, mut events) = build_session(app_config, options)?;
    session.add_to_queue(&args.urls.join("\n"));
    if let Some(batch) = &args.batch_file {
        let text = read_batch_file(batch)?;
        session.add_to_queue(&strip_comments(&text));
    }
    info!("Queued {} URL(s)", session.queue().len());

    let show_bar = !args.no_progress && std::io::stderr().is_terminal();
    let mut display = TerminalDisplay::new(show_bar);

    session
        .start_download(&mut display)
        .await
        .context("Could not start the download")?;
    pump_events(&mut session, &mut events, &mut display).await?;

    let summary = session.summary();
    eprintln!(
        "Downloaded {} of {} item(s){}",
        summary.completed,
        session.queue().len(),
        if summary.cancelled { " (canceled)" } else { "" }
    );
    Ok(ExitCode::from(exit_status(&summary)))
}
