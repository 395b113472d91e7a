//! Option translation
//!
//! Turns the user's download selections into the engine configuration
//! record. The record keeps the engine's own option names so it can be dumped
//! as JSON, and translates one-to-one into engine command-line flags.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

/// Format selector used when the user keeps the default choice
pub const DEFAULT_FORMAT_SELECTOR: &str = "bv*+ba/b";

/// Format selector used when extracting audio
pub const AUDIO_FORMAT_SELECTOR: &str = "ba/b";

/// Value of the "best (default)" format choice
pub const BEST_FORMAT: &str = "best";

/// Output template placed under the chosen folder
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Target codec for audio extraction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    M4a,
    Wav,
    Flac,
    Opus,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 5] = [
        AudioFormat::Mp3,
        AudioFormat::M4a,
        AudioFormat::Wav,
        AudioFormat::Flac,
        AudioFormat::Opus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Opus => "opus",
        }
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        AudioFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| format!("Invalid audio format: {} (expected mp3, m4a, wav, flac or opus)", s))
    }
}

/// Target bitrate for audio extraction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AudioBitrate {
    #[default]
    #[serde(rename = "192K")]
    K192,
    #[serde(rename = "256K")]
    K256,
    #[serde(rename = "320K")]
    K320,
}

impl AudioBitrate {
    pub const ALL: [AudioBitrate; 3] = [AudioBitrate::K192, AudioBitrate::K256, AudioBitrate::K320];

    /// Label as shown to the user, e.g. "192K"
    pub fn label(&self) -> &'static str {
        match self {
            AudioBitrate::K192 => "192K",
            AudioBitrate::K256 => "256K",
            AudioBitrate::K320 => "320K",
        }
    }

    /// Engine quality value, the label without the unit
    pub fn quality(&self) -> &'static str {
        self.label().trim_end_matches('K')
    }
}

impl FromStr for AudioBitrate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        let wanted = if wanted.ends_with('K') {
            wanted
        } else {
            format!("{}K", wanted)
        };
        AudioBitrate::ALL
            .into_iter()
            .find(|b| b.label() == wanted)
            .ok_or_else(|| format!("Invalid audio bitrate: {} (expected 192K, 256K or 320K)", s))
    }
}

/// Download selections as the user made them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DownloadOptions {
    pub output_dir: PathBuf,
    /// Format id chosen from the listing, or "best"
    pub format: String,
    pub extract_audio: bool,
    pub audio_format: AudioFormat,
    pub audio_bitrate: AudioBitrate,
    pub subtitles: bool,
    pub auto_subtitles: bool,
    /// Comma-separated language codes
    pub subtitle_langs: String,
    pub embed_metadata: bool,
    pub embed_thumbnail: bool,
    pub write_info_json: bool,
    pub allow_playlists: bool,
    /// Free text such as "500K" or "1.5M"
    pub rate_limit: String,
    /// Netscape cookies.txt path, blank for none
    pub cookies_path: String,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            format: BEST_FORMAT.to_string(),
            extract_audio: false,
            audio_format: AudioFormat::default(),
            audio_bitrate: AudioBitrate::default(),
            subtitles: false,
            auto_subtitles: false,
            subtitle_langs: "en".to_string(),
            embed_metadata: false,
            embed_thumbnail: false,
            write_info_json: false,
            allow_playlists: true,
            rate_limit: String::new(),
            cookies_path: String::new(),
        }
    }
}

/// The user's download folder, falling back to the current directory
pub fn default_output_dir() -> PathBuf {
    if let Some(user_dirs) = directories::UserDirs::new() {
        if let Some(dir) = user_dirs.download_dir() {
            return dir.to_path_buf();
        }
        return user_dirs.home_dir().join("Downloads");
    }
    PathBuf::from(".")
}

/// Retry counts passed through to the engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub fragment_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            fragment_retries: 3,
        }
    }
}

/// Engine post-processing step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostProcessor {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferredcodec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferredquality: Option<String>,
}

impl PostProcessor {
    pub fn extract_audio(codec: AudioFormat, bitrate: AudioBitrate) -> Self {
        Self {
            key: "FFmpegExtractAudio".to_string(),
            preferredcodec: Some(codec.as_str().to_string()),
            preferredquality: Some(bitrate.quality().to_string()),
        }
    }
}

/// Engine configuration record, keyed by the engine's option names
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EngineConfig {
    pub outtmpl: String,
    pub noplaylist: bool,
    pub retries: u32,
    pub fragment_retries: u32,
    pub continuedl: bool,
    pub quiet: bool,
    pub no_warnings: bool,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratelimit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookiefile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitleslangs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub writesubtitles: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub writeautomaticsub: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub embedmetadata: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub addmetadata: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub writethumbnail: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub embedthumbnail: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub writeinfojson: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub postprocessors: Vec<PostProcessor>,
}

impl EngineConfig {
    pub fn from_options(options: &DownloadOptions, retry: RetryPolicy) -> Self {
        let outtmpl = options
            .output_dir
            .join(OUTPUT_TEMPLATE)
            .to_string_lossy()
            .into_owned();

        let format = match options.format.trim() {
            "" | BEST_FORMAT => DEFAULT_FORMAT_SELECTOR.to_string(),
            chosen => chosen.to_string(),
        };

        let mut config = EngineConfig {
            outtmpl,
            noplaylist: !options.allow_playlists,
            retries: retry.retries,
            fragment_retries: retry.fragment_retries,
            continuedl: true,
            quiet: true,
            no_warnings: true,
            format,
            ratelimit: parse_rate_limit(&options.rate_limit),
            ..Default::default()
        };

        let cookies = options.cookies_path.trim();
        if !cookies.is_empty() {
            config.cookiefile = Some(cookies.to_string());
        }

        if options.subtitles {
            let langs: Vec<String> = options
                .subtitle_langs
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !langs.is_empty() {
                config.subtitleslangs = Some(langs);
            }
            config.writesubtitles = true;
            if options.auto_subtitles {
                config.writeautomaticsub = true;
            }
        }

        if options.embed_metadata {
            config.embedmetadata = true;
            config.addmetadata = true;
        }
        if options.embed_thumbnail {
            config.writethumbnail = true;
            config.embedthumbnail = true;
        }
        if options.write_info_json {
            config.writeinfojson = true;
        }

        if options.extract_audio {
            config.format = AUDIO_FORMAT_SELECTOR.to_string();
            config.postprocessors = vec![PostProcessor::extract_audio(
                options.audio_format,
                options.audio_bitrate,
            )];
        }

        config
    }

    /// Engine command-line flags equivalent to this record
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-o".into(), self.outtmpl.clone()];

        args.push(if self.noplaylist { "--no-playlist" } else { "--yes-playlist" }.into());
        args.push("--retries".into());
        args.push(self.retries.to_string());
        args.push("--fragment-retries".into());
        args.push(self.fragment_retries.to_string());
        args.push(if self.continuedl { "--continue" } else { "--no-continue" }.into());
        if self.quiet {
            args.push("--quiet".into());
        }
        if self.no_warnings {
            args.push("--no-warnings".into());
        }

        if let Some(rate) = self.ratelimit {
            args.push("--limit-rate".into());
            args.push(rate.to_string());
        }
        if let Some(cookies) = &self.cookiefile {
            args.push("--cookies".into());
            args.push(cookies.clone());
        }

        args.push("-f".into());
        args.push(self.format.clone());

        if self.writesubtitles {
            args.push("--write-subs".into());
        }
        if self.writeautomaticsub {
            args.push("--write-auto-subs".into());
        }
        if let Some(langs) = &self.subtitleslangs {
            args.push("--sub-langs".into());
            args.push(langs.join(","));
        }

        if self.embedmetadata || self.addmetadata {
            args.push("--embed-metadata".into());
        }
        if self.writethumbnail {
            args.push("--write-thumbnail".into());
        }
        if self.embedthumbnail {
            args.push("--embed-thumbnail".into());
        }
        if self.writeinfojson {
            args.push("--write-info-json".into());
        }

        for pp in &self.postprocessors {
            if pp.key == "FFmpegExtractAudio" {
                args.push("-x".into());
                if let Some(codec) = &pp.preferredcodec {
                    args.push("--audio-format".into());
                    args.push(codec.clone());
                }
                if let Some(quality) = &pp.preferredquality {
                    args.push("--audio-quality".into());
                    args.push(format!("{}K", quality));
                }
            }
        }

        args
    }
}

fn rate_limit_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(\d+(?:\.\d+)?)\s*([KMG])?B?$").expect("rate limit pattern is valid")
    })
}

/// Convert strings like "500K", "2M", "1.5M" or "3G" to bytes/sec.
/// Returns None when empty or invalid.
pub fn parse_rate_limit(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let caps = rate_limit_regex().captures(s)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let mult: f64 = match caps.get(2).map(|m| m.as_str().to_ascii_uppercase()) {
        Some(unit) if unit == "K" => 1024.0,
        Some(unit) if unit == "M" => 1024.0 * 1024.0,
        Some(unit) if unit == "G" => 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    };
    Some((value * mult) as u64)
}
