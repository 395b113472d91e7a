//! Format listing built from the engine's info record

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::core::models::FormatEntry;
use crate::core::progress_tracker::human_bytes;

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn str_field<'a>(format: &'a Value, key: &str) -> &'a str {
    format.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Truthy field value, if any
fn present<'a>(format: &'a Value, key: &str) -> Option<&'a Value> {
    format.get(key).filter(|v| is_truthy(v))
}

fn codec_flag(codec: &str) -> Option<String> {
    (!codec.is_empty() && codec != "none").then(|| codec.to_string())
}

/// One display row for a format object
pub fn describe_format(format: &Value) -> FormatEntry {
    let format_id = str_field(format, "format_id");
    let ext = str_field(format, "ext");
    let resolution = str_field(format, "resolution");
    let note = str_field(format, "format_note");

    let mut flags: Vec<String> = Vec::new();
    flags.extend(codec_flag(str_field(format, "vcodec")));
    flags.extend(codec_flag(str_field(format, "acodec")));
    if let Some(abr) = present(format, "abr") {
        flags.push(format!("abr:{}", abr));
    }
    if let Some(tbr) = present(format, "tbr") {
        flags.push(format!("tbr:{}", tbr));
    }
    if let Some(fps) = present(format, "fps") {
        flags.push(format!("{}fps", fps));
    }
    let filesize = present(format, "filesize").or_else(|| present(format, "filesize_approx"));
    if let Some(size) = filesize.and_then(Value::as_f64) {
        flags.push(human_bytes(Some(size)));
    }

    let display = format!(
        "{:>5}  {:<4}  {:<10}  {:<12}  {}",
        format_id,
        ext,
        resolution,
        note,
        flags.join(" | ")
    );

    FormatEntry {
        format_id: format_id.to_string(),
        display,
    }
}

fn height_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{3,4})p").expect("height pattern is valid"))
}

/// Vertical resolution mentioned in a display row, 0 when none
pub fn display_height(display: &str) -> u32 {
    height_regex()
        .captures(display)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Highest resolution first, then by display text
pub fn sort_formats(formats: &mut [FormatEntry]) {
    formats.sort_by(|a, b| {
        display_height(&b.display)
            .cmp(&display_height(&a.display))
            .then_with(|| a.display.cmp(&b.display))
    });
}

/// Sorted listing from an info record. Records without a `formats` array
/// (e.g. playlists) produce an empty listing.
pub fn formats_from_info(info: &Value) -> Vec<FormatEntry> {
    let mut formats: Vec<FormatEntry> = info
        .get("formats")
        .and_then(Value::as_array)
        .map(|list| list.iter().map(describe_format).collect())
        .unwrap_or_default();
    sort_formats(&mut formats);
    formats
}
