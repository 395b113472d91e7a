//! URL and input validation utilities

use anyhow::{anyhow, Result};
use url::Url;

/// Parse `url`, reporting why it is not a URL
pub fn validate_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| anyhow!("Invalid URL format: {}", e))
}

/// Check if URL looks like something the engine can fetch over the web
pub fn is_valid_video_url(url: &str) -> bool {
    if let Ok(parsed) = validate_url(url) {
        let scheme = parsed.scheme();
        scheme == "http" || scheme == "https"
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_video_url() {
        assert!(is_valid_video_url("https://www.youtube.com/watch?v=abc"));
        assert!(is_valid_video_url("http://example.com/video.mp4"));
        assert!(!is_valid_video_url("ftp://example.com/video.mp4"));
        assert!(!is_valid_video_url("ytsearch:cats"));
        assert!(!is_valid_video_url("not a url"));
    }

    #[test]
    fn test_validate_url_error() {
        let err = validate_url("::nope").unwrap_err();
        assert!(err.to_string().starts_with("Invalid URL format"));
    }
}
