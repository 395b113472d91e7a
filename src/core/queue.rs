//! Ordered list of pending URLs

use tracing::{debug, warn};

use crate::core::models::{AppError, AppResult, DownloadItem};
use crate::utils::validation::is_valid_video_url;

/// Split free text into trimmed, non-blank lines. `\n`, `\r\n` and a lone
/// `\r` all end a line.
pub fn safe_strip_lines(text: &str) -> Vec<String> {
    text.split(|c| c == '\n' || c == '\r')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Default, Clone)]
pub struct UrlQueue {
    items: Vec<DownloadItem>,
}

impl UrlQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every non-blank line of `text`, returning how many were added
    pub fn add_from_text(&mut self, text: &str) -> usize {
        let urls = safe_strip_lines(text);
        for url in &urls {
            if !is_valid_video_url(url) {
                warn!("Queued entry is not an http(s) URL, passing through: {}", url);
            }
            self.items.push(DownloadItem::new(url.clone()));
        }
        debug!("Added {} URL(s), queue length {}", urls.len(), self.items.len());
        urls.len()
    }

    /// Remove the given positions. All indices are checked before anything
    /// is removed.
    pub fn remove_selected(&mut self, indices: &[usize]) -> AppResult<usize> {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();

        if let Some(&bad) = sorted.iter().find(|&&idx| idx >= self.items.len()) {
            return Err(AppError::Parse(format!(
                "Queue index {} out of range (queue has {} item(s))",
                bad,
                self.items.len()
            )));
        }

        for idx in &sorted {
            self.items.remove(*idx);
        }
        Ok(sorted.len())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&DownloadItem> {
        self.items.first()
    }

    pub fn items(&self) -> &[DownloadItem] {
        &self.items
    }

    pub fn urls(&self) -> Vec<String> {
        self.items.iter().map(|item| item.url.clone()).collect()
    }

    /// Copy of the queue handed to the worker at start
    pub fn snapshot(&self) -> Vec<DownloadItem> {
        self.items.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_from_text_strips_blank_lines() {
        let mut queue = UrlQueue::new();
        let added = queue.add_from_text("  https://a.example/1  \n\n\t\nhttps://a.example/2\n");
        assert_eq!(added, 2);
        assert_eq!(queue.urls(), vec!["https://a.example/1", "https://a.example/2"]);
    }

    #[test]
    fn test_add_from_text_accepts_any_line_ending() {
        let mut queue = UrlQueue::new();
        let added = queue.add_from_text("https://a.example/1\rhttps://a.example/2\r\nhttps://a.example/3");
        assert_eq!(added, 3);
        assert_eq!(
            queue.urls(),
            vec!["https://a.example/1", "https://a.example/2", "https://a.example/3"]
        );
    }

    #[test]
    fn test_add_empty_text_is_noop() {
        let mut queue = UrlQueue::new();
        assert_eq!(queue.add_from_text("   \n  "), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_non_http_entries_are_kept() {
        let mut queue = UrlQueue::new();
        queue.add_from_text("ytsearch:rust talks");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_remove_selected_uses_positions_before_removal() {
        let mut queue = UrlQueue::new();
        queue.add_from_text("a\nb\nc\nd");
        let removed = queue.remove_selected(&[0, 2, 2]).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(queue.urls(), vec!["b", "d"]);
    }

    #[test]
    fn test_remove_out_of_range_leaves_queue_untouched() {
        let mut queue = UrlQueue::new();
        queue.add_from_text("a\nb");
        assert!(queue.remove_selected(&[0, 5]).is_err());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_clear_and_first() {
        let mut queue = UrlQueue::new();
        queue.add_from_text("first\nsecond");
        assert_eq!(queue.first().map(|i| i.url.as_str()), Some("first"));
        queue.clear();
        assert!(queue.first().is_none());
    }
}
