//! File system utilities

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Ensure directory exists
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .map_err(|e| anyhow!("Failed to create directory {}: {}", path.display(), e))?;
    }
    Ok(())
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &str) -> PathBuf {
    let home = directories::UserDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    match (path, home) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

/// Read a batch file of URLs; `-` reads standard input
pub fn read_batch_file(path: &str) -> Result<String> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read URLs from standard input")?;
        return Ok(text);
    }

    let path = expand_home(path);
    fs::read_to_string(&path)
        .with_context(|| format!("Failed to read batch file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_home("relative"), PathBuf::from("relative"));
        if let Some(dirs) = directories::UserDirs::new() {
            assert_eq!(expand_home("~/Videos"), dirs.home_dir().join("Videos"));
            assert_eq!(expand_home("~"), dirs.home_dir());
        }
    }

    #[test]
    fn test_read_batch_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.txt");
        fs::write(&path, "https://a.example/v\n# comment\n").unwrap();

        let text = read_batch_file(path.to_str().unwrap()).unwrap();
        assert!(text.starts_with("https://a.example/v"));
        assert!(read_batch_file(dir.path().join("missing.txt").to_str().unwrap()).is_err());
    }

    #[test]
    fn test_ensure_dir_exists() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
