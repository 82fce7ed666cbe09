//! Reading and producing the merged corpus file.
//!
//! A merged corpus is the concatenation of many source files, each introduced
//! by a blank line pair, a separator of 50 `=` characters, and the file name.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};

pub const SEPARATOR_WIDTH: usize = 50;

pub fn is_separator_line(trimmed: &str) -> bool {
    trimmed.len() == SEPARATOR_WIDTH && trimmed.bytes().all(|b| b == b'=')
}

/// Read the whole corpus, replacing invalid UTF-8 sequences instead of failing.
pub fn read_corpus(path: &Path) -> Result<String> {
    if !path.is_file() { return Err(Error::SourceNotFound(path.to_path_buf())); }
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), "corpus is not valid UTF-8; decoding lossily");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub files: usize,
    pub bytes: usize,
}

/// Merge every matching file under `root` into `out`.
///
/// `extensions` are matched against the end of the file name (so `xaml.cs`
/// works); an empty list accepts every file. Files are visited in path order
/// and empty files are skipped.
pub fn merge_directory(root: &Path, out: &Path, extensions: &[String]) -> Result<MergeReport> {
    if !root.is_dir() { return Err(Error::SourceNotFound(root.to_path_buf())); }
    let files = list_source_files(root, out, extensions);
    let separator = format!("\n\n{}\n", "=".repeat(SEPARATOR_WIDTH));
    let mut parts = Vec::with_capacity(files.len());
    for file_path in &files {
        let raw = fs::read(file_path)?;
        let content = String::from_utf8_lossy(&raw);
        let content = content.trim();
        if content.is_empty() { continue; }
        let name = file_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        parts.push(format!("{separator}{name}\n{content}"));
    }
    let merged = parts.join("\n");
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() { fs::create_dir_all(parent)?; }
    }
    fs::write(out, &merged)?;
    info!(files = parts.len(), bytes = merged.len(), out = %out.display(), "merged corpus written");
    Ok(MergeReport { files: parts.len(), bytes: merged.len() })
}

fn list_source_files(root: &Path, out: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.as_path() != out)
        .filter(|p| matches_extension(p, extensions))
        .collect();
    files.sort();
    files
}

fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() { return true; }
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else { return false };
    extensions.iter().any(|ext| {
        let ext = ext.trim_start_matches('.');
        name.len() > ext.len() + 1 && name.ends_with(ext) && name.as_bytes()[name.len() - ext.len() - 1] == b'.'
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_detection() {
        assert!(is_separator_line(&"=".repeat(50)));
        assert!(!is_separator_line(&"=".repeat(49)));
        assert!(!is_separator_line("== not a separator =="));
    }

    #[test]
    fn extension_matching_accepts_compound_suffixes() {
        let exts = vec!["cs".to_string(), ".xaml".to_string()];
        assert!(matches_extension(Path::new("a/Main.xaml.cs"), &exts));
        assert!(matches_extension(Path::new("View.xaml"), &exts));
        assert!(!matches_extension(Path::new("notes.txt"), &exts));
        assert!(!matches_extension(Path::new("cs"), &exts));
        assert!(matches_extension(Path::new("anything.bin"), &[]));
    }
}
