//! Archive entry filter
//!
//! Decides, per entry name and before any extraction work, whether the entry
//! is junk, a directory, or a traversal attempt. Skips are expected and
//! recorded; they are not errors.

use stowage_core::AppError;

/// Why an archive entry was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyName,
    PathTraversal,
    Directory,
    SystemFile,
    EmptyFile,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::EmptyName => "EMPTY_NAME",
            SkipReason::PathTraversal => "PATH_TRAVERSAL",
            SkipReason::Directory => "DIRECTORY",
            SkipReason::SystemFile => "SYSTEM_FILE",
            SkipReason::EmptyFile => "EMPTY_FILE",
        }
    }
}

/// OS metadata, VCS, IDE, and build-cache names, matched case-insensitively
/// against whole path segments. Any component match is enough
/// (`__MACOSX/anything` is junk).
const SYSTEM_SEGMENTS: &[&str] = &[
    ".ds_store",
    "__macosx",
    "thumbs.db",
    "desktop.ini",
    ".spotlight-v100",
    ".trashes",
    ".fseventsd",
    ".git",
    ".svn",
    ".hg",
    ".idea",
    ".vscode",
    "node_modules",
    "__pycache__",
    ".pytest_cache",
    "target",
    ".gradle",
];

/// Editor/Office temp files by leading characters of a segment.
const SYSTEM_PREFIXES: &[&str] = &["~$", "._"];

/// Temp and backup files by trailing extension.
const SYSTEM_SUFFIXES: &[&str] = &[".tmp", ".swp", ".bak"];

/// Evaluate an entry name against the skip rules. `None` means extract it.
pub fn should_skip(entry_name: &str) -> Option<SkipReason> {
    if entry_name.is_empty() {
        return Some(SkipReason::EmptyName);
    }

    let normalized = entry_name.replace('\\', "/");
    if normalized.starts_with('/')
        || normalized
            .split('/')
            .any(|segment| segment == "..")
    {
        return Some(SkipReason::PathTraversal);
    }
    if normalized.ends_with('/') {
        return Some(SkipReason::Directory);
    }

    let lowered = normalized.to_lowercase();
    for segment in lowered.split('/') {
        let junk = SYSTEM_SEGMENTS.contains(&segment)
            || SYSTEM_PREFIXES.iter().any(|p| segment.starts_with(p))
            || SYSTEM_SUFFIXES.iter().any(|s| segment.ends_with(s));
        if junk {
            return Some(SkipReason::SystemFile);
        }
    }
    None
}

/// Normalize an entry name into the storage-safe relative path used for the
/// object key: separators unified, `.` and `..` segments dropped. Errors if
/// nothing valid remains.
pub fn sanitize_path(entry_name: &str) -> Result<String, AppError> {
    let normalized = entry_name.replace('\\', "/");
    let segments: Vec<&str> = normalized
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();
    if segments.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "archive entry name '{}' has no usable path",
            entry_name
        )));
    }
    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_file_not_skipped() {
        assert_eq!(should_skip("doc1.pdf"), None);
        assert_eq!(should_skip("unit1/lesson/notes.pdf"), None);
    }

    #[test]
    fn test_empty_and_traversal() {
        assert_eq!(should_skip(""), Some(SkipReason::EmptyName));
        assert_eq!(should_skip("../evil.sh"), Some(SkipReason::PathTraversal));
        assert_eq!(should_skip("a/../../b.txt"), Some(SkipReason::PathTraversal));
        assert_eq!(should_skip("/etc/passwd"), Some(SkipReason::PathTraversal));
        assert_eq!(should_skip("..\\win\\evil.dll"), Some(SkipReason::PathTraversal));
    }

    #[test]
    fn test_directories_skipped() {
        assert_eq!(should_skip("docs/"), Some(SkipReason::Directory));
    }

    #[test]
    fn test_system_files_skipped() {
        assert_eq!(should_skip(".DS_Store"), Some(SkipReason::SystemFile));
        assert_eq!(should_skip("__MACOSX/._doc1.pdf"), Some(SkipReason::SystemFile));
        assert_eq!(should_skip("project/.git/config"), Some(SkipReason::SystemFile));
        assert_eq!(should_skip("report/~$draft.docx"), Some(SkipReason::SystemFile));
        assert_eq!(should_skip("cache/file.tmp"), Some(SkipReason::SystemFile));
        assert_eq!(should_skip("node_modules/pkg/index.js"), Some(SkipReason::SystemFile));
    }

    #[test]
    fn test_system_pattern_needs_whole_segment() {
        // "targeting.pdf" must not match the "target" build-dir pattern
        assert_eq!(should_skip("targeting.pdf"), None);
        assert_eq!(should_skip("gitlog.txt"), None);
    }

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("a/./b/../c.pdf").unwrap(), "a/b/c.pdf");
        assert_eq!(sanitize_path("win\\docs\\x.pdf").unwrap(), "win/docs/x.pdf");
        assert_eq!(sanitize_path("/lead/slash.txt").unwrap(), "lead/slash.txt");
        assert!(sanitize_path("../..").is_err());
        assert!(sanitize_path("").is_err());
    }

    /// Sanitizing an already-sanitized path changes nothing.
    #[test]
    fn test_sanitize_idempotent() {
        for raw in ["a/./b/../c.pdf", "win\\x.pdf", "plain.txt", "d/e/f.png"] {
            let once = sanitize_path(raw).unwrap();
            let twice = sanitize_path(&once).unwrap();
            assert_eq!(once, twice);
        }
    }
}
