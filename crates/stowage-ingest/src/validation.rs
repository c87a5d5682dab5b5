//! Content validation pipeline
//!
//! [`validate_file`] runs a fixed sequence of checks over an untrusted
//! `(filename, declared MIME, size, content prefix)` tuple and fails on the
//! first violation. The order is deliberate: earlier checks are cheaper or
//! catch higher-severity abuse. The function is pure and deterministic, so
//! the same input always produces the same verdict.

use stowage_core::{AppError, StowageConfig};

use crate::sniff;

pub const MAX_FILENAME_LENGTH: usize = 255;

/// Extensions that name executable or server-interpreted content.
const DANGEROUS_EXTENSIONS: &[&str] = &[
    "exe", "dll", "com", "bat", "cmd", "scr", "pif", "msi", "jar", "app", "deb", "rpm", "sh",
    "bash", "ps1", "vbs", "js", "wsf", "php", "php3", "php4", "php5", "phtml", "jsp", "jspx",
    "asp", "aspx", "cgi", "pl", "py",
];

/// Unicode codepoints used to disguise filenames: bidi overrides and
/// zero-width characters.
const DECEPTIVE_CODEPOINTS: &[char] = &[
    '\u{202A}', '\u{202B}', '\u{202C}', '\u{202D}', '\u{202E}', '\u{2066}', '\u{2067}',
    '\u{2068}', '\u{2069}', '\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}',
];

/// Extension to allowed-MIME table for the cross-check. Unknown extensions
/// are permitted (fail-open for unmapped types); tightening this would
/// change accepted-file behavior for no security gain.
fn allowed_mimes_for_extension(ext: &str) -> Option<&'static [&'static str]> {
    let allowed: &[&str] = match ext {
        "pdf" => &["application/pdf"],
        "jpg" | "jpeg" => &["image/jpeg"],
        "png" => &["image/png"],
        "gif" => &["image/gif"],
        "webp" => &["image/webp"],
        "mp4" | "m4v" => &["video/mp4"],
        "webm" => &["video/webm"],
        "mp3" => &["audio/mpeg"],
        "ogg" | "oga" => &["audio/ogg"],
        "txt" => &["text/plain"],
        "csv" => &["text/csv", "text/plain"],
        "zip" => &["application/zip"],
        "epub" => &["application/epub+zip", "application/zip"],
        _ => return None,
    };
    Some(allowed)
}

fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        // Dotfiles like ".gitignore" have no extension
        return None;
    }
    Some(ext.to_lowercase())
}

fn validation_error(code: &'static str, message: impl Into<String>) -> AppError {
    AppError::Validation {
        code,
        message: message.into(),
    }
}

/// Validate an untrusted file before any byte of it is trusted.
///
/// `content_prefix` is the leading bytes of the payload when the caller has
/// them; signature and executable checks are skipped when absent.
pub fn validate_file(
    name: &str,
    declared_mime: &str,
    size: i64,
    content_prefix: Option<&[u8]>,
    config: &StowageConfig,
) -> Result<(), AppError> {
    check_filename_shape(name)?;
    check_dangerous_filename(name)?;
    check_declared_type(declared_mime, config)?;
    check_extension_mime(name, declared_mime)?;
    check_size(declared_mime, size, config)?;
    if let Some(prefix) = content_prefix {
        check_content(declared_mime, prefix)?;
    }
    Ok(())
}

fn check_filename_shape(name: &str) -> Result<(), AppError> {
    if name.is_empty() {
        return Err(validation_error("INVALID_FILENAME", "Filename is empty"));
    }
    if name.chars().count() > MAX_FILENAME_LENGTH {
        return Err(validation_error(
            "FILENAME_TOO_LONG",
            format!("Filename exceeds {} characters", MAX_FILENAME_LENGTH),
        ));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(validation_error(
            "INVALID_FILENAME",
            "Filename must not contain path separators",
        ));
    }
    if name == ".." || name.contains("../") || name.contains("..\\") {
        return Err(validation_error(
            "INVALID_FILENAME",
            "Filename must not contain parent references",
        ));
    }
    Ok(())
}

fn check_dangerous_filename(name: &str) -> Result<(), AppError> {
    if name.contains('\0') {
        return Err(validation_error(
            "DANGEROUS_FILENAME",
            "Filename contains a null byte",
        ));
    }
    if name.chars().any(|c| DECEPTIVE_CODEPOINTS.contains(&c)) {
        return Err(validation_error(
            "DANGEROUS_FILENAME",
            "Filename contains invisible or direction-override characters",
        ));
    }

    // Every dot-separated segment after the first counts: catches both
    // "malware.exe" and double extensions like "report.pdf.exe".
    let lowered = name.to_lowercase();
    let mut segments = lowered.split('.');
    segments.next();
    for segment in segments {
        if DANGEROUS_EXTENSIONS.contains(&segment) {
            return Err(validation_error(
                "DANGEROUS_FILENAME",
                format!("Filename has a dangerous extension: .{}", segment),
            ));
        }
    }
    Ok(())
}

fn check_declared_type(declared_mime: &str, config: &StowageConfig) -> Result<(), AppError> {
    let mime = declared_mime.to_lowercase();
    if config.allowed_content_types.iter().any(|m| *m == mime) {
        return Ok(());
    }
    let hint: Vec<&str> = config
        .allowed_content_types
        .iter()
        .take(4)
        .map(String::as_str)
        .collect();
    Err(validation_error(
        "INVALID_FILE_TYPE",
        format!(
            "Content type '{}' is not allowed (allowed types include {})",
            declared_mime,
            hint.join(", ")
        ),
    ))
}

fn check_extension_mime(name: &str, declared_mime: &str) -> Result<(), AppError> {
    let Some(ext) = extension_of(name) else {
        return Ok(());
    };
    let Some(allowed) = allowed_mimes_for_extension(&ext) else {
        return Ok(());
    };
    let mime = declared_mime.to_lowercase();
    if allowed.contains(&mime.as_str()) {
        Ok(())
    } else {
        Err(validation_error(
            "EXTENSION_MISMATCH",
            format!(
                "Declared type '{}' does not match extension '.{}'",
                declared_mime, ext
            ),
        ))
    }
}

fn check_size(declared_mime: &str, size: i64, config: &StowageConfig) -> Result<(), AppError> {
    if size == 0 {
        return Err(validation_error("EMPTY_FILE", "File is empty"));
    }
    if size < 0 {
        return Err(validation_error(
            "INVALID_FILE_SIZE",
            "File size must be positive",
        ));
    }
    let limit = config.size_limit_for(declared_mime);
    if size as u64 > limit {
        return Err(validation_error(
            "FILE_TOO_LARGE",
            format!("File of {} bytes exceeds the {} byte limit", size, limit),
        ));
    }
    Ok(())
}

fn check_content(declared_mime: &str, prefix: &[u8]) -> Result<(), AppError> {
    // Executable and markup scans run regardless of the declared type.
    if sniff::is_executable(prefix) {
        return Err(validation_error(
            "EXECUTABLE_DETECTED",
            "Content is an executable binary",
        ));
    }
    let mime = declared_mime.to_lowercase();
    if sniff::has_markup_script_markers(prefix) {
        return Err(validation_error(
            "XSS_CONTENT_DETECTED",
            "Content contains active markup or script",
        ));
    }
    if sniff::signature_matches(&mime, prefix) == Some(false) {
        return Err(validation_error(
            "INVALID_FILE_TYPE",
            format!("Content does not match declared type '{}'", declared_mime),
        ));
    }
    Ok(())
}

/// Produce a storage-safe filename from an arbitrary one: traversal
/// sequences, null bytes and shell-hostile characters are stripped, the
/// result is truncated to the filename length cap. Usable on names that
/// failed validation; never errors.
pub fn safe_filename(name: &str) -> String {
    let cleaned: String = name
        .replace("..", "")
        .chars()
        .filter(|c| {
            !c.is_control()
                && !DECEPTIVE_CODEPOINTS.contains(c)
                && !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0')
        })
        .collect();
    let trimmed = cleaned.trim().trim_start_matches('.');
    let fallback = if trimmed.is_empty() { "unnamed" } else { trimmed };
    fallback.chars().take(MAX_FILENAME_LENGTH).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StowageConfig {
        StowageConfig::default()
    }

    #[test]
    fn test_valid_pdf_passes() {
        let result = validate_file(
            "report.pdf",
            "application/pdf",
            1024,
            Some(b"%PDF-1.7 content"),
            &config(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_checks_run_in_order() {
        // A name that is both too long and dangerous fails on length first
        let long_dangerous = format!("{}.exe", "a".repeat(300));
        let err = validate_file(&long_dangerous, "application/pdf", 10, None, &config())
            .unwrap_err();
        assert_eq!(error_code(&err), "FILENAME_TOO_LONG");
    }

    fn error_code(err: &AppError) -> &'static str {
        match err {
            AppError::Validation { code, .. } => code,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_double_extension_rejected() {
        let err =
            validate_file("report.pdf.exe", "application/pdf", 10, None, &config()).unwrap_err();
        assert_eq!(error_code(&err), "DANGEROUS_FILENAME");
    }

    #[test]
    fn test_bidi_override_rejected() {
        let err = validate_file(
            "invoice\u{202E}fdp.exe",
            "application/pdf",
            10,
            None,
            &config(),
        )
        .unwrap_err();
        assert_eq!(error_code(&err), "DANGEROUS_FILENAME");
    }

    #[test]
    fn test_disallowed_type_rejected_with_hint() {
        let err =
            validate_file("tool.bin", "application/x-custom", 10, None, &config()).unwrap_err();
        assert_eq!(error_code(&err), "INVALID_FILE_TYPE");
        assert!(err.to_string().contains("application/pdf"));
    }

    #[test]
    fn test_extension_mismatch() {
        let err = validate_file("photo.png", "image/jpeg", 10, None, &config()).unwrap_err();
        assert_eq!(error_code(&err), "EXTENSION_MISMATCH");
    }

    #[test]
    fn test_unknown_extension_fails_open() {
        // ".dat" is not in the extension table; only the whitelist applies
        assert!(validate_file("data.dat", "application/pdf", 10, None, &config()).is_ok());
    }

    #[test]
    fn test_size_checks() {
        let cfg = config();
        assert_eq!(
            error_code(&validate_file("a.pdf", "application/pdf", 0, None, &cfg).unwrap_err()),
            "EMPTY_FILE"
        );
        assert_eq!(
            error_code(&validate_file("a.pdf", "application/pdf", -5, None, &cfg).unwrap_err()),
            "INVALID_FILE_SIZE"
        );
        let over = (cfg.max_file_bytes + 1) as i64;
        assert_eq!(
            error_code(&validate_file("a.pdf", "application/pdf", over, None, &cfg).unwrap_err()),
            "FILE_TOO_LARGE"
        );
    }

    #[test]
    fn test_executable_content_detected_regardless_of_type() {
        let err = validate_file(
            "innocent.pdf",
            "application/pdf",
            100,
            Some(b"MZ\x90\x00\x03"),
            &config(),
        )
        .unwrap_err();
        assert_eq!(error_code(&err), "EXECUTABLE_DETECTED");
    }

    #[test]
    fn test_spoofed_signature_detected() {
        let err = validate_file(
            "photo.png",
            "image/png",
            100,
            Some(b"GIF89a not a png"),
            &config(),
        )
        .unwrap_err();
        assert_eq!(error_code(&err), "INVALID_FILE_TYPE");
    }

    #[test]
    fn test_script_content_detected() {
        let err = validate_file(
            "notes.txt",
            "text/plain",
            100,
            Some(b"<script>alert(1)</script>"),
            &config(),
        )
        .unwrap_err();
        assert_eq!(error_code(&err), "XSS_CONTENT_DETECTED");
    }

    #[test]
    fn test_script_content_detected_regardless_of_declared_type() {
        // The marker scan has no declared-type exemption
        let err = validate_file(
            "report.pdf",
            "application/pdf",
            100,
            Some(b"<!doctype html><script>alert(1)</script>"),
            &config(),
        )
        .unwrap_err();
        assert_eq!(error_code(&err), "XSS_CONTENT_DETECTED");

        // Declaring text/html does not help: the whitelist rejects it first
        let err = validate_file(
            "page.html",
            "text/html",
            100,
            Some(b"<!doctype html>"),
            &config(),
        )
        .unwrap_err();
        assert_eq!(error_code(&err), "INVALID_FILE_TYPE");
    }

    #[test]
    fn test_deterministic() {
        let cfg = config();
        let a = validate_file("x.pdf", "application/pdf", 42, Some(b"%PDF-"), &cfg);
        let b = validate_file("x.pdf", "application/pdf", 42, Some(b"%PDF-"), &cfg);
        assert_eq!(a.is_ok(), b.is_ok());
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(safe_filename("re:po*rt?.pdf"), "report.pdf");
        assert_eq!(safe_filename("...hidden"), "hidden");
        assert_eq!(safe_filename("///"), "unnamed");
        assert!(safe_filename(&"x".repeat(500)).chars().count() <= MAX_FILENAME_LENGTH);
    }
}
