//! Magic-byte inspection
//!
//! Pure functions over the first bytes of an untrusted payload: container
//! signature checks, executable-format detection, and markup/script marker
//! scanning. A payload claiming to be a PDF must start like one; a payload
//! claiming to be anything must not start like a Windows or Unix executable.

/// Map a filename extension to its canonical MIME type. Returns `None` for
/// unknown extensions; callers fall back to [`sniff_mime`].
pub fn mime_from_extension(name: &str) -> Option<&'static str> {
    let ext = name.rsplit('.').next()?.to_lowercase();
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "zip" => "application/zip",
        "epub" => "application/epub+zip",
        _ => return None,
    };
    Some(mime)
}

/// Best-effort MIME detection from leading bytes alone.
pub fn sniff_mime(prefix: &[u8]) -> Option<&'static str> {
    if prefix.starts_with(b"%PDF-") {
        Some("application/pdf")
    } else if prefix.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if prefix.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if prefix.starts_with(b"GIF87a") || prefix.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if is_riff_webp(prefix) {
        Some("image/webp")
    } else if is_mp4_ftyp(prefix) {
        Some("video/mp4")
    } else if prefix.starts_with(b"ID3") || prefix.starts_with(&[0xFF, 0xFB]) {
        Some("audio/mpeg")
    } else if prefix.starts_with(b"OggS") {
        Some("audio/ogg")
    } else if prefix.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
        Some("application/zip")
    } else {
        None
    }
}

fn is_riff_webp(prefix: &[u8]) -> bool {
    prefix.len() >= 12 && prefix.starts_with(b"RIFF") && &prefix[8..12] == b"WEBP"
}

/// ISO base-media containers carry `ftyp` at offset 4; the leading 4 bytes
/// are the box length and vary.
fn is_mp4_ftyp(prefix: &[u8]) -> bool {
    prefix.len() >= 8 && &prefix[4..8] == b"ftyp"
}

/// Check the payload prefix against the signature of the declared MIME type.
///
/// - `None`: the declared type has no known signature; nothing to verify.
/// - `Some(true)`: signature present and matching.
/// - `Some(false)`: signature present and the bytes disagree (spoofed type).
pub fn signature_matches(declared_mime: &str, prefix: &[u8]) -> Option<bool> {
    let matched = match declared_mime.to_lowercase().as_str() {
        "application/pdf" => prefix.starts_with(b"%PDF-"),
        "image/jpeg" => prefix.starts_with(&[0xFF, 0xD8, 0xFF]),
        "image/png" => prefix.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
        "image/gif" => prefix.starts_with(b"GIF87a") || prefix.starts_with(b"GIF89a"),
        "image/webp" => is_riff_webp(prefix),
        "video/mp4" => is_mp4_ftyp(prefix),
        "audio/mpeg" => prefix.starts_with(b"ID3") || prefix.starts_with(&[0xFF, 0xFB]),
        "audio/ogg" => prefix.starts_with(b"OggS"),
        _ => return None,
    };
    Some(matched)
}

/// Detect executable container formats regardless of declared type: Windows
/// PE, ELF, Mach-O (32/64-bit, both endiannesses) and Mach-O universal
/// binaries.
pub fn is_executable(prefix: &[u8]) -> bool {
    const EXECUTABLE_MAGICS: &[&[u8]] = &[
        b"MZ",                         // Windows PE
        &[0x7F, b'E', b'L', b'F'],     // ELF
        &[0xFE, 0xED, 0xFA, 0xCE],     // Mach-O 32-bit
        &[0xFE, 0xED, 0xFA, 0xCF],     // Mach-O 64-bit
        &[0xCE, 0xFA, 0xED, 0xFE],     // Mach-O 32-bit, swapped
        &[0xCF, 0xFA, 0xED, 0xFE],     // Mach-O 64-bit, swapped
        &[0xCA, 0xFE, 0xBA, 0xBE],     // Mach-O universal binary
    ];
    EXECUTABLE_MAGICS.iter().any(|magic| prefix.starts_with(magic))
}

/// Scan for HTML/SVG/script markers that would make the payload executable
/// in a browser context when served with a permissive type.
pub fn has_markup_script_markers(prefix: &[u8]) -> bool {
    const MARKERS: &[&[u8]] = &[
        b"<script",
        b"<html",
        b"<!doctype html",
        b"<svg",
        b"<iframe",
        b"javascript:",
        b"onerror=",
        b"onload=",
    ];
    let lowered: Vec<u8> = prefix.iter().map(|b| b.to_ascii_lowercase()).collect();
    MARKERS
        .iter()
        .any(|marker| lowered.windows(marker.len()).any(|w| w == *marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(mime_from_extension("report.pdf"), Some("application/pdf"));
        assert_eq!(mime_from_extension("photo.JPG"), Some("image/jpeg"));
        assert_eq!(mime_from_extension("weird.xyz"), None);
    }

    #[test]
    fn test_sniff_common_formats() {
        assert_eq!(sniff_mime(b"%PDF-1.7 ..."), Some("application/pdf"));
        assert_eq!(
            sniff_mime(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00]),
            Some("image/png")
        );
        assert_eq!(sniff_mime(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some("image/webp"));
        assert_eq!(
            sniff_mime(&[0x00, 0x00, 0x00, 0x20, b'f', b't', b'y', b'p']),
            Some("video/mp4")
        );
        assert_eq!(sniff_mime(b"plain text"), None);
    }

    #[test]
    fn test_signature_mismatch_detected() {
        // A PE binary claiming to be a PDF
        assert_eq!(signature_matches("application/pdf", b"MZ\x90\x00"), Some(false));
        assert_eq!(signature_matches("application/pdf", b"%PDF-1.4"), Some(true));
        // No signature table entry for plain text
        assert_eq!(signature_matches("text/plain", b"hello"), None);
    }

    #[test]
    fn test_executable_magics() {
        assert!(is_executable(b"MZ\x90\x00\x03"));
        assert!(is_executable(&[0x7F, b'E', b'L', b'F', 0x02]));
        assert!(is_executable(&[0xFE, 0xED, 0xFA, 0xCF, 0x00]));
        assert!(is_executable(&[0xCA, 0xFE, 0xBA, 0xBE, 0x00]));
        assert!(!is_executable(b"%PDF-1.4"));
    }

    #[test]
    fn test_markup_markers_case_insensitive() {
        assert!(has_markup_script_markers(b"<HTML><body>"));
        assert!(has_markup_script_markers(b"xx <ScRiPt>alert(1)</script>"));
        assert!(has_markup_script_markers(b"<svg onload=alert(1)>"));
        assert!(!has_markup_script_markers(b"%PDF-1.4 plain content"));
    }
}
