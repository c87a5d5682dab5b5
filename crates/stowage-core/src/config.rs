//! Configuration module
//!
//! Environment-driven configuration for the metadata service: database,
//! storage backend, upload limits, archive-extraction caps, capability-URL
//! expiries, and per-role rate-limit strings forwarded to the external
//! limiter.

use std::env;
use std::str::FromStr;

// Defaults
const DEFAULT_MAX_IMAGE_BYTES: u64 = 25 * 1024 * 1024;
const DEFAULT_MAX_VIDEO_BYTES: u64 = 500 * 1024 * 1024;
const DEFAULT_MAX_AUDIO_BYTES: u64 = 100 * 1024 * 1024;
const DEFAULT_MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;
const DEFAULT_ARCHIVE_MAX_FILES: usize = 1000;
const DEFAULT_ARCHIVE_MAX_TOTAL_BYTES: u64 = 2 * 1024 * 1024 * 1024;
const DEFAULT_ARCHIVE_MAX_RATIO: f64 = 100.0;
const DEFAULT_UPLOAD_URL_EXPIRY_SECS: u64 = 15 * 60;
const DEFAULT_DOWNLOAD_URL_EXPIRY_SECS: u64 = 60 * 60;
const DEFAULT_STREAM_URL_EXPIRY_SECS: u64 = 2 * 60 * 60;
const DEFAULT_BATCH_URL_EXPIRY_SECS: u64 = 30 * 60;
const DEFAULT_BATCH_MAX_ITEMS: usize = 100;
const DEFAULT_BATCH_TMP_PREFIX: &str = "tmp/batch";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_TIMEOUT_SECONDS: u64 = 30;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, anyhow::Error> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("invalid value for {}: {}", key, raw)),
        Err(_) => Ok(default),
    }
}

fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct StowageConfig {
    pub environment: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,

    // Storage backend
    pub storage_backend: String,
    pub bucket: String,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub local_storage_path: Option<String>,

    // Upload limits by MIME category
    pub max_image_bytes: u64,
    pub max_video_bytes: u64,
    pub max_audio_bytes: u64,
    pub max_file_bytes: u64,
    pub allowed_content_types: Vec<String>,

    // Archive extraction caps
    pub archive_max_files: usize,
    pub archive_max_total_bytes: u64,
    pub archive_max_compression_ratio: f64,

    // Capability URL expiries
    pub upload_url_expiry_secs: u64,
    pub download_url_expiry_secs: u64,
    pub stream_url_expiry_secs: u64,
    pub batch_url_expiry_secs: u64,

    // Batch packaging
    pub batch_max_items: usize,
    pub batch_tmp_prefix: String,

    // Per-role rate limit strings, forwarded verbatim to the external limiter
    pub rate_limit_admin: String,
    pub rate_limit_member: String,
}

impl StowageConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        Ok(Self {
            environment: env_or("ENVIRONMENT", "development"),
            database_url: env_or("DATABASE_URL", ""),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            db_timeout_seconds: env_parse("DB_TIMEOUT_SECONDS", DEFAULT_DB_TIMEOUT_SECONDS)?,
            storage_backend: env_or("STORAGE_BACKEND", "s3"),
            bucket: env_or("STORAGE_BUCKET", "stowage"),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            max_image_bytes: env_parse("MAX_IMAGE_BYTES", DEFAULT_MAX_IMAGE_BYTES)?,
            max_video_bytes: env_parse("MAX_VIDEO_BYTES", DEFAULT_MAX_VIDEO_BYTES)?,
            max_audio_bytes: env_parse("MAX_AUDIO_BYTES", DEFAULT_MAX_AUDIO_BYTES)?,
            max_file_bytes: env_parse("MAX_FILE_BYTES", DEFAULT_MAX_FILE_BYTES)?,
            allowed_content_types: env_list(
                "ALLOWED_CONTENT_TYPES",
                &[
                    "application/pdf",
                    "image/jpeg",
                    "image/png",
                    "image/gif",
                    "image/webp",
                    "video/mp4",
                    "video/webm",
                    "audio/mpeg",
                    "audio/ogg",
                    "text/plain",
                    "text/csv",
                    "application/zip",
                    "application/epub+zip",
                ],
            ),
            archive_max_files: env_parse("ARCHIVE_MAX_FILES", DEFAULT_ARCHIVE_MAX_FILES)?,
            archive_max_total_bytes: env_parse(
                "ARCHIVE_MAX_TOTAL_BYTES",
                DEFAULT_ARCHIVE_MAX_TOTAL_BYTES,
            )?,
            archive_max_compression_ratio: env_parse(
                "ARCHIVE_MAX_COMPRESSION_RATIO",
                DEFAULT_ARCHIVE_MAX_RATIO,
            )?,
            upload_url_expiry_secs: env_parse(
                "UPLOAD_URL_EXPIRY_SECS",
                DEFAULT_UPLOAD_URL_EXPIRY_SECS,
            )?,
            download_url_expiry_secs: env_parse(
                "DOWNLOAD_URL_EXPIRY_SECS",
                DEFAULT_DOWNLOAD_URL_EXPIRY_SECS,
            )?,
            stream_url_expiry_secs: env_parse(
                "STREAM_URL_EXPIRY_SECS",
                DEFAULT_STREAM_URL_EXPIRY_SECS,
            )?,
            batch_url_expiry_secs: env_parse(
                "BATCH_URL_EXPIRY_SECS",
                DEFAULT_BATCH_URL_EXPIRY_SECS,
            )?,
            batch_max_items: env_parse("BATCH_MAX_ITEMS", DEFAULT_BATCH_MAX_ITEMS)?,
            batch_tmp_prefix: env_or("BATCH_TMP_PREFIX", DEFAULT_BATCH_TMP_PREFIX),
            rate_limit_admin: env_or("RATE_LIMIT_ADMIN", "600/minute"),
            rate_limit_member: env_or("RATE_LIMIT_MEMBER", "120/minute"),
        })
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.bucket.is_empty() {
            anyhow::bail!("STORAGE_BUCKET must not be empty");
        }
        match self.storage_backend.as_str() {
            "s3" => {}
            "local" => {
                if self.local_storage_path.is_none() {
                    anyhow::bail!("LOCAL_STORAGE_PATH is required for the local backend");
                }
            }
            other => anyhow::bail!("unknown STORAGE_BACKEND: {}", other),
        }
        if self.archive_max_compression_ratio <= 1.0 {
            anyhow::bail!("ARCHIVE_MAX_COMPRESSION_RATIO must be greater than 1");
        }
        if self.batch_max_items == 0 || self.batch_max_items > DEFAULT_BATCH_MAX_ITEMS {
            anyhow::bail!(
                "BATCH_MAX_ITEMS must be between 1 and {}",
                DEFAULT_BATCH_MAX_ITEMS
            );
        }
        // Upload URLs are short-lived by contract; see capability issuer.
        if self.upload_url_expiry_secs >= self.download_url_expiry_secs
            || self.upload_url_expiry_secs >= self.stream_url_expiry_secs
        {
            anyhow::bail!("UPLOAD_URL_EXPIRY_SECS must be shorter than download/stream expiries");
        }
        Ok(())
    }

    /// Byte ceiling for a declared MIME type, by category prefix.
    pub fn size_limit_for(&self, content_type: &str) -> u64 {
        let ct = content_type.to_lowercase();
        if ct.starts_with("video/") {
            self.max_video_bytes
        } else if ct.starts_with("image/") {
            self.max_image_bytes
        } else if ct.starts_with("audio/") {
            self.max_audio_bytes
        } else {
            self.max_file_bytes
        }
    }

    /// Rate-limit string for a role, forwarded to the external limiter.
    pub fn rate_limit_for_role(&self, role: &str) -> &str {
        match role {
            "admin" | "support" => &self.rate_limit_admin,
            _ => &self.rate_limit_member,
        }
    }
}

impl Default for StowageConfig {
    /// Defaults suitable for tests and local development.
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            database_url: String::new(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            db_timeout_seconds: DEFAULT_DB_TIMEOUT_SECONDS,
            storage_backend: "local".to_string(),
            bucket: "stowage".to_string(),
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: None,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_video_bytes: DEFAULT_MAX_VIDEO_BYTES,
            max_audio_bytes: DEFAULT_MAX_AUDIO_BYTES,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            allowed_content_types: [
                "application/pdf",
                "image/jpeg",
                "image/png",
                "image/gif",
                "image/webp",
                "video/mp4",
                "video/webm",
                "audio/mpeg",
                "audio/ogg",
                "text/plain",
                "text/csv",
                "application/zip",
                "application/epub+zip",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            archive_max_files: DEFAULT_ARCHIVE_MAX_FILES,
            archive_max_total_bytes: DEFAULT_ARCHIVE_MAX_TOTAL_BYTES,
            archive_max_compression_ratio: DEFAULT_ARCHIVE_MAX_RATIO,
            upload_url_expiry_secs: DEFAULT_UPLOAD_URL_EXPIRY_SECS,
            download_url_expiry_secs: DEFAULT_DOWNLOAD_URL_EXPIRY_SECS,
            stream_url_expiry_secs: DEFAULT_STREAM_URL_EXPIRY_SECS,
            batch_url_expiry_secs: DEFAULT_BATCH_URL_EXPIRY_SECS,
            batch_max_items: DEFAULT_BATCH_MAX_ITEMS,
            batch_tmp_prefix: DEFAULT_BATCH_TMP_PREFIX.to_string(),
            rate_limit_admin: "600/minute".to_string(),
            rate_limit_member: "120/minute".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limit_by_category() {
        let config = StowageConfig::default();
        assert_eq!(config.size_limit_for("video/mp4"), config.max_video_bytes);
        assert_eq!(config.size_limit_for("image/png"), config.max_image_bytes);
        assert_eq!(config.size_limit_for("audio/mpeg"), config.max_audio_bytes);
        assert_eq!(
            config.size_limit_for("application/pdf"),
            config.max_file_bytes
        );
    }

    #[test]
    fn test_validate_rejects_upload_expiry_not_shortest() {
        let mut config = StowageConfig {
            local_storage_path: Some("/tmp/stowage".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.upload_url_expiry_secs = config.download_url_expiry_secs;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_backend() {
        let config = StowageConfig {
            storage_backend: "ftp".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rate_limit_by_role() {
        let config = StowageConfig::default();
        assert_eq!(config.rate_limit_for_role("admin"), "600/minute");
        assert_eq!(config.rate_limit_for_role("member"), "120/minute");
        assert_eq!(config.rate_limit_for_role("unknown"), "120/minute");
    }
}
