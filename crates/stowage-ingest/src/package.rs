//! Batch archive packaging
//!
//! Inverse of extraction: streams several stored objects into one compressed
//! archive on local scratch space. The archive is never held fully in
//! memory, and the scratch file is removed when [`PackagedArchive`] drops,
//! success or failure.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;
use tempfile::NamedTempFile;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use stowage_core::models::Asset;
use stowage_core::AppError;
use stowage_storage::Storage;

/// A finished archive on scratch space. Dropping it deletes the file.
pub struct PackagedArchive {
    file: NamedTempFile,
    pub entry_count: usize,
    pub total_bytes: u64,
}

impl PackagedArchive {
    /// Reopen the archive for reading from the start. The scratch file stays
    /// owned by `self` and is still removed on drop.
    pub fn reopen(&self) -> std::io::Result<std::fs::File> {
        self.file.reopen()
    }

    /// Size of the finished archive in bytes.
    pub fn archive_len(&self) -> std::io::Result<u64> {
        Ok(self.file.as_file().metadata()?.len())
    }
}

pub struct ArchivePackager {
    storage: Arc<dyn Storage>,
}

impl ArchivePackager {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Stream every asset's bytes from the object store into one zip
    /// archive. Callers must have resolved and authorized the assets first;
    /// a storage read failure here aborts packaging.
    #[tracing::instrument(skip(self, assets), fields(asset_count = assets.len()))]
    pub async fn pack(&self, assets: &[Asset]) -> Result<PackagedArchive, AppError> {
        let scratch = NamedTempFile::new()?;
        let mut zip = ZipWriter::new(scratch.reopen()?);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut used_names: HashSet<String> = HashSet::new();
        let mut total_bytes: u64 = 0;

        for asset in assets {
            // Duplicate display names get the asset id as a disambiguator.
            let entry_name = if used_names.insert(asset.file_name.clone()) {
                asset.file_name.clone()
            } else {
                format!("{}_{}", asset.id, asset.file_name)
            };

            zip.start_file(&entry_name, options)
                .map_err(|e| AppError::Internal(format!("zip write failed: {}", e)))?;

            let mut stream = self
                .storage
                .get_stream(&asset.object_key)
                .await
                .map_err(|e| {
                    AppError::Storage(format!(
                        "failed to read asset {} for packaging: {}",
                        asset.id, e
                    ))
                })?;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| {
                    AppError::Storage(format!(
                        "failed mid-read of asset {} for packaging: {}",
                        asset.id, e
                    ))
                })?;
                total_bytes += chunk.len() as u64;
                zip.write_all(&chunk)?;
            }
        }

        let mut inner = zip
            .finish()
            .map_err(|e| AppError::Internal(format!("zip finalize failed: {}", e)))?;
        inner.flush()?;

        tracing::info!(
            entries = assets.len(),
            total_bytes,
            "Batch archive packaged"
        );
        Ok(PackagedArchive {
            file: scratch,
            entry_count: assets.len(),
            total_bytes,
        })
    }
}
