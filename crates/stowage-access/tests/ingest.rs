//! Ingestion orchestration: extraction, metadata persistence, rollback.

mod common;

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;
use zip::write::FileOptions;
use zip::CompressionMethod;

use common::MemoryDirectory;
use stowage_access::IngestService;
use stowage_core::audit::AuditAction;
use stowage_core::models::TenantType;
use stowage_core::{AppError, MemoryAuditSink, StowageConfig, TenantContext};
use stowage_storage::{LocalStorage, Storage};

const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF";

fn build_zip(entries: &[(&str, &[u8])]) -> Bytes {
    let mut cursor = std::io::Cursor::new(Vec::new());
    let mut zip = zip::ZipWriter::new(&mut cursor);
    for (name, data) in entries {
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        zip.start_file(*name, options).expect("start_file");
        zip.write_all(data).expect("write entry");
    }
    zip.finish().expect("finish zip");
    drop(zip);
    Bytes::from(cursor.into_inner())
}

async fn service_with(
    directory: Arc<MemoryDirectory>,
) -> (
    tempfile::TempDir,
    Arc<LocalStorage>,
    Arc<MemoryAuditSink>,
    IngestService,
) {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Arc::new(
        LocalStorage::new(dir.path(), "stowage-test".to_string())
            .await
            .expect("local storage"),
    );
    let audit = Arc::new(MemoryAuditSink::new());
    let service = IngestService::new(
        storage.clone(),
        directory,
        audit.clone(),
        StowageConfig::default(),
    );
    (dir, storage, audit, service)
}

#[tokio::test]
async fn ingest_persists_one_row_per_extracted_entry() {
    let directory = Arc::new(MemoryDirectory::new());
    let (_dir, storage, audit, service) = service_with(directory.clone()).await;
    let (tenant, user) = (Uuid::new_v4(), Uuid::new_v4());
    let ctx = TenantContext::for_user(user, tenant);

    let archive = build_zip(&[("doc1.pdf", PDF), ("unit/doc2.pdf", PDF), (".DS_Store", b"x")]);
    let result = service
        .ingest_archive(&ctx, TenantType::School, archive)
        .await
        .unwrap();

    assert_eq!(result.extracted_count(), 2);
    assert_eq!(result.skipped_count(), 1);
    assert_eq!(directory.len(), 2);

    for extracted in &result.extracted {
        let row = directory.get(extracted.id).expect("row persisted");
        assert_eq!(row.tenant_id, tenant);
        assert_eq!(row.user_id, user);
        assert_eq!(row.object_key, extracted.object_key);
        assert_eq!(row.checksum, extracted.checksum);
        assert_eq!(row.bucket, "stowage-test");
        assert!(storage.exists(&row.object_key).await.unwrap());
    }

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::ZipUpload);
    assert_eq!(entries[0].metadata["extracted"], 2);
}

#[tokio::test]
async fn persistence_failure_rolls_back_uploaded_objects() {
    // Second create fails, after the first entry was persisted
    let directory = Arc::new(MemoryDirectory::failing_after(1));
    let (dir, _storage, _audit, service) = service_with(directory.clone()).await;
    let ctx = TenantContext::for_user(Uuid::new_v4(), Uuid::new_v4());

    let archive = build_zip(&[("a.pdf", PDF), ("b.pdf", PDF)]);
    let err = service
        .ingest_archive(&ctx, TenantType::Publisher, archive)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));

    // Every uploaded object was deleted again
    assert_eq!(count_files(&dir.path().join("stowage-test")), 0);
}

fn count_files(root: &std::path::Path) -> usize {
    let Ok(entries) = std::fs::read_dir(root) else {
        return 0;
    };
    entries
        .flatten()
        .map(|e| {
            let path = e.path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

#[tokio::test]
async fn anonymous_context_cannot_ingest() {
    let directory = Arc::new(MemoryDirectory::new());
    let (_dir, _storage, _audit, service) = service_with(directory).await;

    let archive = build_zip(&[("doc.pdf", PDF)]);
    let err = service
        .ingest_archive(&TenantContext::system(), TenantType::School, archive)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}
