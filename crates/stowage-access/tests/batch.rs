//! Batch download service behavior.

mod common;

use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use common::{sample_asset, MemoryDirectory};
use stowage_access::BatchService;
use stowage_core::models::Asset;
use stowage_core::{AppError, MemoryAuditSink, StowageConfig, TenantContext};
use stowage_storage::{batch_archive_key, LocalStorage, Storage};

struct Fixture {
    dir: tempfile::TempDir,
    storage: Arc<LocalStorage>,
    directory: Arc<MemoryDirectory>,
    audit: Arc<MemoryAuditSink>,
    service: BatchService,
}

async fn fixture(config: StowageConfig) -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Arc::new(
        LocalStorage::new(dir.path(), "stowage-test".to_string())
            .await
            .expect("local storage"),
    );
    let directory = Arc::new(MemoryDirectory::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let service = BatchService::new(directory.clone(), storage.clone(), audit.clone(), config);
    Fixture {
        dir,
        storage,
        directory,
        audit,
        service,
    }
}

/// Insert a directory row and write matching bytes to storage.
async fn seed_asset(f: &Fixture, tenant: Uuid, user: Uuid, name: &str, data: &[u8]) -> Asset {
    let mut asset = sample_asset(tenant, user, name);
    asset.size_bytes = data.len() as i64;
    asset.checksum = f
        .storage
        .put(&asset.object_key, Bytes::from(data.to_vec()), "application/pdf")
        .await
        .unwrap();
    f.directory.insert(asset.clone());
    asset
}

fn batch_tmp_dir_is_empty(f: &Fixture) -> bool {
    // LocalStorage roots objects at {tempdir}/{bucket}
    !f.dir.path().join("stowage-test").join("tmp").exists()
}

#[tokio::test]
async fn happy_path_packages_and_signs() {
    let f = fixture(StowageConfig::default()).await;
    let (tenant, user) = (Uuid::new_v4(), Uuid::new_v4());
    let a = seed_asset(&f, tenant, user, "a.pdf", b"%PDF-1.4 aaaa").await;
    let b = seed_asset(&f, tenant, user, "b.pdf", b"%PDF-1.4 bbbb").await;

    let ctx = TenantContext::for_user(user, tenant);
    let batch = f.service.batch_download(&ctx, &[a.id, b.id]).await.unwrap();

    assert_eq!(batch.entry_count, 2);
    assert!(batch.url.contains("verb=get"));
    assert!(batch.expires_at > Utc::now());

    // The archive landed in the temp area and is a readable zip with both
    // entries
    let key = batch_archive_key("tmp/batch", batch.batch_id);
    let archive = f.storage.get(&key).await.unwrap();
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(archive.as_ref())).unwrap();
    assert_eq!(zip.len(), 2);
    let mut content = String::new();
    zip.by_name("a.pdf")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "%PDF-1.4 aaaa");
}

#[tokio::test]
async fn soft_deleted_id_fails_naming_it_and_uploads_nothing() {
    let f = fixture(StowageConfig::default()).await;
    let (tenant, user) = (Uuid::new_v4(), Uuid::new_v4());
    let a = seed_asset(&f, tenant, user, "a.pdf", b"%PDF a").await;
    let b = seed_asset(&f, tenant, user, "b.pdf", b"%PDF b").await;
    let c = seed_asset(&f, tenant, user, "c.pdf", b"%PDF c").await;
    let mut dead = seed_asset(&f, tenant, user, "d.pdf", b"%PDF d").await;
    dead.mark_deleted(Utc::now()).unwrap();
    f.directory.insert(dead.clone());

    let ctx = TenantContext::for_user(user, tenant);
    let err = f
        .service
        .batch_download(&ctx, &[a.id, b.id, dead.id, c.id])
        .await
        .unwrap_err();

    match err {
        AppError::BatchNotFound(ids) => assert_eq!(ids, vec![dead.id]),
        other => panic!("expected BatchNotFound, got {:?}", other),
    }
    assert!(batch_tmp_dir_is_empty(&f));
}

#[tokio::test]
async fn foreign_tenant_id_fails_with_access_denied_and_audit() {
    let f = fixture(StowageConfig::default()).await;
    let (tenant, user) = (Uuid::new_v4(), Uuid::new_v4());
    let mine = seed_asset(&f, tenant, user, "mine.pdf", b"%PDF m").await;
    let foreign = seed_asset(&f, Uuid::new_v4(), Uuid::new_v4(), "theirs.pdf", b"%PDF t").await;

    let ctx = TenantContext::for_user(user, tenant);
    let err = f
        .service
        .batch_download(&ctx, &[mine.id, foreign.id])
        .await
        .unwrap_err();

    match err {
        AppError::BatchAccessDenied(ids) => assert_eq!(ids, vec![foreign.id]),
        other => panic!("expected BatchAccessDenied, got {:?}", other),
    }
    assert_eq!(f.audit.entries().len(), 1);
    assert!(batch_tmp_dir_is_empty(&f));
}

#[tokio::test]
async fn input_shape_is_validated() {
    let config = StowageConfig {
        batch_max_items: 2,
        ..Default::default()
    };
    let f = fixture(config).await;
    let (tenant, user) = (Uuid::new_v4(), Uuid::new_v4());
    let ctx = TenantContext::for_user(user, tenant);

    assert!(matches!(
        f.service.batch_download(&ctx, &[]).await.unwrap_err(),
        AppError::InvalidInput(_)
    ));

    let id = Uuid::new_v4();
    assert!(matches!(
        f.service.batch_download(&ctx, &[id, id]).await.unwrap_err(),
        AppError::InvalidInput(_)
    ));

    let too_many: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    assert!(matches!(
        f.service.batch_download(&ctx, &too_many).await.unwrap_err(),
        AppError::InvalidInput(_)
    ));
}

#[tokio::test]
async fn elevated_role_can_batch_across_tenants() {
    let f = fixture(StowageConfig::default()).await;
    let a = seed_asset(&f, Uuid::new_v4(), Uuid::new_v4(), "a.pdf", b"%PDF a").await;
    let b = seed_asset(&f, Uuid::new_v4(), Uuid::new_v4(), "b.pdf", b"%PDF b").await;

    let admin = TenantContext::elevated(Uuid::new_v4());
    let batch = f.service.batch_download(&admin, &[a.id, b.id]).await.unwrap();
    assert_eq!(batch.entry_count, 2);
}
