mod common;

use blog_content_backend::api::error::AppError;
use blog_content_backend::entities::file_resources;
use blog_content_backend::services::file_service::AttachTarget;
use blog_content_backend::services::ledger::RelationKind;
use blog_content_backend::services::registry::ResourceFilter;
use blog_content_backend::services::storage::{BlobStore, categories};
use chrono::Utc;
use common::{sample_jpeg, setup, setup_with};
use sea_orm::{ConnectionTrait, Statement};
use std::time::Duration;

fn attach(document_id: &str) -> Option<AttachTarget> {
    Some(AttachTarget {
        document_id: document_id.to_string(),
        kind: RelationKind::InlineImage,
        order: 0,
    })
}

#[tokio::test]
async fn test_shared_file_survives_first_unlink() {
    let env = setup().await;
    let service = &env.state.file_service;

    let file = service
        .upload("shared.jpg", &sample_jpeg(64, 64), attach("D1"))
        .await
        .unwrap();
    service
        .link_existing("D2", &file.id, RelationKind::Cover, 1)
        .await
        .unwrap();
    env.state
        .thumbnails
        .get_or_generate(&file.id, &file.extension, 32, 32)
        .await
        .unwrap();
    assert_eq!(env.state.ledger.ref_count(&file.id).await.unwrap(), 2);

    let outcome = service.delete_file(&file.id, Some("D1")).await.unwrap();
    assert!(outcome.unlinked);
    assert!(!outcome.deleted);
    assert!(env.store.exists(categories::FILES, &file.id).await.unwrap());
    assert!(env.state.registry.exists(&file.id).await.unwrap());

    let outcome = service.delete_file(&file.id, Some("D2")).await.unwrap();
    assert!(outcome.unlinked);
    assert!(outcome.deleted);
    assert!(!env.store.exists(categories::FILES, &file.id).await.unwrap());
    assert!(env.state.registry.get(&file.id).await.unwrap_err().is_not_found());
    assert!(env.store.list(categories::THUMBNAILS).await.unwrap().is_empty());
    assert_eq!(env.state.thumbnails.stats().await.unwrap().entries, 0);
}

#[tokio::test]
async fn test_delete_without_document_keeps_referenced_file() {
    let env = setup().await;
    let service = &env.state.file_service;
    let file = service
        .upload("kept.jpg", &sample_jpeg(16, 16), attach("D1"))
        .await
        .unwrap();

    let outcome = service.delete_file(&file.id, None).await.unwrap();
    assert!(!outcome.unlinked);
    assert!(!outcome.deleted);

    let loose = service.upload("loose.txt", b"plain notes", None).await.unwrap();
    let outcome = service.delete_file(&loose.id, None).await.unwrap();
    assert!(outcome.deleted);
    assert!(
        !env.store
            .exists(categories::BLOG_ASSETS, &loose.id)
            .await
            .unwrap()
    );

    let err = service.delete_file(&loose.id, None).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_document_collects_unreferenced_files() {
    let env = setup().await;
    let service = &env.state.file_service;

    let own = service
        .upload("own.jpg", &sample_jpeg(16, 16), attach("post-1"))
        .await
        .unwrap();
    let shared = service
        .upload("shared.pdf", b"%PDF-1.4 shared", attach("post-1"))
        .await
        .unwrap();
    service
        .link_existing("post-2", &shared.id, RelationKind::Attachment, 0)
        .await
        .unwrap();

    let cleanup = service.delete_document("post-1").await.unwrap();
    assert_eq!(cleanup.unlinked, 2);
    assert_eq!(cleanup.deleted, vec![own.id.clone()]);

    assert!(!env.store.exists(categories::FILES, &own.id).await.unwrap());
    assert!(
        env.store
            .exists(categories::BLOG_ASSETS, &shared.id)
            .await
            .unwrap()
    );
    assert_eq!(env.state.ledger.ref_count(&shared.id).await.unwrap(), 1);

    // Already empty
    let cleanup = service.delete_document("post-1").await.unwrap();
    assert_eq!(cleanup.unlinked, 0);
    assert!(cleanup.deleted.is_empty());
}

#[tokio::test]
async fn test_upload_rolls_back_blob_when_registry_fails() {
    let env = setup().await;
    env.db
        .execute(Statement::from_string(
            env.db.get_database_backend(),
            "DROP TABLE file_resources".to_string(),
        ))
        .await
        .unwrap();

    let err = env
        .state
        .file_service
        .upload("doomed.jpg", &sample_jpeg(16, 16), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Database(_)));
    assert!(env.store.list(categories::FILES).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_rolls_back_row_and_blob_when_link_fails() {
    let env = setup().await;
    env.db
        .execute(Statement::from_string(
            env.db.get_database_backend(),
            "DROP TABLE attachment_relations".to_string(),
        ))
        .await
        .unwrap();

    let err = env
        .state
        .file_service
        .upload("doomed.jpg", &sample_jpeg(16, 16), attach("D1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Database(_)));
    assert!(env.store.list(categories::FILES).await.unwrap().is_empty());
    assert_eq!(
        env.state
            .registry
            .count(&ResourceFilter::default())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_upload_validation() {
    let env = setup_with(|config| config.max_file_size = 1024).await;
    let service = &env.state.file_service;

    let err = service.upload("big.txt", &vec![b'a'; 2048], None).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = service.upload("tool.exe", b"MZ\x90\x00", None).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = service.upload("noext", b"data", None).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    assert!(env.store.list(categories::BLOG_ASSETS).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_records_metadata() {
    let env = setup().await;
    let jpeg = sample_jpeg(32, 32);
    let image = env
        .state
        .file_service
        .upload("Holiday Photo.JPG", &jpeg, None)
        .await
        .unwrap();

    assert_eq!(image.original_name, "Holiday Photo.JPG");
    assert_eq!(image.extension, ".jpg");
    assert_eq!(image.mime_type, "image/jpeg");
    assert_eq!(image.category, file_resources::category::IMAGE);
    assert_eq!(image.size, jpeg.len() as i64);
    assert!(image.id.ends_with(".jpg"));
    assert!(image.id.contains("-jpg-"));
    assert_eq!(
        env.store.get(categories::FILES, &image.id).await.unwrap(),
        jpeg
    );

    let note = env
        .state
        .file_service
        .upload("notes.md", b"# heading", None)
        .await
        .unwrap();
    assert_eq!(note.category, file_resources::category::BLOG_ASSET);
    assert_eq!(note.mime_type, "text/markdown");
    assert!(
        env.store
            .exists(categories::BLOG_ASSETS, &note.id)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_ids_without_retained_extension() {
    let env = setup_with(|config| config.retain_extension = false).await;
    let file = env
        .state
        .file_service
        .upload("plain.png", &common::sample_png(8, 8), None)
        .await
        .unwrap();
    assert!(!file.id.contains('.'));
    assert_eq!(file.id.split('-').nth(1), Some("png"));
}

#[tokio::test]
async fn test_link_is_idempotent_and_ordered() {
    let env = setup().await;
    let service = &env.state.file_service;
    let ledger = &env.state.ledger;

    let a = service.upload("a.txt", b"a", None).await.unwrap();
    let b = service.upload("b.txt", b"b", None).await.unwrap();
    let c = service.upload("c.txt", b"c", None).await.unwrap();

    let first = service
        .link_existing("doc", &a.id, RelationKind::Attachment, 2)
        .await
        .unwrap();
    let again = service
        .link_existing("doc", &a.id, RelationKind::Cover, 9)
        .await
        .unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(again.relation_kind, "attachment");
    assert_eq!(ledger.ref_count(&a.id).await.unwrap(), 1);

    service
        .link_existing("doc", &b.id, RelationKind::Cover, 0)
        .await
        .unwrap();
    service
        .link_existing("doc", &c.id, RelationKind::InlineImage, 2)
        .await
        .unwrap();

    let order: Vec<String> = ledger
        .by_document("doc")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.file_id)
        .collect();
    assert_eq!(order, vec![b.id.clone(), a.id.clone(), c.id.clone()]);
    assert_eq!(ledger.by_file(&b.id).await.unwrap().len(), 1);

    assert_eq!(ledger.unlink("doc", &a.id).await.unwrap(), 1);
    assert_eq!(ledger.unlink("doc", &a.id).await.unwrap(), 0);

    let err = service
        .link_existing("doc", "missing-file", RelationKind::Attachment, 0)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_registry_rejects_duplicate_ids() {
    let env = setup().await;
    let now = Utc::now();
    let resource = file_resources::Model {
        id: "1700000000000-txt-1.txt".to_string(),
        original_name: "a.txt".to_string(),
        extension: ".txt".to_string(),
        mime_type: "text/plain".to_string(),
        size: 1,
        category: file_resources::category::BLOG_ASSET.to_string(),
        storage_path: "storage/blog-assets/1700000000000-txt-1.txt".to_string(),
        created_at: now,
        updated_at: now,
    };

    env.state.registry.create(resource.clone()).await.unwrap();
    let err = env
        .state
        .registry
        .create(file_resources::Model {
            original_name: "other.txt".to_string(),
            ..resource.clone()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(
        env.state.registry.get(&resource.id).await.unwrap().original_name,
        "a.txt"
    );
}

#[tokio::test]
async fn test_registry_listing_and_paging() {
    let env = setup().await;
    let service = &env.state.file_service;
    let registry = &env.state.registry;

    let mut ids = Vec::new();
    for i in 0..5 {
        let file = service
            .upload(&format!("note-{}.txt", i), b"text", None)
            .await
            .unwrap();
        ids.push(file.id);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let image = service
        .upload("pic.png", &common::sample_png(4, 4), None)
        .await
        .unwrap();

    let all = registry.list(&ResourceFilter::default()).await.unwrap();
    assert_eq!(all.len(), 6);
    assert_eq!(all[0].id, image.id);

    let assets = ResourceFilter::category(file_resources::category::BLOG_ASSET);
    assert_eq!(registry.count(&assets).await.unwrap(), 5);
    let page = registry.list_page(&assets, 1, 2).await.unwrap();
    assert_eq!(
        page.iter().map(|f| f.id.clone()).collect::<Vec<_>>(),
        vec![ids[3].clone(), ids[2].clone()]
    );

    let by_mime = ResourceFilter {
        mime_prefix: Some("image/".to_string()),
        ..Default::default()
    };
    assert_eq!(registry.count(&by_mime).await.unwrap(), 1);
    let by_ext = ResourceFilter {
        extension: Some("TXT".to_string()),
        ..Default::default()
    };
    assert_eq!(registry.count(&by_ext).await.unwrap(), 5);

    let wanted = vec![ids[0].clone(), ids[4].clone(), "unknown".to_string()];
    assert_eq!(registry.get_many(&wanted).await.unwrap().len(), 2);
    assert_eq!(registry.count_many(&wanted).await.unwrap(), 2);
    assert_eq!(
        registry.get_many_page(&wanted, 0, 1).await.unwrap()[0].id,
        ids[4]
    );
    assert!(registry.get_many(&[]).await.unwrap().is_empty());

    let image_ids = registry
        .ids(file_resources::category::IMAGE)
        .await
        .unwrap();
    assert!(image_ids.contains(&image.id));
    assert_eq!(image_ids.len(), 1);
}

#[tokio::test]
async fn test_orphan_sweep_respects_registry_and_grace() {
    let env = setup().await;
    let service = &env.state.file_service;

    let kept = service
        .upload("kept.jpg", &sample_jpeg(40, 40), None)
        .await
        .unwrap();
    env.state
        .thumbnails
        .get_or_generate(&kept.id, &kept.extension, 20, 20)
        .await
        .unwrap();

    env.store
        .save(categories::FILES, "1600000000000-jpg-1.jpg", b"stray")
        .await
        .unwrap();
    env.store
        .save(categories::BLOG_ASSETS, "1600000000000-pdf-2.pdf", b"stray")
        .await
        .unwrap();
    env.store
        .save(categories::THUMBNAILS, "1600000000000-jpg-1_10x10.jpg", b"stray")
        .await
        .unwrap();

    // Everything is brand new, so a long grace period keeps it all
    let report = service
        .sweep_orphans(Duration::from_secs(3600))
        .await
        .unwrap();
    assert_eq!(report.total(), 0);

    let report = service.sweep_orphans(Duration::ZERO).await.unwrap();
    assert_eq!(report.files, 1);
    assert_eq!(report.blog_assets, 1);
    assert_eq!(report.thumbnails, 1);

    assert_eq!(
        env.store.list(categories::FILES).await.unwrap(),
        vec![kept.id.clone()]
    );
    assert!(env.store.list(categories::BLOG_ASSETS).await.unwrap().is_empty());
    assert_eq!(env.store.list(categories::THUMBNAILS).await.unwrap().len(), 1);
    assert_eq!(env.state.thumbnails.stats().await.unwrap().entries, 1);
}

#[tokio::test]
async fn test_orphan_sweep_purges_cache_of_vanished_sources() {
    let env = setup().await;
    let service = &env.state.file_service;
    let file = service
        .upload("gone.jpg", &sample_jpeg(40, 40), None)
        .await
        .unwrap();
    env.state
        .thumbnails
        .get_or_generate(&file.id, &file.extension, 16, 16)
        .await
        .unwrap();

    // Simulate a crash between the registry delete and the rest of the cleanup
    env.state.registry.delete(&file.id).await.unwrap();

    let report = service.sweep_orphans(Duration::ZERO).await.unwrap();
    assert_eq!(report.files, 1);
    assert_eq!(env.state.thumbnails.stats().await.unwrap().entries, 0);
    assert!(env.store.list(categories::THUMBNAILS).await.unwrap().is_empty());
    assert!(env.store.list(categories::FILES).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_worker_pass_runs_both_sweeps() {
    use blog_content_backend::entities::{prelude::*, thumbnail_caches};
    use blog_content_backend::services::worker::BackgroundWorker;
    use sea_orm::EntityTrait;
    use sea_orm::sea_query::Expr;

    let env = setup().await;
    let file = env
        .state
        .file_service
        .upload("old.jpg", &sample_jpeg(40, 40), None)
        .await
        .unwrap();
    env.state
        .thumbnails
        .get_or_generate(&file.id, &file.extension, 10, 10)
        .await
        .unwrap();
    ThumbnailCaches::update_many()
        .col_expr(
            thumbnail_caches::Column::LastAccessedAt,
            Expr::value(Utc::now() - chrono::Duration::days(90)),
        )
        .exec(&env.db)
        .await
        .unwrap();
    env.store
        .save(categories::BLOG_ASSETS, "1600000000000-txt-3.txt", b"stray")
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker = BackgroundWorker::new(
        env.state.thumbnails.clone(),
        env.state.file_service.clone(),
        env.config.clone(),
        shutdown_rx,
    );

    let report = worker.perform_cleanup().await;
    assert_eq!(report.expired_thumbnails, 1);
    assert_eq!(report.orphans.blog_assets, 1);
    assert!(env.store.exists(categories::FILES, &file.id).await.unwrap());

    let handle = tokio::spawn(worker.run());
    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
