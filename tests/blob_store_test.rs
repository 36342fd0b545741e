use blog_content_backend::services::storage::{
    BlobStore, LocalBlobStore, StorageError, categories,
};

fn store() -> (tempfile::TempDir, LocalBlobStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path().join("storage"));
    (dir, store)
}

#[tokio::test]
async fn test_save_get_delete_cycle() {
    let (_dir, store) = store();

    store
        .save(categories::FILES, "a.jpg", b"hello")
        .await
        .unwrap();
    assert_eq!(store.get(categories::FILES, "a.jpg").await.unwrap(), b"hello");
    assert!(store.exists(categories::FILES, "a.jpg").await.unwrap());

    store.delete(categories::FILES, "a.jpg").await.unwrap();
    let err = store.get(categories::FILES, "a.jpg").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!store.exists(categories::FILES, "a.jpg").await.unwrap());
}

#[tokio::test]
async fn test_delete_missing_is_noop() {
    let (_dir, store) = store();
    store
        .delete(categories::BLOG_ASSETS, "never-created")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_save_replaces_existing_blob() {
    let (_dir, store) = store();
    store.save(categories::THUMBNAILS, "t", b"v1").await.unwrap();
    store.save(categories::THUMBNAILS, "t", b"v2").await.unwrap();
    assert_eq!(store.get(categories::THUMBNAILS, "t").await.unwrap(), b"v2");
}

#[tokio::test]
async fn test_list_missing_category_is_empty() {
    let (_dir, store) = store();
    assert!(store.list(categories::THUMBNAILS).await.unwrap().is_empty());

    store.save(categories::THUMBNAILS, "b", b"2").await.unwrap();
    store.save(categories::THUMBNAILS, "a", b"1").await.unwrap();
    assert_eq!(
        store.list(categories::THUMBNAILS).await.unwrap(),
        vec!["a".to_string(), "b".to_string()]
    );
}

#[tokio::test]
async fn test_path_and_metadata_point_at_the_blob() {
    let (_dir, store) = store();
    store
        .save(categories::BLOG_ASSETS, "doc.pdf", b"%PDF-1.4")
        .await
        .unwrap();

    let path = store.path(categories::BLOG_ASSETS, "doc.pdf").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");
    assert!(path.ends_with("blog-assets/doc.pdf"));

    let meta = store.metadata(categories::BLOG_ASSETS, "doc.pdf").await.unwrap();
    assert_eq!(meta.size, 8);
    assert!(meta.modified.is_some());

    let err = store
        .metadata(categories::BLOG_ASSETS, "missing")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_invalid_keys_are_rejected() {
    let (_dir, store) = store();
    for id in ["", "..", "../escape", "nested/id", ".hidden"] {
        let err = store.save(categories::FILES, id, b"x").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)), "id {:?}", id);
    }
    assert!(matches!(
        store.path("../files", "a"),
        Err(StorageError::InvalidKey(_))
    ));
}

#[tokio::test]
async fn test_concurrent_writers_never_expose_partial_blobs() {
    let (_dir, store) = store();
    let store = std::sync::Arc::new(store);
    let big_a = vec![b'a'; 256 * 1024];
    let big_b = vec![b'b'; 256 * 1024];

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        let data = if i % 2 == 0 { big_a.clone() } else { big_b.clone() };
        handles.push(tokio::spawn(async move {
            store.save(categories::FILES, "shared", &data).await.unwrap();
            let read = store.get(categories::FILES, "shared").await.unwrap();
            assert_eq!(read.len(), 256 * 1024);
            assert!(read.iter().all(|b| *b == read[0]));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(
        store.list(categories::FILES).await.unwrap(),
        vec!["shared".to_string()]
    );
}
