use campaign_portal::storage::{
    MockStorageService, S3StorageClient, StorageService, sanitize_key,
};

// --- Key Sanitization ---

#[test]
fn test_sanitize_key_strips_traversal_segments() {
    assert_eq!(sanitize_key("../../etc/passwd"), "etc/passwd");
    assert_eq!(sanitize_key("a/./b//c"), "a/b/c");
    assert_eq!(sanitize_key("settings/123-home.jpg"), "settings/123-home.jpg");
}

// --- Mock Storage ---

#[tokio::test]
async fn test_mock_put_and_url_roundtrip() {
    let mock = MockStorageService::new();
    let url = mock
        .put_object("settings/home.jpg", vec![1, 2, 3], "image/jpeg")
        .await
        .expect("put should succeed");

    assert!(url.contains("settings/home.jpg"));
    let key = mock.object_key(&url).expect("url should map back to a key");
    assert_eq!(key, "settings/home.jpg");
    assert_eq!(mock.stored(&key), Some(vec![1, 2, 3]));
}

#[tokio::test]
async fn test_mock_delete_records_and_removes() {
    let mock = MockStorageService::new();
    mock.put_object("a/b.jpg", vec![1], "image/jpeg")
        .await
        .unwrap();

    mock.delete_object("a/b.jpg").await.unwrap();

    assert!(mock.stored("a/b.jpg").is_none());
    assert_eq!(mock.deleted_keys(), vec!["a/b.jpg".to_string()]);
}

#[tokio::test]
async fn test_mock_failure_mode() {
    let mock = MockStorageService::new_failing();
    assert!(
        mock.put_object("a.jpg", vec![1], "image/jpeg")
            .await
            .is_err()
    );
    assert!(mock.delete_object("a.jpg").await.is_err());
}

#[tokio::test]
async fn test_mock_sanitizes_keys_on_put() {
    let mock = MockStorageService::new();
    let url = mock
        .put_object("../../etc/passwd", vec![1], "text/plain")
        .await
        .unwrap();
    assert!(!url.contains(".."));
    assert_eq!(mock.stored_keys(), vec!["etc/passwd".to_string()]);
}

#[test]
fn test_mock_foreign_url_has_no_key() {
    let mock = MockStorageService::new();
    assert!(mock.object_key("https://elsewhere.example/x.jpg").is_none());
}

// --- S3 Client (construction and URL mapping only; no network) ---

#[tokio::test]
async fn test_s3_client_creation() {
    let _client = S3StorageClient::new(
        "http://localhost:9000",
        "us-east-1",
        "admin",
        "password",
        "testbucket",
    )
    .await;
    // Construction must not panic.
}

#[tokio::test]
async fn test_s3_url_mapping_is_path_style() {
    let client = S3StorageClient::new(
        "http://localhost:9000",
        "us-east-1",
        "admin",
        "password",
        "testbucket",
    )
    .await;

    let url = client.object_url("locations/1-pin.jpg");
    assert_eq!(url, "http://localhost:9000/testbucket/locations/1-pin.jpg");

    // object_key is the exact inverse for our own URLs.
    assert_eq!(
        client.object_key(&url).as_deref(),
        Some("locations/1-pin.jpg")
    );
    assert!(client.object_key("http://other-host/bucket/k.jpg").is_none());
}
