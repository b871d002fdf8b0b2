//! Integration tests for the Cloudinary upload client.

use kiosk_screenshotter::cloudinary::CloudinaryClient;
use kiosk_screenshotter::config::{CloudinaryConfig, Config};
use kiosk_screenshotter::store::{MediaStore, UploadError, UploadRequest};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_client(api_base: &str) -> CloudinaryClient {
    let config = CloudinaryConfig {
        api_base: api_base.to_string(),
        ..Config::for_testing().cloudinary
    };
    CloudinaryClient::new(reqwest::Client::new(), config)
}

fn request() -> UploadRequest {
    UploadRequest::deterministic(
        "kiosk247/example.com/2024/03/2024-03-01_14-00",
        vec![
            "kiosk247".to_string(),
            "example.com".to_string(),
            "2024".to_string(),
            "03".to_string(),
            "screenshot".to_string(),
        ],
    )
}

async fn write_image(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("example.com_2024-03-01_14-00.jpg");
    tokio::fs::write(&path, b"fake-jpeg-bytes")
        .await
        .expect("Failed to write image");
    path
}

#[tokio::test]
async fn test_upload_returns_secure_url() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let image = write_image(&temp_dir).await;

    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1_1/demo/image/upload"))
        .and(body_string_contains("kiosk247/example.com/2024/03/2024-03-01_14-00"))
        .and(body_string_contains("kiosk247,example.com,2024,03,screenshot"))
        .and(body_string_contains("name=\"signature\""))
        .and(body_string_contains("name=\"api_key\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "public_id": "kiosk247/example.com/2024/03/2024-03-01_14-00",
            "version": 1_709_298_000,
            "resource_type": "image",
            "format": "jpg",
            "bytes": 15,
            "secure_url": "https://res.cloudinary.com/demo/image/upload/v1709298000/kiosk247/example.com/2024/03/2024-03-01_14-00.jpg",
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server.uri());
    let uploaded = client
        .upload_image(&image, &request())
        .await
        .expect("upload failed");

    assert_eq!(uploaded.public_id, "kiosk247/example.com/2024/03/2024-03-01_14-00");
    assert_eq!(
        uploaded.secure_url,
        "https://res.cloudinary.com/demo/image/upload/v1709298000/kiosk247/example.com/2024/03/2024-03-01_14-00.jpg"
    );
    // The client never deletes the source file itself.
    assert!(image.exists());
}

#[tokio::test]
async fn test_upload_rejection_carries_message() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let image = write_image(&temp_dir).await;

    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1_1/demo/image/upload"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "message": "Invalid Signature 1a2b3c" }
        })))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server.uri());
    let err = client
        .upload_image(&image, &request())
        .await
        .expect_err("upload should fail");

    match err {
        UploadError::Rejected { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid Signature 1a2b3c");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_upload_unexpected_body() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let image = write_image(&temp_dir).await;

    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1_1/demo/image/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy page</html>"))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server.uri());
    let err = client
        .upload_image(&image, &request())
        .await
        .expect_err("upload should fail");
    assert!(matches!(err, UploadError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_upload_missing_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let client = create_client("http://127.0.0.1:9");

    let err = client
        .upload_image(&temp_dir.path().join("missing.jpg"), &request())
        .await
        .expect_err("upload should fail");
    assert!(matches!(err, UploadError::ReadFile { .. }));
}
