use std::sync::Arc;

use async_trait::async_trait;
use formhive_core::{AttachmentResolver, PhotoAcquirer, PhotoDownloader, PhotoError, ResolvedAttachment};
use formhive_schema::{AttachmentRef, ChatId};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct UrlResolver {
    base: String,
}

#[async_trait]
impl AttachmentResolver for UrlResolver {
    async fn resolve(&self, attachment: &AttachmentRef) -> Result<ResolvedAttachment, PhotoError> {
        Ok(ResolvedAttachment::Url(format!(
            "{}/files/{}",
            self.base, attachment.id
        )))
    }
}

struct LocalResolver;

#[async_trait]
impl AttachmentResolver for LocalResolver {
    async fn resolve(&self, attachment: &AttachmentRef) -> Result<ResolvedAttachment, PhotoError> {
        Ok(ResolvedAttachment::LocalFile(attachment.id.clone().into()))
    }
}

fn attachment(channel_type: &str, id: &str) -> AttachmentRef {
    AttachmentRef {
        channel_type: channel_type.into(),
        id: id.into(),
    }
}

#[tokio::test]
async fn downloads_photo_into_photo_dir() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\xff\xd8jpeg-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let photo_dir = tmp.path().join("photos");
    let downloader = PhotoDownloader::new(&photo_dir).with_resolver(
        "telegram",
        Arc::new(UrlResolver { base: server.uri() }),
    );

    let stored = downloader
        .acquire(ChatId(77), &attachment("telegram", "abc"))
        .await
        .unwrap();

    assert!(stored.starts_with(&photo_dir));
    let name = stored.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("photo_77_"), "unexpected name {name}");
    assert!(name.ends_with(".jpg"));
    assert_eq!(std::fs::read(&stored).unwrap(), b"\xff\xd8jpeg-bytes");
}

#[tokio::test]
async fn failed_download_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let downloader = PhotoDownloader::new(tmp.path()).with_resolver(
        "telegram",
        Arc::new(UrlResolver { base: server.uri() }),
    );

    let err = downloader
        .acquire(ChatId(1), &attachment("telegram", "missing"))
        .await
        .unwrap_err();

    assert!(matches!(err, PhotoError::Status(status) if status.as_u16() == 404));
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn copies_local_attachment() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("receipt.jpg");
    std::fs::write(&source, b"local-photo").unwrap();

    let photo_dir = tmp.path().join("photos");
    let downloader =
        PhotoDownloader::new(&photo_dir).with_resolver("console", Arc::new(LocalResolver));

    let stored = downloader
        .acquire(ChatId(3), &attachment("console", &source.to_string_lossy()))
        .await
        .unwrap();

    assert_eq!(stored.parent().unwrap(), photo_dir);
    assert_eq!(std::fs::read(&stored).unwrap(), b"local-photo");
    assert!(source.exists());
}

#[tokio::test]
async fn missing_local_attachment_is_an_io_error() {
    let tmp = tempfile::tempdir().unwrap();
    let downloader =
        PhotoDownloader::new(tmp.path().join("photos")).with_resolver("console", Arc::new(LocalResolver));

    let err = downloader
        .acquire(ChatId(3), &attachment("console", "/nonexistent/formhive/photo.jpg"))
        .await
        .unwrap_err();

    assert!(matches!(err, PhotoError::Io(_)));
    assert_eq!(
        std::fs::read_dir(tmp.path().join("photos")).unwrap().count(),
        0
    );
}

struct TokenUrlResolver;

#[async_trait]
impl AttachmentResolver for TokenUrlResolver {
    async fn resolve(&self, _attachment: &AttachmentRef) -> Result<ResolvedAttachment, PhotoError> {
        // Nothing listens on port 1, so the request fails before any response.
        Ok(ResolvedAttachment::Url(
            "http://127.0.0.1:1/file/bot123456:SECRET-TOKEN/photos/f.jpg".into(),
        ))
    }
}

#[tokio::test]
async fn download_error_does_not_expose_bot_token() {
    let tmp = tempfile::tempdir().unwrap();
    let downloader =
        PhotoDownloader::new(tmp.path()).with_resolver("telegram", Arc::new(TokenUrlResolver));

    let err = downloader
        .acquire(ChatId(1), &attachment("telegram", "f"))
        .await
        .unwrap_err();

    assert!(matches!(err, PhotoError::Download(_)));
    let logged = format!("failed to acquire photo: {err}");
    assert!(!logged.contains("SECRET-TOKEN"), "token in error: {logged}");
    assert!(!logged.contains("/file/bot"), "url in error: {logged}");
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}
