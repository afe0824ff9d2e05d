use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use formhive_schema::{AttachmentRef, ChatId};
use futures_util::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("no attachment resolver for channel: {0}")]
    UnsupportedChannel(String),
    #[error("failed to resolve attachment: {0}")]
    Resolve(String),
    /// The request URL is stripped; Telegram file URLs embed the bot token.
    #[error("photo download failed: {0}")]
    Download(reqwest::Error),
    #[error("photo download returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("failed to store photo: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the bytes of an attachment can be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAttachment {
    Url(String),
    LocalFile(PathBuf),
}

/// Channel-specific lookup from an attachment reference to its bytes.
#[async_trait]
pub trait AttachmentResolver: Send + Sync {
    async fn resolve(&self, attachment: &AttachmentRef) -> Result<ResolvedAttachment, PhotoError>;
}

#[async_trait]
pub trait PhotoAcquirer: Send + Sync {
    /// Store the attachment locally and return the stored path.
    async fn acquire(&self, chat_id: ChatId, attachment: &AttachmentRef)
        -> Result<PathBuf, PhotoError>;
}

/// `photo_<chat>_<YYYYmmddHHMMSSmmm>.jpg`; milliseconds keep quick resends apart.
pub fn photo_file_name(chat_id: ChatId, at: DateTime<Utc>) -> String {
    format!("photo_{}_{}.jpg", chat_id, at.format("%Y%m%d%H%M%S%3f"))
}

/// Streams attachments into `photo_dir`, dispatching resolution by channel type.
pub struct PhotoDownloader {
    photo_dir: PathBuf,
    http: reqwest::Client,
    resolvers: HashMap<String, Arc<dyn AttachmentResolver>>,
}

impl PhotoDownloader {
    pub fn new(photo_dir: impl Into<PathBuf>) -> Self {
        Self {
            photo_dir: photo_dir.into(),
            http: reqwest::Client::new(),
            resolvers: HashMap::new(),
        }
    }

    pub fn with_resolver(
        mut self,
        channel_type: impl Into<String>,
        resolver: Arc<dyn AttachmentResolver>,
    ) -> Self {
        self.resolvers.insert(channel_type.into(), resolver);
        self
    }

    pub fn photo_dir(&self) -> &Path {
        &self.photo_dir
    }

    /// Create the photo directory if it does not exist yet.
    pub async fn prepare(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.photo_dir).await
    }

    async fn download(&self, url: &str, target: &Path) -> Result<(), PhotoError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| PhotoError::Download(err.without_url()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PhotoError::Status(status));
        }

        let mut file = tokio::fs::File::create(target).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| PhotoError::Download(err.without_url()))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl PhotoAcquirer for PhotoDownloader {
    async fn acquire(
        &self,
        chat_id: ChatId,
        attachment: &AttachmentRef,
    ) -> Result<PathBuf, PhotoError> {
        let resolver = self
            .resolvers
            .get(&attachment.channel_type)
            .ok_or_else(|| PhotoError::UnsupportedChannel(attachment.channel_type.clone()))?;
        let source = resolver.resolve(attachment).await?;

        self.prepare().await?;
        let target = self.photo_dir.join(photo_file_name(chat_id, Utc::now()));

        let result = match &source {
            ResolvedAttachment::Url(url) => self.download(url, &target).await,
            ResolvedAttachment::LocalFile(path) => tokio::fs::copy(path, &target)
                .await
                .map(|_| ())
                .map_err(PhotoError::from),
        };

        if let Err(err) = result {
            // Partial downloads must not be mistaken for a stored photo.
            let _ = tokio::fs::remove_file(&target).await;
            return Err(err);
        }

        tracing::info!(%chat_id, path = %target.display(), "stored photo");
        Ok(target)
    }
}
