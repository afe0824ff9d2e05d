use std::path::{Path, PathBuf};

use async_trait::async_trait;
use formhive_core::{SinkError, SubmissionSink};
use formhive_schema::Submission;
use tokio::io::AsyncWriteExt;

/// Appends each submission as one JSON line to a local file.
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SubmissionSink for JsonlSink {
    async fn append(&self, submission: &Submission) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line =
            serde_json::to_string(submission).map_err(|err| SinkError::Encode(err.to_string()))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tracing::info!(
            chat_id = %submission.chat_id,
            path = %self.path.display(),
            "appended submission line"
        );
        Ok(())
    }
}
