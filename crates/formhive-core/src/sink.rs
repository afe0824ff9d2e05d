use async_trait::async_trait;
use formhive_schema::Submission;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink authorization failed: {0}")]
    Auth(String),
    #[error("sink rejected submission ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("sink request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sink io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode submission: {0}")]
    Encode(String),
}

/// Append-only target for confirmed submissions.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    async fn append(&self, submission: &Submission) -> Result<(), SinkError>;
}
