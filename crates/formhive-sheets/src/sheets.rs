use anyhow::{anyhow, Result};
use async_trait::async_trait;
use formhive_core::{SheetsConfig, SinkError, SubmissionSink};
use formhive_schema::Submission;
use serde_json::{json, Value};

use crate::token::TokenSource;

/// Appends each submission as one row via the Sheets `values:append` API.
pub struct SheetsSink {
    http: reqwest::Client,
    api_base: String,
    spreadsheet_id: String,
    range: String,
    tokens: TokenSource,
}

impl SheetsSink {
    pub fn from_config(
        http: reqwest::Client,
        config: &SheetsConfig,
        tokens: TokenSource,
    ) -> Result<Self> {
        if config.spreadsheet_id.trim().is_empty() {
            return Err(anyhow!(
                "sheets sink requires a spreadsheet_id (is SPREADSHEET_ID set?)"
            ));
        }
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            range: config.range.clone(),
            tokens,
        })
    }

    pub fn append_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            self.api_base,
            urlencoding::encode(&self.spreadsheet_id),
            urlencoding::encode(&self.range),
        )
    }
}

/// `[chat_id, answers..., photo_path]`, with the chat id as a number.
pub fn submission_row(submission: &Submission) -> Vec<Value> {
    let mut row = Vec::with_capacity(submission.answers.len() + 2);
    row.push(json!(submission.chat_id.0));
    row.extend(submission.answers.iter().map(|answer| json!(answer)));
    let photo = submission
        .photo_path
        .as_ref()
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_default();
    row.push(json!(photo));
    row
}

#[async_trait]
impl SubmissionSink for SheetsSink {
    async fn append(&self, submission: &Submission) -> Result<(), SinkError> {
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|err| SinkError::Auth(err.to_string()))?;

        let body = json!({ "values": [submission_row(submission)] });
        let response = self
            .http
            .post(self.append_url())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(
            chat_id = %submission.chat_id,
            spreadsheet = %self.spreadsheet_id,
            "appended submission row"
        );
        Ok(())
    }
}
