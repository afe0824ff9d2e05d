pub mod jsonl;
pub mod sheets;
pub mod token;

pub use jsonl::*;
pub use sheets::*;
pub use token::*;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use formhive_core::{SheetsAuthConfig, SinkConfig, SubmissionSink};

/// Build the configured sink. Relative paths are resolved against `base_dir`.
pub fn build_sink(config: &SinkConfig, base_dir: &Path) -> Result<Arc<dyn SubmissionSink>> {
    match config {
        SinkConfig::Sheets(sheets) => {
            let http = reqwest::Client::new();
            let tokens = match &sheets.auth {
                SheetsAuthConfig::Static { access_token } => {
                    TokenSource::fixed(access_token.clone())
                }
                SheetsAuthConfig::AuthorizedUser { credentials_path } => {
                    let path = base_dir.join(credentials_path);
                    TokenSource::authorized_user(http.clone(), AuthorizedUserCredentials::load(&path)?)
                }
                SheetsAuthConfig::ServiceAccount { key_path } => {
                    let path = base_dir.join(key_path);
                    TokenSource::service_account(http.clone(), ServiceAccountKey::load(&path)?)?
                }
            };
            Ok(Arc::new(SheetsSink::from_config(http, sheets, tokens)?))
        }
        SinkConfig::Jsonl { path } => Ok(Arc::new(JsonlSink::new(base_dir.join(path)))),
    }
}
