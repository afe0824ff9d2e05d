use std::{fs, path::Path, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::flow::{Flow, Question};
use crate::messages::Messages;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
}

fn default_connector_id() -> String {
    "tg_main".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub enabled: bool,
    #[serde(default = "default_connector_id")]
    pub connector_id: String,
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

fn default_photo_dir() -> PathBuf {
    PathBuf::from("photos")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_photo_dir")]
    pub photo_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            photo_dir: default_photo_dir(),
        }
    }
}

fn default_sheet_range() -> String {
    "Основная!A:O".to_string()
}

fn default_sheets_api_base() -> String {
    "https://sheets.googleapis.com".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SheetsAuthConfig {
    /// A pre-issued OAuth access token
    Static { access_token: String },
    /// Google `authorized_user` credentials JSON with a refresh token
    AuthorizedUser { credentials_path: PathBuf },
    /// Google service account key JSON, exchanged through a signed JWT
    ServiceAccount { key_path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    #[serde(default = "default_sheet_range")]
    pub range: String,
    #[serde(default = "default_sheets_api_base")]
    pub api_base: String,
    pub auth: SheetsAuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SinkConfig {
    Sheets(SheetsConfig),
    Jsonl { path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainConfig {
    pub app: AppConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub messages: Messages,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone)]
pub struct FormhiveConfig {
    pub main: MainConfig,
    pub flow: Flow,
}

/// Replace each `${NAME}` with the environment variable `NAME`, empty when unset.
/// An unterminated `${` is kept as written.
pub fn resolve_env_var(raw: &str) -> String {
    let mut resolved = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some((before, after)) = rest.split_once("${") {
        resolved.push_str(before);
        let Some((name, tail)) = after.split_once('}') else {
            resolved.push_str("${");
            resolved.push_str(after);
            return resolved;
        };
        resolved.push_str(&std::env::var(name).unwrap_or_default());
        rest = tail;
    }

    resolved.push_str(rest);
    resolved
}

fn resolve_path_env(path: &mut PathBuf) {
    *path = PathBuf::from(resolve_env_var(&path.to_string_lossy()));
}

pub fn load_config(root: &Path) -> Result<FormhiveConfig> {
    let mut main: MainConfig = parse_yaml(&root.join("main.yaml"))?;
    let flow_config: FlowConfig = parse_yaml(&root.join("flow.yaml"))?;

    resolve_main_env(&mut main);

    let flow = Flow::new(flow_config.questions)
        .with_context(|| format!("invalid flow in {}", root.join("flow.yaml").display()))?;

    let config = FormhiveConfig { main, flow };
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &FormhiveConfig) -> Result<()> {
    let messages = &config.main.messages;
    if messages.yes.trim().is_empty() || messages.no.trim().is_empty() {
        return Err(anyhow!("confirmation tokens must not be empty"));
    }
    if messages.yes.trim().to_lowercase() == messages.no.trim().to_lowercase() {
        return Err(anyhow!(
            "confirmation tokens must differ: yes and no are both '{}'",
            messages.yes
        ));
    }

    match &config.main.sink {
        SinkConfig::Sheets(sheets) => {
            if sheets.range.trim().is_empty() {
                return Err(anyhow!("sheets sink requires a range"));
            }
        }
        SinkConfig::Jsonl { path } => {
            if path.as_os_str().is_empty() {
                return Err(anyhow!("jsonl sink requires a path"));
            }
        }
    }

    Ok(())
}

fn parse_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("cannot parse {}", path.display()))
}

fn resolve_main_env(main: &mut MainConfig) {
    main.app.name = resolve_env_var(&main.app.name);

    if let Some(telegram) = &mut main.channels.telegram {
        telegram.connector_id = resolve_env_var(&telegram.connector_id);
        telegram.token = resolve_env_var(&telegram.token);
    }

    resolve_path_env(&mut main.storage.photo_dir);

    match &mut main.sink {
        SinkConfig::Sheets(sheets) => {
            sheets.spreadsheet_id = resolve_env_var(&sheets.spreadsheet_id);
            sheets.range = resolve_env_var(&sheets.range);
            sheets.api_base = resolve_env_var(&sheets.api_base);
            match &mut sheets.auth {
                SheetsAuthConfig::Static { access_token } => {
                    *access_token = resolve_env_var(access_token);
                }
                SheetsAuthConfig::AuthorizedUser { credentials_path } => {
                    resolve_path_env(credentials_path);
                }
                SheetsAuthConfig::ServiceAccount { key_path } => resolve_path_env(key_path),
            }
        }
        SinkConfig::Jsonl { path } => resolve_path_env(path),
    }
}
