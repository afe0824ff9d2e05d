use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use formhive_schema::{ChatId, Submission};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as TokioMutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyState {
    Waiting,
    Confirming,
}

/// A recorded answer to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Answer {
    Text(String),
    Choice(String),
    Photo(PathBuf),
}

impl Answer {
    /// The value written to the sink.
    pub fn as_cell(&self) -> String {
        match self {
            Answer::Text(text) | Answer::Choice(text) => text.clone(),
            Answer::Photo(path) => path.to_string_lossy().into_owned(),
        }
    }

    pub fn is_photo(&self) -> bool {
        matches!(self, Answer::Photo(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub chat_id: ChatId,
    pub state: SurveyState,
    pub current_index: usize,
    pub responses: Vec<Answer>,
    pub photo_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(chat_id: ChatId) -> Self {
        let now = Utc::now();
        Self {
            chat_id,
            state: SurveyState::Waiting,
            current_index: 0,
            responses: Vec::new(),
            photo_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Back to the first question with nothing recorded.
    pub fn reset(&mut self) {
        self.state = SurveyState::Waiting;
        self.current_index = 0;
        self.responses.clear();
        self.photo_path = None;
        self.touch();
    }

    pub fn record(&mut self, answer: Answer) {
        if let Answer::Photo(path) = &answer {
            self.photo_path = Some(path.clone());
        }
        self.responses.push(answer);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn submission(&self) -> Submission {
        Submission {
            chat_id: self.chat_id,
            answers: self.responses.iter().map(Answer::as_cell).collect(),
            photo_path: self.photo_path.clone(),
            submitted_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, chat_id: ChatId) -> Option<Session>;
    async fn put(&self, chat_id: ChatId, session: Session);
    /// Returns true if a session was removed.
    async fn remove(&self, chat_id: ChatId) -> bool;
}

/// Process-local store. No eviction: sessions live until submitted or the process exits.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<TokioMutex<HashMap<ChatId, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, chat_id: ChatId) -> Option<Session> {
        self.sessions.lock().await.get(&chat_id).cloned()
    }

    async fn put(&self, chat_id: ChatId, session: Session) {
        self.sessions.lock().await.insert(chat_id, session);
    }

    async fn remove(&self, chat_id: ChatId) -> bool {
        self.sessions.lock().await.remove(&chat_id).is_some()
    }
}
