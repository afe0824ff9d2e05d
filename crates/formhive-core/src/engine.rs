use std::sync::Arc;

use anyhow::Result;
use formhive_schema::{AttachmentRef, ChatId, InboundEvent, InboundKind};
use tracing::{debug, error, info, warn};

use crate::flow::Flow;
use crate::messages::Messages;
use crate::photo::PhotoAcquirer;
use crate::session::{Answer, Session, SessionStore, SurveyState};
use crate::sink::SubmissionSink;
use crate::transport::Transport;

/// Walks each chat through the flow, one event at a time.
///
/// Input that does not fit the current question (or arrives for a chat
/// without a session) is dropped without a reply. Errors returned from the
/// handlers are outbound transport failures only; photo and sink failures
/// are reported to the user and leave the session where it was.
pub struct SurveyEngine {
    flow: Arc<Flow>,
    sessions: Arc<dyn SessionStore>,
    transport: Arc<dyn Transport>,
    photos: Arc<dyn PhotoAcquirer>,
    sink: Arc<dyn SubmissionSink>,
    messages: Messages,
}

impl SurveyEngine {
    pub fn new(
        flow: Arc<Flow>,
        sessions: Arc<dyn SessionStore>,
        transport: Arc<dyn Transport>,
        photos: Arc<dyn PhotoAcquirer>,
        sink: Arc<dyn SubmissionSink>,
        messages: Messages,
    ) -> Self {
        Self {
            flow,
            sessions,
            transport,
            photos,
            sink,
            messages,
        }
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub async fn handle(&self, event: InboundEvent) -> Result<()> {
        debug!(
            trace_id = %event.trace_id,
            channel = %event.channel_type,
            chat_id = %event.chat_id,
            "inbound event"
        );
        match event.kind {
            InboundKind::Start => self.on_command_start(event.chat_id).await,
            InboundKind::Text { text } => self.on_text_message(event.chat_id, &text).await,
            InboundKind::Photo { attachment } => {
                self.on_photo_message(event.chat_id, &attachment).await
            }
            InboundKind::ChoiceSelected { value } => {
                self.on_choice_selected(event.chat_id, &value).await
            }
        }
    }

    pub async fn on_command_start(&self, chat_id: ChatId) -> Result<()> {
        let mut session = self
            .sessions
            .get(chat_id)
            .await
            .unwrap_or_else(|| Session::new(chat_id));
        session.reset();
        self.sessions.put(chat_id, session).await;
        info!(%chat_id, "survey started");
        self.ask(chat_id, 0).await
    }

    pub async fn on_text_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let Some(mut session) = self.sessions.get(chat_id).await else {
            debug!(%chat_id, "text from chat without session ignored");
            return Ok(());
        };

        match session.state {
            SurveyState::Confirming => self.confirm(session, text).await,
            SurveyState::Waiting => {
                let Some(question) = self.flow.question(session.current_index) else {
                    return Ok(());
                };
                if !question.kind.accepts_text() {
                    debug!(%chat_id, kind = %question.kind, "text does not answer current question");
                    return Ok(());
                }
                session.record(Answer::Text(text.to_string()));
                self.advance(session).await
            }
        }
    }

    pub async fn on_choice_selected(&self, chat_id: ChatId, value: &str) -> Result<()> {
        let Some(mut session) = self.sessions.get(chat_id).await else {
            debug!(%chat_id, "choice from chat without session ignored");
            return Ok(());
        };
        if session.state != SurveyState::Waiting {
            return Ok(());
        }
        let Some(question) = self.flow.question(session.current_index) else {
            return Ok(());
        };
        if !question.kind.accepts_choice() || !question.has_choice(value) {
            debug!(%chat_id, value, "choice does not answer current question");
            return Ok(());
        }

        session.record(Answer::Choice(value.to_string()));
        self.advance(session).await
    }

    pub async fn on_photo_message(&self, chat_id: ChatId, attachment: &AttachmentRef) -> Result<()> {
        let Some(mut session) = self.sessions.get(chat_id).await else {
            debug!(%chat_id, "photo from chat without session ignored");
            return Ok(());
        };
        if session.state != SurveyState::Waiting {
            return Ok(());
        }
        let Some(question) = self.flow.question(session.current_index) else {
            return Ok(());
        };
        if !question.kind.accepts_photo() {
            debug!(%chat_id, kind = %question.kind, "photo does not answer current question");
            return Ok(());
        }

        match self.photos.acquire(chat_id, attachment).await {
            Ok(path) => {
                session.record(Answer::Photo(path));
                self.advance(session).await
            }
            Err(err) => {
                warn!(%chat_id, "failed to acquire photo: {err}");
                self.transport
                    .send_text(chat_id, &self.messages.photo_failed)
                    .await
            }
        }
    }

    /// Move past the question that was just answered.
    async fn advance(&self, mut session: Session) -> Result<()> {
        let chat_id = session.chat_id;

        if !self.flow.is_last(session.current_index) {
            session.current_index += 1;
            session.touch();
            let index = session.current_index;
            self.sessions.put(chat_id, session).await;
            return self.ask(chat_id, index).await;
        }

        session.state = SurveyState::Confirming;
        session.touch();
        let summary = self.summary(&session);
        self.sessions.put(chat_id, session).await;
        info!(%chat_id, "survey awaiting confirmation");
        self.transport.send_text(chat_id, &summary).await
    }

    async fn confirm(&self, mut session: Session, text: &str) -> Result<()> {
        let chat_id = session.chat_id;

        if self.messages.is_yes(text) {
            let submission = session.submission();
            return match self.sink.append(&submission).await {
                Ok(()) => {
                    self.sessions.remove(chat_id).await;
                    info!(%chat_id, answers = submission.answers.len(), "submission stored");
                    self.transport
                        .send_text(chat_id, &self.messages.submitted)
                        .await
                }
                Err(err) => {
                    error!(%chat_id, "failed to store submission: {err}");
                    self.transport
                        .send_text(chat_id, &self.messages.submit_failed)
                        .await
                }
            };
        }

        if self.messages.is_no(text) {
            session.reset();
            self.sessions.put(chat_id, session).await;
            info!(%chat_id, "submission rejected, survey restarted");
            return self.ask(chat_id, 0).await;
        }

        debug!(%chat_id, "unrecognised confirmation input ignored");
        Ok(())
    }

    async fn ask(&self, chat_id: ChatId, index: usize) -> Result<()> {
        let Some(question) = self.flow.question(index) else {
            return Ok(());
        };
        self.transport
            .send_prompt(chat_id, &question.prompt, question.choice_set())
            .await
    }

    /// Confirmation text: one `prompt: answer` line per question, photos shown as a placeholder.
    pub fn summary(&self, session: &Session) -> String {
        let lines = self
            .flow
            .questions()
            .iter()
            .zip(&session.responses)
            .map(|(question, answer)| {
                if answer.is_photo() {
                    format!("{}: {}", question.prompt, self.messages.photo_placeholder)
                } else {
                    format!("{}: {}", question.prompt, answer.as_cell())
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "{}\n\n{}\n\n{}",
            self.messages.summary_header, lines, self.messages.confirm_prompt
        )
    }
}
