use std::sync::Arc;

use async_trait::async_trait;
use formhive_core::{
    AttachmentResolver, PhotoError, ResolvedAttachment, SurveyEngine, Transport,
};
use formhive_schema::{AttachmentRef, ChatId as SurveyChatId, Choice, InboundEvent, InboundKind};
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQuery, FileId, InlineKeyboardButton, InlineKeyboardMarkup, Message,
};

pub const CHANNEL_TYPE: &str = "telegram";

pub struct TelegramBot {
    bot: Bot,
    token: String,
    connector_id: String,
}

impl TelegramBot {
    pub fn new(token: impl Into<String>, connector_id: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            bot: Bot::new(&token),
            token,
            connector_id: connector_id.into(),
        }
    }

    pub fn transport(&self) -> Arc<TelegramTransport> {
        Arc::new(TelegramTransport {
            bot: self.bot.clone(),
        })
    }

    pub fn resolver(&self) -> Arc<TelegramAttachmentResolver> {
        Arc::new(TelegramAttachmentResolver {
            bot: self.bot.clone(),
            token: self.token.clone(),
        })
    }

    pub async fn run_impl(self, engine: Arc<SurveyEngine>) -> anyhow::Result<()> {
        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(on_message))
            .branch(Update::filter_callback_query().endpoint(on_callback_query));

        tracing::info!(connector_id = %self.connector_id, "telegram bot polling");

        // Updates from one chat are handled in order; distinct chats run concurrently.
        Dispatcher::builder(self.bot, handler)
            .dependencies(dptree::deps![engine])
            .error_handler(LoggingErrorHandler::with_custom_text(
                "error in telegram update handler",
            ))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}

#[async_trait]
impl crate::ChannelBot for TelegramBot {
    fn channel_type(&self) -> &str {
        CHANNEL_TYPE
    }

    fn connector_id(&self) -> &str {
        &self.connector_id
    }

    async fn run(self: Box<Self>, engine: Arc<SurveyEngine>) -> anyhow::Result<()> {
        (*self).run_impl(engine).await
    }
}

async fn on_message(msg: Message, engine: Arc<SurveyEngine>) -> ResponseResult<()> {
    if let Some(event) = message_to_event(&msg) {
        dispatch(&engine, event).await;
    }
    Ok(())
}

async fn on_callback_query(
    bot: Bot,
    q: CallbackQuery,
    engine: Arc<SurveyEngine>,
) -> ResponseResult<()> {
    // Stops the client-side spinner on the pressed button.
    if let Err(err) = bot.answer_callback_query(q.id.clone()).await {
        tracing::warn!("failed to answer callback query: {err}");
    }

    let chat_id = q.message.as_ref().map(|message| message.chat().id);
    let (Some(chat_id), Some(value)) = (chat_id, q.data) else {
        return Ok(());
    };

    let event = InboundEvent::new(
        CHANNEL_TYPE,
        SurveyChatId(chat_id.0),
        InboundKind::ChoiceSelected { value },
    );
    dispatch(&engine, event).await;
    Ok(())
}

async fn dispatch(engine: &SurveyEngine, event: InboundEvent) {
    let chat_id = event.chat_id;
    let trace_id = event.trace_id;
    if let Err(err) = engine.handle(event).await {
        tracing::error!(%chat_id, %trace_id, "failed to handle telegram update: {err:#}");
    }
}

/// Map a message to an engine event; messages the survey cannot use map to `None`.
pub fn message_to_event(msg: &Message) -> Option<InboundEvent> {
    let chat_id = SurveyChatId(msg.chat.id.0);

    if let Some(sizes) = msg.photo() {
        // Sizes are ordered smallest first.
        let largest = sizes.last()?;
        let attachment = AttachmentRef {
            channel_type: CHANNEL_TYPE.to_string(),
            id: largest.file.id.to_string(),
        };
        return Some(InboundEvent::new(
            CHANNEL_TYPE,
            chat_id,
            InboundKind::Photo { attachment },
        ));
    }

    let text = msg.text()?;
    let kind = if is_start_command(text) {
        InboundKind::Start
    } else {
        InboundKind::Text {
            text: text.to_string(),
        }
    };
    Some(InboundEvent::new(CHANNEL_TYPE, chat_id, kind))
}

/// `/start`, optionally addressed to a bot (`/start@formhive_bot`) and followed by a payload.
pub fn is_start_command(text: &str) -> bool {
    let Some(command) = text.split_whitespace().next() else {
        return false;
    };
    let command = command.split('@').next().unwrap_or(command);
    command == "/start"
}

/// One button per row, carrying the choice value as callback data.
pub fn build_keyboard(choices: &[Choice]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(choices.iter().map(|choice| {
        vec![InlineKeyboardButton::callback(
            choice.label.clone(),
            choice.value.clone(),
        )]
    }))
}

pub fn file_url(api_url: &str, token: &str, file_path: &str) -> String {
    format!(
        "{}/file/bot{}/{}",
        api_url.trim_end_matches('/'),
        token,
        file_path.trim_start_matches('/')
    )
}

pub struct TelegramTransport {
    bot: Bot,
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_prompt(
        &self,
        chat_id: SurveyChatId,
        text: &str,
        choices: Option<&[Choice]>,
    ) -> anyhow::Result<()> {
        let mut request = self.bot.send_message(ChatId(chat_id.0), text);
        if let Some(choices) = choices.filter(|choices| !choices.is_empty()) {
            request = request.reply_markup(build_keyboard(choices));
        }
        request.await?;
        Ok(())
    }
}

pub struct TelegramAttachmentResolver {
    bot: Bot,
    token: String,
}

#[async_trait]
impl AttachmentResolver for TelegramAttachmentResolver {
    async fn resolve(&self, attachment: &AttachmentRef) -> Result<ResolvedAttachment, PhotoError> {
        let file = self
            .bot
            .get_file(FileId(attachment.id.clone()))
            .await
            .map_err(|err| PhotoError::Resolve(err.to_string()))?;
        Ok(ResolvedAttachment::Url(file_url(
            self.bot.api_url().as_str(),
            &self.token,
            &file.path,
        )))
    }
}
