use anyhow::Result;
use async_trait::async_trait;
use formhive_schema::{ChatId, Choice};

/// Outbound half of a channel: how the engine talks back to a chat.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `text`, rendering `choices` as buttons when present.
    async fn send_prompt(&self, chat_id: ChatId, text: &str, choices: Option<&[Choice]>)
        -> Result<()>;

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.send_prompt(chat_id, text, None).await
    }
}
