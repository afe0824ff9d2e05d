use std::sync::Arc;

use formhive_core::SurveyEngine;

/// A messaging channel that feeds inbound events into the survey engine.
///
/// The engine is built after the bot, since it needs the bot's transport
/// and attachment resolver.
#[async_trait::async_trait]
pub trait ChannelBot: Send {
    fn channel_type(&self) -> &str;
    fn connector_id(&self) -> &str;
    async fn run(self: Box<Self>, engine: Arc<SurveyEngine>) -> anyhow::Result<()>;
}

pub mod console;

#[cfg(feature = "telegram")]
pub mod telegram;
