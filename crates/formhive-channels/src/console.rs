use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use formhive_core::{AttachmentResolver, PhotoError, ResolvedAttachment, SurveyEngine, Transport};
use formhive_schema::{AttachmentRef, ChatId, Choice, InboundEvent, InboundKind};

pub const CHANNEL_TYPE: &str = "console";

/// What the REPL should do with one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Quit,
    Skip,
    Event(InboundKind),
}

/// `/start`, `/photo <path>`, `/choose <value>`, `quit`/`exit`; anything else is an answer.
pub fn parse_console_line(line: &str) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleInput::Skip;
    }
    if line == "quit" || line == "exit" {
        return ConsoleInput::Quit;
    }
    if line == "/start" {
        return ConsoleInput::Event(InboundKind::Start);
    }
    if let Some(path) = line.strip_prefix("/photo ") {
        return ConsoleInput::Event(InboundKind::Photo {
            attachment: AttachmentRef {
                channel_type: CHANNEL_TYPE.to_string(),
                id: path.trim().to_string(),
            },
        });
    }
    if let Some(value) = line.strip_prefix("/choose ") {
        return ConsoleInput::Event(InboundKind::ChoiceSelected {
            value: value.trim().to_string(),
        });
    }
    ConsoleInput::Event(InboundKind::Text {
        text: line.to_string(),
    })
}

pub fn render_prompt(text: &str, choices: Option<&[Choice]>) -> String {
    let mut rendered = text.to_string();
    for choice in choices.unwrap_or_default() {
        rendered.push_str(&format!("\n  [{}] {}", choice.value, choice.label));
    }
    rendered
}

/// Local REPL acting as a single chat.
pub struct ConsoleBot {
    connector_id: String,
    chat_id: ChatId,
}

impl ConsoleBot {
    pub fn new(connector_id: impl Into<String>, chat_id: ChatId) -> Self {
        Self {
            connector_id: connector_id.into(),
            chat_id,
        }
    }

    pub fn transport(&self) -> Arc<ConsoleTransport> {
        Arc::new(ConsoleTransport)
    }

    pub fn resolver(&self) -> Arc<ConsoleAttachmentResolver> {
        Arc::new(ConsoleAttachmentResolver)
    }

    pub async fn run_impl(self, engine: Arc<SurveyEngine>) -> anyhow::Result<()> {
        println!("formhive console. /start to begin, /photo <path>, /choose <value>, 'quit' to exit.");
        println!("---");

        let stdin = std::io::stdin();
        loop {
            print!("> ");
            std::io::stdout().flush()?;
            let mut input = String::new();
            if stdin.read_line(&mut input)? == 0 {
                break;
            }

            let kind = match parse_console_line(&input) {
                ConsoleInput::Quit => break,
                ConsoleInput::Skip => continue,
                ConsoleInput::Event(kind) => kind,
            };

            let event = InboundEvent::new(CHANNEL_TYPE, self.chat_id, kind);
            if let Err(err) = engine.handle(event).await {
                eprintln!("Error: {err:#}");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl crate::ChannelBot for ConsoleBot {
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

pub struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send_prompt(
        &self,
        _chat_id: ChatId,
        text: &str,
        choices: Option<&[Choice]>,
    ) -> anyhow::Result<()> {
        println!("{}", render_prompt(text, choices));
        Ok(())
    }
}

/// Console attachments are paths on the local file system.
pub struct ConsoleAttachmentResolver;

#[async_trait]
impl AttachmentResolver for ConsoleAttachmentResolver {
    async fn resolve(&self, attachment: &AttachmentRef) -> Result<ResolvedAttachment, PhotoError> {
        let path = PathBuf::from(&attachment.id);
        if !path.is_file() {
            return Err(PhotoError::Resolve(format!(
                "no such file: {}",
                path.display()
            )));
        }
        Ok(ResolvedAttachment::LocalFile(path))
    }
}
