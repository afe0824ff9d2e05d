use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use formhive_channels::console::ConsoleBot;
use formhive_channels::telegram::TelegramBot;
use formhive_channels::ChannelBot;
use formhive_core::*;
use formhive_schema::ChatId;
use formhive_sheets::{build_sink, JsonlSink};

#[derive(Parser)]
#[command(name = "formhive", version, about = "formhive survey bot")]
struct Cli {
    #[arg(
        long,
        default_value = ".",
        help = "Config root directory (contains config/, photos/ and logs/)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the Telegram bot")]
    Start,
    #[command(about = "Local REPL for testing (no Telegram needed)")]
    Chat {
        #[arg(long, default_value = "0", allow_hyphen_values = true, help = "Chat id the REPL acts as")]
        chat_id: i64,
        #[arg(long, help = "Write submissions to the configured sink instead of data/submissions.jsonl")]
        configured_sink: bool,
    },
    #[command(about = "Validate config files")]
    Validate,
    #[command(about = "Print the configured questions")]
    Flow,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    cli.config_root = expand_home(&cli.config_root);

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "formhive.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Validate => {
            let config = load_config(&cli.config_root.join("config"))?;
            println!(
                "Config valid. {} questions, sink: {}.",
                config.flow.len(),
                sink_kind(&config.main.sink)
            );
        }
        Commands::Flow => {
            let config = load_config(&cli.config_root.join("config"))?;
            print!("{}", render_flow(&config.flow));
        }
        Commands::Start => start_bot(&cli.config_root).await?,
        Commands::Chat {
            chat_id,
            configured_sink,
        } => run_console(&cli.config_root, ChatId(chat_id), configured_sink).await?,
    }

    Ok(())
}

async fn start_bot(root: &Path) -> Result<()> {
    let config = load_config(&root.join("config"))?;

    let telegram = config
        .main
        .channels
        .telegram
        .as_ref()
        .filter(|telegram| telegram.enabled)
        .ok_or_else(|| anyhow!("telegram channel is not enabled in main.yaml"))?;
    if telegram.token.trim().is_empty() {
        return Err(anyhow!(
            "telegram token is empty (is the variable referenced in main.yaml set?)"
        ));
    }

    let sink = build_sink(&config.main.sink, root).context("failed to build submission sink")?;
    let bot = TelegramBot::new(telegram.token.clone(), telegram.connector_id.clone());
    let photos = PhotoDownloader::new(resolve_against(root, &config.main.storage.photo_dir))
        .with_resolver(bot.channel_type(), bot.resolver());

    let engine = bootstrap(config, bot.transport(), photos, sink).await?;
    tracing::info!(
        channel = bot.channel_type(),
        connector_id = bot.connector_id(),
        "starting channel bot"
    );
    Box::new(bot).run(engine).await
}

async fn run_console(root: &Path, chat_id: ChatId, configured_sink: bool) -> Result<()> {
    let config = load_config(&root.join("config"))?;

    let sink: Arc<dyn SubmissionSink> = if configured_sink {
        build_sink(&config.main.sink, root).context("failed to build submission sink")?
    } else {
        Arc::new(JsonlSink::new(root.join("data/submissions.jsonl")))
    };
    let bot = ConsoleBot::new("console", chat_id);
    let photos = PhotoDownloader::new(resolve_against(root, &config.main.storage.photo_dir))
        .with_resolver(bot.channel_type(), bot.resolver());

    let engine = bootstrap(config, bot.transport(), photos, sink).await?;
    Box::new(bot).run(engine).await
}

async fn bootstrap(
    config: FormhiveConfig,
    transport: Arc<dyn Transport>,
    photos: PhotoDownloader,
    sink: Arc<dyn SubmissionSink>,
) -> Result<Arc<SurveyEngine>> {
    photos.prepare().await.with_context(|| {
        format!(
            "failed to create photo directory {}",
            photos.photo_dir().display()
        )
    })?;

    let engine = SurveyEngine::new(
        Arc::new(config.flow),
        Arc::new(InMemorySessionStore::new()),
        transport,
        Arc::new(photos),
        sink,
        config.main.messages,
    );
    tracing::info!(
        app = %config.main.app.name,
        questions = engine.flow().len(),
        "survey engine ready"
    );
    Ok(Arc::new(engine))
}

fn expand_home(path: &Path) -> PathBuf {
    if path.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(path.strip_prefix("~").unwrap_or(path));
        }
    }
    path.to_path_buf()
}

fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn sink_kind(sink: &SinkConfig) -> &'static str {
    match sink {
        SinkConfig::Sheets(_) => "sheets",
        SinkConfig::Jsonl { .. } => "jsonl",
    }
}

fn render_flow(flow: &Flow) -> String {
    let mut out = String::new();
    for (index, question) in flow.questions().iter().enumerate() {
        out.push_str(&format!("{}. [{}] {}\n", index + 1, question.kind, question.prompt));
        for choice in &question.choices {
            out.push_str(&format!("     {} = {}\n", choice.value, choice.label));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use formhive_schema::Choice;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn chat_accepts_negative_chat_id() {
        let cli = Cli::try_parse_from(["formhive", "chat", "--chat-id", "-100"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Chat {
                chat_id: -100,
                configured_sink: false
            })
        ));
    }

    #[test]
    fn resolve_against_keeps_absolute_paths() {
        let root = Path::new("/srv/formhive");
        assert_eq!(
            resolve_against(root, Path::new("photos")),
            PathBuf::from("/srv/formhive/photos")
        );
        assert_eq!(
            resolve_against(root, Path::new("/var/photos")),
            PathBuf::from("/var/photos")
        );
    }

    #[test]
    fn expand_home_leaves_plain_paths() {
        assert_eq!(expand_home(Path::new("./conf")), PathBuf::from("./conf"));
    }

    #[test]
    fn render_flow_lists_questions_and_choices() {
        let flow = Flow::new(vec![
            Question::single_choice("Pickup point", vec![Choice::new("CDEK, Kosta 79", "costa79")]),
            Question::free_text("Recipient"),
        ])
        .unwrap();
        assert_eq!(
            render_flow(&flow),
            "1. [single_choice] Pickup point\n     costa79 = CDEK, Kosta 79\n2. [free_text] Recipient\n"
        );
    }

    #[test]
    fn fixture_config_validates() {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..");
        let config = load_config(&root.join("config")).unwrap();
        assert_eq!(sink_kind(&config.main.sink), "sheets");
        assert!(render_flow(&config.flow).starts_with("1. [single_choice]"));
    }
}
