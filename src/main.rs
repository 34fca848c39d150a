use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use smart_mail_bot::assistant::{Assistant, Runner, RunnerConfig};
use smart_mail_bot::channels::{ChannelManager, CliChannel, TelegramChannel};
use smart_mail_bot::config::AppConfig;
use smart_mail_bot::draft::{GeneratorConfig, LlmDraftGenerator};
use smart_mail_bot::llm::create_provider;
use smart_mail_bot::mailer::SmtpDispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  Set it in the environment or in a .env file.");
        std::process::exit(1);
    });

    // Initialize tracing; keep the guard alive so the file writer flushes.
    let (file_layer, _log_guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "smart-mail-bot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    eprintln!("📧 Smart Mail Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   SMTP: {}:{}", config.smtp.host, config.smtp.port);
    if let Some(dir) = &config.log_dir {
        eprintln!("   Log dir: {}", dir.display());
    }

    // ── Collaborators ───────────────────────────────────────────────────
    let llm = create_provider(&config.llm)?;
    let generator = Arc::new(LlmDraftGenerator::new(llm, GeneratorConfig::default()));
    let dispatcher = Arc::new(SmtpDispatcher::new(config.smtp.clone()));
    let assistant = Assistant::new(generator, dispatcher);

    // ── Channels ────────────────────────────────────────────────────────
    let mut channels = ChannelManager::new();

    // Always add CLI
    channels.add(Box::new(CliChannel::new()));

    if let Some(telegram) = config.telegram.clone() {
        eprintln!(
            "   Telegram: enabled (allowed: {})",
            if telegram.allowed_users.iter().any(|u| u == "*") {
                "everyone".to_string()
            } else if telegram.allowed_users.is_empty() {
                "none (deny all)".to_string()
            } else {
                telegram.allowed_users.join(", ")
            }
        );
        channels.add(Box::new(TelegramChannel::new(
            telegram.bot_token,
            telegram.allowed_users,
        )));
    } else {
        eprintln!("   Telegram: disabled (TELEGRAM_BOT_TOKEN not set)");
    }

    eprintln!("   Channels: {}", channels.names().join(", "));
    eprintln!("   Type /help and press Enter to get started.\n");

    let runner_config = RunnerConfig {
        session_idle_timeout: config.session_idle_timeout,
    };
    Runner::new(assistant, channels, runner_config).run().await?;

    Ok(())
}
