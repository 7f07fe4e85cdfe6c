use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use careers_bot::channels::{Channel, TelegramChannel};
use careers_bot::config::BotConfig;
use careers_bot::intake::{Catalog, IntakeConfig, IntakeDeps, IntakeFlow, SessionStore};
use careers_bot::store::{ApplicationStore, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = BotConfig::from_env().context("Invalid configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_tracing(config.log_dir.as_deref())?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Careers bot starting");
    match config.reviewer_chat_id {
        Some(chat_id) => tracing::info!(chat_id, "Forwarding applications to reviewer chat"),
        None => tracing::warn!("ADMIN_CHAT_ID not set; applications will not be forwarded"),
    }

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn ApplicationStore> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| {
                format!("Failed to open database at {}", config.db_path.display())
            })?,
    );

    // ── Telegram ─────────────────────────────────────────────────────────
    let telegram =
        TelegramChannel::new(config.bot_token.clone()).with_api_base(config.api_base.clone());
    telegram
        .health_check()
        .await
        .context("Telegram health check failed")?;
    let channel: Arc<dyn Channel> = Arc::new(telegram);

    let flow = IntakeFlow::new(
        IntakeConfig::from(&config),
        IntakeDeps {
            channel,
            store,
            catalog: Arc::new(Catalog::builtin()),
            sessions: Arc::new(SessionStore::new()),
        },
    );

    flow.run().await?;

    tracing::info!("Careers bot stopped");
    Ok(())
}

/// Log to stderr, and to a daily-rolling file when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let Some(dir) = log_dir else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
        return Ok(None);
    };

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("careers-bot")
        .filename_suffix("log")
        .build(dir)
        .with_context(|| format!("Failed to open log directory {}", dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(Some(guard))
}
