//! CLI entrypoint: wires configuration, tools, and the agent runtime into
//! the interactive chat loop.

mod config;
mod driver;
mod prompt;
mod resolver;
mod terminal;
#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::sync::Arc;

use agent::{
    AgentRuntime, Checkpointer, LlmProvider, MemorySaver, OpenAiProvider, RuntimeOptions,
    SqliteSaver, ToolRegistry,
};
use clap::Parser;
use proto::SessionConfig;
use tools::{ArcadeClient, ArcadeProvisioner, ToolProvisioner, ToolkitRequest};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, PersistenceBackend};
use crate::resolver::InterruptResolver;
use crate::terminal::StdTerminal;

/// Top-level command-line arguments for toolbot.
#[derive(Parser, Debug)]
#[command(name = "toolbot")]
#[command(about = "Terminal chat agent with authorized remote tools", version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Enable debug logging to ~/.toolbot/logs/debug.log
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Continue an existing conversation thread by its ID
    #[arg(short, long)]
    thread: Option<String>,
}

const FILE_LOG_FILTER: &str = "debug,hyper_util=info,rustls=info,reqwest=info,sqlx=info";

/// Installs the console subscriber, plus a daily debug log file with `--debug`.
///
/// The returned guard must outlive `main` so buffered file writes are flushed.
fn init_tracing(cli: &Cli) -> Option<WorkerGuard> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    if !cli.debug {
        tracing_subscriber::registry().with(console).init();
        return None;
    }

    let log_dir = config::home_dir().join(".toolbot").join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let appender = tracing_appender::rolling::daily(&log_dir, "debug.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_ansi(false)
        .with_filter(EnvFilter::new(FILE_LOG_FILTER));
    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .init();
    Some(guard)
}

fn session_for(thread: Option<String>) -> SessionConfig {
    match thread {
        Some(id) => SessionConfig::with_thread(id),
        None => SessionConfig::new(),
    }
}

async fn build_checkpointer(config: &Config) -> anyhow::Result<Arc<dyn Checkpointer>> {
    let checkpointer: Arc<dyn Checkpointer> = match config.persistence.backend {
        PersistenceBackend::Memory => Arc::new(MemorySaver::new()),
        PersistenceBackend::Sqlite => {
            info!(url = %config.persistence.url, "Opening checkpoint database");
            Arc::new(SqliteSaver::open(&config.persistence.url).await?)
        }
    };
    Ok(checkpointer)
}

fn build_llm(config: &Config) -> Arc<dyn LlmProvider> {
    match &config.agent.base_url {
        Some(url) => Arc::new(OpenAiProvider::with_base_url(&config.agent.api_key, url)),
        None => Arc::new(OpenAiProvider::new(&config.agent.api_key)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _file_guard = init_tracing(&cli);
    if cli.debug {
        info!(version = env!("CARGO_PKG_VERSION"), "toolbot session start");
    }

    let config = Config::load(cli.config.as_deref())?;
    config.validate()?;
    let user_id = config.require_user_id()?.to_string();
    let model = config.require_model()?.to_string();
    if config.arcade.api_key.is_empty() {
        warn!("ARCADE_API_KEY is not set; tool service requests will be rejected");
    }

    let arcade = Arc::new(ArcadeClient::with_base_url(
        &config.arcade.api_key,
        &config.arcade.base_url,
    ));
    let tool_set = ArcadeProvisioner::new(Arc::clone(&arcade))
        .provision(&ToolkitRequest {
            toolkits: config.arcade.toolkits.clone(),
            tools: config.arcade.tools.clone(),
            user_id,
            limit: config.arcade.limit,
        })
        .await?;
    info!(count = tool_set.len(), "Tools provisioned");
    let registry =
        ToolRegistry::from_tool_set(tool_set).require_approval(config.arcade.require_approval.clone());
    debug!(tools = ?registry.tool_names(), "Tool registry ready");

    if cli.thread.is_some() && config.persistence.backend == PersistenceBackend::Memory {
        warn!("In-memory checkpoints do not survive restarts; the thread starts empty");
    }
    let checkpointer = build_checkpointer(&config).await?;

    let runtime = Arc::new(AgentRuntime::new(
        build_llm(&config),
        Arc::new(registry),
        checkpointer,
        RuntimeOptions {
            system_prompt: config.system_prompt()?,
            model,
            max_tool_rounds: config.agent.max_tool_rounds,
        },
    ));

    let session = session_for(cli.thread);
    info!(thread = %session.thread_id, "Chat session started");

    let resolver = InterruptResolver::new(arcade);
    let mut terminal = StdTerminal::new();
    driver::run_chat(&runtime, &resolver, &mut terminal, &session).await
}
