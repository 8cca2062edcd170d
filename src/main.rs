mod repl;

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cadre_agent::{CompiledGraph, GraphBuilder, MemoryCheckpointStore};
use cadre_core::config::AppConfig;
use cadre_core::event::EventBus;
use cadre_core::graph_config::GraphConfig;
use cadre_core::traits::LlmClient;
use cadre_core::types::SessionId;
use cadre_llm::RetryingClient;
use cadre_tools::ToolRegistry;

#[derive(Parser)]
#[command(name = "cadre", version, about = "Supervisor-routed multi-agent orchestration")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "cadre.toml")]
    config: PathBuf,

    /// Path to the agent topology JSON (overrides [graph].path)
    #[arg(short, long)]
    graph: Option<PathBuf>,

    /// Session ID (auto-generated if not provided)
    #[arg(short, long)]
    session: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive REPL mode
    Repl,
    /// Run a single prompt through the graph and exit
    Run {
        /// The prompt to send
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Load and build the graph, then print its nodes and edges
    Check,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Everything a command needs once the graph is built.
pub(crate) struct App {
    pub graph: CompiledGraph,
    pub topology: GraphConfig,
    pub tools: Arc<ToolRegistry>,
    pub store: Arc<MemoryCheckpointStore>,
    pub event_bus: Arc<EventBus>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Credentials may come from a .env file next to the working directory
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cadre=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "cadre", &mut std::io::stdout());
        return Ok(());
    }

    let config = if cli.config.exists() {
        AppConfig::load(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?
    } else {
        info!(path = %cli.config.display(), "No config file, using environment");
        AppConfig::from_env()
    };

    let graph_path = match &cli.graph {
        Some(path) => path.clone(),
        None => config.graph_path(cli.config.parent().filter(|_| cli.config.exists())),
    };
    let app = build_app(&config, &graph_path)?;

    let session_id = cli
        .session
        .as_deref()
        .map(SessionId::from_str)
        .unwrap_or_default();

    match cli.command {
        Some(Commands::Check) => {
            println!("Graph: {}", graph_path.display());
            println!("Entry: {}", app.graph.entry());
            println!("Nodes: {}", app.graph.node_names().join(", "));
            println!("Edges:");
            for edge in app.graph.describe_edges() {
                println!("  {}", edge);
            }
            println!("Route options: {}", app.graph.route_options().join(", "));
            println!("Registered tools: {}", app.tools.list().join(", "));
            println!("Worker tools:");
            for (name, spec) in &app.topology.agents {
                let (found, missing) = app.tools.resolve(&spec.tools);
                let found: Vec<&str> = found.iter().map(|t| t.name()).collect();
                if missing.is_empty() {
                    println!("  {}: [{}]", name, found.join(", "));
                } else {
                    println!(
                        "  {}: [{}] (unknown: {})",
                        name,
                        found.join(", "),
                        missing.join(", ")
                    );
                }
            }
            println!("Recursion limit: {}", app.graph.recursion_limit());
        }
        Some(Commands::Run { prompt }) => {
            let mut text = prompt.join(" ");
            if text.is_empty() {
                text = io::stdin()
                    .lock()
                    .lines()
                    .map_while(|l| l.ok())
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            repl::run_once(&app, &session_id, &text).await?;
        }
        Some(Commands::Repl) | None => {
            repl::run_repl(&app, session_id).await?;
        }
        // Handled before config loading
        Some(Commands::Completions { .. }) => {}
    }

    Ok(())
}

/// Load the topology and assemble the graph with a real LLM client.
fn build_app(config: &AppConfig, graph_path: &Path) -> anyhow::Result<App> {
    let graph_config = GraphConfig::load(graph_path)
        .with_context(|| format!("loading topology {}", graph_path.display()))?;

    if config.model.api_key.is_none() && config.model.provider == "openai" {
        warn!("No API key configured; set OPENAI_API_KEY or [model].api_key");
    }

    let store = Arc::new(MemoryCheckpointStore::new());
    let event_bus = Arc::new(EventBus::default());
    let tools = Arc::new(ToolRegistry::with_builtins());
    let graph = GraphBuilder::new(graph_config.clone())
        .with_llm(create_llm(config), config.model.clone())
        .with_tools(tools.clone())
        .with_checkpointer(store.clone())
        .with_event_bus(event_bus.clone())
        .with_settings(config.graph.clone(), config.worker.clone())
        .build()?;

    Ok(App {
        graph,
        topology: graph_config,
        tools,
        store,
        event_bus,
    })
}

/// Primary client, wrapped for retries and fallbacks when either is configured.
fn create_llm(config: &AppConfig) -> Arc<dyn LlmClient> {
    let primary = cadre_llm::create_client(&config.model);
    if config.model.retry.is_none() && config.fallback_models.is_empty() {
        return Arc::from(primary);
    }
    let fallbacks = config
        .fallback_models
        .iter()
        .map(|m| (m.clone(), cadre_llm::create_client(m)))
        .collect();
    Arc::new(RetryingClient::new(
        primary,
        fallbacks,
        config.model.retry.clone().unwrap_or_default(),
    ))
}
