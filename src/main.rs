//! switchboard - score-based routing and fallback across LLM inference backends
//!
//! Serves the execution core over HTTP, or runs single requests from the
//! command line.

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use switchboard::api::{build_executor, run_server};
use switchboard::config::{Config, KeySource};
use switchboard::router::{Criterion, TaskRequest};

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "Score-based routing and fallback across LLM inference backends")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },

    /// Show enabled backends in registration order
    Providers {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },

    /// Execute one request and print the result as JSON
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Task identifier used for routing
        #[arg(short, long)]
        task: String,

        /// Prompt text (or text to embed with --embed)
        #[arg(short, long)]
        prompt: String,

        /// Optional system context
        #[arg(long)]
        system: Option<String>,

        /// Selection criteria, comma separated (cost,speed,quality)
        #[arg(long, value_delimiter = ',')]
        criteria: Vec<Criterion>,

        /// Attempts for the retry wrapper (defaults to routing.max_retries)
        #[arg(short, long)]
        retries: Option<u32>,

        /// Pin the request to one backend
        #[arg(short, long)]
        backend: Option<String>,

        /// Embed the prompt instead of generating text
        #[arg(long)]
        embed: bool,
    },
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("switchboard={},tower_http={}", level, level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(path: &str) -> anyhow::Result<(Config, Vec<(String, KeySource)>)> {
    Config::from_file_with_env(path).with_context(|| format!("loading {}", path))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            let (mut cfg, key_sources) = load_config(&config)?;
            init_tracing(&cfg.logging.level);
            tracing::info!(config = %config, "Loaded configuration");

            for (provider, source) in &key_sources {
                tracing::info!(provider = %provider, key_source = %source, "Resolved API key");
            }

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                cfg.server.listen = addr;
            }

            run_server(cfg).await?;
            Ok(())
        }

        Commands::Check { config } => {
            let (cfg, key_sources) = load_config(&config)?;
            init_tracing(&cfg.logging.level);

            let executor = build_executor(&cfg, reqwest::Client::new(), None)?;

            println!("Configuration OK: {}", config);
            println!("  listen: {}", cfg.server.listen);
            println!(
                "  database: {}",
                cfg.database
                    .as_ref()
                    .map(|d| d.path.as_str())
                    .unwrap_or("disabled")
            );
            println!("  backends: {}", executor.registry().len());
            for (provider, source) in &key_sources {
                println!("  {}: key from {}", provider, source);
            }
            Ok(())
        }

        Commands::Providers { config } => {
            let (cfg, _) = load_config(&config)?;
            init_tracing(&cfg.logging.level);

            let executor = build_executor(&cfg, reqwest::Client::new(), None)?;

            println!(
                "{:<20} {:<10} {:<36} {:>10}",
                "NAME", "TYPE", "MODEL", "RATE/1K"
            );
            for backend in executor.registry().backends() {
                println!(
                    "{:<20} {:<10} {:<36} {:>10.4}",
                    backend.name(),
                    backend.kind(),
                    backend.default_model(),
                    backend.rate_per_1k()
                );
            }
            Ok(())
        }

        Commands::Run {
            config,
            task,
            prompt,
            system,
            criteria,
            retries,
            backend,
            embed,
        } => {
            let (cfg, _) = load_config(&config)?;
            init_tracing(&cfg.logging.level);

            let executor = build_executor(&cfg, reqwest::Client::new(), None)?;

            let mut request = if embed {
                TaskRequest::embedding(task, prompt)
            } else {
                TaskRequest::new(task, prompt)
            };
            if let Some(system) = system {
                request = request.with_system(system);
            }
            if !criteria.is_empty() {
                request = request.with_criteria(criteria.into());
            }

            let result = match backend {
                Some(name) => {
                    executor
                        .execute_on_with_retry(&name, &request, retries)
                        .await?
                }
                None => executor.execute_with_retry(&request, retries).await?,
            };

            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}
