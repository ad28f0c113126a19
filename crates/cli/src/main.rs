//! Parley playground entry point
//!
//! Reads one user input per stdin line, routes it through the route table
//! and prints the outcome as a JSON line.

mod router;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use parley_agent::Ai;
use parley_config::{constants::env, load_settings, Settings};

use crate::router::{load_routes, Router};

/// Route table location when `PARLEY_ROUTES` is unset
const DEFAULT_ROUTES: &str = "config/routes.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env_name = std::env::var(env::ENVIRONMENT).ok();
    let config = match load_settings(env_name.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&config);

    tracing::info!("Starting parley v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?config.environment,
        config_path = env_name.as_deref().unwrap_or("default"),
        backends = config.backends.len(),
        "Configuration loaded"
    );

    if let Err(e) = config.validate() {
        tracing::warn!(error = %e, "Configuration did not validate");
    }

    let ai = Arc::new(Ai::from_settings(&config).context("Failed to initialize the Ai service")?);

    let routes_path = std::env::var("PARLEY_ROUTES").unwrap_or_else(|_| DEFAULT_ROUTES.to_string());
    let routes = load_routes(&routes_path)?;
    tracing::info!(path = %routes_path, routes = routes.len(), "Loaded route table");

    let mut router = Router::new(ai, routes);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        let outcome = router.handle(text).await;
        let mut encoded = serde_json::to_string(&outcome)?;
        encoded.push('\n');
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.flush().await?;
    }

    tracing::info!("Input closed, shutting down");
    Ok(())
}

/// Crates logged at the configured level when `RUST_LOG` is unset
const LOG_TARGETS: [&str; 5] = [
    "parley",
    "parley_agent",
    "parley_nlu",
    "parley_text_processing",
    "parley_config",
];

fn default_filter(level: &str) -> String {
    LOG_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize tracing on stderr, stdout carries the JSON outcomes
fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        default_filter(&config.observability.log_level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };
    subscriber.with(fmt_layer).init();
}
