// Listing concierge entry point.
//
// Startup sequence:
// 1. Initialize tracing
// 2. Load config (copying defaults on first run)
// 3. Load datasets, build clients and the tool registry
// 4. Serve WebSocket connections until Ctrl+C

use std::sync::Arc;

use anyhow::Context;
use concierge_app::app::AppContext;
use concierge_app::server;
use concierge_core::config;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("Listing concierge starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: area={}, port={}, model={}",
        config.site.area_name, config.server.port, config.llm.model
    );

    let base_dir = std::env::current_dir().context("failed to resolve working directory")?;
    let ctx = Arc::new(AppContext::from_config(&config, &base_dir)?);
    info!("Tools registered: {}", ctx.registry().names().join(", "));

    let listener = server::bind(config.server.port)
        .await
        .with_context(|| format!("failed to bind port {}", config.server.port))?;

    tokio::select! {
        result = server::run(listener, ctx) => {
            if let Err(e) = result {
                error!("WebSocket server error: {e:#}");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
        }
    }

    info!("Listing concierge shut down cleanly");
    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the default filter.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("concierge=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
