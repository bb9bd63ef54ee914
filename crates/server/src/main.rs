use anyhow::Result;
use axum::serve;
use explorer_core::config::AppConfig;
use rustls::crypto::{ring::default_provider, CryptoProvider};
use server::{build_explorer, create_app};
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Builds the log filter. `RUST_LOG` wins when set; the shorthands `debug` and
/// `trace` only raise the explorer crates and keep dependencies at `warn`.
fn log_filter(config: &AppConfig) -> EnvFilter {
    let crates = |level: &str| format!("warn,explorer_core={level},server={level}");

    match std::env::var("RUST_LOG") {
        Ok(level) if level == "debug" || level == "trace" => EnvFilter::new(crates(&level)),
        Ok(_) => EnvFilter::try_from_env("RUST_LOG")
            .unwrap_or_else(|_| EnvFilter::new(crates(&config.logging.level))),
        Err(_) => EnvFilter::new(crates(&config.logging.level)),
    }
}

fn init_logging(config: &AppConfig) {
    let registry = tracing_subscriber::registry().with(log_filter(config));

    if config.logging.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CryptoProvider::install_default(default_provider())
        .map_err(|e| anyhow::anyhow!("Failed to install crypto provider: {e:?}"))?;

    let config =
        AppConfig::load().map_err(|e| anyhow::anyhow!("Configuration loading failed: {e}"))?;
    config.validate().map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;

    init_logging(&config);
    info!(environment = %config.environment, "Starting IPPAN explorer gateway");
    debug!(
        upstreams = ?config.upstreams(),
        has_proxy_key = config.proxy_key().is_some(),
        timeout_ms = config.upstreams.timeout_ms,
        retries = config.upstreams.retries,
        cache_ttl_ms = config.cache.ttl_ms,
        "Configuration loaded"
    );
    if config.upstreams().is_empty() {
        error!("UPSTREAM_V1_BASES is empty; upstream routes will answer 500 until it is set");
    }

    let addr = config.socket_addr().map_err(|e| anyhow::anyhow!(e))?;
    let explorer = build_explorer(config.clone())?;
    let app = create_app(explorer, &config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Explorer gateway listening");

    if let Err(e) = serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        error!(error = %e, "Server error occurred");
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, draining in-flight requests");
}
