//! Tiqs Stream Binary
//!
//! Connects to the Tiqs tick feed, subscribes to the configured tokens and
//! logs ticks until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin tiqs-stream
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `TIQS_APP_ID`: Tiqs application id
//! - `TIQS_TOKEN`: Authenticated session token
//!
//! ## Optional
//! - `TIQS_STREAM_URL`: Stream endpoint (default: wss://wss.tiqs.trading)
//! - `TIQS_RETRY_DELAY_MS`: Delay between dial attempts (default: 5000)
//! - `TIQS_MAX_RETRIES`: Dial attempts per connect (default: 25)
//! - `TIQS_TICK_QUEUE_CAPACITY`: Tick queue capacity (default: 1000)
//! - `TIQS_ERROR_QUEUE_CAPACITY`: Error queue capacity (default: 100)
//! - `TIQS_METRICS_PORT`: Prometheus metrics port (default: 0, disabled)
//! - `TIQS_SUBSCRIBE_TOKENS`: Comma separated instrument tokens
//! - `TIQS_SUBSCRIBE_MODE`: ltp | quote | full (default: full)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: tiqs-stream)
//! - `RUST_LOG`: Log filter (default: tiqs_stream=info)

use anyhow::Context;
use tiqs_stream::infrastructure::telemetry;
use tiqs_stream::{
    ErrorStream, Mode, StreamClient, StreamClientConfig, StreamConfig, TickStream, Token,
    init_metrics,
};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting Tiqs stream client");

    let config = StreamConfig::from_env()?;
    log_config(&config);

    if init_metrics(config.metrics_port)? {
        tracing::info!(port = config.metrics_port, "Prometheus exporter listening");
    }

    let tokens = parse_tokens(std::env::var("TIQS_SUBSCRIBE_TOKENS").ok().as_deref())?;
    let mode = std::env::var("TIQS_SUBSCRIBE_MODE")
        .ok()
        .map_or(Ok(Mode::Full), |v| v.parse())?;

    let (client, ticks, errors) =
        StreamClient::websocket(StreamClientConfig::from_stream_config(&config)?);

    let tick_task = tokio::spawn(log_ticks(ticks));
    let error_task = tokio::spawn(log_errors(errors));

    client.connect().await.context("initial connect failed")?;

    if tokens.is_empty() {
        tracing::warn!("TIQS_SUBSCRIBE_TOKENS is empty, no ticks will arrive");
    } else if let Err(e) = client.subscribe(&tokens, mode).await {
        tracing::error!(error = %e, "Initial subscribe failed, will retry on reconnect");
    }

    await_shutdown().await;

    tracing::info!("Shutting down");
    client.close().await?;

    let (ticks_seen, _) = tokio::join!(tick_task, error_task);
    tracing::info!(ticks = ticks_seen.unwrap_or_default(), "Tiqs stream client stopped");

    Ok(())
}

/// Drain the tick stream, returning how many ticks arrived.
async fn log_ticks(mut ticks: TickStream) -> u64 {
    let mut count = 0u64;
    while let Some(tick) = ticks.recv().await {
        count += 1;
        tracing::info!(
            token = tick.token,
            ltp = tick.ltp,
            close = tick.close,
            volume = tick.volume,
            depth = tick.has_depth(),
            "Tick"
        );
    }
    count
}

async fn log_errors(mut errors: ErrorStream) {
    while let Some(error) = errors.recv().await {
        tracing::warn!(error = %error, "Stream error");
    }
}

/// Parse `TIQS_SUBSCRIBE_TOKENS` (comma separated, blanks ignored).
fn parse_tokens(raw: Option<&str>) -> anyhow::Result<Vec<Token>> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Token>()
                .with_context(|| format!("invalid token in TIQS_SUBSCRIBE_TOKENS: {s:?}"))
        })
        .collect()
}

fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &StreamConfig) {
    tracing::info!(
        url = %config.stream.url,
        retry_delay_ms = config.stream.retry_delay.as_millis(),
        max_retries = config.stream.max_retries,
        tick_capacity = config.queues.tick_capacity,
        error_capacity = config.queues.error_capacity,
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}
