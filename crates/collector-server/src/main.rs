use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use collector_core::config::parse_duration;
use collector_core::Config;
use collector_server::{operator_router, rpc_router, AppState};

/// How long shutdown waits for in-flight connections to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "collector", about = "Human-in-the-loop request broker")]
struct Args {
    /// Operator HTTP listener port.
    #[arg(long)]
    http_port: Option<u16>,

    /// Caller RPC listener port.
    #[arg(long)]
    rpc_port: Option<u16>,

    /// Maximum queued requests before admission rejects.
    #[arg(long)]
    max_pending: Option<usize>,

    /// Long-poll deadline for operator takes (e.g. "30s").
    #[arg(long, value_parser = parse_duration)]
    http_timeout: Option<Duration>,

    /// Deadline for reading a submit body (e.g. "5s").
    #[arg(long, value_parser = parse_duration)]
    submit_timeout: Option<Duration>,
}

impl Args {
    fn apply(self, mut config: Config) -> Config {
        if let Some(port) = self.http_port {
            config.http_port = port;
        }
        if let Some(port) = self.rpc_port {
            config.rpc_port = port;
        }
        if let Some(limit) = self.max_pending {
            config.max_pending_requests = limit;
        }
        if let Some(timeout) = self.http_timeout {
            config.http_timeout = timeout;
        }
        if let Some(timeout) = self.submit_timeout {
            config.submit_timeout = timeout;
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let config = Args::parse().apply(Config::from_env());
    let state = AppState::new(config.clone());

    let http_listener = match TcpListener::bind(("0.0.0.0", config.http_port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(port = config.http_port, error = %e, "failed to bind http listener");
            return ExitCode::FAILURE;
        }
    };
    let rpc_listener = match TcpListener::bind(("0.0.0.0", config.rpc_port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(port = config.rpc_port, error = %e, "failed to bind rpc listener");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        http_port = config.http_port,
        rpc_port = config.rpc_port,
        max_pending = config.max_pending_requests,
        "listening"
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        });
    }

    let http_server = {
        let shutdown = shutdown.clone();
        let router = operator_router(state.clone());
        tokio::spawn(async move {
            axum::serve(http_listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        })
    };
    let rpc_server = {
        let shutdown = shutdown.clone();
        let router = rpc_router(state);
        tokio::spawn(async move {
            axum::serve(rpc_listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        })
    };

    shutdown.cancelled().await;

    let drain = async {
        let _ = http_server.await;
        let _ = rpc_server.await;
    };
    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        tracing::warn!("drain deadline exceeded, exiting with streams open");
    }
    tracing::info!("shutdown complete");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
