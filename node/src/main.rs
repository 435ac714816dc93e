// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Swarm Node
//!
//! Entry point for the `swarm-node` binary. Parses CLI arguments, initializes
//! logging and metrics, joins the gossip overlay and serves the HTTP API.
//!
//! The binary supports four subcommands:
//!
//! - `run`     join the overlay and gossip until interrupted
//! - `keygen`  generate a node key
//! - `status`  query a running node's status endpoint
//! - `version` print build version information

mod api;
mod cli;
mod identity;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use axum::http::Uri;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use swarm_protocol::network::Swarm;

use cli::{Commands, SwarmNodeCli};
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = SwarmNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Keygen(args) => keygen(args),
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Joins the overlay, runs the round loop and serves the API until a
/// shutdown signal, then disposes the swarm.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_FILTER, args.log_format);

    let (key, ephemeral) = identity::resolve_key(args.key.as_deref(), args.key_file.as_deref())?;
    if ephemeral {
        tracing::warn!("no --key or --key-file given, running with a throwaway identity");
    }

    let interval = Duration::from_millis(args.interval_ms);
    let swarm = Swarm::new(key, args.listen.clone(), Duration::from_millis(args.timeout_ms))
        .context("failed to create swarm")?;

    tracing::info!(
        public_key = %swarm.public_key(),
        endpoint = %swarm.endpoint(),
        seeds = args.seeds.len(),
        interval_ms = args.interval_ms,
        timeout_ms = args.timeout_ms,
        http_port = args.http_port,
        "starting swarm-node"
    );

    // --- Overlay ---
    swarm
        .init_context()
        .await
        .with_context(|| format!("failed to bind gossip endpoint {}", swarm.endpoint()))?;
    let seeded = swarm.add_peers(args.seeds)?;
    tracing::info!(seeded, "seed peers added");

    let runner = {
        let swarm = swarm.clone();
        tokio::spawn(async move { swarm.run(interval).await })
    };

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);

    // --- API server ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            swarm_protocol::config::PROTOCOL_VERSION,
        ),
        swarm: swarm.clone(),
        metrics: node_metrics,
        started_at: chrono::Utc::now(),
    };
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.http_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {}", api_addr))?;
    tracing::info!("HTTP API listening on {}", api_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, leaving the overlay");
        }
    }

    swarm.dispose().await;
    match runner.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("round loop ended with error: {}", e),
        Err(e) => tracing::error!("round loop task failed: {}", e),
    }
    tracing::info!("swarm-node stopped");
    Ok(())
}

/// Generates a node key and prints or stores it.
fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let key = swarm_protocol::crypto::PrivateKey::generate();
    let public_key = key.public_key();

    match &args.out {
        Some(path) => {
            identity::write_key_file(path, &key)?;
            println!("Node key written.");
            println!("  Key file   : {}", path.display());
        }
        None => {
            println!("Node key generated. Keep the private key secret.");
            println!("  Private key: {}", key.to_hex());
        }
    }
    println!("  Public key : {}", public_key.to_hex());
    println!("  Base58     : {}", public_key.to_base58());
    Ok(())
}

/// Queries a running node's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.url.trim_end_matches('/'));
    let body = http_get(&url).await?;
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", body),
    }
    Ok(())
}

/// Minimal HTTP/1.1 GET over a plain TCP stream. Enough for talking to our
/// own status endpoint without an HTTP client dependency.
async fn http_get(url: &str) -> Result<String> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let uri: Uri = url
        .parse()
        .with_context(|| format!("invalid URL: {}", url))?;
    if uri.scheme_str().is_some_and(|scheme| scheme != "http") {
        anyhow::bail!("only http:// URLs are supported: {}", url);
    }
    let host = uri
        .host()
        .ok_or_else(|| anyhow::anyhow!("missing host in URL: {}", url))?;
    let port = uri.port_u16().unwrap_or(80);
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    let addr = format!("{}:{}", host, port);
    let mut stream = tokio::net::TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, host,
    );
    stream.write_all(request.as_bytes()).await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    // Everything after the first blank line is the body.
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_else(|| response.to_string());

    Ok(body)
}

/// Prints version information to stdout.
fn print_version() {
    println!("swarm-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol   {}", swarm_protocol::config::PROTOCOL_VERSION);
    println!("wire       v{}", swarm_protocol::config::WIRE_PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed the node keeps running and relies on the other one.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
