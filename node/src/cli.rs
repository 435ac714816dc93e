//! # CLI Interface
//!
//! Defines the command-line argument structure for `swarm-node` using
//! `clap` derive. Supports four subcommands: `run`, `keygen`, `status`,
//! and `version`. Every `run` flag can also come from a `SWARM_*`
//! environment variable.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use swarm_protocol::config::{DEFAULT_HTTP_PORT, DEFAULT_ROUND_INTERVAL, DEFAULT_SEND_TIMEOUT};
use swarm_protocol::network::{Endpoint, Peer};

use crate::logging::LogFormat;

/// Swarm peer-discovery node.
///
/// Joins the gossip overlay at the given endpoint, learns the rest of the
/// network from its seed peers, and serves its view of the membership over
/// HTTP together with Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "swarm-node",
    about = "Swarm peer-discovery node",
    version,
    propagate_version = true
)]
pub struct SwarmNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the swarm node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Join the overlay and gossip until interrupted.
    Run(RunArgs),
    /// Generate a fresh Ed25519 node key.
    Keygen(KeygenArgs),
    /// Query the status of a running node via its HTTP endpoint.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Endpoint to listen on and advertise to peers, e.g. `tcp://10.0.0.5:9750`.
    ///
    /// Peers dial exactly this address, so it must be reachable from them.
    #[arg(long, short = 'l', env = "SWARM_LISTEN", default_value = "tcp://127.0.0.1:9750")]
    pub listen: Endpoint,

    /// Seed peer as `<public-key-hex>@<endpoint>`. Repeatable.
    #[arg(long = "seed", short = 's', env = "SWARM_SEEDS", value_delimiter = ',')]
    pub seeds: Vec<Peer>,

    /// Delay between distribute rounds, in milliseconds.
    #[arg(long, env = "SWARM_INTERVAL_MS", default_value_t = DEFAULT_ROUND_INTERVAL.as_millis() as u64)]
    pub interval_ms: u64,

    /// Bound on each individual peer send, in milliseconds.
    #[arg(long, env = "SWARM_TIMEOUT_MS", default_value_t = DEFAULT_SEND_TIMEOUT.as_millis() as u64)]
    pub timeout_ms: u64,

    /// Hex-encoded Ed25519 node private key.
    ///
    /// **Avoid this flag outside development**, it leaks into shell history.
    /// Prefer `--key-file`.
    #[arg(long, env = "SWARM_NODE_KEY", conflicts_with = "key_file")]
    pub key: Option<String>,

    /// File holding the hex-encoded node private key (see `keygen --out`).
    ///
    /// Without `--key` or `--key-file` the node runs with a throwaway key.
    #[arg(long, env = "SWARM_NODE_KEY_FILE")]
    pub key_file: Option<PathBuf>,

    /// Port for the HTTP status API and `/metrics`.
    #[arg(long, env = "SWARM_HTTP_PORT", default_value_t = DEFAULT_HTTP_PORT)]
    pub http_port: u16,

    /// Log output format.
    #[arg(long, env = "SWARM_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Arguments for the `keygen` subcommand.
#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Write the private key to this file instead of printing it.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// HTTP endpoint of the running node.
    #[arg(long, default_value = "http://127.0.0.1:9751")]
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use swarm_protocol::crypto::PrivateKey;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        SwarmNodeCli::command().debug_assert();
    }

    #[test]
    fn run_parses_seeds_and_endpoint() {
        let seed_key = PrivateKey::generate().public_key().to_hex();
        let cli = SwarmNodeCli::try_parse_from([
            "swarm-node",
            "run",
            "--listen",
            "tcp://10.0.0.5:9750",
            "--seed",
            &format!("{seed_key}@tcp://10.0.0.6:9750"),
            "--interval-ms",
            "500",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.listen.location(), "10.0.0.5:9750");
        assert_eq!(args.seeds.len(), 1);
        assert_eq!(args.seeds[0].public_key().to_hex(), seed_key);
        assert_eq!(args.interval_ms, 500);
        assert_eq!(args.timeout_ms, DEFAULT_SEND_TIMEOUT.as_millis() as u64);
        assert_eq!(args.log_format, LogFormat::Pretty);
    }

    #[test]
    fn run_rejects_malformed_seed() {
        let result = SwarmNodeCli::try_parse_from(["swarm-node", "run", "--seed", "not-a-peer"]);
        assert!(result.is_err());
    }

    #[test]
    fn key_and_key_file_conflict() {
        let result = SwarmNodeCli::try_parse_from([
            "swarm-node",
            "run",
            "--key",
            "00",
            "--key-file",
            "node.key",
        ]);
        assert!(result.is_err());
    }
}
