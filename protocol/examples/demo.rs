//! Interactive demo of peer discovery over the gossip overlay.
//!
//! Starts three in-process nodes chained A -> B -> C, lets them gossip until
//! every node knows the other two, prints the tables and liveness data, then
//! retires A and shows that B and C keep it in their tables.
//!
//! Run with:
//!   cargo run --example demo --release

use std::time::{Duration, Instant};

use swarm_protocol::crypto::PrivateKey;
use swarm_protocol::network::{Endpoint, Swarm};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const BG_BLUE: &str = "\x1b[44m";

const ROUND: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn banner() {
    println!();
    println!("{BG_BLUE}{BOLD}{WHITE}                                                          {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}    SWARM PROTOCOL  --  Peer Discovery Demo               {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}                                                          {RESET}");
    println!();
}

fn section(title: &str) {
    println!();
    println!("{BOLD}{WHITE}  {title}{RESET}");
    println!("{DIM}  ------------------------------------------------------{RESET}");
}

fn name_of(swarm: &Swarm, nodes: &[(&str, &Swarm)]) -> String {
    nodes
        .iter()
        .find(|(_, s)| s.key_equals(swarm))
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| "?".into())
}

fn print_tables(nodes: &[(&str, &Swarm)]) {
    for (name, swarm) in nodes {
        let mut known: Vec<String> = swarm
            .peers()
            .iter()
            .filter_map(|peer| {
                nodes
                    .iter()
                    .find(|(_, s)| s.as_peer().same_node(peer))
                    .map(|(n, _)| n.to_string())
            })
            .collect();
        known.sort();
        println!(
            "  {CYAN}{name}{RESET} {DIM}({}){RESET} knows [{GREEN}{}{RESET}]",
            swarm.public_key().to_base58(),
            known.join(", ")
        );
        for (peer, seen) in swarm.liveness() {
            let from = nodes
                .iter()
                .find(|(_, s)| s.as_peer().same_node(&peer))
                .map(|(n, _)| *n)
                .unwrap_or("?");
            println!("      {DIM}last heard from {from} at {seen}{RESET}");
        }
    }
}

fn converged(nodes: &[(&str, &Swarm)]) -> bool {
    nodes.iter().all(|(_, s)| s.count() == nodes.len() - 1)
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    banner();

    section("1. Creating nodes");
    let a = Swarm::new(PrivateKey::generate(), Endpoint::parse("inproc://demo-a")?, ROUND)?;
    let b = Swarm::new(PrivateKey::generate(), Endpoint::parse("inproc://demo-b")?, ROUND)?;
    let c = Swarm::new(PrivateKey::generate(), Endpoint::parse("inproc://demo-c")?, ROUND)?;
    let nodes = [("A", &a), ("B", &b), ("C", &c)];
    for (name, swarm) in &nodes {
        swarm.init_context().await?;
        println!("  {CYAN}{name}{RESET} listening on {}", swarm.endpoint());
    }

    section("2. Seeding: A knows B, B knows C");
    a.add_peers([b.as_peer()])?;
    b.add_peers([c.as_peer()])?;
    print_tables(&nodes);

    section("3. Gossiping");
    let started = Instant::now();
    let runners: Vec<_> = nodes
        .iter()
        .map(|(_, swarm)| {
            let swarm = (*swarm).clone();
            tokio::spawn(async move { swarm.run(ROUND).await })
        })
        .collect();
    while !converged(&nodes) {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    println!(
        "  {GREEN}converged{RESET} after {:?} ({} rounds from A)",
        started.elapsed(),
        a.stats().rounds
    );
    tokio::time::sleep(ROUND * 2).await;
    print_tables(&nodes);

    section("4. Retiring A");
    a.dispose().await;
    tokio::time::sleep(ROUND * 3).await;
    println!(
        "  {YELLOW}{}{RESET} is {:?}; B still lists it: {}",
        name_of(&a, &nodes),
        a.status(),
        b.contains(&a.as_peer())
    );
    println!("  B failed sends so far: {}", b.stats().sends_failed);

    b.dispose().await;
    c.dispose().await;
    for runner in runners {
        runner.await??;
    }

    println!();
    println!("{BOLD}{GREEN}  Done.{RESET}");
    println!();
    Ok(())
}
