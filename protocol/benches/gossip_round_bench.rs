// Gossip round benchmarks for the swarm protocol.
//
// Measures one full distribute round from a node that knows `n` live peers
// on an isolated in-process transport. Receivers merge in their own tasks,
// so this is the sender's cost: snapshot, fan-out and timestamp update.

use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use swarm_protocol::crypto::PrivateKey;
use swarm_protocol::network::{Endpoint, InProcTransport, Swarm};

fn swarm(transport: &InProcTransport, name: &str) -> Swarm {
    Swarm::with_transport(
        PrivateKey::generate(),
        Endpoint::parse(&format!("inproc://{name}")).unwrap(),
        Duration::from_secs(1),
        Arc::new(transport.clone()),
    )
}

/// A sender seeded with `n` initialized receivers.
async fn setup(n: usize) -> (Swarm, Vec<Swarm>) {
    let transport = InProcTransport::new();
    let sender = swarm(&transport, "sender");
    sender.init_context().await.unwrap();

    let mut receivers = Vec::with_capacity(n);
    for i in 0..n {
        let receiver = swarm(&transport, &format!("receiver-{i}"));
        receiver.init_context().await.unwrap();
        receivers.push(receiver);
    }
    sender
        .add_peers(receivers.iter().map(Swarm::as_peer))
        .unwrap();
    (sender, receivers)
}

fn bench_distribute_round(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("gossip/distribute_round");

    for peer_count in [4, 16, 64] {
        let (sender, receivers) = runtime.block_on(setup(peer_count));
        group.throughput(Throughput::Elements(peer_count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(peer_count), &sender, |b, sender| {
            b.to_async(&runtime).iter(|| async { sender.distribute().await.unwrap() });
        });

        runtime.block_on(async {
            sender.dispose().await;
            for receiver in &receivers {
                receiver.dispose().await;
            }
        });
    }

    group.finish();
}

criterion_group!(benches, bench_distribute_round);
criterion_main!(benches);
