//! Criterion benchmarks for the download planner under a realistic window.
//!
//! Covers: a steady-state `find_next_blocks_to_download` call against a
//! peer whose best-known block sits a full window ahead of the common
//! ancestor, and the in-flight mark/receive round-trip that runs once per
//! block during normal sync.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rill_core::chain_index::{BlockStatus, BlockTree, ChainWork};
use rill_core::types::Hash256;
use rill_network::collaborators::{InMemoryAddressBook, InMemoryOrphanPool};
use rill_network::peer_state::ConnectInfo;
use rill_network::planner::find_next_blocks_to_download;
use rill_network::registry::PeerRegistry;

fn h(n: u32) -> Hash256 {
    let mut bytes = [0u8; 32];
    bytes[0..4].copy_from_slice(&n.to_le_bytes());
    Hash256(bytes)
}

fn connect_info() -> ConnectInfo {
    ConnectInfo {
        name: "bench-peer".into(),
        address: "127.0.0.1:1".parse().unwrap(),
        outbound: true,
        whitelisted: false,
        one_shot: false,
        light_client: false,
    }
}

fn build_chain(len: u32, have_data_up_to: u32) -> (BlockTree, Vec<Hash256>) {
    let mut tree = BlockTree::new();
    tree.insert_genesis(h(0), ChainWork(1), BlockStatus::VALID_TREE | BlockStatus::HAVE_DATA);
    let mut hashes = vec![h(0)];
    for i in 1..len {
        let prev = hashes[i as usize - 1];
        let status = if i <= have_data_up_to { BlockStatus::VALID_TREE | BlockStatus::HAVE_DATA } else { BlockStatus::VALID_TREE };
        tree.insert(h(i), prev, ChainWork(1), status, 1);
        hashes.push(h(i));
    }
    (tree, hashes)
}

fn bench_find_next_blocks(c: &mut Criterion) {
    let (mut tree, hashes) = build_chain(3_000, 2_000);
    tree.set_active_tip(hashes[2_000]);
    let peer_id = rill_core::types::PeerId(1);

    c.bench_function("find_next_blocks_to_download_steady_window", |b| {
        b.iter_with_setup(
            || {
                let mut registry = PeerRegistry::new(Box::new(InMemoryAddressBook::new()), Box::new(InMemoryOrphanPool::new()));
                registry.initialize(peer_id, connect_info());
                registry.lookup_mut(peer_id).unwrap().best_known_block = Some(hashes[2_500]);
                registry
            },
            |mut registry| {
                find_next_blocks_to_download(black_box(&mut registry), peer_id, 16, 1024, 128, &tree, &tree)
            },
        )
    });
}

fn bench_mark_in_flight_round_trip(c: &mut Criterion) {
    let peer_id = rill_core::types::PeerId(1);

    c.bench_function("mark_in_flight_then_received", |b| {
        b.iter_with_setup(
            || {
                let mut registry = PeerRegistry::new(Box::new(InMemoryAddressBook::new()), Box::new(InMemoryOrphanPool::new()));
                registry.initialize(peer_id, connect_info());
                registry
            },
            |mut registry| {
                registry.mark_block_as_in_flight(peer_id, black_box(h(1)), Some(h(1)), 1);
                registry.mark_block_as_received(black_box(&h(1)));
            },
        )
    });
}

criterion_group!(benches, bench_find_next_blocks, bench_mark_in_flight_round_trip);
criterion_main!(benches);
