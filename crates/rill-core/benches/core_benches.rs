//! Criterion benchmarks for rill-core's block-index traversal.
//!
//! Covers: skip-list ancestor walks (`GetAncestor`) and last-common-ancestor
//! resolution across a long chain plus a divergent fork, the two operations
//! `find_next_blocks_to_download` leans on most heavily.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rill_core::chain_index::{last_common_ancestor, BlockStatus, BlockTree, ChainIndex, ChainWork};
use rill_core::types::Hash256;

fn h(n: u32) -> Hash256 {
    let mut bytes = [0u8; 32];
    bytes[0..4].copy_from_slice(&n.to_le_bytes());
    Hash256(bytes)
}

fn build_chain(len: u32) -> (BlockTree, Vec<Hash256>) {
    let mut tree = BlockTree::new();
    tree.insert_genesis(h(0), ChainWork(1), BlockStatus::VALID_TREE | BlockStatus::HAVE_DATA);
    let mut hashes = vec![h(0)];
    for i in 1..len {
        let prev = hashes[i as usize - 1];
        tree.insert(h(i), prev, ChainWork(1), BlockStatus::VALID_TREE | BlockStatus::HAVE_DATA, 1);
        hashes.push(h(i));
    }
    (tree, hashes)
}

fn bench_get_ancestor(c: &mut Criterion) {
    let (tree, hashes) = build_chain(100_000);
    let tip = *hashes.last().unwrap();

    c.bench_function("get_ancestor_far", |b| {
        b.iter(|| tree.get_ancestor(black_box(&tip), black_box(0)))
    });

    c.bench_function("get_ancestor_near", |b| {
        b.iter(|| tree.get_ancestor(black_box(&tip), black_box(99_990)))
    });
}

fn bench_last_common_ancestor(c: &mut Criterion) {
    let (mut tree, trunk) = build_chain(50_000);
    let fork_point = trunk[40_000];
    let mut fork_tip = fork_point;
    for i in 0..5_000u32 {
        let hash = h(1_000_000 + i);
        tree.insert(hash, fork_tip, ChainWork(1), BlockStatus::VALID_TREE | BlockStatus::HAVE_DATA, 1);
        fork_tip = hash;
    }
    let trunk_tip = *trunk.last().unwrap();

    c.bench_function("last_common_ancestor", |b| {
        b.iter(|| last_common_ancestor(black_box(&tree), black_box(&trunk_tip), black_box(&fork_tip)))
    });
}

criterion_group!(benches, bench_get_ancestor, bench_last_common_ancestor);
criterion_main!(benches);
