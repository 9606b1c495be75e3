//! Property-based tests for allocator and bitmap bookkeeping.
//!
//! Uses proptest to verify the free-counter and uniqueness invariants hold
//! across many random operation sequences.

use chunkstore::{CheckpointConfig, CheckpointFile};
use proptest::prelude::*;
use std::collections::HashSet;
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> CheckpointFile {
    let mut store =
        CheckpointFile::new(CheckpointConfig::single(12, dir.path(), 0)).unwrap();
    store.open(false, true).unwrap();
    store
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn free_count_always_matches_zero_bits(
        ops in prop::collection::vec(any::<bool>(), 1..200)
    ) {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let mut live: Vec<u64> = Vec::new();

        for allocate in ops {
            if allocate || live.is_empty() {
                live.push(store.allocate_block());
            } else {
                let block = live.swap_remove(live.len() / 2);
                store.free_block(block);
            }
            prop_assert_eq!(
                store.free_bit_count(),
                store.used_bitmap().count_zeros(),
                "free counter diverged from bitmap"
            );
        }
    }

    #[test]
    fn allocations_are_unique_until_freed(count in 1usize..300) {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        let mut seen = HashSet::new();
        for _ in 0..count {
            let block = store.allocate_block();
            prop_assert!(seen.insert(block), "block {} allocated twice", block);
            prop_assert!(store.get_used_block_info(block));
        }
    }

    #[test]
    fn freed_blocks_become_allocatable_again(count in 2usize..100) {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        let blocks: Vec<u64> = (0..count).map(|_| store.allocate_block()).collect();
        for &block in &blocks {
            store.free_block(block);
            prop_assert!(!store.get_used_block_info(block));
        }

        // Everything is free again; the next `count` allocations must fit
        // inside the existing bitmap without growing it.
        let len_before = store.used_bitmap().len();
        for _ in 0..count {
            store.allocate_block();
        }
        prop_assert_eq!(store.used_bitmap().len(), len_before);
    }

    #[test]
    fn setting_a_used_bit_twice_is_idempotent(
        flags in prop::collection::vec(any::<bool>(), 1..100)
    ) {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        for _ in 0..flags.len() {
            store.allocate_block();
        }

        for (i, flag) in flags.iter().enumerate() {
            store.set_used_block_info(i as u64, *flag);
            let free = store.free_bit_count();
            store.set_used_block_info(i as u64, *flag);
            prop_assert_eq!(store.free_bit_count(), free);
        }
    }

    #[test]
    fn write_read_round_trip(
        writes in prop::collection::vec((0u64..16, any::<u8>()), 1..20)
    ) {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let mut expected = std::collections::HashMap::new();

        for (block, byte) in writes {
            store.write_block(&vec![byte; 4096], block).unwrap();
            expected.insert(block, byte);
        }

        let mut buf = vec![0u8; 4096];
        for (block, byte) in expected {
            prop_assert_eq!(store.read_block(&mut buf, block).unwrap(), 1);
            prop_assert!(buf.iter().all(|&b| b == byte));
        }
    }
}
