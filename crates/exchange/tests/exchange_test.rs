//! Group-level tests for the sparse exchange.

use kvtree_core::Tree;
use kvtree_exchange::{
    exchange, exchange_direction, send_queue_insert, Communicator, Direction, LocalComm,
    LocalGroup,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn message(from: usize, to: usize) -> Tree {
    let mut t = Tree::new();
    t.set_kv_int("FROM", from as i64);
    t.set_kv_int("TO", to as i64);
    t
}

#[derive(Clone, Copy)]
enum Mode {
    Left,
    Right,
    Auto,
}

fn run(comm: &LocalComm, send: &Tree, mode: Mode) -> Tree {
    let mut recv = Tree::new();
    match mode {
        Mode::Left => exchange_direction(comm, send, &mut recv, Direction::Left).unwrap(),
        Mode::Right => exchange_direction(comm, send, &mut recv, Direction::Right).unwrap(),
        Mode::Auto => exchange(comm, send, &mut recv).unwrap(),
    }
    recv
}

fn check_ring(size: usize, mode: Mode) {
    let results = LocalGroup::run(size, |comm| {
        let rank = comm.rank();
        let right = (rank + 1) % size;
        let mut send = Tree::new();
        send_queue_insert(&mut send, right, &message(rank, right));
        run(comm, &send, mode)
    });
    for (rank, recv) in results.iter().enumerate() {
        let left = (rank + size - 1) % size;
        assert_eq!(recv.size(), 1, "rank {} of {}", rank, size);
        assert_eq!(recv.get(&left.to_string()), Some(&message(left, rank)));
    }
}

#[test]
fn test_ring_left() {
    for size in 1..=8 {
        check_ring(size, Mode::Left);
    }
}

#[test]
fn test_ring_right() {
    for size in 1..=8 {
        check_ring(size, Mode::Right);
    }
}

#[test]
fn test_ring_auto() {
    for size in 1..=8 {
        check_ring(size, Mode::Auto);
    }
}

#[test]
fn test_all_to_all() {
    for mode in [Mode::Left, Mode::Right, Mode::Auto] {
        let size = 6;
        let results = LocalGroup::run(size, |comm| {
            let rank = comm.rank();
            let mut send = Tree::new();
            for dest in 0..size {
                send_queue_insert(&mut send, dest, &message(rank, dest));
            }
            run(comm, &send, mode)
        });
        for (rank, recv) in results.iter().enumerate() {
            assert_eq!(recv.size(), size);
            for src in 0..size {
                assert_eq!(recv.get(&src.to_string()), Some(&message(src, rank)));
            }
        }
    }
}

#[test]
fn test_gather_to_root() {
    let size = 7;
    let results = LocalGroup::run(size, |comm| {
        let rank = comm.rank();
        let mut send = Tree::new();
        send_queue_insert(&mut send, 0, &message(rank, 0));
        run(comm, &send, Mode::Auto)
    });
    assert_eq!(results[0].size(), size);
    for recv in &results[1..] {
        assert!(recv.is_empty());
    }
}

#[test]
fn test_empty_exchange() {
    let results = LocalGroup::run(5, |comm| run(comm, &Tree::new(), Mode::Auto));
    assert!(results.iter().all(Tree::is_empty));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_random_pattern_delivers_everything(size in 1usize..9, seed in any::<u64>()) {
        let sends: Vec<Vec<usize>> = (0..size)
            .map(|rank| {
                let mut rng = StdRng::seed_from_u64(seed ^ rank as u64);
                (0..size).filter(|_| rng.gen_bool(0.4)).collect()
            })
            .collect();

        let results = LocalGroup::run(size, |comm| {
            let rank = comm.rank();
            let mut send = Tree::new();
            for &dest in &sends[rank] {
                send_queue_insert(&mut send, dest, &message(rank, dest));
            }
            run(comm, &send, Mode::Auto)
        });

        for (rank, recv) in results.iter().enumerate() {
            let expected: Vec<usize> = (0..size).filter(|src| sends[*src].contains(&rank)).collect();
            prop_assert_eq!(recv.size(), expected.len());
            for src in expected {
                prop_assert_eq!(recv.get(&src.to_string()), Some(&message(src, rank)));
            }
        }
    }
}
