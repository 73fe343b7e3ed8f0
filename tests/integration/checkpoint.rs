//! Checkpoint-style flows mixing collective and single-process access.

use kvtree::{
    read_scatter, read_scatter_single, write_gather, write_to_gather, CollectiveError,
    Communicator, GatherConfig, IoConfig, LocalGroup, Tree,
};

use crate::common::{rank_record, temp_prefix};

#[test]
fn test_collective_write_single_read() {
    let (_dir, prefix) = temp_prefix("summary");
    let size = 6;

    let results = LocalGroup::run(size, |comm| {
        write_gather(&prefix, &rank_record(comm.rank()), comm)
    });
    assert!(results.iter().all(|r| r.is_ok()));

    let mut union = Tree::new();
    read_scatter_single(&prefix, &mut union).unwrap();
    assert_eq!(union.size(), size);
    for rank in 0..size {
        assert_eq!(union.get(&rank.to_string()), Some(&rank_record(rank)));
    }
}

#[test]
fn test_single_write_collective_read() {
    let (_dir, prefix) = temp_prefix("summary");
    let size = 5;

    let mut data = Tree::new();
    for rank in 0..size {
        data.set(&rank.to_string(), rank_record(rank));
    }
    let config = GatherConfig::new().with_entries_per_file(2);
    kvtree::durability::shard::write_to_gather_with(
        &prefix,
        &mut data,
        size,
        &config,
        &IoConfig::default(),
    )
    .unwrap();

    // batches of two: .0.0 holds ranks 0-1, .0.2 ranks 2-3, .0.4 rank 4;
    // each batch file is read by the rank matching its writer id
    let results = LocalGroup::run(size, |comm| {
        let mut back = Tree::new();
        read_scatter(&prefix, &mut back, comm)?;
        Ok::<_, CollectiveError>(back)
    });
    for (rank, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), rank_record(rank));
    }
}

#[test]
fn test_default_batch_writer() {
    let (_dir, prefix) = temp_prefix("summary");
    let mut data = Tree::new();
    data.set("0", rank_record(0));
    data.set("1", rank_record(1));
    write_to_gather(&prefix, &mut data, 2).unwrap();

    let mut union = Tree::new();
    read_scatter_single(&prefix, &mut union).unwrap();
    assert_eq!(union, data);
}
