//! Single-process persistence through the facade crate.

use std::thread;

use kvtree::{lock_open_read, read_file, read_with_lock, write_file, write_with_lock, FileError, Tree};

use crate::common::{rank_record, temp_prefix};

#[test]
fn test_file_roundtrip_preserves_typed_values() {
    let (_dir, path) = temp_prefix("record");
    let record = rank_record(3);
    write_file(&path, &record).unwrap();

    let mut back = Tree::new();
    read_file(&path, &mut back).unwrap();
    assert_eq!(back, record);
    assert_eq!(back.get_int("RANK"), Some(3));
    assert_eq!(back.get_crc32("CRC"), Some(0xdead_0003));
    let file = back.get("FILE").unwrap().first().unwrap();
    assert_eq!(file.key(), "rank_3.dat");
    assert_eq!(file.tree().get_bytecount("SIZE"), Some(4096));
}

#[test]
fn test_missing_file_is_not_readable() {
    let (_dir, path) = temp_prefix("absent");
    let mut tree = Tree::new();
    assert!(matches!(
        read_file(&path, &mut tree),
        Err(FileError::NotReadable { .. })
    ));
}

#[test]
fn test_locked_counter_from_threads() {
    let (_dir, path) = temp_prefix("counter");
    let mut tree = Tree::new();
    tree.set_int("COUNT", 0);
    write_file(&path, &tree).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let path = path.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    let mut tree = Tree::new();
                    let locked = lock_open_read(&path, &mut tree).unwrap();
                    let count = tree.get_int("COUNT").unwrap();
                    tree.set_int("COUNT", count + 1);
                    locked.write_close_unlock(&tree).unwrap();
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    let mut tree = Tree::new();
    read_with_lock(&path, &mut tree).unwrap();
    assert_eq!(tree.get_int("COUNT"), Some(40));

    write_with_lock(&path, &Tree::new()).unwrap();
    let mut tree = Tree::new();
    read_file(&path, &mut tree).unwrap();
    assert!(tree.is_empty());
}
