use std::sync::Arc;

use flat_fs::{
    BlockDevice, FlatFileSystem, FsConfig, FsError, RamDisk, SlotId, Status, BLOCK_SIZE,
    UNSPECIFIED_ID,
};

fn config(slots: u32) -> FsConfig {
    FsConfig::default().with_slots(slots).without_seed()
}

fn fresh(slots: u32) -> FlatFileSystem {
    FlatFileSystem::format(Arc::new(RamDisk::new()), config(slots)).unwrap()
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn created_path_resolves_to_its_slot() {
    let mut fs = fresh(16);
    let slot = fs.create("/notes.txt", 0o644).unwrap();
    let stat = fs.getattr("/notes.txt").unwrap();
    assert_eq!(stat.slot, slot);
    assert_eq!(stat.mode(), 0o100644);
    assert_eq!(stat.size, 0);
    assert_eq!(stat.nlink, 1);
    assert_eq!(fs.lookup(SlotId::ROOT, "notes.txt").unwrap(), slot);
}

#[test]
fn write_then_read() {
    let mut fs = fresh(16);

    let small = b"hello, flat-fs";
    assert_eq!(fs.write("/small", small, 0).unwrap(), small.len());
    assert_eq!(fs.read("/small", 100, 0).unwrap(), small);

    let large = pattern(3 * BLOCK_SIZE + 17);
    fs.create("/large", 0o644).unwrap();
    assert_eq!(fs.write("/large", &large, 0).unwrap(), large.len());
    assert_eq!(fs.read("/large", large.len(), 0).unwrap(), large);

    let stat = fs.getattr("/large").unwrap();
    assert_eq!(stat.size, large.len() as u64);
    assert_eq!(stat.blocks, 4);
}

#[test]
fn write_at_offset_extends() {
    let mut fs = fresh(16);
    fs.write("/f", b"abc", 0).unwrap();
    fs.write("/f", b"xyz", BLOCK_SIZE as u64 + 1).unwrap();

    let data = fs.read("/f", 2 * BLOCK_SIZE, 0).unwrap();
    assert_eq!(data.len(), BLOCK_SIZE + 4);
    assert_eq!(&data[..3], b"abc");
    assert!(data[3..=BLOCK_SIZE].iter().all(|&b| b == 0));
    assert_eq!(&data[BLOCK_SIZE + 1..], b"xyz");
}

#[test]
fn read_past_end_is_empty() {
    let mut fs = fresh(8);
    fs.write("/f", b"abc", 0).unwrap();
    assert!(fs.read("/f", 10, 3).unwrap().is_empty());
    assert!(fs.read("/f", 10, 1000).unwrap().is_empty());
    assert_eq!(fs.read("/f", 10, 1).unwrap(), b"bc");
}

#[test]
fn unlinked_slots_are_reused() {
    let mut fs = fresh(16);
    fs.write("/a", &pattern(2 * BLOCK_SIZE), 0).unwrap();
    let slot = fs.getattr("/a").unwrap().slot;
    let free = fs.statfs().free_slots;

    fs.unlink("/a").unwrap();
    assert!(matches!(fs.getattr("/a"), Err(FsError::NotFound)));
    assert_eq!(fs.statfs().free_slots, free + 2);

    assert_eq!(fs.create("/b", 0o644).unwrap(), slot);
}

#[test]
fn truncate_sets_size() {
    let mut fs = fresh(16);
    fs.write("/f", &pattern(BLOCK_SIZE), 0).unwrap();

    fs.truncate("/f", 10).unwrap();
    assert_eq!(fs.getattr("/f").unwrap().size, 10);
    assert_eq!(fs.getattr("/f").unwrap().blocks, 1);

    fs.truncate("/f", 3 * BLOCK_SIZE as u64).unwrap();
    let stat = fs.getattr("/f").unwrap();
    assert_eq!(stat.size, 3 * BLOCK_SIZE as u64);
    assert_eq!(stat.blocks, 1);

    let data = fs.read("/f", 3 * BLOCK_SIZE, 0).unwrap();
    assert_eq!(&data[..10], &pattern(10)[..]);
    assert!(data[10..].iter().all(|&b| b == 0));
}

#[test]
fn truncate_creates_missing_files() {
    let mut fs = fresh(8);
    fs.truncate("/new", 5000).unwrap();
    let stat = fs.getattr("/new").unwrap();
    assert_eq!(stat.size, 5000);
    assert_eq!(stat.blocks, 1);
    assert_eq!(fs.read("/new", 10, 0).unwrap(), [0; 10]);
}

#[test]
fn size_limit() {
    let config = config(64).with_max_file_size(2 * BLOCK_SIZE as u64);
    let mut fs = FlatFileSystem::format(Arc::new(RamDisk::new()), config).unwrap();
    let free = fs.statfs().free_slots;

    let too_big = pattern(2 * BLOCK_SIZE + 1);
    assert!(matches!(fs.write("/f", &too_big, 0), Err(FsError::TooLarge { .. })));
    assert!(matches!(fs.getattr("/f"), Err(FsError::NotFound)));
    assert!(matches!(
        fs.truncate("/f", 2 * BLOCK_SIZE as u64 + 1),
        Err(FsError::TooLarge { .. })
    ));
    assert_eq!(fs.statfs().free_slots, free);
    assert_eq!(fs.write("/f", &too_big[1..], 0).unwrap(), 2 * BLOCK_SIZE);
}

#[test]
fn nested_directories() {
    let mut fs = fresh(16);
    fs.mkdir("/a", 0o755).unwrap();
    fs.create("/a/b.txt", 0o644).unwrap();

    let names = fs.readdir("/a").unwrap();
    assert_eq!(names, [".", "..", "b.txt"]);
    let root = fs.readdir("/").unwrap();
    assert!(root.contains(&String::from("a")));
    assert!(!root.contains(&String::from("b.txt")));

    assert!(fs.getattr("/a").unwrap().is_dir());
    assert!(matches!(fs.getattr("/b.txt"), Err(FsError::NotFound)));
    assert!(matches!(fs.readdir("/a/b.txt"), Err(FsError::NotADirectory)));
    // a file in the middle of a path
    assert!(matches!(fs.getattr("/a/b.txt/c"), Err(FsError::NotFound)));
    assert!(matches!(fs.create("/a/b.txt/c", 0o644), Err(FsError::NotFound)));
    // extra slashes are ignored
    assert_eq!(fs.getattr("//a///b.txt").unwrap(), fs.getattr("/a/b.txt").unwrap());
}

#[test]
fn exhaustion_and_recovery() {
    let mut fs = fresh(8);
    let mut created = Vec::new();
    for i in 0.. {
        match fs.create(&format!("/f{i}"), 0o644) {
            Ok(_) => created.push(format!("/f{i}")),
            Err(err) => {
                assert!(matches!(err, FsError::NoSpace));
                break;
            }
        }
    }
    assert_eq!(created.len(), 7);
    assert_eq!(fs.statfs().free_slots, 0);

    fs.unlink(&created[3]).unwrap();
    fs.create("/again", 0o644).unwrap();
    assert!(matches!(fs.create("/and-again", 0o644), Err(FsError::NoSpace)));
}

#[test]
fn multi_block_write_is_all_or_nothing() {
    let mut fs = fresh(8);
    // 7 free slots, the write needs 8
    let data = pattern(8 * BLOCK_SIZE);
    assert!(matches!(fs.write("/f", &data, 0), Err(FsError::NoSpace)));
    assert_eq!(fs.statfs().free_slots, 7);
    assert!(matches!(fs.getattr("/f"), Err(FsError::NotFound)));

    fs.write("/f", &data[..7 * BLOCK_SIZE], 0).unwrap();
    assert_eq!(fs.statfs().free_slots, 0);
}

#[test]
fn chmod_and_chown() {
    let mut fs = fresh(8);
    fs.create("/f", 0o644).unwrap();
    fs.chmod("/f", 0o100600).unwrap();
    fs.chown("/f", Some(1000), Some(1000)).unwrap();
    fs.chown("/f", flat_fs::specified(UNSPECIFIED_ID), flat_fs::specified(50)).unwrap();

    let stat = fs.getattr("/f").unwrap();
    assert_eq!(stat.mode(), 0o100600);
    assert_eq!((stat.uid, stat.gid), (1000, 50));
}

#[test]
fn save_discard_load() {
    let disk = Arc::new(RamDisk::new());
    let large = pattern(2 * BLOCK_SIZE + 5);
    {
        let mut fs = FlatFileSystem::open(disk.clone(), config(32)).unwrap();
        fs.mkdir("/docs", 0o750).unwrap();
        fs.write("/docs/big.bin", &large, 0).unwrap();
        fs.write("/top.txt", b"top", 0).unwrap();
        fs.chown("/top.txt", Some(7), None).unwrap();
        fs.release("/top.txt").unwrap();
    }
    assert!(disk.exists());

    let mut fs = FlatFileSystem::open(disk, config(32)).unwrap();
    assert_eq!(fs.readdir("/").unwrap(), [".", "..", "docs", "top.txt"]);
    assert_eq!(fs.readdir("/docs").unwrap(), [".", "..", "big.bin"]);
    assert_eq!(fs.read("/docs/big.bin", large.len(), 0).unwrap(), large);
    assert_eq!(fs.read("/top.txt", 10, 0).unwrap(), b"top");
    assert_eq!(fs.getattr("/docs").unwrap().perm, 0o750);
    assert_eq!(fs.getattr("/top.txt").unwrap().uid, 7);
    // root, docs, big.bin (3 blocks), top.txt
    assert_eq!(fs.statfs().free_slots, 32 - 6);
}

#[test]
fn seed_file_on_first_open() {
    let disk = Arc::new(RamDisk::new());
    let config = FsConfig::default().with_slots(16);
    let seed = config.seed.clone().unwrap();
    let mut fs = FlatFileSystem::open(disk, config).unwrap();
    let path = format!("/{}", seed.name);
    assert_eq!(fs.read(&path, 4096, 0).unwrap(), seed.content);
    assert_eq!(fs.getattr(&path).unwrap().perm, 0o644);
}

#[test]
fn short_image_fails_to_open() {
    let geometry = config(16).geometry();
    let disk = Arc::new(RamDisk::with_image(vec![0; geometry.image_len() - 1]));
    assert!(matches!(
        FlatFileSystem::open(disk, config(16)),
        Err(FsError::CorruptImage { .. })
    ));
}

#[test]
fn statuses_for_a_bridge() {
    let mut fs = fresh(8);
    assert_eq!(fs.create("/f", 0o644).map(|_| ()).status(), 0);
    assert_eq!(fs.write("/f", b"12345", 0).status(), 5);
    assert_eq!(fs.read("/f", 3, 0).status(), 3);
    assert_eq!(fs.unlink("/nope").status(), -libc::ENOENT);
    assert_eq!(fs.rmdir("/").status(), -libc::EBUSY);
    assert_eq!(fs.mknod("/p", 0o010644).map(|_| ()).status(), -libc::EINVAL);
    assert_eq!(fs.open_file("/f").status(), 0);
    assert_eq!(fs.fsync("/f").status(), 0);
    assert_eq!(fs.utimens("/f").status(), 0);
}

#[test]
fn shared_handle() {
    let shared = fresh(8).into_shared();
    let writer = {
        let shared = shared.clone();
        std::thread::spawn(move || shared.lock().write("/t", b"from a thread", 0))
    };
    assert_eq!(writer.join().unwrap().unwrap(), 13);
    assert_eq!(shared.lock().read("/t", 100, 0).unwrap(), b"from a thread");
}
