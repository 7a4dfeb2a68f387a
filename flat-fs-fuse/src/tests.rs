use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

use flat_fs::{BlockDevice, FlatFileSystem, FsConfig, FsError, BLOCK_SIZE};
use tempfile::TempDir;

use crate::{pack, BlockFile, HostError, PackStats};

fn config() -> FsConfig {
    FsConfig::default().with_slots(32)
}

#[test]
fn missing_image_is_created_on_save() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hdd1");

    let device = Arc::new(BlockFile::open(&path).unwrap());
    assert!(!device.exists());
    let mut fs = FlatFileSystem::open(device, config()).unwrap();
    assert!(!path.exists());

    fs.write("/hello.txt", b"hello", 0).unwrap();
    fs.release("/hello.txt").unwrap();
    let len = fs::metadata(&path).unwrap().len();
    assert_eq!(len as usize, config().geometry().image_len());
}

#[test]
fn image_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("image");
    let payload: Vec<u8> = (0..3 * BLOCK_SIZE).map(|i| (i * 7) as u8).collect();

    let mut fs = FlatFileSystem::open(Arc::new(BlockFile::open(&path).unwrap()), config()).unwrap();
    fs.mkdir("/data", 0o755).unwrap();
    fs.write("/data/blob", &payload, 0).unwrap();
    fs.close().unwrap();

    let mut fs = FlatFileSystem::open(Arc::new(BlockFile::open(&path).unwrap()), config()).unwrap();
    assert_eq!(fs.read("/data/blob", payload.len(), 0).unwrap(), payload);
    assert!(fs.readdir("/").unwrap().contains(&String::from("WELCOME.txt")));
}

#[test]
fn truncated_image_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("image");
    let fs = FlatFileSystem::open(Arc::new(BlockFile::open(&path).unwrap()), config()).unwrap();
    fs.close().unwrap();

    let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
    let len = file.metadata().unwrap().len();
    file.set_len(len - 1).unwrap();

    let res = FlatFileSystem::open(Arc::new(BlockFile::open(&path).unwrap()), config());
    assert!(matches!(res, Err(FsError::CorruptImage { .. })));
}

#[test]
fn short_reads_report_length() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("image");
    fs::write(&path, vec![9; BLOCK_SIZE + 3]).unwrap();

    let device = BlockFile::open(&path).unwrap();
    let mut buf = vec![0; BLOCK_SIZE];
    assert_eq!(device.read_block(0, &mut buf).unwrap(), BLOCK_SIZE);
    assert_eq!(device.read_block(1, &mut buf).unwrap(), 3);
    assert_eq!(&buf[..3], [9, 9, 9]);
}

#[test]
fn pack_host_tree() {
    let source = TempDir::new().unwrap();
    fs::create_dir(source.path().join("bin")).unwrap();
    fs::write(source.path().join("bin/tool"), vec![0xCC; BLOCK_SIZE + 1]).unwrap();
    fs::set_permissions(
        source.path().join("bin/tool"),
        fs::Permissions::from_mode(0o755),
    )
    .unwrap();
    fs::write(source.path().join("readme"), b"packed").unwrap();

    let out = TempDir::new().unwrap();
    let image = out.path().join("fs.img");
    let device = Arc::new(BlockFile::create(&image).unwrap());
    let mut fs = FlatFileSystem::format(device, config().without_seed()).unwrap();

    let stats = pack(&mut fs, source.path()).unwrap();
    assert_eq!(
        stats,
        PackStats {
            files: 2,
            dirs: 1,
            bytes: BLOCK_SIZE as u64 + 1 + 6,
        }
    );
    fs.close().unwrap();

    let mut fs = FlatFileSystem::open(Arc::new(BlockFile::open(&image).unwrap()), config()).unwrap();
    assert_eq!(fs.readdir("/").unwrap(), [".", "..", "bin", "readme"]);
    assert_eq!(fs.read("/readme", 100, 0).unwrap(), b"packed");
    let tool = fs.getattr("/bin/tool").unwrap();
    assert_eq!(tool.size, BLOCK_SIZE as u64 + 1);
    assert_eq!(tool.perm, 0o755);
    assert_eq!(tool.blocks, 2);
}

#[test]
fn pack_leaves_nothing_behind_on_failure() {
    let source = TempDir::new().unwrap();
    fs::write(source.path().join("huge"), vec![1; 2 * BLOCK_SIZE + 1]).unwrap();

    let out = TempDir::new().unwrap();
    let device = Arc::new(BlockFile::create(out.path().join("fs.img")).unwrap());
    let config = config()
        .with_max_file_size(2 * BLOCK_SIZE as u64)
        .without_seed();
    let mut fs = FlatFileSystem::format(device, config).unwrap();
    let free = fs.statfs().free_slots;

    let res = pack(&mut fs, source.path());
    assert!(matches!(res, Err(HostError::Fs(FsError::TooLarge { .. }))));
    assert_eq!(fs.readdir("/").unwrap(), [".", ".."]);
    assert_eq!(fs.statfs().free_slots, free);

    // too few slots for the content is refused up front as well
    let device = Arc::new(BlockFile::create(out.path().join("small.img")).unwrap());
    let mut fs = FlatFileSystem::format(device, FsConfig::default().with_slots(3).without_seed())
        .unwrap();
    let res = pack(&mut fs, source.path());
    assert!(matches!(res, Err(HostError::Fs(FsError::NoSpace))));
    assert_eq!(fs.readdir("/").unwrap(), [".", ".."]);
    assert_eq!(fs.statfs().free_slots, 2);
}
