mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::Cli;
use flat_fs::{FlatFileSystem, FsConfig};
use flat_fs_fuse::{BlockFile, HostError};

fn main() -> Result<(), HostError> {
    env_logger::init();
    let cli = Cli::parse();
    println!("source={:?}\nout={:?}", cli.source, cli.out);

    let block_file = Arc::new(BlockFile::create(&cli.out).map_err(|source| HostError::Io {
        path: cli.out.clone(),
        source,
    })?);

    let config = FsConfig::default().with_slots(cli.slots).without_seed();
    let mut fs = FlatFileSystem::format(block_file, config).map_err(|source| HostError::Image {
        path: cli.out.clone(),
        source,
    })?;

    let stats = flat_fs_fuse::pack(&mut fs, &cli.source)?;
    let free = fs.statfs().free_slots;
    fs.close()?;

    println!(
        "packed {} file(s), {} dir(s), {} bytes; {} of {} slots free",
        stats.files, stats.dirs, stats.bytes, free, cli.slots
    );
    Ok(())
}
