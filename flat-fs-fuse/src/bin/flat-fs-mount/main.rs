mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::Cli;
use flat_fs::{BlockDevice, FlatFileSystem, BLOCK_SIZE};
use flat_fs_fuse::{BlockFile, HostError};

fn main() -> Result<(), HostError> {
    env_logger::init();
    let cli = Cli::parse();
    let config = cli.config();

    let block_file: Arc<dyn BlockDevice> =
        Arc::new(BlockFile::open(&cli.image).map_err(|source| HostError::Io {
            path: cli.image.clone(),
            source,
        })?);
    let image_err = |source| HostError::Image {
        path: cli.image.clone(),
        source,
    };
    let mut fs = if cli.format {
        FlatFileSystem::format(block_file, config)
    } else {
        FlatFileSystem::open(block_file, config)
    }
    .map_err(image_err)?;

    if cli.reclaim {
        let freed = fs.reclaim_orphans().map_err(image_err)?;
        log::info!("reclaim: {freed} slot(s) freed");
    }

    let geometry = fs.geometry();
    let stats = fs.statfs();
    println!("flat-fs");
    println!("  image      {}", cli.image.display());
    println!(
        "  slots      {} ({} free), {} byte blocks",
        geometry.slots(),
        stats.free_slots,
        BLOCK_SIZE
    );
    println!("  table      {} block(s)", geometry.table_blocks());
    println!("  max file   {} bytes", fs.config().max_file_size);
    println!("  mountpoint {}", cli.mountpoint.display());

    let fs = fs.into_shared();
    flat_fs_fuse::mount(fs.clone(), &cli.mountpoint)?;

    log::info!("unmounted, saving {}", cli.image.display());
    fs.lock().save().map_err(image_err)?;
    Ok(())
}
