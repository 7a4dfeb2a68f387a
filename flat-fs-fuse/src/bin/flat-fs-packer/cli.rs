use clap::Parser;
use flat_fs::DEFAULT_SLOTS;
use std::path::PathBuf;

/// Build a flat-fs image from a host directory tree.
#[derive(Parser)]
pub struct Cli {
    /// Directory whose contents become the image's root directory
    #[arg(long, short)]
    pub source: PathBuf,

    /// Image file to write, replacing any existing one
    #[arg(long, short = 'O')]
    pub out: PathBuf,

    /// Number of slots in the image
    #[arg(long, default_value_t = DEFAULT_SLOTS)]
    pub slots: u32,
}
