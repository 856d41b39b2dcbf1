pub use clap::Parser;

use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "cairn")]
#[command(about = "Encrypted documents, signed mutable names and topic notifications")]
pub struct Args {
    /// Naming server to talk to (defaults to naming_url from config.toml)
    #[arg(long, global = true)]
    pub remote: Option<Url>,

    /// Path to the cairn config directory (defaults to ~/.cairn)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
