//! CLI surface for Siren

use clap::Parser;

/// Siren voice assistant
#[derive(Parser, Debug)]
#[command(name = "siren")]
#[command(about = "Fully local, always-listening voice assistant")]
#[command(version)]
pub struct Cli {
    /// Build the local document index and exit (no microphone, no
    /// workers).
    #[arg(long)]
    pub index: bool,
}
