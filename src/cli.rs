use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "ki", version, about = "Bidirectional sync between an Anki collection and a git repository of markdown notes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Materialize a collection into a new working directory.
    Clone {
        /// Path to the collection.anki2 file, or an Anki profile name when
        /// `--profile` is given.
        collection: String,
        /// Target directory (defaults to the collection's file stem).
        directory: Option<PathBuf>,
        /// Resolve `collection` as a profile name under the platform's Anki
        /// data directory rather than a literal file path.
        #[arg(long)]
        profile: Option<String>,
    },
    /// Merge the collection's current state into the working tree.
    Pull {
        /// Working tree root (defaults to the current directory).
        #[arg(long)]
        directory: Option<PathBuf>,
    },
    /// Apply the working tree's changes back into the collection.
    Push {
        /// Working tree root (defaults to the current directory).
        #[arg(long)]
        directory: Option<PathBuf>,
    },
}
