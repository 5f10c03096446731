//! Command-line definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "stickynote")]
#[command(about = "Sticky-note board synced with a document store", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Directory for rolling log files (default: <data dir>/logs)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a note
    Add {
        /// Note text
        text: String,

        /// Initial horizontal position
        #[arg(long, requires = "y", allow_negative_numbers = true)]
        x: Option<f64>,

        /// Initial vertical position
        #[arg(long, requires = "x", allow_negative_numbers = true)]
        y: Option<f64>,
    },

    /// Print every note once
    List,

    /// Drag a note by a displacement
    #[command(name = "move")]
    Move {
        /// Note id as shown by `list`
        id: String,

        #[arg(allow_negative_numbers = true)]
        dx: f64,

        #[arg(allow_negative_numbers = true)]
        dy: f64,
    },

    /// Delete a note
    Delete {
        /// Note id as shown by `list`
        id: String,
    },

    /// Re-render the board on every remote change until Ctrl-C
    Watch,
}
