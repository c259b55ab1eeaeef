//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, ValueHint};

use crate::application::services::DEFAULT_SOURCE;

/// Inspect how many bytes vector tiles spend, and where
#[derive(Parser, Debug)]
#[command(name = "scoville")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output: -d info, -dd debug, -ddd trace
    #[arg(short = 'd', long = "debug", action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Break down the size of a single tile by layer
    Info {
        /// MVT file or URL
        #[arg(value_hint = ValueHint::AnyPath)]
        source: String,

        /// Property used to group features, e.g. "kind"
        #[arg(short, long)]
        kind: Option<String>,

        /// Print a treemap JSON document instead of flat sizes
        #[arg(long, conflicts_with = "tree")]
        d3_json: bool,

        /// Print the breakdown as a tree
        #[arg(long)]
        tree: bool,
    },

    /// Render a treemap JSON document to SVG
    Treemap {
        /// JSON file or URL
        #[arg(default_value = DEFAULT_SOURCE, value_hint = ValueHint::AnyPath)]
        source: String,

        /// Output file (default: stdout)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,

        #[arg(long, default_value_t = 960.0)]
        width: f64,

        #[arg(long, default_value_t = 500.0)]
        height: f64,

        /// Space between nested cells
        #[arg(long, default_value_t = 4.0)]
        padding: f64,
    },

    /// Print the Leaflet script of the map page
    Map {
        /// Port of the local tile proxy
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Serve treemap tiles of an upstream tile source
    Proxy {
        /// Upstream URL pattern with {z}, {x} and {y}
        url: String,

        #[arg(short, long)]
        port: Option<u16>,

        /// Cache upstream tiles on disk
        #[arg(long)]
        cache: bool,
    },

    /// Serve heatmap tiles of an upstream tile source
    Heatmap {
        /// Upstream URL pattern with {z}, {x} and {y}
        url: String,

        #[arg(short, long)]
        port: Option<u16>,

        /// Cache upstream tiles on disk
        #[arg(long)]
        cache: bool,

        /// Zoom levels below each tile to sample
        #[arg(long)]
        sub_zooms: Option<u8>,

        /// Never sample deeper than this zoom
        #[arg(long)]
        max_zoom: Option<u8>,
    },

    /// Percentiles of tile and layer sizes
    Percentiles {
        /// File with one "z/x/y" per line
        #[arg(value_hint = ValueHint::FilePath)]
        tiles_file: PathBuf,

        /// URL pattern with {z}, {x} and {y}
        url: String,

        /// Percentile to report, repeatable
        #[arg(short = 'p', long = "percentile")]
        percentiles: Vec<f64>,

        /// Cache tiles on disk
        #[arg(long)]
        cache: bool,

        /// Number of worker threads
        #[arg(short, long)]
        jobs: Option<usize>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Largest tiles per layer
    Outliers {
        /// File with one "z/x/y" per line
        #[arg(value_hint = ValueHint::FilePath)]
        tiles_file: PathBuf,

        /// URL pattern with {z}, {x} and {y}
        url: String,

        /// Cache tiles on disk
        #[arg(long)]
        cache: bool,

        /// Number of worker threads
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Outliers per layer
        #[arg(short = 'n', long)]
        num: Option<usize>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create config template
    Init {
        /// Create global config
        #[arg(short, long)]
        global: bool,
    },

    /// Show config paths
    Path,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Csv,
}
