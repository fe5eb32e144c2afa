//! CLI argument definitions using clap
//!
//! Commands:
//! - flatapi serve --config <path>
//! - flatapi validate --kind request|response   (envelope on stdin)
//! - flatapi meta --code <code> [--message ..] [--page .. --page-size .. --total ..]
//! - flatapi routes

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// flatapi - flat JSON envelopes routed by version, resource and operation
#[derive(Parser, Debug)]
#[command(name = "flatapi")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Which envelope shape to validate
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Request,
    Response,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve envelope operations over HTTP
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./flatapi.json")]
        config: PathBuf,
    },

    /// Validate an envelope read from stdin
    Validate {
        #[arg(long, value_enum, default_value = "request")]
        kind: EnvelopeKind,

        /// Skip decoding binary64/binary64gz payloads
        #[arg(long)]
        lazy_binary: bool,
    },

    /// Print a response envelope for the given meta code
    Meta {
        #[arg(long)]
        code: u16,

        #[arg(long)]
        message: Option<String>,

        #[arg(long, requires = "page_size")]
        page: Option<u64>,

        #[arg(long, requires = "page")]
        page_size: Option<u64>,

        #[arg(long, requires = "page")]
        total: Option<u64>,
    },

    /// List the built-in routes
    Routes,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
