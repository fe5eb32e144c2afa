//! CLI module for flatapi
//!
//! Provides command-line interface for:
//! - serve: Run the HTTP server
//! - validate: Check an envelope from stdin
//! - meta: Print a response envelope for a code
//! - routes: List built-in routes

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, EnvelopeKind};
pub use commands::{build_dispatcher, builtin_router, meta, routes, run_command, serve, validate};
pub use errors::{CliError, CliErrorCode, CliResult};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}
