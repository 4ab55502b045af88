// CLI module
// Command-line interface, argument parsing and command execution

mod args;
mod commands;

pub use args::{
    CardsCommand, CliArgs, Command, Confirm, LoadsCommand, OpsCommand, Owner, UsersCommand,
};
pub use commands::run;

use clap::Parser;

/// Parse command-line arguments using clap
///
/// On invalid arguments or `--help`, clap prints the message and exits the
/// process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
