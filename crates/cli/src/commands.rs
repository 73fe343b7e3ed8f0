//! Clap command definition for `kvtree-print`.

use clap::{Arg, Command};

/// Usage line printed on any argument error.
pub const USAGE: &str = "Usage: kvtree-print <file>";

/// Build the command line parser.
///
/// The only argument is the file to print. There are no flags, so
/// something like `--help` is taken as a file name.
pub fn build_cli() -> Command {
    Command::new("kvtree-print")
        .about("Print a persisted kvtree file")
        .override_usage("kvtree-print <file>")
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new("file")
                .help("Path of the tree file to print")
                .required(true)
                .num_args(1)
                .allow_hyphen_values(true),
        )
}
