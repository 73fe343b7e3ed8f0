//! `kvtree-print`: dump a persisted tree file to stdout.
//!
//! Takes exactly one argument, the file. Exits 0 after printing, 1 on a
//! usage error or when the file cannot be read. Diagnostics go to stderr
//! and are filtered by `RUST_LOG` (default `warn`).

mod commands;

use std::process;

use kvtree_core::Tree;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use commands::{build_cli, USAGE};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn usage() -> ! {
    eprintln!("{}", USAGE);
    process::exit(1);
}

fn main() {
    init_logging();

    let matches = match build_cli().try_get_matches() {
        Ok(m) => m,
        Err(e) => {
            debug!(target: "kvtree::cli", kind = ?e.kind(), "Rejected arguments");
            usage();
        }
    };
    let Some(file) = matches.get_one::<String>("file") else {
        usage();
    };

    let mut tree = Tree::new();
    if let Err(e) = kvtree_durability::read_file(file, &mut tree) {
        eprintln!("Failed to read {}: {}", file, e);
        process::exit(1);
    }
    tree.print(0);
}
