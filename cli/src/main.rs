//! The main entrypoint for devsetup, a thin wrapper around the lib crate
//! which does most of the work.

use anyhow::Result;

fn run() -> Result<()> {
    devsetup_utils::initialize_tracing();
    tracing::trace!("starting");
    devsetup_lib::cli::run_from_iter(std::env::args())
}

fn main() {
    if let Err(e) = run() {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}
