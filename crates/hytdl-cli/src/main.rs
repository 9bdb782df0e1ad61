use hytdl_core::logging;

mod cli;
mod progress;

fn main() {
    // Initialize logging as early as possible.
    logging::init();

    // Parse CLI and dispatch.
    if let Err(err) = cli::run_from_args() {
        eprintln!("hytdl error: {:#}", err);
        std::process::exit(1);
    }
}
