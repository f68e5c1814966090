//! CLI entry point. All of the actual work lives in `seiscoal::cli`; this
//! binary only turns a top-level `SeisError` into a process exit code.

fn main() {
    if let Err(e) = seiscoal::cli::run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}
