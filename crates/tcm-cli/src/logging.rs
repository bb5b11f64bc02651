//! Tracing setup for the binary.

use tracing_subscriber::EnvFilter;

/// Filter for a `-v` count. `RUST_LOG`, when set, wins.
pub fn filter_for(verbose: u8) -> EnvFilter {
    if std::env::var_os("RUST_LOG").is_some() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    })
}

/// Install the global subscriber, writing to stderr so stdout stays
/// machine-readable.
pub fn init(verbose: u8, json: bool) {
    let filter = filter_for(verbose);
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}
