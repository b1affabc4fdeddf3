// src/logging.rs
// Tracing subscriber setup for the CLI. Logs go to stderr so stdout can carry --json output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `verbosity` counts `-v` flags: 0 honours `RUST_LOG` (default `warn`), 1 is `info`, 2+ is `debug`.
pub fn init(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };

    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    // A second init (e.g. in tests) is not an error worth reporting.
    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}
