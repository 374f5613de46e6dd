use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter directive for a `-v` count: 0 → info, 1 → debug, 2+ → trace.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Initialize tracing with an env-based filter and bridge `log` records.
///
/// - `RUST_LOG` wins when set (e.g., "info", "debug,kbalance=trace").
/// - Otherwise the level follows the `-v` count, see [`default_directive`].
/// - Forwards `log` crate records to `tracing` via `LogTracer`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init(verbosity: u8) {
    let _ = LogTracer::init();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let fmt_layer = fmt::layer().with_target(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
