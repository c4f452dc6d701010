//! Tracing subscriber setup for mesh nodes and the simulator.
//!
//! Level conventions:
//! - ERROR: unrecoverable failures
//! - WARN: recovered per-packet failures (auth failure, radio send failure, handshake timeout)
//! - INFO: protocol events (session established, chat delivered, ACK received, start/stop)
//! - DEBUG: forwarding, drops, handshake bookkeeping
//! - TRACE: duplicates and raw frames

use tracing_subscriber::EnvFilter;

/// Environment variable selecting the output format; `json` enables JSON lines.
pub const LOG_FORMAT_ENV: &str = "LORAMESH_LOG_FORMAT";

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize with a configured default level, picking the format from
/// [`LOG_FORMAT_ENV`]. `RUST_LOG` still overrides `level`.
pub fn init_with_level(level: &str) {
    let filter = filter(level);
    if json_requested() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Subscriber for tests; safe to call more than once.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("debug"))
        .with_test_writer()
        .try_init();
}

fn json_requested() -> bool {
    std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"))
}
