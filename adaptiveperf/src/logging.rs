//! Log output setup for binaries and tests.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the host.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Filter used by `init(true)`.
pub const VERBOSE_FILTER: &str = "adaptiveperf=debug,info";

/// Installs a formatting subscriber filtered by `RUST_LOG`.
///
/// Falls back to [`DEFAULT_FILTER`] (or [`VERBOSE_FILTER`] when `verbose`)
/// if `RUST_LOG` is not set. Returns `false` if a global subscriber was
/// already installed.
pub fn init(verbose: bool) -> bool {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
