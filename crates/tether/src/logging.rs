//! Log output for binaries and demos.
//!
//! The library crates only emit `tracing` events; nothing is printed until
//! the host installs a subscriber. These helpers install a `fmt`
//! subscriber filtered by `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Installs the default subscriber. `RUST_LOG` wins; otherwise `info`.
pub fn init() {
    init_with_filter("info");
}

/// Installs the default subscriber with `default_filter` used when
/// `RUST_LOG` is unset or unparsable.
///
/// Only the first call in a process installs anything.
pub fn init_with_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!("log subscriber installed");
    }
}
