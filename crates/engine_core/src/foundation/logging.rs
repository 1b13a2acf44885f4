//! Logging utilities
//!
//! The crate logs through the `log` facade; applications choose the backend.
//! These helpers install `env_logger` for binaries and tests that want one.

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system from `RUST_LOG`
///
/// Calling this more than once is harmless.
pub fn init() {
    let _ = env_logger::try_init();
}

/// Initialize the logging system with a default filter such as `"info"` or
/// `"engine_core=debug"`; `RUST_LOG` still takes precedence when set.
pub fn init_with_level(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env).try_init();
}
