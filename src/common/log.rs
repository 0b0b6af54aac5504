//! Logging helpers
//!
//! The relay logs through the `log` facade; this module wires up `env_logger`
//! as the backend.

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over `level` when it is set.
///
/// # Parameters
///
/// * `level` - Log level or filter directive (e.g. `info`, `retry_relay=debug`)
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", level);

    // A second initialisation (e.g. from tests) is not an error worth reporting
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_twice() {
        // The global logger can only be installed once per process
        init_logger("debug");
        init_logger("info");
    }
}
