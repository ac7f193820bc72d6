//! Logging setup
//!
//! The engine logs through the `log` facade; binaries install `env_logger`.

pub use log::{debug, error, info, trace, warn};

/// Initialize logging from `RUST_LOG`, defaulting to `info`
pub fn init() {
    init_with_filter("info");
}

/// Initialize logging with a default filter that `RUST_LOG` still overrides
pub fn init_with_filter(default_filter: &str) {
    let env = env_logger::Env::default().default_filter_or(default_filter);
    if env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init()
        .is_err()
    {
        log::debug!("Logger already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_keeps_first_logger() {
        init_with_filter("debug");
        init_with_filter("warn");
        init();
        if std::env::var_os("RUST_LOG").is_none() {
            assert_eq!(log::max_level(), log::LevelFilter::Debug);
        }
    }
}
