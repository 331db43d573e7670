//! Tracing subscriber setup for host binaries.

use tracing_subscriber::EnvFilter;

use crate::config::{defaults, json_logging};

/// Install the global subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise `hub=info` (or
/// `hub=debug` when `verbose`). `HUB_LOG_JSON=true` switches to JSON output.
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_logging(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives = if verbose { "hub=debug" } else { defaults::LOG_FILTER };
        EnvFilter::new(directives).add_directive(tracing::Level::WARN.into())
    });

    let result = if json_logging() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        init_logging(true);
        init_logging(false);
        tracing::info!("logging initialized");
    }
}
