//! Tracing subscriber setup for embedders and tests

use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor an explicit default is set
pub const DEFAULT_FILTER: &str = "webrtc_provider_core=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to `default`
///
/// Returns `false` if a global subscriber was already installed, in which
/// case nothing changes.
pub fn init_tracing(default: Option<&str>) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default.unwrap_or(DEFAULT_FILTER)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        init_tracing(Some("debug"));
        assert!(!init_tracing(None));
    }
}
