//! Tracing subscriber setup for binaries and demos embedding the crate.

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_directive` (for example
/// `"batchpool=info"`) is used. Returns an error if a global subscriber is
/// already installed.
pub fn init_tracing(
    default_directive: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_directive))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error() {
        // Only one global subscriber can ever be installed
        let _ = init_tracing("batchpool=debug");
        assert!(init_tracing("batchpool=debug").is_err());
    }

    #[test]
    fn test_invalid_directive_is_rejected() {
        if std::env::var("RUST_LOG").is_err() {
            assert!(init_tracing("batchpool=notalevel").is_err());
        }
    }
}
