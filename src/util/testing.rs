//! Shared setup for unit and integration tests.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Install a tracing subscriber for tests, once per process.
///
/// `RUST_LOG` wins over the default `treestore=trace`. Output goes through the
/// test writer so it is captured unless `--nocapture` is given.
pub fn init_test_setup() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("treestore=trace"));
        let installed = tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer().with_filter(filter))
            .try_init();
        if let Err(e) = installed {
            eprintln!("test logging not installed: {e}");
        }
        tracing::debug!("test setup complete");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_repeated_calls_when_initialising_then_runs_once() {
        init_test_setup();
        init_test_setup();
        assert!(INIT.is_completed());
    }
}
