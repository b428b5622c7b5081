//! Subscriber setup for the demo binary.

use tracing_subscriber::EnvFilter;

use crate::error::{DemoError, Result};

/// Default directives when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "brew=info";

/// Install a global `fmt` subscriber filtered by `RUST_LOG`.
pub fn init(json: bool, verbose: bool) -> Result<()> {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if verbose {
        if let Ok(directive) = "brew=debug".parse() {
            filter = filter.add_directive(directive);
        }
    }
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| DemoError::Logging {
        message: e.to_string(),
    })
}
