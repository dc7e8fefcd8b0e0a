//! Logging setup.
//!
//! Output goes to stderr so stdout stays reserved for command results.

use tracing_subscriber::EnvFilter;

use super::{Composition, Module, ModuleError};

/// Filter used when `RUST_LOG` is unset or invalid.
const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber.  Returns the filter directive in effect.
pub fn init_tracing() -> String {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let directive = filter.to_string();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr) // never pollute stdout
        .init();
    directive
}

#[derive(Debug, Clone, Copy)]
pub struct LogModule;

impl Module for LogModule {
    fn name(&self) -> &'static str {
        "log"
    }

    fn compose(&self, ctx: &mut Composition<'_>) -> Result<String, ModuleError> {
        Ok(format!("filter `{}`", ctx.runtime.log_filter))
    }
}
