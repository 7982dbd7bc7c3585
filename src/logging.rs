use std::env;

use tracing_subscriber::EnvFilter;

/// Maps the `-v`/`-q` flags onto a tracing filter.
#[derive(Clone, Copy, Debug)]
pub struct Logger {
    verbose: u8,
    quiet: bool,
}

impl Logger {
    pub fn new(verbose: u8, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    /// Filter directive used when `RUST_LOG` is not set.
    pub fn directive(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn,manrender=info",
            1 => "warn,manrender=debug",
            _ => "warn,manrender=trace",
        }
    }

    /// Install the global subscriber, writing to stderr.
    pub fn init(&self) {
        let filter = if env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(self.directive())
        };
        // Fails only if a subscriber is already installed.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
