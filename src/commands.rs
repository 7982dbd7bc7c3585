//! Implementation of the manrender run.
//!
//! The main entry point is [`execute`], which validates the command line,
//! scans the serving directory and renders everything that is stale using
//! one [`ProcessConverter`] per render worker.
//!
//! # Example
//!
//! ```no_run
//! use manrender::cli::Cli;
//! use manrender::commands;
//!
//! let cli = Cli::parse_args();
//! if let Err(e) = commands::execute(&cli) {
//!     eprintln!("Error: {e:?}");
//! }
//! ```

use std::time::Instant;

use tracing::info;

use crate::cli::Cli;
use crate::context::{RunContext, StatsSnapshot};
use crate::convert::ProcessConverter;
use crate::error::Result;
use crate::pipeline::render_all;

/// Run one incremental render as configured by `cli`.
pub fn execute(cli: &Cli) -> Result<()> {
    execute_with_stats(cli).map(|_| ())
}

/// Like [`execute`], returning the run's counters.
pub fn execute_with_stats(cli: &Cli) -> Result<StatsSnapshot> {
    let config = cli.to_config()?;
    let started = Instant::now();
    let ctx = RunContext::prepare(config)?;

    if let Some(only) = ctx.config().only_render() {
        info!("Restricting rendering to the following binary packages:");
        for package in only {
            info!("  {package:?}");
        }
        info!("(total: {} whitelist entries)", only.len());
    }
    info!(
        "{} manpages in {} suites below {}",
        ctx.registry().len(),
        ctx.suites().len(),
        ctx.root().display()
    );

    let converter = ctx.config().converter();
    let stats = render_all(&ctx, || ProcessConverter::spawn(converter))?;
    info!("{stats} in {:.2?}", started.elapsed());
    Ok(stats)
}
