//! # manrender CLI
//!
//! Renders the manpages below `--serving-dir` that changed since the last
//! run.
//!
//! ```bash
//! manrender --serving-dir /srv/manpages/www --suites bookworm,trixie \
//!     --converter /usr/libexec/mandocd --concurrency-render 8
//! ```
//!
//! ## Environment Variables
//!
//! - `MANRENDER_SERVING_DIR`: Root of the serving tree
//! - `MANRENDER_SUITES`: Comma-separated suites to render
//! - `MANRENDER_CONVERTER`: Converter program
//! - `MANRENDER_VERBOSE` / `MANRENDER_QUIET`: Output verbosity
//! - `RUST_LOG`: Overrides the log filter derived from `-v`/`-q`
//!
//! See `manrender --help` for every flag.

use std::io::IsTerminal;

use manrender::cli::Cli;
use manrender::logging::Logger;

fn main() -> miette::Result<()> {
    miette::set_panic_hook();

    if std::io::stderr().is_terminal() {
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::unicode_nocolor())
                    .with_context_lines(3),
            )
        }))?;
    } else {
        // Plain output for logs and cron mails
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::none())
                    .with_context_lines(0),
            )
        }))?;
    }

    let cli = Cli::parse_args();
    Logger::new(cli.verbose(), cli.quiet()).init();

    manrender::commands::execute(&cli).map_err(Into::into)
}
