//! # manrender
//!
//! Incrementally renders a tree of gzip-compressed manpages into
//! gzip-compressed HTML pages, per-package index pages, per-suite contents
//! pages and sitemaps.
//!
//! ## Overview
//!
//! The serving directory is laid out as `<root>/<suite>/<package>/<file>`.
//! Every `bash.1.gz` gets a `bash.1.html.gz` next to it. A run only renders
//! what is stale: a page that is missing, older than its source, or
//! explicitly forced. When a manpage changes, every other variant of it
//! (other suites, other languages) is rendered again too, because all
//! variants link to each other.
//!
//! ## Key Features
//!
//! - **Incremental**: staleness is decided from modification times alone, so
//!   a run that finds nothing to do touches nothing
//! - **Resumable**: an interrupted run leaves only complete files behind and
//!   the next run picks up where it stopped
//! - **Bounded**: directory traversal and conversion are two separately
//!   bounded pools joined by a rendezvous queue
//! - **Converter reuse**: each render worker keeps one long-lived converter
//!   process for its whole lifetime
//!
//! ## Architecture
//!
//! - [`cli`]: Command-line interface definitions using clap
//! - [`commands`]: The run behind the command line
//! - [`config`]: Validated run configuration
//! - [`error`]: Error types and handling with thiserror + miette
//! - [`pipeline`]: Traversal and render workers wired together
//! - [`walker`], [`cascade`], [`suite`]: staleness detection, version cascade
//!   and suite traversal
//! - [`render`], [`convert`], [`templates`]: turning a job into a page
//! - [`atomic`], [`sitemap`]: output writing
//!
//! ## Library Usage
//!
//! ```no_run
//! use manrender::config::RenderConfig;
//! use manrender::context::RunContext;
//! use manrender::convert::ProcessConverter;
//! use manrender::pipeline::render_all;
//!
//! let config = RenderConfig::builder()
//!     .serving_dir("/srv/manpages/www")
//!     .suite("bookworm")
//!     .build()?;
//! let ctx = RunContext::prepare(config)?;
//! let command = ctx.config().converter().clone();
//! let stats = render_all(&ctx, || ProcessConverter::spawn(&command))?;
//! println!("{stats}");
//! # Ok::<(), manrender::error::RenderError>(())
//! ```
//!
//! ## Error Handling
//!
//! Fatal errors are [`error::RenderError`]s with miette diagnostics. Problems
//! confined to a single file (an unparsable name, a vanished sibling, an
//! empty package directory, a document the converter rejects) are logged
//! with `tracing` and the run continues.

pub mod atomic;
pub mod cascade;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod convert;
pub mod document;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod registry;
pub mod render;
pub mod sitemap;
pub mod suite;
pub mod templates;
pub mod walker;

#[cfg(test)]
mod test_helpers;
