//! Error types for manrender.
//!
//! Every failure that aborts a run is a [`RenderError`]. Conditions the
//! renderer recovers from locally (an unparsable file name inside the tree, a
//! sibling whose source disappeared, an empty package directory) are logged
//! and never show up here.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use manrender::error::{RenderError, Result};
//!
//! fn check_root(root: &Path) -> Result<()> {
//!     std::fs::metadata(root).map_err(|source| RenderError::IoError {
//!         path: root.to_path_buf(),
//!         source,
//!     })?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::convert::ConvertError;

/// Error types that can occur while rendering the manpage tree
#[derive(Error, Debug, Diagnostic)]
pub enum RenderError {
    /// File system I/O error.
    ///
    /// Reading a source, listing a suite, writing an output or renaming a
    /// temporary file into place failed. These are treated as environment
    /// problems (disk full, permissions) and abort the whole run.
    #[error("I/O error accessing '{path}'")]
    #[diagnostic(
        code(manrender::io_error),
        help("Check permissions and free disk space; re-running resumes where this run stopped.")
    )]
    IoError {
        /// The path that caused the I/O error
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A render worker could not start its converter process.
    #[error("Failed to start the converter")]
    #[diagnostic(
        code(manrender::convert::start_error),
        help("Check the --converter program and its arguments.")
    )]
    ConverterStart(#[source] ConvertError),

    /// The converter failed while processing a document.
    ///
    /// Documents the converter merely rejects are rendered as error pages;
    /// this variant means the converter process itself is unusable.
    #[error("Converter failed on '{path}'")]
    #[diagnostic(code(manrender::convert::error))]
    ConvertError {
        /// The source document being converted
        path: PathBuf,
        /// The underlying converter error
        #[source]
        source: ConvertError,
    },

    /// The run was cancelled because another task failed first.
    #[error("Run cancelled")]
    #[diagnostic(code(manrender::cancelled))]
    Cancelled,

    /// A render worker thread panicked.
    #[error("A render worker panicked")]
    #[diagnostic(code(manrender::worker_panic))]
    WorkerPanicked,

    /// The directory traversal thread pool could not be created.
    #[error("Failed to build the directory traversal thread pool")]
    #[diagnostic(
        code(manrender::walk::thread_pool),
        help("Lower --concurrency-manwalk or raise the process/thread limits.")
    )]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(manrender::config::error),
        help("Check the command-line flags and MANRENDER_* environment variables.")
    )]
    ConfigError(
        /// Description of the configuration error
        String,
    ),

    /// A path does not follow the `<suite>/<package>/<name>.<section>[.<lang>].gz`
    /// layout.
    #[error("Invalid serving path '{path}': {reason}")]
    #[diagnostic(code(manrender::path::invalid))]
    InvalidServingPath {
        /// The offending path
        path: PathBuf,
        /// Why it could not be parsed
        reason: String,
    },
}

impl RenderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RenderError::IoError {
            path: path.into(),
            source,
        }
    }
}

/// Type alias for Results in this crate
pub type Result<T> = std::result::Result<T, RenderError>;
