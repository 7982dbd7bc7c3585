//! Command-line interface definitions for manrender.
//!
//! Every flag can also be given through a `MANRENDER_*` environment variable.
//! The parsed [`Cli`] is turned into a validated [`RenderConfig`] with
//! [`Cli::to_config`].
//!
//! # Example
//!
//! ```no_run
//! use manrender::cli::Cli;
//!
//! let cli = Cli::parse_args();
//! let config = cli.to_config()?;
//! println!("rendering below {}", config.serving_dir().display());
//! # Ok::<(), manrender::error::RenderError>(())
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::config::{
    DEFAULT_BASE_URL, DEFAULT_CONVERTER, DEFAULT_GZIP_LEVEL, DEFAULT_RENDER_CONCURRENCY,
    DEFAULT_SERVING_DIR, DEFAULT_WALK_CONCURRENCY, RenderConfig,
};
use crate::error::Result;

/// Main command-line interface for manrender.
#[derive(Parser, Debug)]
#[command(
    name = "manrender",
    author,
    version,
    about = "Incrementally render a tree of compressed manpages into HTML",
    long_about = None
)]
pub struct Cli {
    #[command(flatten)]
    render_opts: RenderOpts,

    #[command(flatten)]
    output_opts: OutputOpts,
}

/// What to render and how.
#[derive(Parser, Debug)]
pub struct RenderOpts {
    /// Root of the serving tree: <serving-dir>/<suite>/<package>/<manpage>.gz
    #[arg(long, default_value = DEFAULT_SERVING_DIR, env = "MANRENDER_SERVING_DIR")]
    serving_dir: PathBuf,

    /// Suites to render (comma-separated, default: every suite directory)
    #[arg(long, value_delimiter = ',', env = "MANRENDER_SUITES")]
    suites: Vec<String>,

    /// Number of package directories walked concurrently
    #[arg(
        long = "concurrency-manwalk",
        default_value_t = DEFAULT_WALK_CONCURRENCY,
        env = "MANRENDER_CONCURRENCY_MANWALK"
    )]
    walk_concurrency: usize,

    /// Number of render workers, each with its own converter process
    #[arg(
        long = "concurrency-render",
        default_value_t = DEFAULT_RENDER_CONCURRENCY,
        env = "MANRENDER_CONCURRENCY_RENDER"
    )]
    render_concurrency: usize,

    /// gzip compression level of every written file (0-9)
    #[arg(
        long = "gzip",
        default_value_t = DEFAULT_GZIP_LEVEL,
        env = "MANRENDER_GZIP"
    )]
    gzip_level: u32,

    /// Base URL (without trailing slash) used where absolute URLs are required
    #[arg(long, default_value = DEFAULT_BASE_URL, env = "MANRENDER_BASE_URL")]
    base_url: String,

    /// Render every manpage, even if its page is up to date
    #[arg(long, env = "MANRENDER_FORCE_RERENDER")]
    force_rerender: bool,

    /// Only render these package directories (comma-separated)
    #[arg(long = "only-render-pkgs", value_delimiter = ',', env = "MANRENDER_ONLY_RENDER_PKGS")]
    only_render: Vec<String>,

    /// Long-lived converter program started once per render worker
    #[arg(long, default_value = DEFAULT_CONVERTER, env = "MANRENDER_CONVERTER")]
    converter: PathBuf,

    /// Argument passed to the converter (repeatable)
    #[arg(long = "converter-arg", allow_hyphen_values = true)]
    converter_args: Vec<String>,
}

/// Output verbosity.
#[derive(Parser, Debug)]
pub struct OutputOpts {
    /// Enable verbose output (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, env = "MANRENDER_VERBOSE")]
    verbose: u8,

    /// Silence all output except for errors
    #[arg(short, long, conflicts_with = "verbose", env = "MANRENDER_QUIET")]
    quiet: bool,
}

impl Cli {
    /// Parse the process arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a builder for programmatic construction
    pub fn builder() -> CliBuilder {
        CliBuilder::default()
    }

    /// Get the serving directory as given
    pub fn serving_dir(&self) -> &Path {
        &self.render_opts.serving_dir
    }

    /// Get the absolute serving directory path
    pub fn get_serving_dir(&self) -> PathBuf {
        normalize_path(self.serving_dir())
    }

    pub fn suites(&self) -> &[String] {
        &self.render_opts.suites
    }

    pub fn only_render(&self) -> &[String] {
        &self.render_opts.only_render
    }

    pub fn force_rerender(&self) -> bool {
        self.render_opts.force_rerender
    }

    /// Get the verbose level
    pub fn verbose(&self) -> u8 {
        self.output_opts.verbose
    }

    /// Check if quiet mode is enabled
    pub fn quiet(&self) -> bool {
        self.output_opts.quiet
    }

    /// Validate the options into a [`RenderConfig`].
    pub fn to_config(&self) -> Result<RenderConfig> {
        let opts = &self.render_opts;
        RenderConfig::builder()
            .serving_dir(self.get_serving_dir())
            .suites(opts.suites.iter().cloned())
            .walk_concurrency(opts.walk_concurrency)
            .render_concurrency(opts.render_concurrency)
            .gzip_level(opts.gzip_level)
            .base_url(opts.base_url.clone())
            .force_rerender(opts.force_rerender)
            .only_render(opts.only_render.iter().cloned())
            .converter(opts.converter.clone(), opts.converter_args.clone())
            .build()
    }
}

/// Builder for [`Cli`]
#[derive(Debug, Default)]
pub struct CliBuilder {
    serving_dir: Option<PathBuf>,
    suites: Vec<String>,
    walk_concurrency: Option<usize>,
    render_concurrency: Option<usize>,
    gzip_level: Option<u32>,
    base_url: Option<String>,
    force_rerender: bool,
    only_render: Vec<String>,
    converter: Option<(PathBuf, Vec<String>)>,
    verbose: u8,
    quiet: bool,
}

impl CliBuilder {
    /// Set the serving directory
    pub fn serving_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.serving_dir = Some(dir.into());
        self
    }

    /// Add a suite to render
    pub fn suite(mut self, suite: impl Into<String>) -> Self {
        self.suites.push(suite.into());
        self
    }

    pub fn walk_concurrency(mut self, concurrency: usize) -> Self {
        self.walk_concurrency = Some(concurrency);
        self
    }

    pub fn render_concurrency(mut self, concurrency: usize) -> Self {
        self.render_concurrency = Some(concurrency);
        self
    }

    pub fn gzip_level(mut self, level: u32) -> Self {
        self.gzip_level = Some(level);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn force_rerender(mut self, force: bool) -> Self {
        self.force_rerender = force;
        self
    }

    /// Add a package to the whitelist
    pub fn only_render(mut self, package: impl Into<String>) -> Self {
        self.only_render.push(package.into());
        self
    }

    /// Set the converter program and its arguments
    pub fn converter(mut self, program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        self.converter = Some((program.into(), args));
        self
    }

    /// Set the verbose level
    pub fn verbose(mut self, level: u8) -> Self {
        self.verbose = level;
        self
    }

    /// Enable quiet mode
    pub fn quiet(mut self, enabled: bool) -> Self {
        self.quiet = enabled;
        self
    }

    /// Build the Cli instance
    pub fn build(self) -> Cli {
        let (converter, converter_args) = self
            .converter
            .unwrap_or_else(|| (PathBuf::from(DEFAULT_CONVERTER), Vec::new()));
        Cli {
            render_opts: RenderOpts {
                serving_dir: self
                    .serving_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SERVING_DIR)),
                suites: self.suites,
                walk_concurrency: self.walk_concurrency.unwrap_or(DEFAULT_WALK_CONCURRENCY),
                render_concurrency: self
                    .render_concurrency
                    .unwrap_or(DEFAULT_RENDER_CONCURRENCY),
                gzip_level: self.gzip_level.unwrap_or(DEFAULT_GZIP_LEVEL),
                base_url: self
                    .base_url
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                force_rerender: self.force_rerender,
                only_render: self.only_render,
                converter,
                converter_args,
            },
            output_opts: OutputOpts {
                verbose: self.verbose,
                quiet: self.quiet,
            },
        }
    }
}

/// Normalize a path to be absolute and clean, without requiring it to exist.
///
/// Relative paths are resolved against the current directory and `.`/`..`
/// components are removed lexically. Symlinks are not resolved.
pub(crate) fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();

    let absolute = if path.is_relative() {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    } else {
        path.to_path_buf()
    };

    let mut components = Vec::new();
    for component in absolute.components() {
        use std::path::Component;
        match component {
            Component::ParentDir => {
                if let Some(last) = components.last()
                    && !matches!(last, Component::ParentDir | Component::RootDir)
                {
                    components.pop();
                    continue;
                }
                if !matches!(components.last(), Some(Component::RootDir)) {
                    components.push(component);
                }
            }
            Component::CurDir => continue,
            _ => components.push(component),
        }
    }

    components.into_iter().collect()
}
