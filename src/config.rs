//! Validated run configuration.
//!
//! # Example
//!
//! ```
//! use manrender::config::RenderConfig;
//!
//! let config = RenderConfig::builder()
//!     .serving_dir("/srv/man")
//!     .render_concurrency(2)
//!     .gzip_level(1)
//!     .force_rerender(true)
//!     .build()?;
//!
//! assert_eq!(config.render_concurrency(), 2);
//! # Ok::<(), manrender::error::RenderError>(())
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use flate2::Compression;

use crate::error::{RenderError, Result};

pub const DEFAULT_SERVING_DIR: &str = "/srv/manpages.debian.org/www";
pub const DEFAULT_BASE_URL: &str = "https://manpages.debian.org";
/// Below the common default of 1024 open file descriptors.
pub const DEFAULT_WALK_CONCURRENCY: usize = 1000;
pub const DEFAULT_RENDER_CONCURRENCY: usize = 5;
/// Decompression cost does not depend on the level, so pay for the smallest
/// output once.
pub const DEFAULT_GZIP_LEVEL: u32 = 9;
pub const DEFAULT_CONVERTER: &str = "mandocd";

/// Program and arguments of the long-lived converter process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Default for ConverterCommand {
    fn default() -> Self {
        ConverterCommand {
            program: PathBuf::from(DEFAULT_CONVERTER),
            args: Vec::new(),
        }
    }
}

/// Immutable configuration of one rendering run.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    serving_dir: PathBuf,
    suites: Vec<String>,
    walk_concurrency: usize,
    render_concurrency: usize,
    gzip_level: u32,
    base_url: String,
    force_rerender: bool,
    only_render: Option<BTreeSet<String>>,
    converter: ConverterCommand,
}

impl RenderConfig {
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder::default()
    }

    pub fn serving_dir(&self) -> &Path {
        &self.serving_dir
    }

    /// Suites requested on the command line; empty means every suite found.
    pub fn suites(&self) -> &[String] {
        &self.suites
    }

    pub fn walk_concurrency(&self) -> usize {
        self.walk_concurrency
    }

    pub fn render_concurrency(&self) -> usize {
        self.render_concurrency
    }

    pub fn gzip_level(&self) -> u32 {
        self.gzip_level
    }

    pub fn compression(&self) -> Compression {
        Compression::new(self.gzip_level)
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn force_rerender(&self) -> bool {
        self.force_rerender
    }

    /// Package directory whitelist, if rendering is restricted.
    pub fn only_render(&self) -> Option<&BTreeSet<String>> {
        self.only_render.as_ref()
    }

    pub fn converter(&self) -> &ConverterCommand {
        &self.converter
    }
}

/// Builder for [`RenderConfig`]
#[derive(Debug)]
pub struct RenderConfigBuilder {
    serving_dir: PathBuf,
    suites: Vec<String>,
    walk_concurrency: usize,
    render_concurrency: usize,
    gzip_level: u32,
    base_url: String,
    force_rerender: bool,
    only_render: Option<BTreeSet<String>>,
    converter: ConverterCommand,
}

impl Default for RenderConfigBuilder {
    fn default() -> Self {
        RenderConfigBuilder {
            serving_dir: PathBuf::from(DEFAULT_SERVING_DIR),
            suites: Vec::new(),
            walk_concurrency: DEFAULT_WALK_CONCURRENCY,
            render_concurrency: DEFAULT_RENDER_CONCURRENCY,
            gzip_level: DEFAULT_GZIP_LEVEL,
            base_url: DEFAULT_BASE_URL.to_string(),
            force_rerender: false,
            only_render: None,
            converter: ConverterCommand::default(),
        }
    }
}

impl RenderConfigBuilder {
    pub fn serving_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.serving_dir = dir.into();
        self
    }

    pub fn suite(mut self, suite: impl Into<String>) -> Self {
        self.suites.push(suite.into());
        self
    }

    pub fn suites<I, S>(mut self, suites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suites.extend(suites.into_iter().map(Into::into));
        self
    }

    pub fn walk_concurrency(mut self, concurrency: usize) -> Self {
        self.walk_concurrency = concurrency;
        self
    }

    pub fn render_concurrency(mut self, concurrency: usize) -> Self {
        self.render_concurrency = concurrency;
        self
    }

    pub fn gzip_level(mut self, level: u32) -> Self {
        self.gzip_level = level;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn force_rerender(mut self, force: bool) -> Self {
        self.force_rerender = force;
        self
    }

    /// Restrict rendering to the named package directories.
    pub fn only_render<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = packages
            .into_iter()
            .map(Into::into)
            .map(|p: String| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        self.only_render = (!set.is_empty()).then_some(set);
        self
    }

    pub fn converter(mut self, program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        self.converter = ConverterCommand {
            program: program.into(),
            args,
        };
        self
    }

    pub fn build(self) -> Result<RenderConfig> {
        if self.walk_concurrency == 0 {
            return Err(RenderError::ConfigError(
                "--concurrency-manwalk must be at least 1".to_string(),
            ));
        }
        if self.render_concurrency == 0 {
            return Err(RenderError::ConfigError(
                "--concurrency-render must be at least 1".to_string(),
            ));
        }
        if self.gzip_level > 9 {
            return Err(RenderError::ConfigError(format!(
                "gzip level {} is out of range 0-9",
                self.gzip_level
            )));
        }

        let mut suites = self.suites;
        suites.retain(|s| !s.trim().is_empty());

        Ok(RenderConfig {
            serving_dir: self.serving_dir,
            suites,
            walk_concurrency: self.walk_concurrency,
            render_concurrency: self.render_concurrency,
            gzip_level: self.gzip_level,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            force_rerender: self.force_rerender,
            only_render: self.only_render,
            converter: self.converter,
        })
    }
}
