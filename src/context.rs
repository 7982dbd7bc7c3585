//! Run-scoped state shared by every traversal and render task.
//!
//! A [`RunContext`] is created once per invocation. Apart from the
//! [`Stats`] counters and the [`CancelToken`] it is immutable, so tasks share
//! it by reference.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use tracing::warn;

use crate::config::RenderConfig;
use crate::error::{RenderError, Result};
use crate::registry::Registry;

/// Observational counters. Increments are independent; no consistency
/// between the three values is implied at any instant.
///
/// Pages of documents with more than one variant can be rewritten by the
/// version cascade before or after their own directory is walked. Their
/// counted size is tracked per path so each contributes once, with its
/// latest size.
#[derive(Debug, Default)]
pub struct Stats {
    source_bytes: AtomicU64,
    html_bytes: AtomicU64,
    rendered: AtomicU64,
    shared_pages: Mutex<HashMap<PathBuf, u64>>,
}

impl Stats {
    pub fn add_source_bytes(&self, n: u64) {
        self.source_bytes.fetch_add(n, Ordering::Relaxed);
    }

    /// Account an up-to-date page of `n` bytes found on disk. A shared page
    /// that was already counted is left alone.
    pub fn add_existing_page(&self, path: &Path, n: u64, shared: bool) {
        if !shared {
            self.html_bytes.fetch_add(n, Ordering::Relaxed);
            return;
        }
        let mut pages = self.shared_pages();
        if let Entry::Vacant(entry) = pages.entry(path.to_path_buf()) {
            entry.insert(n);
            self.html_bytes.fetch_add(n, Ordering::Relaxed);
        }
    }

    /// Account one rendered page of `n` compressed bytes. A shared page
    /// replaces whatever size was counted for it before.
    pub fn record_render(&self, path: &Path, n: u64, shared: bool) {
        self.rendered.fetch_add(1, Ordering::Relaxed);
        if !shared {
            self.html_bytes.fetch_add(n, Ordering::Relaxed);
            return;
        }
        let mut pages = self.shared_pages();
        let previous = pages.insert(path.to_path_buf(), n).unwrap_or(0);
        self.html_bytes.fetch_add(n, Ordering::Relaxed);
        self.html_bytes.fetch_sub(previous, Ordering::Relaxed);
    }

    fn shared_pages(&self) -> MutexGuard<'_, HashMap<PathBuf, u64>> {
        self.shared_pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            source_bytes: self.source_bytes.load(Ordering::Relaxed),
            html_bytes: self.html_bytes.load(Ordering::Relaxed),
            rendered: self.rendered.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`Stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub source_bytes: u64,
    pub html_bytes: u64,
    pub rendered: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} manpages rendered, {} of manpages, {} of HTML",
            self.rendered,
            format_size(self.source_bytes),
            format_size(self.html_bytes)
        )
    }
}

/// Human-readable binary size, e.g. `1.5 KiB`.
pub(crate) fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Run-wide cancellation flag. Set once by the first fatal error.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a run needs to know, plus its counters.
#[derive(Debug)]
pub struct RunContext {
    config: RenderConfig,
    suites: BTreeSet<String>,
    registry: Registry,
    start: SystemTime,
    stats: Stats,
    cancel: CancelToken,
}

impl RunContext {
    /// Create a context whose run starts now.
    pub fn new(config: RenderConfig, suites: BTreeSet<String>, registry: Registry) -> Self {
        RunContext {
            config,
            suites,
            registry,
            start: SystemTime::now(),
            stats: Stats::default(),
            cancel: CancelToken::new(),
        }
    }

    /// Discover the suites to process and scan the registry for them.
    pub fn prepare(config: RenderConfig) -> Result<Self> {
        let suites = discover_suites(config.serving_dir(), config.suites())?;
        let registry = Registry::scan(config.serving_dir(), &suites)?;
        Ok(Self::new(config, suites, registry))
    }

    /// Override the run-start timestamp.
    pub fn with_start(mut self, start: SystemTime) -> Self {
        self.start = start;
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        self.config.serving_dir()
    }

    pub fn suites(&self) -> &BTreeSet<String> {
        &self.suites
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Outputs modified after this instant were written by the current run.
    pub fn start(&self) -> SystemTime {
        self.start
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

/// Suite directories below `root`, restricted to `requested` unless it is
/// empty.
pub fn discover_suites(root: &Path, requested: &[String]) -> Result<BTreeSet<String>> {
    let entries = fs::read_dir(root).map_err(|source| RenderError::io(root, source))?;
    let mut found = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|source| RenderError::io(root, source))?;
        let is_dir = entry
            .file_type()
            .map_err(|source| RenderError::io(entry.path(), source))?
            .is_dir();
        if let (true, Some(name)) = (is_dir, entry.file_name().to_str()) {
            found.insert(name.to_string());
        }
    }

    if requested.is_empty() {
        return Ok(found);
    }
    let mut suites = BTreeSet::new();
    for suite in requested {
        if found.contains(suite) {
            suites.insert(suite.clone());
        } else {
            warn!("suite {suite:?} not found in {}, skipping", root.display());
        }
    }
    Ok(suites)
}
