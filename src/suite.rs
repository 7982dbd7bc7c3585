//! Suite traversal and sitemap aggregation.
//!
//! Package directories of a suite are walked in parallel on a rayon pool
//! sized by `--concurrency-manwalk`; each one runs the three passes of
//! [`walk_package_dir`] and reports the newest source modification time into
//! the suite's sitemap entry table.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use rayon::ThreadPool;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::atomic::write_atomically;
use crate::context::RunContext;
use crate::error::{RenderError, Result};
use crate::queue::JobSender;
use crate::sitemap::{SITEMAP, SITEMAP_INDEX, write_sitemap, write_sitemap_index};
use crate::templates;
use crate::walker::walk_package_dir;

/// Walk every suite of the run, then write the sitemap index.
pub fn walk_suites(ctx: &RunContext, queue: &JobSender) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(ctx.config().walk_concurrency())
        .thread_name(|i| format!("manwalk-{i}"))
        .build()?;

    let mut sitemaps = BTreeMap::new();
    for suite in ctx.suites() {
        if ctx.cancel_token().is_cancelled() {
            return Err(RenderError::Cancelled);
        }
        let modified = walk_suite(ctx, &pool, queue, suite)?;
        sitemaps.insert(suite.clone(), modified);
    }

    let index = ctx.root().join(SITEMAP_INDEX);
    write_atomically(&index, Some(ctx.config().compression()), |w| {
        write_sitemap_index(w, ctx.config().base_url(), &sitemaps)
    })?;
    Ok(())
}

/// Walk one suite and write its sitemap; returns the sitemap's
/// modification time.
fn walk_suite(
    ctx: &RunContext,
    pool: &ThreadPool,
    queue: &JobSender,
    suite: &str,
) -> Result<SystemTime> {
    let suite_dir = ctx.root().join(suite);
    let cancel = ctx.cancel_token();
    let mut packages = list_entries(&suite_dir).inspect_err(|_| cancel.cancel())?;
    if let Some(only) = ctx.config().only_render() {
        packages.retain(|package| only.contains(package));
    }
    info!("walking {} entries of suite {suite}", packages.len());

    let entries = Mutex::new(BTreeMap::new());
    pool.install(|| {
        packages.par_iter().try_for_each(|package| {
            if cancel.is_cancelled() {
                return Err(RenderError::Cancelled);
            }
            let dir = suite_dir.join(package);
            // Stop the packages still in flight on other pool threads.
            let newest = walk_package_dir(ctx, queue, &dir).inspect_err(|_| cancel.cancel())?;
            if let Some(newest) = newest {
                entries
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(package.clone(), newest);
            }
            Ok::<_, RenderError>(())
        })
    })?;
    let entries = entries.into_inner().unwrap_or_else(PoisonError::into_inner);

    let path = suite_dir.join(SITEMAP);
    let base_url = format!("{}/{suite}", ctx.config().base_url());
    write_atomically(&path, Some(ctx.config().compression()), |w| {
        write_sitemap(w, &base_url, &entries)
    })?;
    debug!("wrote {} with {} entries", path.display(), entries.len());

    fs::metadata(&path)
        .and_then(|m| m.modified())
        .map_err(|source| RenderError::io(&path, source))
}

/// Names of all entries of a suite directory, sorted.
fn list_entries(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|source| RenderError::io(dir, source))? {
        let entry = entry.map_err(|source| RenderError::io(dir, source))?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort_unstable();
    Ok(names)
}

/// Write `contents-<suite>.html.gz` for every suite of the run.
pub fn render_contents(ctx: &RunContext) -> Result<()> {
    for suite in ctx.suites() {
        let suite_dir = ctx.root().join(suite);
        let mut packages = Vec::new();
        let entries =
            fs::read_dir(&suite_dir).map_err(|source| RenderError::io(&suite_dir, source))?;
        for entry in entries {
            let entry = entry.map_err(|source| RenderError::io(&suite_dir, source))?;
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            if let (true, Some(name)) = (is_dir, entry.file_name().to_str()) {
                packages.push(name.to_string());
            }
        }
        packages.sort_unstable();

        let page = templates::contents_page(ctx.config().base_url(), suite, &packages);
        let path = ctx.root().join(format!("contents-{suite}.html.gz"));
        write_atomically(&path, Some(ctx.config().compression()), |w| {
            w.write_all(page.as_bytes())
        })?;
        debug!("wrote {} with {} packages", path.display(), packages.len());
    }
    Ok(())
}
