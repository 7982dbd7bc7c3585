//! Staleness detection for one package directory.
//!
//! Invariant: every `*.gz` source has a `*.html.gz` page whose modification
//! time is not older than the source's.
//!
//! A package directory is walked three times, strictly in this order:
//!
//! 1. [`Pass::RegularFiles`] queues a job for every stale regular file;
//! 2. [`Pass::Symlinks`] queues a job for every stale symlink, pointing the
//!    job at the page of the link target, which pass 1 already brought up to
//!    date;
//! 3. [`Pass::PackageIndex`] renders `index.html.gz`, which lists both kinds.
//!
//! Walking the same directory three times in a row keeps its entries in the
//! dentry cache.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::SystemTime;

use tracing::{debug, error, warn};

use crate::atomic::write_atomically;
use crate::cascade::invalidate_siblings;
use crate::context::RunContext;
use crate::document::{Document, html_name, is_source_name};
use crate::error::{RenderError, Result};
use crate::queue::{JobSender, RenderJob};
use crate::templates;

pub const PACKAGE_INDEX: &str = "index.html.gz";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    RegularFiles,
    Symlinks,
    PackageIndex,
}

/// Run all three passes over `dir` and return the newest source modification
/// time seen, if any.
pub fn walk_package_dir(
    ctx: &RunContext,
    queue: &JobSender,
    dir: &Path,
) -> Result<Option<SystemTime>> {
    let newest = walk_package(ctx, queue, dir, Pass::RegularFiles, None)?;
    let newest = walk_package(ctx, queue, dir, Pass::Symlinks, newest)?;
    walk_package(ctx, queue, dir, Pass::PackageIndex, newest)?;
    Ok(newest)
}

/// One pass over a package directory.
///
/// `newest` is the newest modification time known so far; the updated value
/// is returned. A `dir` that is not a directory has no entries.
pub fn walk_package(
    ctx: &RunContext,
    queue: &JobSender,
    dir: &Path,
    pass: Pass,
    mut newest: Option<SystemTime>,
) -> Result<Option<SystemTime>> {
    // Listing optimistically and handling ENOTDIR saves a stat per entry
    // of the suite directory.
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotADirectory => return Ok(newest),
        Err(source) => return Err(RenderError::io(dir, source)),
    };

    let mut by_name: BTreeMap<String, Document> = BTreeMap::new();

    for entry in entries {
        let entry = entry.map_err(|source| RenderError::io(dir, source))?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if !is_source_name(file_name) {
            continue;
        }
        let full = entry.path();

        if pass == Pass::PackageIndex {
            match Document::from_serving_path(ctx.root(), &full) {
                Ok(document) => {
                    by_name.insert(file_name.to_string(), document);
                }
                Err(err) => error!("BUG: cannot parse manpage from serving path: {err}"),
            }
            continue;
        }

        let Ok(st) = fs::symlink_metadata(&full) else {
            continue;
        };
        let Ok(modified) = st.modified() else {
            continue;
        };
        let symlink = st.file_type().is_symlink();
        if (pass == Pass::RegularFiles) == symlink {
            continue;
        }
        newest = newest.max(Some(modified));
        if !symlink {
            ctx.stats().add_source_bytes(st.len());
        }

        let dest = dir.join(html_name(file_name));
        let rendered = fs::metadata(&dest).ok();
        let stale = match &rendered {
            None => true,
            Some(_) if ctx.config().force_rerender() => true,
            Some(html) => html.modified().map_or(true, |mtime| mtime < modified),
        };
        if !stale {
            if let Some(html) = &rendered {
                let shared = has_siblings(ctx, &full);
                ctx.stats().add_existing_page(&dest, html.len(), shared);
            }
            continue;
        }

        let parsed = match Document::from_serving_path(ctx.root(), &full) {
            Ok(document) => document,
            Err(err) => {
                error!("BUG: cannot parse manpage from serving path: {err}");
                continue;
            }
        };

        let registry = ctx.registry();
        let versions = registry.variants(&parsed.name);
        let primary = registry.lookup(&parsed.serving_path());
        let document = match primary {
            Some(id) => registry.get(id).clone(),
            None => parsed,
        };

        // Dependent variants first, so an interrupted run resumes correctly.
        invalidate_siblings(ctx, queue, primary, &versions, &full)
            .map_err(|_| RenderError::Cancelled)?;

        let reuse = if symlink {
            fs::read_link(&full).ok().map(|link| {
                let resolved = dir.join(link);
                let target = resolved
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(html_name)
                    .unwrap_or_default();
                resolved.with_file_name(target)
            })
        } else {
            None
        };

        debug!("queueing {}", dest.display());
        queue
            .send(RenderJob {
                dest,
                src: full,
                document,
                versions,
                modified,
                reuse,
            })
            .map_err(|_| RenderError::Cancelled)?;
    }

    if pass != Pass::PackageIndex {
        return Ok(newest);
    }

    let index_path = dir.join(PACKAGE_INDEX);
    let index_mtime = fs::metadata(&index_path).and_then(|m| m.modified()).ok();
    if !ctx.config().force_rerender()
        && let Some(index_mtime) = index_mtime
        && newest.is_none_or(|newest| index_mtime > newest)
    {
        return Ok(newest);
    }

    let Some(first) = by_name.values().next() else {
        warn!(
            "empty directory {}, not generating package index",
            dir.display()
        );
        return Ok(newest);
    };

    let page = templates::package_index(
        ctx.config().base_url(),
        &first.suite,
        &first.package,
        &by_name,
    );
    write_atomically(&index_path, Some(ctx.config().compression()), |w| {
        w.write_all(page.as_bytes())
    })?;

    Ok(newest)
}

/// Whether the document at `src` has other variants the cascade may
/// rewrite.
fn has_siblings(ctx: &RunContext, src: &Path) -> bool {
    Document::from_serving_path(ctx.root(), src)
        .is_ok_and(|document| ctx.registry().variants(&document.name).len() > 1)
}
