//! Version cascade: re-render the siblings of a stale document first.
//!
//! Variants of one manpage link to each other, so when one variant changes
//! every sibling page is potentially outdated too. Siblings are queued
//! before the variant that triggered the cascade: if the run is interrupted
//! in between, the trigger is still stale on the next run and the cascade is
//! repeated.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::context::RunContext;
use crate::queue::{Cancelled, JobSender, RenderJob};
use crate::registry::DocId;

/// Queue every sibling of `primary` that this run has not rendered yet.
///
/// `trigger` is the source path of the stale document, for logging only.
pub fn invalidate_siblings(
    ctx: &RunContext,
    queue: &JobSender,
    primary: Option<DocId>,
    versions: &Arc<[DocId]>,
    trigger: &Path,
) -> Result<(), Cancelled> {
    if ctx.config().force_rerender() {
        return Ok(());
    }

    for &id in versions.iter() {
        if Some(id) == primary {
            continue;
        }
        let sibling = ctx.registry().get(id);
        let src = ctx.root().join(sibling.raw_path());
        let dest = ctx.root().join(sibling.html_path());

        let rendered = fs::metadata(&dest).and_then(|m| m.modified()).ok();
        if rendered.is_some_and(|mtime| mtime > ctx.start()) {
            // Already handled earlier in this run.
            continue;
        }

        let modified = match fs::metadata(&src).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(err) => {
                warn!("stat {}: {err}", src.display());
                continue;
            }
        };

        let reuse = rendered
            .filter(|mtime| *mtime > modified)
            .map(|_| dest.clone());

        info!("{} invalidated by {}", dest.display(), trigger.display());

        queue.send(RenderJob {
            dest,
            src,
            document: sibling.clone(),
            versions: versions.clone(),
            modified,
            reuse,
        })?;
    }
    Ok(())
}
