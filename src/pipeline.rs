//! The whole run: traversal feeding a fixed pool of render workers.
//!
//! The calling thread walks the suites on the rayon traversal pool while
//! `--concurrency-render` scoped worker threads drain the queue. The first
//! fatal error from either side cancels the run; every other task stops at
//! its next queue operation.

use std::sync::Arc;
use std::thread;

use tracing::{debug, error};

use crate::context::{CancelToken, RunContext, StatsSnapshot};
use crate::convert::{ConvertError, Converter};
use crate::error::{RenderError, Result};
use crate::queue::work_queue;
use crate::render::render_worker;
use crate::suite::{render_contents, walk_suites};

/// Bring the serving directory up to date.
///
/// `new_converter` is called once per worker, on the worker's thread.
pub fn render_all<F, C>(ctx: &RunContext, new_converter: F) -> Result<StatsSnapshot>
where
    F: Fn() -> std::result::Result<C, ConvertError> + Sync,
    C: Converter,
{
    let cancel = ctx.cancel_token();
    let (queue, jobs) = work_queue(cancel);
    let new_converter = &new_converter;

    let (walked, rendered) = thread::scope(|scope| {
        let workers: Vec<_> = (0..ctx.config().render_concurrency())
            .map(|i| {
                let jobs = Arc::clone(&jobs);
                scope.spawn(move || {
                    let _guard = CancelOnPanic(cancel);
                    let result = new_converter()
                        .map_err(RenderError::ConverterStart)
                        .and_then(|converter| render_worker(ctx, &jobs, converter));
                    if let Err(err) = &result {
                        error!("render worker {i} failed: {err}");
                        cancel.cancel();
                    }
                    debug!("render worker {i} exiting");
                    result
                })
            })
            .collect();
        // Only workers may keep the receiving side alive.
        drop(jobs);

        let walked = walk_suites(ctx, &queue);
        if walked.is_err() {
            cancel.cancel();
        }
        drop(queue);

        let rendered: Vec<Result<()>> = workers
            .into_iter()
            .map(|worker| worker.join().unwrap_or(Err(RenderError::WorkerPanicked)))
            .collect();
        (walked, rendered)
    });

    // The root cause wins over the cancellations it triggered.
    let mut failure = None;
    for err in rendered.into_iter().chain([walked]).filter_map(Result::err) {
        if matches!(failure, None | Some(RenderError::Cancelled)) {
            failure = Some(err);
        }
    }
    if let Some(err) = failure {
        return Err(err);
    }

    render_contents(ctx)?;
    Ok(ctx.stats().snapshot())
}

/// Cancels the run when a worker unwinds.
struct CancelOnPanic<'a>(&'a CancelToken);

impl Drop for CancelOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("render worker panicked");
            self.0.cancel();
        }
    }
}
