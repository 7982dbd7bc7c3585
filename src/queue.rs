//! The rendezvous queue between directory traversal and render workers.
//!
//! The channel has no buffer: a traversal task blocks in
//! [`JobSender::send`] until a worker takes the job, which bounds memory
//! when conversion is slower than discovery. Neither side can block forever
//! once the run is cancelled:
//!
//! - senders check the [`CancelToken`] before every hand-off;
//! - workers check it after every receive and exit, dropping their
//!   [`JobReceiver`] handle; once all handles are gone a blocked send fails;
//! - once every sender is dropped, receiving yields `None`.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use crate::context::CancelToken;
use crate::document::Document;
use crate::registry::DocId;

/// One page to (re-)render.
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// Where the compressed HTML goes.
    pub dest: PathBuf,
    /// Compressed manpage source.
    pub src: PathBuf,
    pub document: Document,
    /// Every variant sharing the document's name, including itself.
    pub versions: Arc<[DocId]>,
    /// Modification time of `src` when the job was created.
    pub modified: SystemTime,
    /// Previously rendered page whose content may be reused instead of
    /// converting `src` again.
    pub reuse: Option<PathBuf>,
}

/// The receiving side went away or the run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Cloneable sending half, one clone per traversal task.
#[derive(Debug, Clone)]
pub struct JobSender {
    tx: SyncSender<RenderJob>,
    cancel: CancelToken,
}

impl JobSender {
    /// Hand `job` to a worker, blocking until one takes it.
    pub fn send(&self, job: RenderJob) -> Result<(), Cancelled> {
        if self.cancel.is_cancelled() {
            return Err(Cancelled);
        }
        self.tx.send(job).map_err(|_| Cancelled)
    }
}

/// Receiving half shared by all render workers.
#[derive(Debug)]
pub struct JobReceiver {
    rx: Mutex<Receiver<RenderJob>>,
    cancel: CancelToken,
}

impl JobReceiver {
    /// Next job, or `None` when the run is cancelled or no sender is left.
    pub fn recv(&self) -> Option<RenderJob> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let job = self
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv()
            .ok()?;
        (!self.cancel.is_cancelled()).then_some(job)
    }
}

/// Create a rendezvous queue tied to `cancel`.
pub fn work_queue(cancel: &CancelToken) -> (JobSender, Arc<JobReceiver>) {
    let (tx, rx) = sync_channel(0);
    (
        JobSender {
            tx,
            cancel: cancel.clone(),
        },
        Arc::new(JobReceiver {
            rx: Mutex::new(rx),
            cancel: cancel.clone(),
        }),
    )
}
