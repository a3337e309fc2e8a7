use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::error::ConvertError;
use crate::job::{ConversionJob, JobId};
use crate::notify::{Notification, Notifier, Outcome};
use crate::pipeline::{CancelToken, ConversionPipeline};

#[derive(Debug, Clone)]
struct ActiveJob {
    id: JobId,
    cancel: CancelToken,
}

/// Runs conversions one at a time on the blocking pool. A submission while
/// another job is running is refused with [`ConvertError::Busy`].
pub struct ConversionQueue {
    pipeline: Arc<ConversionPipeline>,
    notifier: Arc<dyn Notifier>,
    active: Arc<Mutex<Option<ActiveJob>>>,
    handle: Handle,
}

/// Handle to a submitted job.
#[derive(Debug)]
pub struct JobTicket {
    pub id: JobId,
    cancel: CancelToken,
    done: oneshot::Receiver<ConversionJob>,
}

impl JobTicket {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the job to reach a terminal state.
    pub async fn wait(self) -> Result<ConversionJob, ConvertError> {
        self.done
            .await
            .map_err(|_| ConvertError::HostFailure("conversion worker stopped".into()))
    }
}

/// Frees the queue slot when the worker finishes, panics included.
struct SlotGuard(Arc<Mutex<Option<ActiveJob>>>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.lock().take();
    }
}

impl ConversionQueue {
    pub fn new(pipeline: ConversionPipeline, notifier: Arc<dyn Notifier>, handle: Handle) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            notifier,
            active: Arc::new(Mutex::new(None)),
            handle,
        }
    }

    pub fn pipeline(&self) -> &ConversionPipeline {
        &self.pipeline
    }

    pub fn is_busy(&self) -> bool {
        self.active.lock().is_some()
    }

    pub fn active_job(&self) -> Option<JobId> {
        self.active.lock().as_ref().map(|active| active.id)
    }

    /// Request cancellation of the running job, if any.
    pub fn cancel_active(&self) -> bool {
        match self.active.lock().as_ref() {
            Some(active) => {
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn submit(&self, job: ConversionJob) -> Result<JobTicket, ConvertError> {
        let cancel = CancelToken::new();
        {
            let mut active = self.active.lock();
            if let Some(running) = active.as_ref() {
                debug!(running = %running.id, rejected = %job.id, "conversion queue busy");
                return Err(ConvertError::Busy);
            }
            *active = Some(ActiveJob {
                id: job.id,
                cancel: cancel.clone(),
            });
        }

        let id = job.id;
        info!(job = %id, source = %job.source.display(), target = %job.target.display(), "conversion submitted");
        let (tx, rx) = oneshot::channel();
        let slot = SlotGuard(Arc::clone(&self.active));
        let pipeline = Arc::clone(&self.pipeline);
        let notifier = Arc::clone(&self.notifier);
        let worker_cancel = cancel.clone();

        self.handle.spawn_blocking(move || {
            let mut job = job;
            let result = pipeline.run(&mut job, &worker_cancel);
            // the slot is free before anyone hears about the outcome
            drop(slot);
            let outcome = match result {
                Ok(target) => Outcome::Succeeded { target },
                Err(err) => Outcome::Failed(err),
            };
            notifier.notify(Notification {
                job: job.id,
                source: job.source.clone(),
                outcome,
            });
            let _ = tx.send(job);
        });

        Ok(JobTicket {
            id,
            cancel,
            done: rx,
        })
    }
}
