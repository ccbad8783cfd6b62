//! Serialized execution lanes, one per connection.
//!
//! A [`HandlerExecutor`] is a single-consumer FIFO queue drained by one tokio
//! task. Many lanes share the runtime's worker pool, so there is no thread per
//! connection, but the tasks of one lane never overlap and always run in the
//! order they were submitted, whichever thread submitted them.

use crate::error::{BoxError, Error, ErrorKind};
use log::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// A unit of work for one lane.
pub type Task = Box<dyn FnOnce() -> Result<(), BoxError> + Send + 'static>;

/// Server-wide destination for failures raised by tasks.
pub trait ErrorSink: Send + Sync {
    fn report(&self, lane: &str, error: &Error);
}

/// Default sink: writes failures to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, lane: &str, error: &Error) {
        error!("Task failed on lane {lane}: {error}");
    }
}

enum Job {
    Run(Task),
    Retire,
}

/// Handle to one serialized lane. Cloning it yields another handle to the
/// same lane.
#[derive(Clone)]
pub struct HandlerExecutor {
    inner: Arc<Inner>,
}

struct Inner {
    label: String,
    queue: UnboundedSender<Job>,
    retired: AtomicBool,
}

impl HandlerExecutor {
    /// Start a new lane on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn spawn(label: impl Into<String>, error_sink: Arc<dyn ErrorSink>) -> Self {
        let label = label.into();
        let (queue, jobs) = mpsc::unbounded_channel();
        tokio::spawn(drain(label.clone(), jobs, error_sink));

        Self {
            inner: Arc::new(Inner {
                label,
                queue,
                retired: AtomicBool::new(false),
            }),
        }
    }

    /// Enqueue a task and return immediately.
    ///
    /// Tasks submitted after [`retire`](Self::retire) are discarded.
    pub fn execute<F>(&self, task: F)
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        if self.is_retired() {
            debug!("Discarding task submitted to retired lane {}", self.inner.label);
            return;
        }
        if self.inner.queue.send(Job::Run(Box::new(task))).is_err() {
            debug!("Lane {} has stopped, task discarded", self.inner.label);
        }
    }

    /// Stop accepting work. Everything queued before this call still runs.
    pub fn retire(&self) {
        if !self.inner.retired.swap(true, Ordering::AcqRel) {
            // The drain loop may already be gone if the runtime shut down.
            let _ = self.inner.queue.send(Job::Retire);
        }
    }

    pub fn is_retired(&self) -> bool {
        self.inner.retired.load(Ordering::Acquire)
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }
}

impl std::fmt::Debug for HandlerExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerExecutor")
            .field("label", &self.inner.label)
            .field("retired", &self.is_retired())
            .finish()
    }
}

async fn drain(label: String, mut jobs: UnboundedReceiver<Job>, error_sink: Arc<dyn ErrorSink>) {
    while let Some(job) = jobs.recv().await {
        match job {
            Job::Run(task) => run(task, &label, error_sink.as_ref()),
            Job::Retire => break,
        }
    }
    debug!("Lane {label} retired");
}

fn run(task: Task, label: &str, error_sink: &dyn ErrorSink) {
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error_sink.report(label, &Error::from(err)),
        Err(payload) => {
            let error = Error::new(ErrorKind::Panicked(panic_message(payload.as_ref())));
            error_sink.report(label, &error);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
