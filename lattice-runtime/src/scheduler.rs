//! Update Scheduler
//!
//! The scheduler batches component updates. A render effect never re-runs
//! inline when its inputs change; its scheduler hands a job to
//! [`Runtime::queue_job`] instead, and all queued jobs run together in one
//! flush.
//!
//! # Algorithm
//!
//! 1. Queueing a job that is already pending does nothing (jobs are compared
//!    by `Rc` identity).
//! 2. The first job queued while no flush is pending sets the "flush
//!    pending" latch and schedules the flush as a microtask.
//! 3. The flush runs jobs in FIFO order until the queue is empty, including
//!    jobs queued by earlier jobs, then clears the latch.
//!
//! # Microtasks
//!
//! There is no event loop underneath the runtime, so it keeps its own FIFO
//! microtask queue. [`Runtime::run_microtasks`] drains it and stands in for
//! the end of the current tick. Callbacks registered with
//! [`Runtime::next_tick`] after a mutation run after the flush that mutation
//! scheduled, so they observe the updated tree.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use tracing::{debug, error};

use crate::error::{RenderError, RenderResult};
use crate::reactive::Runtime;

/// A unit of deferred work, usually a component update.
pub type Job = Rc<dyn Fn() -> RenderResult>;

type Microtask = Box<dyn FnOnce(&Runtime) -> RenderResult>;

#[derive(Default)]
pub(crate) struct Scheduler {
    queue: RefCell<VecDeque<Job>>,
    flush_pending: Cell<bool>,
    microtasks: RefCell<VecDeque<Microtask>>,
}

fn job_ptr(job: &Job) -> *const () {
    Rc::as_ptr(job) as *const ()
}

impl Runtime {
    fn scheduler(&self) -> &Scheduler {
        &self.inner().scheduler
    }

    /// Add `job` to the queue unless it is already pending, and make sure a
    /// flush is scheduled.
    pub fn queue_job(&self, job: &Job) {
        let scheduler = self.scheduler();
        {
            let mut queue = scheduler.queue.borrow_mut();
            let ptr = job_ptr(job);
            if queue.iter().any(|queued| job_ptr(queued) == ptr) {
                return;
            }
            queue.push_back(Rc::clone(job));
        }
        self.queue_flush();
    }

    /// Remove `job` from the queue if it is pending.
    ///
    /// Used when a parent update renders a child synchronously, making the
    /// child's own queued update redundant.
    pub fn invalidate_job(&self, job: &Job) {
        let ptr = job_ptr(job);
        self.scheduler()
            .queue
            .borrow_mut()
            .retain(|queued| job_ptr(queued) != ptr);
    }

    fn queue_flush(&self) {
        let scheduler = self.scheduler();
        if scheduler.flush_pending.replace(true) {
            return;
        }
        scheduler
            .microtasks
            .borrow_mut()
            .push_back(Box::new(|rt: &Runtime| rt.flush_jobs()));
    }

    /// Run `callback` once everything scheduled so far has run.
    pub fn next_tick<F>(&self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        self.scheduler().microtasks.borrow_mut().push_back(Box::new(move |_: &Runtime| {
            callback();
            Ok(())
        }));
    }

    /// Drain the microtask queue, including microtasks queued while
    /// draining.
    ///
    /// Every microtask runs even if an earlier one failed; the first error is
    /// returned.
    pub fn run_microtasks(&self) -> RenderResult {
        let mut first_error = None;
        loop {
            let task = self.scheduler().microtasks.borrow_mut().pop_front();
            let Some(task) = task else {
                break;
            };
            if let Err(err) = task(self) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Run every queued job in FIFO order.
    fn flush_jobs(&self) -> RenderResult {
        let limit = self.config().recursion_limit;
        let mut runs: HashMap<*const (), usize> = HashMap::new();
        let mut first_error = None;
        let mut flushed = 0usize;

        loop {
            let job = self.scheduler().queue.borrow_mut().pop_front();
            let Some(job) = job else {
                break;
            };

            let count = runs.entry(job_ptr(&job)).or_insert(0);
            *count += 1;
            if *count > limit {
                let err = RenderError::RecursionLimit { limit };
                error!("{err}");
                first_error.get_or_insert(err);
                continue;
            }

            flushed += 1;
            if let Err(err) = job() {
                error!("job failed during flush: {err}");
                first_error.get_or_insert(err);
            }
        }

        self.scheduler().flush_pending.set(false);
        debug!(jobs = flushed, "flushed job queue");
        first_error.map_or(Ok(()), Err)
    }

    /// Whether any job is waiting for a flush.
    pub fn has_pending_jobs(&self) -> bool {
        !self.scheduler().queue.borrow().is_empty()
    }

    /// Number of jobs waiting for a flush.
    pub fn pending_job_count(&self) -> usize {
        self.scheduler().queue.borrow().len()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
