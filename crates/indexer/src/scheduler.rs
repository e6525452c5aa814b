use crate::job::{IndexJob, JobOutcome};
use crate::locator::Locator;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

/// Tracks spawned jobs so they can be cancelled or awaited by family.
#[derive(Default)]
pub struct JobSet {
    jobs: Mutex<Vec<(Arc<IndexJob>, JoinHandle<JobOutcome>)>>,
}

impl JobSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `job` on the blocking pool. Must be called inside a tokio runtime.
    pub fn schedule(&self, job: IndexJob) -> Arc<IndexJob> {
        let job = Arc::new(job);
        let handle = Arc::clone(&job).spawn();
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.retain(|(_, handle)| !handle.is_finished());
        jobs.push((Arc::clone(&job), handle));
        job
    }

    /// Request cancellation of every live job in `family`.
    pub fn cancel(&self, family: Option<&Locator>) -> usize {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let mut cancelled = 0;
        for (job, handle) in jobs.iter() {
            if !handle.is_finished() && job.belongs_to(family) {
                job.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.iter().filter(|(_, handle)| !handle.is_finished()).count()
    }

    /// Wait for every job of `family`, in scheduling order.
    pub async fn join_family(&self, family: Option<&Locator>) -> Vec<JobOutcome> {
        let handles: Vec<_> = {
            let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
            let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut *jobs)
                .into_iter()
                .partition(|(job, _)| job.belongs_to(family));
            *jobs = rest;
            matching
        };
        join(handles).await
    }

    pub async fn join_all(&self) -> Vec<JobOutcome> {
        let handles = {
            let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *jobs)
        };
        join(handles).await
    }
}

async fn join(handles: Vec<(Arc<IndexJob>, JoinHandle<JobOutcome>)>) -> Vec<JobOutcome> {
    let mut outcomes = Vec::with_capacity(handles.len());
    for (job, handle) in handles {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => log::error!("{} did not finish: {err}", job.name()),
        }
    }
    outcomes
}
