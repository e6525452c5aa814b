//! Work-unit progress reporting.
//!
//! A root [`Progress`] owns a unit budget on a shared tracker; child slices
//! carve whole units out of their parent and rescale them to whatever total
//! the participant declares with [`Progress::begin`]. Dropping a slice
//! reports whatever it has not reported yet.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receives progress notifications from a running job.
pub trait ProgressListener: Send + Sync {
    fn progress(&self, done: u64, total: u64);

    fn task(&self, _name: &str) {}
}

struct Tracker {
    done: AtomicU64,
    total: AtomicU64,
    listener: Option<Arc<dyn ProgressListener>>,
}

impl Tracker {
    fn advance(&self, units: u64) {
        if units == 0 {
            return;
        }
        let done = self.done.fetch_add(units, Ordering::Relaxed) + units;
        if let Some(listener) = &self.listener {
            listener.progress(done, self.total.load(Ordering::Relaxed));
        }
    }

    fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        if let Some(listener) = &self.listener {
            listener.progress(self.done.load(Ordering::Relaxed), total);
        }
    }
}

pub struct Progress {
    tracker: Arc<Tracker>,
    root: bool,
    /// Tracker units owned by this handle.
    budget: u64,
    local_total: u64,
    local_done: u64,
    /// Tracker units already reported, grants to children included.
    reported: u64,
}

impl Progress {
    pub fn root(listener: Option<Arc<dyn ProgressListener>>, total: u64) -> Self {
        let tracker = Arc::new(Tracker {
            done: AtomicU64::new(0),
            total: AtomicU64::new(total),
            listener,
        });
        Self {
            tracker,
            root: true,
            budget: total,
            local_total: total,
            local_done: 0,
            reported: 0,
        }
    }

    /// A sink that reports nowhere.
    #[must_use]
    pub fn none() -> Self {
        Self::root(None, 0)
    }

    /// Declare the number of local units this handle will report.
    pub fn begin(&mut self, total: u64) {
        let left = self.budget.saturating_sub(self.reported);
        if self.root {
            self.tracker
                .set_total(self.tracker.done.load(Ordering::Relaxed) + total);
            self.budget = total;
        } else {
            self.budget = left;
        }
        self.local_total = total;
        self.local_done = 0;
        self.reported = 0;
    }

    pub fn worked(&mut self, units: u64) {
        self.local_done = (self.local_done + units).min(self.local_total);
        let target = self.scaled(self.local_done);
        if target > self.reported {
            self.tracker.advance(target - self.reported);
            self.reported = target;
        }
    }

    /// Hand `units` local units to a child slice.
    pub fn child(&mut self, units: u64) -> Progress {
        let units = units.min(self.local_total - self.local_done);
        self.local_done += units;
        let after = self.scaled(self.local_done);
        let grant = after.saturating_sub(self.reported);
        self.reported = self.reported.max(after);
        Progress {
            tracker: Arc::clone(&self.tracker),
            root: false,
            budget: grant,
            local_total: grant,
            local_done: 0,
            reported: 0,
        }
    }

    /// Re-estimate the remaining local work.
    pub fn set_work_remaining(&mut self, remaining: u64) {
        if self.root {
            self.tracker
                .set_total(self.tracker.done.load(Ordering::Relaxed) + remaining);
            self.budget = remaining;
        } else {
            self.budget = self.budget.saturating_sub(self.reported);
        }
        self.local_total = remaining;
        self.local_done = 0;
        self.reported = 0;
    }

    pub fn task(&self, name: &str) {
        if let Some(listener) = &self.tracker.listener {
            listener.task(name);
        }
    }

    pub fn done(&mut self) {
        if self.budget > self.reported {
            self.tracker.advance(self.budget - self.reported);
            self.reported = self.budget;
        }
        self.local_done = self.local_total;
    }

    /// `(done, total)` of the whole tracker.
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.tracker.done.load(Ordering::Relaxed),
            self.tracker.total.load(Ordering::Relaxed),
        )
    }

    fn scaled(&self, local: u64) -> u64 {
        if self.local_total == 0 {
            return 0;
        }
        self.budget.saturating_mul(local.min(self.local_total)) / self.local_total
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_slices_rescale_into_parent_units() {
        let mut root = Progress::root(None, 22);
        root.worked(1);
        {
            let mut slice = root.child(5);
            slice.begin(100);
            slice.worked(50);
            assert_eq!(root.snapshot().0, 3);
        }
        assert_eq!(root.snapshot(), (6, 22));
        let _ = root.child(5);
        assert_eq!(root.snapshot().0, 11);

        root.set_work_remaining(11);
        assert_eq!(root.snapshot(), (11, 22));
    }

    #[test]
    fn none_reports_nothing() {
        let mut progress = Progress::none();
        progress.worked(10);
        let mut child = progress.child(3);
        child.worked(3);
        assert_eq!(child.snapshot(), (0, 0));
    }
}
