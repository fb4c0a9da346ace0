//! Wall-clock and scheduling ports.
//!
//! Nothing in the core reads system time directly. Components take an
//! `Arc<dyn Clock>` so tests can drive them with [`ManualClock`], and periodic
//! work is registered with a [`Scheduler`] whose deadlines the driving event
//! loop sleeps on.
//!
//! ```text
//! driver loop:  sleep(next_deadline - now) -> owner.poll() -> scheduler.take_due(now)
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

/// Source of epoch-millisecond wall-clock time.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Simulated clock. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Handle for a scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

/// Periodic and one-off callback registration.
///
/// The scheduler never calls back into its owner. The owner asks which tasks
/// are due via [`Scheduler::take_due`] and reacts to them itself.
pub trait Scheduler {
    fn schedule_repeating(&mut self, now_ms: u64, period: Duration) -> TaskId;
    fn schedule_once(&mut self, now_ms: u64, delay: Duration) -> TaskId;
    fn cancel(&mut self, id: TaskId);
    fn cancel_all(&mut self);
    /// Earliest pending deadline in epoch milliseconds.
    fn next_deadline(&self) -> Option<u64>;
    /// Removes one-off tasks that are due and re-arms repeating ones.
    fn take_due(&mut self, now_ms: u64) -> Vec<TaskId>;
    fn is_pending(&self, id: TaskId) -> bool;
}

#[derive(Debug, Clone)]
struct Pending {
    due_ms: u64,
    period_ms: Option<u64>,
}

/// In-process deadline queue.
///
/// A repeating task that is overdue by several periods fires once and is
/// re-armed one period after `now`, so a throttled or suspended driver sees a
/// single late tick instead of a burst.
#[derive(Debug, Default)]
pub struct DeadlineScheduler {
    tasks: BTreeMap<TaskId, Pending>,
    next_id: u64,
}

impl DeadlineScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, pending: Pending) -> TaskId {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        self.tasks.insert(id, pending);
        id
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Scheduler for DeadlineScheduler {
    fn schedule_repeating(&mut self, now_ms: u64, period: Duration) -> TaskId {
        let period_ms = (period.as_millis() as u64).max(1);
        tracing::debug!(period_ms, "scheduling repeating task");
        self.insert(Pending {
            due_ms: now_ms + period_ms,
            period_ms: Some(period_ms),
        })
    }

    fn schedule_once(&mut self, now_ms: u64, delay: Duration) -> TaskId {
        self.insert(Pending {
            due_ms: now_ms + delay.as_millis() as u64,
            period_ms: None,
        })
    }

    fn cancel(&mut self, id: TaskId) {
        self.tasks.remove(&id);
    }

    fn cancel_all(&mut self) {
        self.tasks.clear();
    }

    fn next_deadline(&self) -> Option<u64> {
        self.tasks.values().map(|p| p.due_ms).min()
    }

    fn take_due(&mut self, now_ms: u64) -> Vec<TaskId> {
        let due: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|(_, p)| p.due_ms <= now_ms)
            .map(|(id, _)| *id)
            .collect();

        for id in &due {
            let rearm = self.tasks.get(id).and_then(|p| p.period_ms);
            match rearm {
                Some(period_ms) => {
                    if let Some(p) = self.tasks.get_mut(id) {
                        p.due_ms = now_ms + period_ms;
                    }
                }
                None => {
                    self.tasks.remove(id);
                }
            }
        }
        due
    }

    fn is_pending(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();
        clock.advance(Duration::from_secs(2));
        assert_eq!(other.now_ms(), 3_000);
        other.set(10);
        assert_eq!(clock.now_ms(), 10);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn repeating_task_fires_and_rearms() {
        let mut sched = DeadlineScheduler::new();
        let id = sched.schedule_repeating(0, Duration::from_secs(1));
        assert_eq!(sched.next_deadline(), Some(1_000));
        assert!(sched.take_due(999).is_empty());
        assert_eq!(sched.take_due(1_000), vec![id]);
        assert_eq!(sched.next_deadline(), Some(2_000));
    }

    #[test]
    fn late_repeating_task_coalesces() {
        let mut sched = DeadlineScheduler::new();
        let id = sched.schedule_repeating(0, Duration::from_secs(1));
        // Driver suspended for a minute.
        assert_eq!(sched.take_due(60_500), vec![id]);
        assert_eq!(sched.next_deadline(), Some(61_500));
        assert!(sched.take_due(61_000).is_empty());
    }

    #[test]
    fn one_off_task_is_removed_after_firing() {
        let mut sched = DeadlineScheduler::new();
        let id = sched.schedule_once(100, Duration::from_millis(50));
        assert!(sched.is_pending(id));
        assert_eq!(sched.take_due(150), vec![id]);
        assert!(!sched.is_pending(id));
        assert!(sched.is_empty());
    }

    #[test]
    fn cancel_removes_task() {
        let mut sched = DeadlineScheduler::new();
        let a = sched.schedule_repeating(0, Duration::from_secs(1));
        let b = sched.schedule_once(0, Duration::from_secs(5));
        sched.cancel(a);
        assert_eq!(sched.next_deadline(), Some(5_000));
        sched.cancel_all();
        assert!(!sched.is_pending(b));
        assert_eq!(sched.next_deadline(), None);
    }
}
