//! Single-threaded cooperative timers.
//!
//! Nothing runs on its own: the owner polls `poll_due` and dispatches what comes
//! back. A cancelled entry is removed from the queue, so it can never be returned.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tracing::trace;

use crate::timer::Timer;

/// Logical owner of a group of timers (one per trial attempt)
pub type OwnerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// A timer that reached its deadline
#[derive(Debug, Clone, PartialEq)]
pub struct Fired<E> {
    pub handle: TimerHandle,
    pub owner: OwnerId,
    pub due_ms: u64,
    pub event: E,
}

/// Deadline-ordered timer storage. Equal deadlines fire in scheduling order.
#[derive(Debug)]
pub struct TimerQueue<E> {
    next_seq: u64,
    by_due: BTreeMap<(u64, u64), (OwnerId, E)>,
    due_of: HashMap<u64, u64>,
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TimerQueue<E> {
    pub fn new() -> Self {
        Self {
            next_seq: 0,
            by_due: BTreeMap::new(),
            due_of: HashMap::new(),
        }
    }

    pub fn schedule_at(&mut self, due_ms: u64, owner: OwnerId, event: E) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_due.insert((due_ms, seq), (owner, event));
        self.due_of.insert(seq, due_ms);
        TimerHandle(seq)
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.due_of.remove(&handle.0) {
            Some(due) => self.by_due.remove(&(due, handle.0)).is_some(),
            None => false,
        }
    }

    /// Drops every pending timer of `owner`, returning how many were removed
    pub fn cancel_owner(&mut self, owner: OwnerId) -> usize {
        let doomed: Vec<(u64, u64)> = self
            .by_due
            .iter()
            .filter(|(_, (o, _))| *o == owner)
            .map(|(key, _)| *key)
            .collect();
        for key in &doomed {
            self.by_due.remove(key);
            self.due_of.remove(&key.1);
        }
        doomed.len()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.by_due.keys().next().map(|(due, _)| *due)
    }

    /// Removes and returns the earliest timer whose deadline is `<= now_ms`
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Fired<E>> {
        let (&(due, seq), _) = self.by_due.iter().next()?;
        if due > now_ms {
            return None;
        }
        let (owner, event) = self.by_due.remove(&(due, seq))?;
        self.due_of.remove(&seq);
        Some(Fired {
            handle: TimerHandle(seq),
            owner,
            due_ms: due,
            event,
        })
    }

    pub fn pending_for(&self, owner: OwnerId) -> usize {
        self.by_due.values().filter(|(o, _)| *o == owner).count()
    }

    pub fn len(&self) -> usize {
        self.by_due.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_due.is_empty()
    }
}

/// Handle-based timer facility the engine is written against
pub trait Scheduler<E> {
    fn now_ms(&self) -> u64;
    fn schedule(&mut self, delay_ms: u64, owner: OwnerId, event: E) -> TimerHandle;
    /// Absolute deadline; chaining off a previous deadline keeps sequences drift-free
    fn schedule_at(&mut self, due_ms: u64, owner: OwnerId, event: E) -> TimerHandle;
    fn cancel(&mut self, handle: TimerHandle) -> bool;
    fn cancel_owner(&mut self, owner: OwnerId) -> usize;
    fn poll_due(&mut self) -> Option<Fired<E>>;
    fn next_due_ms(&self) -> Option<u64>;
    fn pending_for(&self, owner: OwnerId) -> usize;
    /// Blocks (or advances virtual time) until the earliest pending deadline.
    /// Returns false when nothing is pending.
    fn wait_for_next(&self) -> bool;
}

/// `TimerQueue` driven by an injected `Timer`
#[derive(Debug)]
pub struct CooperativeScheduler<T: Timer, E> {
    timer: T,
    queue: TimerQueue<E>,
}

impl<T: Timer, E> CooperativeScheduler<T, E> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            queue: TimerQueue::new(),
        }
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T: Timer, E> Scheduler<E> for CooperativeScheduler<T, E> {
    fn now_ms(&self) -> u64 {
        self.timer.now_ms()
    }

    fn schedule(&mut self, delay_ms: u64, owner: OwnerId, event: E) -> TimerHandle {
        let due = self.timer.now_ms().saturating_add(delay_ms);
        self.schedule_at(due, owner, event)
    }

    fn schedule_at(&mut self, due_ms: u64, owner: OwnerId, event: E) -> TimerHandle {
        let handle = self.queue.schedule_at(due_ms, owner, event);
        trace!(?handle, owner, due_ms, "timer scheduled");
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.queue.cancel(handle)
    }

    fn cancel_owner(&mut self, owner: OwnerId) -> usize {
        let removed = self.queue.cancel_owner(owner);
        if removed > 0 {
            trace!(owner, removed, "timers cancelled");
        }
        removed
    }

    fn poll_due(&mut self) -> Option<Fired<E>> {
        self.queue.pop_due(self.timer.now_ms())
    }

    fn next_due_ms(&self) -> Option<u64> {
        self.queue.next_due()
    }

    fn pending_for(&self, owner: OwnerId) -> usize {
        self.queue.pending_for(owner)
    }

    fn wait_for_next(&self) -> bool {
        let Some(due) = self.queue.next_due() else {
            return false;
        };
        let now = self.timer.now_ms();
        if due > now {
            self.timer.sleep(Duration::from_millis(due - now));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualClock;

    #[test]
    fn fires_in_deadline_then_schedule_order() {
        let mut q = TimerQueue::new();
        q.schedule_at(20, 1, "late");
        q.schedule_at(10, 1, "first");
        q.schedule_at(10, 2, "second");
        assert_eq!(q.pop_due(5), None);
        assert_eq!(q.pop_due(10).map(|f| f.event), Some("first"));
        assert_eq!(q.pop_due(10).map(|f| f.event), Some("second"));
        assert_eq!(q.pop_due(15), None);
        assert_eq!(q.pop_due(30).map(|f| f.event), Some("late"));
        assert!(q.is_empty());
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut q = TimerQueue::new();
        let a = q.schedule_at(10, 1, 'a');
        q.schedule_at(10, 1, 'b');
        q.schedule_at(12, 2, 'c');
        assert!(q.cancel(a));
        assert!(!q.cancel(a));
        assert_eq!(q.cancel_owner(1), 1);
        assert_eq!(q.pending_for(1), 0);
        assert_eq!(q.pending_for(2), 1);
        assert_eq!(q.pop_due(100).map(|f| f.event), Some('c'));
        assert_eq!(q.pop_due(100), None);
    }

    #[test]
    fn wait_for_next_advances_virtual_time() {
        let clock = ManualClock::starting_at(1_000);
        let mut sched = CooperativeScheduler::new(clock.clone());
        assert!(!sched.wait_for_next());

        sched.schedule(250, 7, ());
        assert!(sched.poll_due().is_none());
        assert!(sched.wait_for_next());
        assert_eq!(clock.now_ms(), 1_250);

        let fired = sched.poll_due().expect("due after wait");
        assert_eq!(fired.owner, 7);
        assert_eq!(fired.due_ms, 1_250);
        assert!(sched.is_empty());
    }
}
