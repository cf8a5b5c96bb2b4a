//! One-shot timers tied to the lifetime of the component that scheduled them.
//!
//! The TUI loop owns a [`Scheduler`] and calls [`Scheduler::poll`] once per
//! frame. Components schedule through their own [`TimerScope`]; cancelling
//! or dropping the scope removes every timer it still has pending.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use log::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ScopeId(u64);

struct Timer {
    handle: TimerHandle,
    scope: ScopeId,
    deadline: Instant,
    callback: Box<dyn FnOnce()>,
}

#[derive(Default)]
struct SchedulerInner {
    next_timer: u64,
    next_scope: u64,
    timers: Vec<Timer>,
}

#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new scope whose timers can be cancelled together
    pub fn scope(&self) -> TimerScope {
        let mut inner = self.inner.borrow_mut();
        inner.next_scope += 1;
        TimerScope {
            scheduler: self.clone(),
            id: ScopeId(inner.next_scope),
        }
    }

    /// Fire every timer whose deadline is at or before `now`.
    ///
    /// Timers fire in deadline order. Callbacks may schedule new timers;
    /// those are picked up on a later poll. Returns the number fired.
    pub fn poll(&self, now: Instant) -> usize {
        let mut due: Vec<Timer> = {
            let mut inner = self.inner.borrow_mut();
            let (due, pending): (Vec<Timer>, Vec<Timer>) = std::mem::take(&mut inner.timers)
                .into_iter()
                .partition(|t| t.deadline <= now);
            inner.timers = pending;
            due
        };

        due.sort_by_key(|t| t.deadline);
        let fired = due.len();
        for timer in due {
            trace!("Firing timer {:?}", timer.handle);
            (timer.callback)();
        }
        fired
    }

    /// Number of timers waiting to fire
    pub fn pending(&self) -> usize {
        self.inner.borrow().timers.len()
    }

    /// Earliest pending deadline, if any
    fn schedule_at(&self, scope: ScopeId, deadline: Instant, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let mut inner = self.inner.borrow_mut();
        inner.next_timer += 1;
        let handle = TimerHandle(inner.next_timer);
        inner.timers.push(Timer {
            handle,
            scope,
            deadline,
            callback,
        });
        handle
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        !self.remove_where(|t| t.handle == handle).is_empty()
    }

    fn cancel_scope(&self, scope: ScopeId) -> usize {
        self.remove_where(|t| t.scope == scope).len()
    }

    // Removed callbacks are returned so they drop after the borrow ends;
    // a callback may own something that touches the scheduler on drop.
    fn remove_where(&self, pred: impl Fn(&Timer) -> bool) -> Vec<Timer> {
        let mut inner = self.inner.borrow_mut();
        let (removed, kept): (Vec<Timer>, Vec<Timer>) =
            std::mem::take(&mut inner.timers).into_iter().partition(|t| pred(t));
        inner.timers = kept;
        removed
    }

    fn pending_in(&self, scope: ScopeId) -> usize {
        self.inner
            .borrow()
            .timers
            .iter()
            .filter(|t| t.scope == scope)
            .count()
    }
}

/// Timers owned by a single component
pub struct TimerScope {
    scheduler: Scheduler,
    id: ScopeId,
}

impl TimerScope {
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> TimerHandle
    where
        F: FnOnce() + 'static,
    {
        self.schedule_at(Instant::now() + delay, callback)
    }

    pub fn schedule_at<F>(&self, deadline: Instant, callback: F) -> TimerHandle
    where
        F: FnOnce() + 'static,
    {
        self.scheduler.schedule_at(self.id, deadline, Box::new(callback))
    }

    pub fn cancel(&self, handle: TimerHandle) -> bool {
        self.scheduler.cancel(handle)
    }

    pub fn cancel_all(&self) {
        let cancelled = self.scheduler.cancel_scope(self.id);
        if cancelled > 0 {
            debug!("Cancelled {} pending timer(s)", cancelled);
        }
    }

    pub fn pending(&self) -> usize {
        self.scheduler.pending_in(self.id)
    }
}

impl Drop for TimerScope {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_fires_only_when_due() {
        let scheduler = Scheduler::new();
        let scope = scheduler.scope();
        let fired = Rc::new(Cell::new(false));

        let start = Instant::now();
        {
            let fired = fired.clone();
            scope.schedule_at(start + Duration::from_millis(100), move || fired.set(true));
        }

        assert_eq!(scheduler.poll(start), 0);
        assert!(!fired.get());
        assert_eq!(scheduler.poll(start + Duration::from_millis(100)), 1);
        assert!(fired.get());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let scheduler = Scheduler::new();
        let scope = scheduler.scope();
        let order = Rc::new(RefCell::new(Vec::new()));
        let start = Instant::now();

        for (tag, ms) in [("late", 30u64), ("early", 10), ("mid", 20)] {
            let order = order.clone();
            scope.schedule_at(start + Duration::from_millis(ms), move || order.borrow_mut().push(tag));
        }

        scheduler.poll(start + Duration::from_secs(1));
        assert_eq!(*order.borrow(), vec!["early", "mid", "late"]);
    }

    #[test]
    fn test_cancel_all_only_touches_own_scope() {
        let scheduler = Scheduler::new();
        let a = scheduler.scope();
        let b = scheduler.scope();
        let start = Instant::now();

        a.schedule_at(start, || {});
        a.schedule_at(start, || {});
        b.schedule_at(start, || {});

        a.cancel_all();
        assert_eq!(a.pending(), 0);
        assert_eq!(b.pending(), 1);
        assert_eq!(scheduler.poll(start), 1);
    }

    #[test]
    fn test_drop_cancels() {
        let scheduler = Scheduler::new();
        let fired = Rc::new(Cell::new(false));
        {
            let scope = scheduler.scope();
            let fired = fired.clone();
            scope.schedule(Duration::ZERO, move || fired.set(true));
        }
        scheduler.poll(Instant::now() + Duration::from_secs(1));
        assert!(!fired.get());
    }

    #[test]
    fn test_callback_can_reschedule() {
        let scheduler = Scheduler::new();
        let scope = Rc::new(scheduler.scope());
        let start = Instant::now();
        let count = Rc::new(Cell::new(0));

        {
            let scope_ref = Rc::downgrade(&scope);
            let count = count.clone();
            scope.schedule_at(start, move || {
                count.set(count.get() + 1);
                if let Some(scope) = scope_ref.upgrade() {
                    let count = count.clone();
                    scope.schedule_at(start, move || count.set(count.get() + 1));
                }
            });
        }

        assert_eq!(scheduler.poll(start), 1);
        assert_eq!(scheduler.poll(start), 1);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_cancel_single_handle() {
        let scheduler = Scheduler::new();
        let scope = scheduler.scope();
        let handle = scope.schedule(Duration::from_secs(5), || {});
        assert!(scope.cancel(handle));
        assert!(!scope.cancel(handle));
        assert_eq!(scope.pending(), 0);
    }
}
