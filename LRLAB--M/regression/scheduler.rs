use std::{
    fmt,
    sync::{Arc, Weak},
    time::Duration,
};

use parking_lot::Mutex;
use tokio::{
    runtime::Handle,
    time::{interval_at, Instant, MissedTickBehavior},
};

/// Callback fired on every interval.
pub type Tick = Box<dyn FnMut() + Send + 'static>;

/// Shortest interval a scheduler will honour.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Source of recurring callbacks.
pub trait Scheduler: Send + Sync {
    /// Fires `tick` every `interval`, first one `interval` from now, until the
    /// returned handle is cancelled or dropped.
    fn schedule_repeating(&self, interval: Duration, tick: Tick) -> TimerHandle;
}

/// Owned handle to a recurring schedule. Cancels on drop.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimerHandle {
    /// Wraps a cancellation action.
    #[must_use]
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Cancels the schedule.
    pub fn cancel(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.fire();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Scheduler backed by a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Uses the given runtime handle.
    #[must_use]
    pub const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime of the calling context, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&self, interval: Duration, mut tick: Tick) -> TimerHandle {
        let period = interval.max(MIN_INTERVAL);
        let task = self.handle.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                tick();
            }
        });
        TimerHandle::new(move || task.abort())
    }
}

/// Deterministic scheduler driven by an explicit virtual clock.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    clock: Arc<Mutex<ManualClock>>,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_id: u64,
    timers: Vec<ManualTimer>,
}

struct ManualTimer {
    id: u64,
    interval: Duration,
    due: Duration,
    // taken out while the callback runs
    tick: Option<Tick>,
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clock = self.clock.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &clock.now)
            .field("timers", &clock.timers.len())
            .finish()
    }
}

impl ManualScheduler {
    /// Creates a scheduler at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.lock().now
    }

    /// Number of live schedules.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.clock.lock().timers.len()
    }

    /// Moves the clock forward, firing every due tick in time order.
    ///
    /// Returns the number of ticks fired. Callbacks run without the clock
    /// locked, so they may cancel schedules, including their own.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.clock.lock().now + by;
        let mut fired = 0;
        loop {
            let next = {
                let mut clock = self.clock.lock();
                let candidate = clock
                    .timers
                    .iter_mut()
                    .filter(|timer| timer.due <= target && timer.tick.is_some())
                    .min_by_key(|timer| (timer.due, timer.id));
                match candidate {
                    Some(timer) => {
                        let fired_at = timer.due;
                        timer.due += timer.interval;
                        let id = timer.id;
                        let tick = timer.tick.take();
                        clock.now = fired_at;
                        tick.map(|tick| (id, tick))
                    }
                    None => None,
                }
            };
            let Some((id, mut tick)) = next else { break };
            tick();
            fired += 1;
            let orphan = {
                let mut clock = self.clock.lock();
                match clock.timers.iter_mut().find(|timer| timer.id == id) {
                    Some(timer) => {
                        timer.tick = Some(tick);
                        None
                    }
                    None => Some(tick),
                }
            };
            drop(orphan);
        }
        self.clock.lock().now = target;
        fired
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, interval: Duration, tick: Tick) -> TimerHandle {
        let period = interval.max(MIN_INTERVAL);
        let id = {
            let mut clock = self.clock.lock();
            let id = clock.next_id;
            clock.next_id += 1;
            let due = clock.now + period;
            clock.timers.push(ManualTimer {
                id,
                interval: period,
                due,
                tick: Some(tick),
            });
            id
        };
        let clock: Weak<Mutex<ManualClock>> = Arc::downgrade(&self.clock);
        TimerHandle::new(move || {
            if let Some(clock) = clock.upgrade() {
                let removed = {
                    let mut clock = clock.lock();
                    clock
                        .timers
                        .iter()
                        .position(|timer| timer.id == id)
                        .map(|idx| clock.timers.remove(idx))
                };
                drop(removed);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Tick) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (
            count,
            Box::new(move || {
                inner.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn manual_scheduler_fires_on_interval() {
        let scheduler = ManualScheduler::new();
        let (count, tick) = counter();
        let handle = scheduler.schedule_repeating(Duration::from_millis(20), tick);
        assert_eq!(scheduler.advance(Duration::from_millis(19)), 0);
        assert_eq!(scheduler.advance(Duration::from_millis(1)), 1);
        assert_eq!(scheduler.advance(Duration::from_millis(100)), 5);
        assert_eq!(count.load(Ordering::SeqCst), 6);
        handle.cancel();
        assert_eq!(scheduler.advance(Duration::from_millis(100)), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn dropping_handle_cancels() {
        let scheduler = ManualScheduler::new();
        let (count, tick) = counter();
        drop(scheduler.schedule_repeating(Duration::from_millis(5), tick));
        scheduler.advance(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn tick_may_cancel_its_own_schedule() {
        let scheduler = ManualScheduler::new();
        let slot: Arc<Mutex<Option<TimerHandle>>> = Arc::new(Mutex::new(None));
        let fired = Arc::new(AtomicUsize::new(0));
        let (slot_in, fired_in) = (Arc::clone(&slot), Arc::clone(&fired));
        let handle = scheduler.schedule_repeating(
            Duration::from_millis(10),
            Box::new(move || {
                fired_in.fetch_add(1, Ordering::SeqCst);
                let handle = slot_in.lock().take();
                drop(handle);
            }),
        );
        *slot.lock() = Some(handle);
        scheduler.advance(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_ticks_until_cancelled() {
        let scheduler = TokioScheduler::current().unwrap();
        let (count, tick) = counter();
        let handle = scheduler.schedule_repeating(Duration::from_millis(20), tick);
        tokio::time::sleep(Duration::from_millis(105)).await;
        let seen = count.load(Ordering::SeqCst);
        assert!((4..=5).contains(&seen), "saw {seen} ticks");
        handle.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }
}
