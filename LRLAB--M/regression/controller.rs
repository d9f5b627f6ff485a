use std::{fmt, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::scheduler::{Scheduler, Tick, TimerHandle};

/// Observable phase of a training session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingPhase {
    /// No schedule outstanding.
    Idle,
    /// Exactly one recurring schedule outstanding.
    Training,
}

enum State {
    Idle,
    Training { generation: u64, timer: TimerHandle },
}

/// Idle/Training state machine owning the single recurring schedule.
///
/// Each schedule carries a generation number. Ticks must check
/// [`TrainingController::is_current`] under the same lock that guards
/// [`TrainingController::stop`]; a tick that loses the race to a stop then
/// sees a stale generation and does nothing.
pub struct TrainingController {
    scheduler: Arc<dyn Scheduler>,
    interval: Duration,
    generation: u64,
    state: State,
}

impl fmt::Debug for TrainingController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingController")
            .field("phase", &self.phase())
            .field("interval", &self.interval)
            .field("generation", &self.generation)
            .finish()
    }
}

impl TrainingController {
    /// Creates an idle controller.
    #[must_use]
    pub fn new(scheduler: Arc<dyn Scheduler>, interval: Duration) -> Self {
        Self {
            scheduler,
            interval,
            generation: 0,
            state: State::Idle,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> TrainingPhase {
        match self.state {
            State::Idle => TrainingPhase::Idle,
            State::Training { .. } => TrainingPhase::Training,
        }
    }

    /// Returns true while a schedule is outstanding.
    #[must_use]
    pub fn is_training(&self) -> bool {
        matches!(self.state, State::Training { .. })
    }

    /// Interval between ticks.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true if `generation` belongs to the live schedule.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        match self.state {
            State::Training { generation: live, .. } => live == generation,
            State::Idle => false,
        }
    }

    /// Idle -> Training. `make_tick` receives the new generation.
    ///
    /// Returns false, scheduling nothing, when already training.
    pub fn start(&mut self, make_tick: impl FnOnce(u64) -> Tick) -> bool {
        if self.is_training() {
            return false;
        }
        self.generation += 1;
        let generation = self.generation;
        let timer = self
            .scheduler
            .schedule_repeating(self.interval, make_tick(generation));
        self.state = State::Training { generation, timer };
        true
    }

    /// Training -> Idle. The schedule is cancelled before this returns.
    ///
    /// Returns false when already idle.
    pub fn stop(&mut self) -> bool {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Training { timer, .. } => {
                timer.cancel();
                true
            }
            State::Idle => false,
        }
    }
}

impl Drop for TrainingController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const STEP: Duration = Duration::from_millis(20);

    fn setup() -> (ManualScheduler, TrainingController, Arc<AtomicUsize>) {
        let scheduler = ManualScheduler::new();
        let controller = TrainingController::new(Arc::new(scheduler.clone()), STEP);
        (scheduler, controller, Arc::new(AtomicUsize::new(0)))
    }

    fn counting(count: &Arc<AtomicUsize>) -> impl FnOnce(u64) -> Tick {
        let count = Arc::clone(count);
        move |_| -> Tick {
            Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    #[test]
    fn starts_idle() {
        let (scheduler, controller, _) = setup();
        assert_eq!(controller.phase(), TrainingPhase::Idle);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn second_start_does_not_double_schedule() {
        let (scheduler, mut controller, count) = setup();
        assert!(controller.start(counting(&count)));
        assert!(!controller.start(counting(&count)));
        assert_eq!(scheduler.pending(), 1);
        scheduler.advance(STEP * 5);
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn stop_cancels_before_returning() {
        let (scheduler, mut controller, count) = setup();
        controller.start(counting(&count));
        scheduler.advance(STEP * 3);
        assert!(controller.stop());
        assert!(!controller.stop());
        assert_eq!(scheduler.pending(), 0);
        scheduler.advance(STEP * 10);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(controller.phase(), TrainingPhase::Idle);
    }

    #[test]
    fn restart_bumps_generation() {
        let (_scheduler, mut controller, count) = setup();
        controller.start(counting(&count));
        assert!(controller.is_current(1));
        controller.stop();
        assert!(!controller.is_current(1));
        controller.start(counting(&count));
        assert!(controller.is_current(2));
        assert!(!controller.is_current(1));
    }

    #[test]
    fn drop_tears_down_schedule() {
        let (scheduler, mut controller, count) = setup();
        controller.start(counting(&count));
        drop(controller);
        assert_eq!(scheduler.pending(), 0);
        scheduler.advance(STEP * 4);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
