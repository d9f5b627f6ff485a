//! Learner-facing sandbox: the point set, the hypothesis line, and the
//! training loop that drives it.

use std::sync::{Arc, Weak};

use anyhow::Result;
use lrlab_logging::LogLevel;
use parking_lot::Mutex;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    config::SandboxConfig,
    controller::{TrainingController, TrainingPhase},
    fit::try_best_fit,
    gradient::gradient_step,
    input::{parse_coordinate, require_finite, InputError},
    loss::mean_squared_error,
    plot::{line_segment, residuals, LineSegment, Residual},
    point::{LineParams, Point, PointSet},
    scheduler::{Scheduler, Tick},
    telemetry::SandboxTelemetry,
};

/// Event carrying a [`SandboxSnapshot`] after every change.
pub const SNAPSHOT_EVENT: &str = "sandbox.snapshot";
/// Event emitted when training starts.
pub const TRAINING_STARTED_EVENT: &str = "training.started";
/// Event emitted when training stops, with the reason.
pub const TRAINING_STOPPED_EVENT: &str = "training.stopped";

/// Why a training session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The learner pressed stop.
    Requested,
    /// The learner edited the line or the points.
    ManualEdit,
    /// A step produced a non-finite line.
    Diverged,
    /// The sandbox was dropped.
    Teardown,
}

/// Everything the display layer renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SandboxSnapshot {
    /// Current hypothesis line.
    pub params: LineParams,
    /// Loss of the current line.
    pub loss: f64,
    /// Least squares line, `(0, 0)` when undefined.
    pub best_fit: LineParams,
    /// False when fewer than two points or no x spread.
    pub best_fit_defined: bool,
    /// Loss of `best_fit`.
    pub best_fit_loss: f64,
    /// Observations in insertion order.
    pub points: PointSet,
    /// Residual of each observation against `params`.
    pub residuals: Vec<Residual>,
    /// `params` drawn over the plot range.
    pub hypothesis_line: LineSegment,
    /// `best_fit` drawn over the plot range, when defined.
    pub best_fit_line: Option<LineSegment>,
    /// Training phase.
    pub phase: TrainingPhase,
    /// Step size used by the next tick.
    pub learning_rate: f64,
    /// Gradient steps applied since the session opened.
    pub steps: u64,
}

struct SandboxState {
    points: PointSet,
    params: LineParams,
    learning_rate: f64,
    steps: u64,
    controller: TrainingController,
    rng: SmallRng,
}

impl SandboxState {
    fn snapshot(&self, config: &SandboxConfig) -> SandboxSnapshot {
        let fit = try_best_fit(&self.points);
        let best_fit = fit.unwrap_or(LineParams::ZERO);
        SandboxSnapshot {
            params: self.params,
            loss: mean_squared_error(self.params, &self.points),
            best_fit,
            best_fit_defined: fit.is_some(),
            best_fit_loss: mean_squared_error(best_fit, &self.points),
            points: self.points.clone(),
            residuals: residuals(self.params, &self.points),
            hypothesis_line: line_segment(self.params, config.plot_x),
            best_fit_line: fit.map(|line| line_segment(line, config.plot_x)),
            phase: self.controller.phase(),
            learning_rate: self.learning_rate,
            steps: self.steps,
        }
    }

    fn random_point(&mut self, config: &SandboxConfig) -> Point {
        let rp = &config.random_point;
        let x = (self.rng.gen::<f64>() * rp.x_span).floor() + rp.x_min;
        let noise = (self.rng.gen::<f64>() - 0.5) * rp.noise_span;
        Point::new(x, rp.y_clamp.clamp(x + rp.y_offset + noise))
    }
}

struct Shared {
    config: SandboxConfig,
    telemetry: Option<SandboxTelemetry>,
}

impl Shared {
    fn log(&self, level: LogLevel, message: &str, metadata: Value) {
        if let Some(telemetry) = &self.telemetry {
            let _ = telemetry.log(level, message, metadata);
        }
    }

    fn event(&self, event_type: &str, payload: Value) {
        if let Some(telemetry) = &self.telemetry {
            let _ = telemetry.event(event_type, payload);
        }
    }

    fn publish(&self, snapshot: &SandboxSnapshot) {
        if self.telemetry.is_none() {
            return;
        }
        match serde_json::to_value(snapshot) {
            Ok(payload) => self.event(SNAPSHOT_EVENT, payload),
            Err(err) => self.log(
                LogLevel::Warn,
                "snapshot.encode_failed",
                json!({ "error": err.to_string() }),
            ),
        }
    }

    fn stopped(&self, reason: StopReason, snapshot: &SandboxSnapshot) {
        let level = if reason == StopReason::Diverged {
            LogLevel::Warn
        } else {
            LogLevel::Info
        };
        let payload = json!({
            "reason": reason,
            "steps": snapshot.steps,
            "loss": snapshot.loss,
        });
        self.log(level, TRAINING_STOPPED_EVENT, payload.clone());
        self.event(TRAINING_STOPPED_EVENT, payload);
    }
}

fn run_tick(state: &Weak<Mutex<SandboxState>>, shared: &Shared, generation: u64) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let (snapshot, diverged) = {
        let mut guard = state.lock();
        if !guard.controller.is_current(generation) {
            return;
        }
        let next = gradient_step(guard.params, &guard.points, guard.learning_rate);
        let diverged = !next.is_finite();
        if diverged {
            guard.controller.stop();
        } else {
            guard.params = next;
            guard.steps += 1;
        }
        (guard.snapshot(&shared.config), diverged)
    };
    if diverged {
        shared.stopped(StopReason::Diverged, &snapshot);
    }
    shared.publish(&snapshot);
}

/// One learner's sandbox session.
///
/// Every manual edit of the line or the points stops training before it is
/// applied, so the next scheduled step never overwrites learner input.
/// Dropping the sandbox cancels any live schedule.
pub struct Sandbox {
    state: Arc<Mutex<SandboxState>>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Sandbox")
            .field("params", &state.params)
            .field("points", &state.points.len())
            .field("controller", &state.controller)
            .finish()
    }
}

impl Sandbox {
    /// Opens a session on the seed points with the configured defaults.
    pub fn new(
        config: SandboxConfig,
        scheduler: Arc<dyn Scheduler>,
        telemetry: Option<SandboxTelemetry>,
    ) -> Result<Self> {
        config.validate()?;
        let rng = config
            .rng_seed
            .map_or_else(SmallRng::from_entropy, SmallRng::seed_from_u64);
        let state = SandboxState {
            points: PointSet::seed(),
            params: config.default_line(),
            learning_rate: config.default_learning_rate,
            steps: 0,
            controller: TrainingController::new(scheduler, config.step_interval()),
            rng,
        };
        let shared = Shared { config, telemetry };
        shared.log(
            LogLevel::Info,
            "sandbox.opened",
            json!({ "step_interval_ms": shared.config.step_interval_ms }),
        );
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            shared: Arc::new(shared),
        })
    }

    /// Current state for rendering.
    #[must_use]
    pub fn snapshot(&self) -> SandboxSnapshot {
        self.state.lock().snapshot(&self.shared.config)
    }

    /// Current hypothesis line.
    #[must_use]
    pub fn params(&self) -> LineParams {
        self.state.lock().params
    }

    /// Copy of the point set.
    #[must_use]
    pub fn points(&self) -> PointSet {
        self.state.lock().points.clone()
    }

    /// Current learning rate.
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.state.lock().learning_rate
    }

    /// Training phase.
    #[must_use]
    pub fn phase(&self) -> TrainingPhase {
        self.state.lock().controller.phase()
    }

    /// Returns true while training.
    #[must_use]
    pub fn is_training(&self) -> bool {
        self.state.lock().controller.is_training()
    }

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.shared.config
    }

    /// Sets the slope, clamped to its slider range.
    pub fn set_slope(&self, value: f64) -> bool {
        let Some(value) = self.accept("set_slope", require_finite(value)) else {
            return false;
        };
        self.edit(|state, config| {
            state.params.slope = config.slope_bounds.clamp(value);
        });
        true
    }

    /// Sets the intercept, clamped to its slider range.
    pub fn set_intercept(&self, value: f64) -> bool {
        let Some(value) = self.accept("set_intercept", require_finite(value)) else {
            return false;
        };
        self.edit(|state, config| {
            state.params.intercept = config.intercept_bounds.clamp(value);
        });
        true
    }

    /// Adds a point; non-finite coordinates are ignored.
    pub fn add_point(&self, x: f64, y: f64) -> bool {
        let parsed = require_finite(x).and_then(|x| require_finite(y).map(|y| Point::new(x, y)));
        let Some(point) = self.accept("add_point", parsed) else {
            return false;
        };
        self.push_point(point)
    }

    /// Adds a point typed into free-text fields; unparseable text is ignored.
    pub fn add_point_text(&self, x: &str, y: &str) -> bool {
        let parsed =
            parse_coordinate(x).and_then(|x| parse_coordinate(y).map(|y| Point::new(x, y)));
        let Some(point) = self.accept("add_point", parsed) else {
            return false;
        };
        self.push_point(point)
    }

    /// Adds a noisy point near `y = x + offset` and returns it.
    pub fn add_random_point(&self) -> Point {
        self.edit(|state, config| {
            let point = state.random_point(config);
            state.points.push(point);
            point
        })
    }

    /// Removes the first point equal to `point`. Absent points are a no-op.
    pub fn remove_point(&self, point: &Point) -> bool {
        self.try_edit(|state, _| state.points.remove(point).then_some(()))
            .is_some()
    }

    /// Replaces the point set wholesale; rejected if any point is non-finite.
    pub fn load_points(&self, points: PointSet) -> bool {
        if let Some(bad) = points.iter().find(|p| !p.is_finite()) {
            let value = if bad.x.is_finite() { bad.y } else { bad.x };
            self.reject("load_points", &InputError::NotFinite(value));
            return false;
        }
        self.edit(move |state, _| state.points = points);
        true
    }

    /// Empties the point set and zeroes the line.
    pub fn clear_all(&self) {
        self.edit(|state, _| {
            state.points.clear();
            state.params = LineParams::ZERO;
        });
    }

    /// Restores the seed points and the default line.
    pub fn reset_to_default(&self) {
        self.edit(|state, config| {
            state.points = PointSet::seed();
            state.params = config.default_line();
        });
    }

    /// Sets the learning rate, clamped to its slider range. Training continues.
    pub fn set_learning_rate(&self, value: f64) -> bool {
        let Some(value) = self.accept("set_learning_rate", require_finite(value)) else {
            return false;
        };
        let snapshot = {
            let mut state = self.state.lock();
            state.learning_rate = self.shared.config.learning_rate_bounds.clamp(value);
            state.snapshot(&self.shared.config)
        };
        self.shared.publish(&snapshot);
        true
    }

    /// Idle -> Training. Returns false if already training.
    pub fn start_training(&self) -> bool {
        let snapshot = {
            let mut state = self.state.lock();
            let weak = Arc::downgrade(&self.state);
            let shared = Arc::clone(&self.shared);
            let started = state.controller.start(move |generation| -> Tick {
                Box::new(move || run_tick(&weak, &shared, generation))
            });
            if !started {
                return false;
            }
            state.snapshot(&self.shared.config)
        };
        let payload = json!({
            "learning_rate": snapshot.learning_rate,
            "points": snapshot.points.len(),
            "loss": snapshot.loss,
        });
        self.shared
            .log(LogLevel::Info, TRAINING_STARTED_EVENT, payload.clone());
        self.shared.event(TRAINING_STARTED_EVENT, payload);
        self.shared.publish(&snapshot);
        true
    }

    /// Training -> Idle. No tick applies after this returns.
    pub fn stop_training(&self) -> bool {
        let snapshot = {
            let mut state = self.state.lock();
            if !state.controller.stop() {
                return false;
            }
            state.snapshot(&self.shared.config)
        };
        self.shared.stopped(StopReason::Requested, &snapshot);
        self.shared.publish(&snapshot);
        true
    }

    fn push_point(&self, point: Point) -> bool {
        self.edit(|state, _| state.points.push(point));
        true
    }

    /// Applies a manual edit under the lock, stopping training first.
    fn edit<R>(&self, apply: impl FnOnce(&mut SandboxState, &SandboxConfig) -> R) -> R {
        let (result, stopped, snapshot) = {
            let mut state = self.state.lock();
            let result = apply(&mut *state, &self.shared.config);
            let stopped = state.controller.stop();
            (result, stopped, state.snapshot(&self.shared.config))
        };
        self.settle_edit(stopped, &snapshot);
        result
    }

    /// Like [`Self::edit`], but `None` from `apply` means nothing changed:
    /// training keeps running and nothing is published.
    fn try_edit<R>(
        &self,
        apply: impl FnOnce(&mut SandboxState, &SandboxConfig) -> Option<R>,
    ) -> Option<R> {
        let (result, stopped, snapshot) = {
            let mut state = self.state.lock();
            let result = apply(&mut *state, &self.shared.config)?;
            let stopped = state.controller.stop();
            (result, stopped, state.snapshot(&self.shared.config))
        };
        self.settle_edit(stopped, &snapshot);
        Some(result)
    }

    fn settle_edit(&self, stopped: bool, snapshot: &SandboxSnapshot) {
        if stopped {
            self.shared.stopped(StopReason::ManualEdit, snapshot);
        }
        self.shared.publish(snapshot);
    }

    fn accept<T>(&self, action: &str, input: Result<T, InputError>) -> Option<T> {
        match input {
            Ok(value) => Some(value),
            Err(err) => {
                self.reject(action, &err);
                None
            }
        }
    }

    fn reject(&self, action: &str, err: &InputError) {
        self.shared.log(
            LogLevel::Debug,
            "input.rejected",
            json!({ "action": action, "reason": err.to_string() }),
        );
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        let snapshot = {
            let mut state = self.state.lock();
            if !state.controller.stop() {
                return;
            }
            state.snapshot(&self.shared.config)
        };
        self.shared.stopped(StopReason::Teardown, &snapshot);
    }
}
