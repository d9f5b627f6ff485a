#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! LRLab regression core: loss, closed-form fit, gradient descent, and the timed sandbox session.

/// Points, point sets, and line parameters.
#[path = "../point.rs"]
pub mod point;

/// Mean squared error.
#[path = "../loss.rs"]
pub mod loss;

/// Ordinary least squares.
#[path = "../fit.rs"]
pub mod fit;

/// Gradients and single descent steps.
#[path = "../gradient.rs"]
pub mod gradient;

/// Repeating timers: tokio-backed and virtual.
#[path = "../scheduler.rs"]
pub mod scheduler;

/// Idle/Training state machine.
#[path = "../controller.rs"]
pub mod controller;

/// Sandbox configuration.
#[path = "../config.rs"]
pub mod config;

/// Telemetry helpers for logging/event emission.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// Learner input validation.
#[path = "../input.rs"]
pub mod input;

/// Chart geometry.
#[path = "../plot.rs"]
pub mod plot;

/// Lesson catalog.
#[path = "../curriculum.rs"]
pub mod curriculum;

/// Sandbox session entry point.
#[path = "../main.rs"]
pub mod sandbox;

pub use config::{Bounds, RandomPointConfig, SandboxConfig};
pub use controller::{TrainingController, TrainingPhase};
pub use curriculum::{Lesson, LessonId, LESSONS};
pub use fit::{best_fit, try_best_fit};
pub use gradient::{gradient_step, gradients, Gradients};
pub use input::InputError;
pub use loss::mean_squared_error;
pub use plot::{LineSegment, Residual};
pub use point::{LineParams, Point, PointSet};
pub use sandbox::{Sandbox, SandboxSnapshot, StopReason};
pub use scheduler::{ManualScheduler, Scheduler, Tick, TimerHandle, TokioScheduler};
pub use telemetry::{SandboxTelemetry, SandboxTelemetryBuilder};
