use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::point::LineParams;

/// Closed interval used to clamp learner input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Lower bound (inclusive).
    pub min: f64,
    /// Upper bound (inclusive).
    pub max: f64,
}

impl Bounds {
    /// Creates bounds.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamps `value` into the interval.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Returns true when `value` lies inside the interval.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            bail!("{name}: bounds must be finite");
        }
        if self.min > self.max {
            bail!("{name}: min {} exceeds max {}", self.min, self.max);
        }
        Ok(())
    }
}

/// How `add_random_point` draws a new observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomPointConfig {
    /// Smallest x drawn.
    #[serde(default = "default_random_x_min")]
    pub x_min: f64,
    /// Width of the x range; x is `floor(u * x_span) + x_min`.
    #[serde(default = "default_random_x_span")]
    pub x_span: f64,
    /// Offset added to x before noise.
    #[serde(default = "default_random_y_offset")]
    pub y_offset: f64,
    /// Total width of the uniform noise, centred on zero.
    #[serde(default = "default_random_noise_span")]
    pub noise_span: f64,
    /// Range y is clamped into.
    #[serde(default = "default_random_y_clamp")]
    pub y_clamp: Bounds,
}

impl Default for RandomPointConfig {
    fn default() -> Self {
        Self {
            x_min: default_random_x_min(),
            x_span: default_random_x_span(),
            y_offset: default_random_y_offset(),
            noise_span: default_random_noise_span(),
            y_clamp: default_random_y_clamp(),
        }
    }
}

/// Sandbox tuning: training cadence, defaults, and input bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Milliseconds between gradient steps while training.
    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,
    /// Slope restored by reset.
    #[serde(default = "default_slope")]
    pub default_slope: f64,
    /// Intercept restored by reset.
    #[serde(default = "default_intercept")]
    pub default_intercept: f64,
    /// Learning rate a new session starts with.
    #[serde(default = "default_learning_rate")]
    pub default_learning_rate: f64,
    /// Range of the slope slider.
    #[serde(default = "default_slope_bounds")]
    pub slope_bounds: Bounds,
    /// Range of the intercept slider.
    #[serde(default = "default_intercept_bounds")]
    pub intercept_bounds: Bounds,
    /// Range of the learning-rate slider.
    #[serde(default = "default_learning_rate_bounds")]
    pub learning_rate_bounds: Bounds,
    /// x range the hypothesis and best-fit lines are drawn over.
    #[serde(default = "default_plot_x")]
    pub plot_x: Bounds,
    /// Seed for random points; entropy when absent.
    #[serde(default)]
    pub rng_seed: Option<u64>,
    /// Random point generation.
    #[serde(default)]
    pub random_point: RandomPointConfig,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            step_interval_ms: default_step_interval_ms(),
            default_slope: default_slope(),
            default_intercept: default_intercept(),
            default_learning_rate: default_learning_rate(),
            slope_bounds: default_slope_bounds(),
            intercept_bounds: default_intercept_bounds(),
            learning_rate_bounds: default_learning_rate_bounds(),
            plot_x: default_plot_x(),
            rng_seed: None,
            random_point: RandomPointConfig::default(),
        }
    }
}

impl SandboxConfig {
    /// Parses and validates a TOML document with sandbox keys at the top level.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("parsing sandbox config")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading sandbox config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("loading {}", path.display()))
    }

    /// Rejects settings the sandbox cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.step_interval_ms == 0 {
            bail!("step_interval_ms must be positive");
        }
        self.slope_bounds.validate("slope_bounds")?;
        self.intercept_bounds.validate("intercept_bounds")?;
        self.learning_rate_bounds.validate("learning_rate_bounds")?;
        self.plot_x.validate("plot_x")?;
        self.random_point.y_clamp.validate("random_point.y_clamp")?;
        if self.learning_rate_bounds.min <= 0.0 {
            bail!("learning_rate_bounds.min must be positive");
        }
        if !self.learning_rate_bounds.contains(self.default_learning_rate) {
            bail!(
                "default_learning_rate {} outside [{}, {}]",
                self.default_learning_rate,
                self.learning_rate_bounds.min,
                self.learning_rate_bounds.max
            );
        }
        if !self.default_slope.is_finite() || !self.default_intercept.is_finite() {
            bail!("default line must be finite");
        }
        let rp = &self.random_point;
        if !(rp.x_span > 0.0 && rp.x_span.is_finite()) {
            bail!("random_point.x_span must be positive");
        }
        if !(rp.noise_span >= 0.0 && rp.noise_span.is_finite()) {
            bail!("random_point.noise_span must be non-negative");
        }
        if !rp.x_min.is_finite() || !rp.y_offset.is_finite() {
            bail!("random_point offsets must be finite");
        }
        Ok(())
    }

    /// Interval between training ticks.
    #[must_use]
    pub const fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms)
    }

    /// Line restored by reset.
    #[must_use]
    pub const fn default_line(&self) -> LineParams {
        LineParams::new(self.default_slope, self.default_intercept)
    }
}

const fn default_step_interval_ms() -> u64 {
    20
}

const fn default_slope() -> f64 {
    0.5
}

const fn default_intercept() -> f64 {
    10.0
}

const fn default_learning_rate() -> f64 {
    0.0001
}

const fn default_slope_bounds() -> Bounds {
    Bounds::new(-2.0, 3.0)
}

const fn default_intercept_bounds() -> Bounds {
    Bounds::new(-20.0, 100.0)
}

const fn default_learning_rate_bounds() -> Bounds {
    Bounds::new(0.000_01, 0.0005)
}

const fn default_plot_x() -> Bounds {
    Bounds::new(0.0, 100.0)
}

const fn default_random_x_min() -> f64 {
    5.0
}

const fn default_random_x_span() -> f64 {
    90.0
}

const fn default_random_y_offset() -> f64 {
    10.0
}

const fn default_random_noise_span() -> f64 {
    30.0
}

const fn default_random_y_clamp() -> Bounds {
    Bounds::new(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_valid() {
        let config = SandboxConfig::default();
        config.validate().unwrap();
        assert_eq!(config.step_interval(), Duration::from_millis(20));
        assert_eq!(config.default_line(), LineParams::new(0.5, 10.0));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = SandboxConfig::from_toml_str(
            r#"
            step_interval_ms = 50
            rng_seed = 7

            [slope_bounds]
            min = -1.0
            max = 1.0
            "#,
        )
        .unwrap();
        assert_eq!(config.step_interval_ms, 50);
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.slope_bounds, Bounds::new(-1.0, 1.0));
        assert_eq!(config.intercept_bounds, default_intercept_bounds());
        assert_eq!(config.random_point, RandomPointConfig::default());
    }

    #[test]
    fn rejects_inverted_bounds_and_zero_interval() {
        let err = SandboxConfig::from_toml_str("step_interval_ms = 0").unwrap_err();
        assert!(err.to_string().contains("step_interval_ms"));
        let err = SandboxConfig::from_toml_str("intercept_bounds = { min = 5.0, max = 1.0 }")
            .unwrap_err();
        assert!(format!("{err:#}").contains("intercept_bounds"));
    }

    #[test]
    fn rejects_learning_rate_outside_bounds() {
        let err = SandboxConfig::from_toml_str("default_learning_rate = 0.5").unwrap_err();
        assert!(err.to_string().contains("default_learning_rate"));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sandbox.toml");
        fs::write(&path, "default_slope = 1.5\n").unwrap();
        let config = SandboxConfig::load(&path).unwrap();
        assert_eq!(config.default_slope, 1.5);
        assert!(SandboxConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
