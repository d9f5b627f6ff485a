use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lrlab_event_bus::FileEventPublisher;
use lrlab_logging::{JsonLogger, LogSink};
use lrlab_regression::{
    mean_squared_error, try_best_fit, LineParams, ManualScheduler, PointSet, Sandbox,
    SandboxConfig, SandboxSnapshot, SandboxTelemetry, Scheduler, TokioScheduler, LESSONS,
};
use lrlab_tutor::{GeminiClient, LoopbackTutorClient, TutorClient, TutorConfig, TutorSession};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::runtime::Runtime;

#[derive(Parser, Debug)]
#[command(name = "lrlab", version, about = "Linear regression lab")]
struct Cli {
    /// TOML file with `[sandbox]` and `[tutor]` tables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// JSON-lines diagnostics log.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    /// JSON-lines event log.
    #[arg(long, global = true)]
    event_log: Option<PathBuf>,
    /// Tutor API key.
    #[arg(long, global = true, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Prints the least squares line for a point set.
    Fit {
        /// JSON array of `{"x": .., "y": ..}`; seed points when absent.
        #[arg(long)]
        points: Option<PathBuf>,
    },
    /// Trains in real time for a fixed duration.
    Train {
        #[arg(long, default_value_t = 2_000)]
        duration_ms: u64,
        #[arg(long)]
        learning_rate: Option<f64>,
        #[arg(long)]
        points: Option<PathBuf>,
    },
    /// Runs a fixed number of training steps on a virtual clock.
    Step {
        #[arg(long, default_value_t = 100)]
        count: u32,
        #[arg(long)]
        learning_rate: Option<f64>,
        #[arg(long)]
        points: Option<PathBuf>,
    },
    /// Asks the tutor one question.
    Ask {
        prompt: String,
        /// Answer locally without calling the API.
        #[arg(long)]
        offline: bool,
    },
    /// Lists the lessons.
    Lessons,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LabConfig {
    #[serde(default)]
    sandbox: SandboxConfig,
    #[serde(default)]
    tutor: TutorConfig,
}

impl LabConfig {
    fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("parsing lab config")?;
        config.sandbox.validate()?;
        config.tutor.validate()?;
        Ok(config)
    }

    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("loading {}", path.display()))
    }
}

struct Sinks {
    logger: Option<Arc<JsonLogger>>,
    events: Option<Arc<FileEventPublisher>>,
}

impl Sinks {
    fn open(log_file: Option<&Path>, event_log: Option<&Path>) -> Result<Self> {
        let logger = log_file.map(JsonLogger::new).transpose()?.map(Arc::new);
        let events = event_log
            .map(FileEventPublisher::new)
            .transpose()?
            .map(Arc::new);
        Ok(Self { logger, events })
    }

    fn telemetry(&self) -> Result<Option<SandboxTelemetry>> {
        if self.logger.is_none() && self.events.is_none() {
            return Ok(None);
        }
        let mut builder = SandboxTelemetry::builder("sandbox");
        if let Some(logger) = &self.logger {
            builder = builder.log_sink(logger.clone());
        }
        if let Some(events) = &self.events {
            builder = builder.event_publisher(events.clone());
        }
        builder.build().map(Some)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = LabConfig::load(cli.config.as_deref())?;
    if let Some(key) = cli.api_key {
        config.tutor.api_key = Some(key);
    }
    let sinks = Sinks::open(cli.log_file.as_deref(), cli.event_log.as_deref())?;

    match cli.command {
        Commands::Fit { points } => handle_fit(&load_points(points.as_deref())?),
        Commands::Train {
            duration_ms,
            learning_rate,
            points,
        } => {
            let points = load_points(points.as_deref())?;
            let runtime = Runtime::new().context("starting tokio runtime")?;
            let snapshot = runtime.block_on(async {
                let scheduler = Arc::new(TokioScheduler::new(tokio::runtime::Handle::current()));
                let sandbox = open_sandbox(&config, scheduler, &sinks, points, learning_rate)?;
                sandbox.start_training();
                tokio::time::sleep(Duration::from_millis(duration_ms)).await;
                sandbox.stop_training();
                Ok::<_, anyhow::Error>(sandbox.snapshot())
            })?;
            print_snapshot(&snapshot)
        }
        Commands::Step {
            count,
            learning_rate,
            points,
        } => {
            let points = load_points(points.as_deref())?;
            let clock = ManualScheduler::new();
            let sandbox = open_sandbox(
                &config,
                Arc::new(clock.clone()),
                &sinks,
                points,
                learning_rate,
            )?;
            sandbox.start_training();
            clock.advance(config.sandbox.step_interval() * count);
            sandbox.stop_training();
            print_snapshot(&sandbox.snapshot())
        }
        Commands::Ask { prompt, offline } => {
            let client: Arc<dyn TutorClient> = if offline {
                Arc::new(LoopbackTutorClient)
            } else {
                Arc::new(GeminiClient::new(&config.tutor)?)
            };
            let mut session = TutorSession::new(client, config.tutor.clone());
            if let Some(logger) = &sinks.logger {
                session = session.with_logger(logger.clone() as Arc<dyn LogSink>);
            }
            let runtime = Runtime::new().context("starting tokio runtime")?;
            let reply = runtime.block_on(session.ask(&prompt))?;
            println!("{reply}");
            Ok(())
        }
        Commands::Lessons => {
            for lesson in &LESSONS {
                println!("{:<40} {}", lesson.title, lesson.description);
            }
            Ok(())
        }
    }
}

fn open_sandbox(
    config: &LabConfig,
    scheduler: Arc<dyn Scheduler>,
    sinks: &Sinks,
    points: PointSet,
    learning_rate: Option<f64>,
) -> Result<Sandbox> {
    let sandbox = Sandbox::new(config.sandbox.clone(), scheduler, sinks.telemetry()?)?;
    anyhow::ensure!(sandbox.load_points(points), "points must be finite");
    if let Some(rate) = learning_rate {
        anyhow::ensure!(sandbox.set_learning_rate(rate), "learning rate must be finite");
    }
    Ok(sandbox)
}

fn load_points(path: Option<&Path>) -> Result<PointSet> {
    let Some(path) = path else {
        return Ok(PointSet::seed());
    };
    let raw =
        fs::read_to_string(path).with_context(|| format!("reading points {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing points {}", path.display()))
}

fn handle_fit(points: &PointSet) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&fit_report(points))?);
    Ok(())
}

fn fit_report(points: &PointSet) -> Value {
    let fit = try_best_fit(points);
    let line = fit.unwrap_or(LineParams::ZERO);
    json!({
        "points": points.len(),
        "defined": fit.is_some(),
        "slope": line.slope,
        "intercept": line.intercept,
        "loss": mean_squared_error(line, points),
    })
}

fn print_snapshot(snapshot: &SandboxSnapshot) -> Result<()> {
    let report = json!({
        "slope": snapshot.params.slope,
        "intercept": snapshot.params.intercept,
        "loss": snapshot.loss,
        "best_fit": snapshot.best_fit,
        "best_fit_loss": snapshot.best_fit_loss,
        "learning_rate": snapshot.learning_rate,
        "steps": snapshot.steps,
        "phase": snapshot.phase,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
