//! Configuration for a simulation run, loadable from YAML.
//!
//! Every field has a default, so a scenario file only needs to name what it changes:
//!
//! ```yaml
//! dt: 0.001
//! order: 4                 # 1, 2 or 4
//! step_policy: strict      # or "round"
//! force_law:
//!   kind: gravity          # gravity | spring | chain
//!   gravitational_constant: 1.0
//! collision:
//!   radius: 0.02236
//!   targets:
//!     kind: massive        # massive | points | none
//! scheduler:
//!   workers: 8             # omitted -> one per available core
//!   batch_size: 4096       # omitted -> one batch per worker
//!   task_timeout_secs: 300
//! ```
//!
//! An unknown `kind` or an unsupported `order` is rejected while parsing.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collisions::{DEFAULT_COLLISION_RADIUS, Targets};
use crate::error::{ConfigError, Result};
use crate::forces::ForceLaw;
use crate::integrator::IntegrationOrder;

/// How `advance(time_units)` turns a time span into whole steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPolicy {
    /// Reject spans that are not a whole number of steps.
    #[default]
    Strict,
    /// Round to the nearest whole number of steps.
    Round,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    pub radius: f64,
    /// `None` picks the force law's natural targets.
    pub targets: Option<Targets>,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            radius: DEFAULT_COLLISION_RADIUS,
            targets: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker threads; `None` uses one per available core. One or fewer runs inline.
    pub workers: Option<usize>,
    /// Small bodies per task; `None` splits evenly across the workers.
    pub batch_size: Option<usize>,
    /// Upper bound on how long one `advance` waits for its tasks.
    pub task_timeout_secs: Option<f64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: None,
            batch_size: None,
            task_timeout_secs: Some(300.0),
        }
    }
}

impl SchedulerConfig {
    pub fn task_timeout(&self) -> Result<Option<Duration>> {
        match self.task_timeout_secs {
            None => Ok(None),
            Some(secs) if secs.is_finite() && secs > 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
            Some(secs) => Err(ConfigError::InvalidTimeout(secs).into()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixed step size for the lifetime of the simulation.
    pub dt: f64,
    pub order: IntegrationOrder,
    pub step_policy: StepPolicy,
    pub force_law: ForceLaw,
    pub collision: CollisionConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: 0.01,
            order: IntegrationOrder::default(),
            step_policy: StepPolicy::default(),
            force_law: ForceLaw::default(),
            collision: CollisionConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn new(dt: f64, force_law: ForceLaw) -> Self {
        Self {
            dt,
            force_law,
            ..Self::default()
        }
    }

    pub fn with_order(mut self, order: IntegrationOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_step_policy(mut self, policy: StepPolicy) -> Self {
        self.step_policy = policy;
        self
    }

    pub fn with_targets(mut self, targets: Targets) -> Self {
        self.collision.targets = Some(targets);
        self
    }

    pub fn with_collision_radius(mut self, radius: f64) -> Self {
        self.collision.radius = radius;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.scheduler.workers = Some(workers);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.scheduler.batch_size = Some(batch_size);
        self
    }

    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.scheduler.task_timeout_secs = timeout.map(|t| t.as_secs_f64());
        self
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let config: Self = serde_yaml::from_reader(reader).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    /// Loads a scenario file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Collision targets after applying the per-law default.
    pub fn resolved_targets(&self) -> Targets {
        if let Some(targets) = &self.collision.targets {
            return targets.clone();
        }
        match &self.force_law {
            ForceLaw::Gravity(_) => Targets::Massive,
            ForceLaw::Spring(params) => Targets::point(params.anchor[0], params.anchor[1]),
            ForceLaw::Chain(_) => Targets::None,
        }
    }

    /// Checks everything that can be checked before a simulation exists.
    pub fn validate(&self) -> Result<()> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ConfigError::NonPositiveDt(self.dt).into());
        }
        if !(self.collision.radius.is_finite() && self.collision.radius > 0.0) {
            return Err(ConfigError::InvalidRadius(self.collision.radius).into());
        }
        if self.force_law.is_coupled() && self.resolved_targets() != Targets::None {
            return Err(ConfigError::CoupledTargets.into());
        }
        self.scheduler.task_timeout()?;
        Ok(())
    }
}
