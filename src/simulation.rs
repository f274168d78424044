use crate::{
    body::Body,
    collisions::{CollisionDetector, CollisionRecord},
    config::{SimulationConfig, StepPolicy},
    diagnostics,
    ensemble::Ensemble,
    error::{ConfigError, Result, SimError},
    forces::{ChainParams, ForceLaw},
    integrator::Integrator,
    scheduler::{Job, Scheduler},
};

/// A finished sub-batch together with the collisions it recorded.
type BatchOutcome = (Ensemble, Vec<CollisionRecord>);

/// Relative slack allowed when checking that a time span is a whole number of steps.
const STEP_TOLERANCE: f64 = 1e-9;

/// One simulation run: the body store plus everything needed to advance it.
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    /// Collection of all bodies, with massive and small views.
    ensemble: Ensemble,
    detector: CollisionDetector,
    /// Distributes sub-batches across the worker pool.
    scheduler: Scheduler,
    /// Steps taken since the last reset.
    total_steps: u64,
}

impl Simulation {
    /// Builds an empty simulation. Fails without creating anything when the configuration
    /// is invalid.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let detector = CollisionDetector::new(config.collision.radius, config.resolved_targets())?;
        let scheduler = Scheduler::new(&config.scheduler)?;
        log::info!(
            "Created {} simulation (dt = {}, order {}, {} workers)",
            config.force_law.name(),
            config.dt,
            u8::from(config.order),
            scheduler.workers()
        );

        Ok(Self {
            config,
            ensemble: Ensemble::new(),
            detector,
            scheduler,
            total_steps: 0,
        })
    }

    /// Builds a simulation with default settings for everything except `dt` and the law.
    pub fn with_force_law(dt: f64, force_law: ForceLaw) -> Result<Self> {
        Self::new(SimulationConfig::new(dt, force_law))
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn dt(&self) -> f64 {
        self.config.dt
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Simulation time elapsed since the last reset.
    pub fn elapsed_time(&self) -> f64 {
        self.total_steps as f64 * self.config.dt
    }

    /// Removes every body and rewinds the clock.
    pub fn reset(&mut self) {
        self.ensemble.clear();
        self.total_steps = 0;
        log::debug!("Simulation reset");
    }

    /// Adds a body and returns its index in the unified list. Massive bodies (mass > 0)
    /// and small bodies are told apart here.
    pub fn add_body(&mut self, body: Body) -> Result<usize> {
        body.validate()?;
        Ok(self.ensemble.push(body))
    }

    pub fn add_bodies(&mut self, bodies: impl IntoIterator<Item = Body>) -> Result<()> {
        for body in bodies {
            self.add_body(body)?;
        }
        Ok(())
    }

    /// Read-only view of every body, in insertion order.
    pub fn bodies(&self) -> &[Body] {
        self.ensemble.bodies()
    }

    pub fn massive_bodies(&self) -> impl Iterator<Item = &Body> {
        self.ensemble.massive()
    }

    /// Small bodies in the order collision records index them.
    pub fn small_bodies(&self) -> impl Iterator<Item = &Body> {
        self.ensemble.small()
    }

    pub fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }

    /// Converts a time span into a step count according to the step policy.
    pub fn steps_for(&self, time_units: f64) -> Result<u64> {
        let dt = self.config.dt;
        let inexact = || SimError::InexactTimeSpan { time_units, dt };
        if !(time_units.is_finite() && time_units >= 0.0) {
            return Err(inexact());
        }

        let ratio = time_units / dt;
        let steps = ratio.round();
        match self.config.step_policy {
            StepPolicy::Strict => {
                if (ratio - steps).abs() > STEP_TOLERANCE * ratio.max(1.0) {
                    return Err(inexact());
                }
            }
            StepPolicy::Round => {
                if ratio != steps {
                    log::warn!("Rounding {time_units} time units to {steps} steps of {dt}");
                }
            }
        }
        Ok(steps as u64)
    }

    /// Advances by `time_units` of simulation time and returns the collisions it produced.
    pub fn advance(&mut self, time_units: f64) -> Result<Vec<CollisionRecord>> {
        let steps = self.steps_for(time_units)?;
        self.advance_steps(steps)
    }

    /// Advances by a whole number of steps.
    ///
    /// Sub-batches run in parallel on clones of the store; the store is only written once
    /// every batch has finished. On any error the store is left exactly as it was.
    pub fn advance_steps(&mut self, steps: u64) -> Result<Vec<CollisionRecord>> {
        if self.scheduler.is_shut_down() {
            return Err(SimError::ShutDown);
        }
        if steps == 0 {
            return Ok(Vec::new());
        }

        let ranges = if self.config.force_law.is_coupled() {
            vec![0..self.ensemble.small_len()]
        } else {
            self.scheduler.partition(self.ensemble.small_len())
        };

        let first_step = self.total_steps;
        let jobs: Vec<Job<BatchOutcome>> = ranges
            .iter()
            .map(|range| -> Result<Job<BatchOutcome>> {
                let mut batch = if self.config.force_law.is_coupled() {
                    self.ensemble.clone()
                } else {
                    self.ensemble.sub_batch(range.clone())
                };
                let law = self.config.force_law.clone();
                let detector = self.detector.clone();
                let mut integrator = Integrator::new(self.config.dt, self.config.order)?;
                let job: Job<BatchOutcome> = Box::new(move || -> Result<BatchOutcome> {
                    let records = integrator.run(&mut batch, &law, &detector, first_step, steps)?;
                    Ok((batch, records))
                });
                Ok(job)
            })
            .collect::<Result<_>>()?;

        log::debug!(
            "Advancing {} bodies by {steps} steps in {} batches",
            self.ensemble.len(),
            jobs.len()
        );
        let results = self.scheduler.run(jobs)?;

        let mut collisions = Vec::new();
        for (k, (range, (batch, records))) in ranges.iter().zip(results).enumerate() {
            self.ensemble.absorb(&batch, range.start, k == 0);
            collisions.extend(records.into_iter().map(|mut record| {
                record.body_index += range.start;
                record
            }));
        }
        collisions.sort_by(|a, b| {
            a.collision_time
                .total_cmp(&b.collision_time)
                .then(a.body_index.cmp(&b.body_index))
        });

        self.total_steps += steps;
        Ok(collisions)
    }

    fn chain_params(&self) -> Result<&ChainParams> {
        match &self.config.force_law {
            ForceLaw::Chain(params) => Ok(params),
            _ => Err(ConfigError::NotChain.into()),
        }
    }

    /// Energy of every oscillator on the chain.
    pub fn chain_energies(&self) -> Result<Vec<f64>> {
        let params = self.chain_params()?;
        Ok(diagnostics::chain_energies(self.bodies(), params.epsilon))
    }

    pub fn chain_total_energy(&self) -> Result<f64> {
        let params = self.chain_params()?;
        Ok(diagnostics::chain_total_energy(self.bodies(), params.epsilon))
    }

    /// `[y.., vy..]` for the whole chain.
    pub fn phase_state(&self) -> Result<Vec<f64>> {
        self.chain_params()?;
        Ok(diagnostics::phase_state(self.bodies()))
    }

    pub fn set_phase_state(&mut self, state: &[f64]) -> Result<()> {
        self.chain_params()?;
        diagnostics::load_phase_state(self.ensemble.bodies_mut(), state)
    }

    /// Releases the worker pool. The simulation can still be inspected but not advanced.
    pub fn shutdown(&mut self) {
        if !self.scheduler.is_shut_down() {
            self.scheduler.shutdown();
            log::info!("Simulation shut down after {} steps", self.total_steps);
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.scheduler.is_shut_down()
    }
}
