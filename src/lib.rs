//! Fixed-step symplectic simulation of point bodies and oscillator chains, with collision
//! detection against designated targets and a batch scheduler that spreads independent test
//! bodies over a worker pool.

pub mod body;
pub mod c_api;
pub mod collisions;
pub mod config;
pub mod diagnostics;
pub mod ensemble;
pub mod error;
pub mod forces;
pub mod integrator;
pub mod scheduler;
pub mod simulation;
pub mod trajectory;
pub mod utils;

pub use body::Body;
pub use collisions::{CollisionRecord, Targets};
pub use config::{SimulationConfig, StepPolicy};
pub use error::{ConfigError, Result, SimError};
pub use forces::{ChainParams, ForceLaw, GravityParams, SpringParams};
pub use integrator::IntegrationOrder;
pub use simulation::Simulation;
pub use trajectory::Trajectory;
