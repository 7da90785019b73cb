//! GitLab custom executor stages for the Cloud Foundry CI driver.
//!
//! A [`Stage`] owns a connected platform client and the job's configuration
//! and implements `prepare`, `run` and `cleanup`. The `config` stage needs
//! no platform connection and is served by [`ExecutorConfig`].

pub mod error;
pub mod executor;
pub mod settings;
pub mod ssh;
pub mod stage;

pub use error::{StageError, StageResult};
pub use executor::ExecutorConfig;
pub use settings::DriverSettings;
pub use stage::Stage;
