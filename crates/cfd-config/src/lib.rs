//! Job configuration assembly for the Cloud Foundry CI driver.
//!
//! This crate handles:
//! - The table of recognised environment variables
//! - Parsing the job response file, `VCAP_APPLICATION` and `VCAP_SERVICES`
//! - Egress proxy credentials
//! - Building one manifest per workload

pub mod context;
pub mod egress;
pub mod env;
pub mod error;
pub mod job;

pub use context::PlatformContext;
pub use egress::EgressProxyConfig;
pub use env::JobEnv;
pub use error::{ConfigError, ConfigResult};
pub use job::{JobConfig, JobService};
