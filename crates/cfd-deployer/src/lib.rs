//! Platform adapters for the Cloud Foundry CI driver.
//!
//! [`CloudFoundryApi`] implements [`cfd_core::PlatformApi`] against the
//! Cloud Controller v3 API and the UAA.

pub mod cloudfoundry;
pub mod resources;

pub use cloudfoundry::CloudFoundryApi;
