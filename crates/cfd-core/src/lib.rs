//! Core domain types and traits for the Cloud Foundry CI driver.
//!
//! This crate contains:
//! - Platform credentials and their resolution
//! - Service binding (`VCAP_SERVICES`) types
//! - Job descriptor types handed over by GitLab Runner
//! - Application manifests and how they are built
//! - The platform capability trait and the client façade over it

pub mod bindings;
pub mod credentials;
pub mod descriptor;
pub mod error;
pub mod manifest;
pub mod network;
pub mod platform;

pub use credentials::{CredentialSource, Credentials, EnvCredentialResolver};
pub use error::{Error, Result};
pub use manifest::AppManifest;
pub use platform::{App, AppState, ClientOptions, PlatformApi, PlatformClient};
