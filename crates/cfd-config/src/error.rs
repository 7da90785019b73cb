//! Job configuration errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading job response file {}: {source}", .path.display())]
    ReadDescriptor {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error parsing job response file {}: {source}", .path.display())]
    MalformedDescriptor {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("error parsing VCAP_APPLICATION: {0}")]
    MalformedContext(#[source] serde_json::Error),

    #[error("error parsing service bindings: {0}")]
    Bindings(#[source] cfd_core::Error),

    #[error("error writing egress proxy auth file {}: {source}", .path.display())]
    EgressAuthFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
