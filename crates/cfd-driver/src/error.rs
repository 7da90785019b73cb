//! Stage errors.

use cfd_config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("error creating stage: {0}")]
    Config(#[from] ConfigError),

    #[error("{context}: {source}")]
    Platform {
        context: String,
        #[source]
        source: cfd_core::Error,
    },

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ssh exited with {status}: {stderr}")]
    Ssh { status: String, stderr: String },

    #[error("job app {0} not found")]
    JobAppMissing(String),

    #[error("error reading script {}: {source}", .path.display())]
    ReadScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{sub_stage} failed: {stderr}")]
    Script { sub_stage: String, stderr: String },
}

impl StageError {
    pub fn platform(context: impl Into<String>, source: cfd_core::Error) -> Self {
        Self::Platform {
            context: context.into(),
            source,
        }
    }

    /// The job's own script failed, as opposed to the driver or platform.
    pub fn is_build_failure(&self) -> bool {
        matches!(self, Self::Script { .. })
    }
}

pub type StageResult<T> = std::result::Result<T, StageError>;
