//! Output of the custom executor `config` stage.

use cfd_config::JobConfig;
use serde::Serialize;

pub const DRIVER_NAME: &str = "cfd";
pub const DRIVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// JSON GitLab Runner reads from `config_exec` stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutorConfig {
    pub driver: DriverInfo,
    pub hostname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverInfo {
    pub name: String,
    pub version: String,
}

impl ExecutorConfig {
    pub fn for_job(config: &JobConfig) -> Self {
        Self {
            driver: DriverInfo {
                name: DRIVER_NAME.to_string(),
                version: DRIVER_VERSION.to_string(),
            },
            hostname: config.container_id.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfd_config::JobEnv;
    use std::collections::HashMap;

    #[test]
    fn test_config_json_shape() {
        let env = JobEnv::from_map(&HashMap::from([
            ("CUSTOM_ENV_CI_PROJECT_ID".to_string(), "7".to_string()),
            ("CUSTOM_ENV_CI_CONCURRENT_PROJECT_ID".to_string(), "1".to_string()),
            ("CUSTOM_ENV_CI_JOB_ID".to_string(), "42".to_string()),
        ]));
        let job = JobConfig::assemble(env).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&ExecutorConfig::for_job(&job).to_json().unwrap()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "driver": { "name": "cfd", "version": env!("CARGO_PKG_VERSION") },
                "hostname": "glrw-p7-c1-j42",
            })
        );
    }
}
