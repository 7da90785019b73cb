//! Environment variables the driver recognises.
//!
//! GitLab Runner prefixes job variables with `CUSTOM_ENV_`; everything else
//! comes from the runner manager's own application environment.

use std::collections::HashMap;
use std::fmt;

pub const JOB_RESPONSE_FILE: &str = "JOB_RESPONSE_FILE";
pub const VCAP_APPLICATION: &str = "VCAP_APPLICATION";
pub const VCAP_SERVICES: &str = "VCAP_SERVICES";
pub const PROXY_CREDENTIAL_INSTANCE: &str = "PROXY_CREDENTIAL_INSTANCE";
pub const PROXY_AUTH_FILE: &str = "PROXY_AUTH_FILE";
pub const CI_JOB_ID: &str = "CUSTOM_ENV_CI_JOB_ID";
pub const CI_RUNNER_ID: &str = "CUSTOM_ENV_CI_RUNNER_ID";
pub const CI_PROJECT_ID: &str = "CUSTOM_ENV_CI_PROJECT_ID";
pub const CI_CONCURRENT_PROJECT_ID: &str = "CUSTOM_ENV_CI_CONCURRENT_PROJECT_ID";
pub const CI_REGISTRY_USER: &str = "CUSTOM_ENV_CI_REGISTRY_USER";
pub const CI_REGISTRY_PASSWORD: &str = "CUSTOM_ENV_CI_REGISTRY_PASSWORD";
pub const DOCKER_HUB_USER: &str = "DOCKER_HUB_USER";
pub const DOCKER_HUB_TOKEN: &str = "DOCKER_HUB_TOKEN";
pub const WORKER_MEMORY: &str = "WORKER_MEMORY";
pub const WORKER_DISK_SIZE: &str = "WORKER_DISK_SIZE";

/// Every key [`JobEnv`] reads.
pub const RECOGNISED: &[&str] = &[
    JOB_RESPONSE_FILE,
    VCAP_APPLICATION,
    VCAP_SERVICES,
    PROXY_CREDENTIAL_INSTANCE,
    PROXY_AUTH_FILE,
    CI_JOB_ID,
    CI_RUNNER_ID,
    CI_PROJECT_ID,
    CI_CONCURRENT_PROJECT_ID,
    CI_REGISTRY_USER,
    CI_REGISTRY_PASSWORD,
    DOCKER_HUB_USER,
    DOCKER_HUB_TOKEN,
    WORKER_MEMORY,
    WORKER_DISK_SIZE,
];

/// Raw string settings taken from the environment. Unset means empty.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct JobEnv {
    pub job_response_file: String,
    pub vcap_application: String,
    pub vcap_services: String,
    pub egress_service_name: String,
    pub proxy_auth_file: String,

    // Combined into the container ID. Some are in the job response too, but
    // several only exist in `.variables`, so all come from the environment.
    pub job_id: String,
    pub runner_id: String,
    pub project_id: String,
    pub concurrent_project_id: String,

    pub ci_registry_user: String,
    pub ci_registry_pass: String,
    pub docker_hub_user: String,
    pub docker_hub_token: String,

    pub worker_memory: String,
    pub worker_disk_size: String,
}

impl JobEnv {
    /// Read every recognised key through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).unwrap_or_default();

        Self {
            job_response_file: var(JOB_RESPONSE_FILE),
            vcap_application: var(VCAP_APPLICATION),
            vcap_services: var(VCAP_SERVICES),
            egress_service_name: var(PROXY_CREDENTIAL_INSTANCE),
            proxy_auth_file: var(PROXY_AUTH_FILE),
            job_id: var(CI_JOB_ID),
            runner_id: var(CI_RUNNER_ID),
            project_id: var(CI_PROJECT_ID),
            concurrent_project_id: var(CI_CONCURRENT_PROJECT_ID),
            ci_registry_user: var(CI_REGISTRY_USER),
            ci_registry_pass: var(CI_REGISTRY_PASSWORD),
            docker_hub_user: var(DOCKER_HUB_USER),
            docker_hub_token: var(DOCKER_HUB_TOKEN),
            worker_memory: var(WORKER_MEMORY),
            worker_disk_size: var(WORKER_DISK_SIZE),
        }
    }

    pub fn from_process_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(map: &HashMap<String, String>) -> Self {
        Self::from_lookup(|key| map.get(key).cloned())
    }

    /// Unique per concurrently running job slot.
    pub fn container_id(&self) -> String {
        format!(
            "glrw-p{}-c{}-j{}",
            self.project_id, self.concurrent_project_id, self.job_id
        )
    }
}

impl fmt::Debug for JobEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobEnv")
            .field("job_response_file", &self.job_response_file)
            .field("egress_service_name", &self.egress_service_name)
            .field("proxy_auth_file", &self.proxy_auth_file)
            .field("job_id", &self.job_id)
            .field("runner_id", &self.runner_id)
            .field("project_id", &self.project_id)
            .field("concurrent_project_id", &self.concurrent_project_id)
            .field("ci_registry_user", &self.ci_registry_user)
            .field("docker_hub_user", &self.docker_hub_user)
            .field("worker_memory", &self.worker_memory)
            .field("worker_disk_size", &self.worker_disk_size)
            .finish_non_exhaustive()
    }
}
