//! Application manifests: one per workload (the job container or a service).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::descriptor::{CiVariable, Image};
use crate::{Error, Result};

/// Health check used for every workload; none of them serve HTTP.
pub const HEALTH_CHECK_PROCESS: &str = "process";

/// Images from this registry authenticate with the job's registry token.
pub const CI_REGISTRY_DOMAIN: &str = "registry.gitlab.com";

// Images on a docker.io domain, or with no domain at all (Docker Hub by default).
static DOCKER_HUB_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((registry-\d+|index)?\.?docker\.io/|[^.]*(:|$))").unwrap()
});

/// Everything needed to create one application on the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppManifest {
    /// Workload identity, used as the application name.
    pub name: String,
    pub env: HashMap<String, String>,
    pub no_route: bool,
    pub docker: DockerSpec,
    pub process: ProcessSpec,
    pub org_name: String,
    pub space_name: String,
}

/// Image reference and optional registry login.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DockerSpec {
    pub image: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl fmt::Debug for DockerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DockerSpec")
            .field("image", &self.image)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The single process each workload runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    /// Entrypoint followed by command.
    pub command: String,
    pub memory: String,
    pub disk_quota: String,
    pub health_check_type: String,
}

/// A registry login pair.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
}

impl RegistryAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Which login goes with which registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryRouting {
    /// The CI job's own registry token.
    pub ci_registry: RegistryAuth,
    /// Statically configured Docker Hub user/token.
    pub docker_hub: RegistryAuth,
}

impl RegistryRouting {
    /// Pick the login for an image reference, if any.
    ///
    /// Private registries other than the CI registry get nothing: the
    /// domain pattern cannot tell them apart from one another.
    pub fn auth_for(&self, image: &str) -> Option<&RegistryAuth> {
        if image.contains(CI_REGISTRY_DOMAIN) {
            Some(&self.ci_registry)
        } else if DOCKER_HUB_REGEX.is_match(image) {
            Some(&self.docker_hub)
        } else {
            None
        }
    }
}

impl AppManifest {
    /// Base manifest: no public route, process health check, no image yet.
    pub fn new(
        name: impl Into<String>,
        org_name: impl Into<String>,
        space_name: impl Into<String>,
        memory: impl Into<String>,
        disk_quota: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            env: HashMap::new(),
            no_route: true,
            docker: DockerSpec::default(),
            process: ProcessSpec {
                command: String::new(),
                memory: memory.into(),
                disk_quota: disk_quota.into(),
                health_check_type: HEALTH_CHECK_PROCESS.to_string(),
            },
            org_name: org_name.into(),
            space_name: space_name.into(),
        }
    }

    /// Set image, process command and registry login from an image reference.
    /// Does nothing for an unnamed image.
    pub fn apply_image(&mut self, image: &Image, routing: &RegistryRouting) {
        if image.name.is_empty() {
            return;
        }

        self.docker.image = image.name.clone();

        if let Some(auth) = routing.auth_for(&image.name) {
            self.docker.username = Some(auth.username.clone());
            self.docker.password = Some(auth.password.clone());
        }

        self.process.command = join_command(&image.entrypoint, &image.command);
    }

    /// Flatten variables into the environment; later keys overwrite earlier ones.
    pub fn apply_variables<'a>(&mut self, vars: impl IntoIterator<Item = &'a CiVariable>) {
        for var in vars {
            self.env.insert(var.key.clone(), var.value.clone());
        }
    }

    /// Name, org and space must all be set before a push.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidManifest(
                "manifest name must be defined".to_string(),
            ));
        }
        if self.org_name.is_empty() || self.space_name.is_empty() {
            return Err(Error::InvalidManifest(format!(
                "manifest {} must have org and space names",
                self.name
            )));
        }
        Ok(())
    }
}

/// Entrypoint then command, trimmed, empties dropped, space separated.
pub fn join_command(entrypoint: &[String], command: &[String]) -> String {
    entrypoint
        .iter()
        .chain(command)
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
