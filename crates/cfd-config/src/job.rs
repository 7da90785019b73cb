//! Job configuration: everything a stage needs to know about the current job.

use cfd_core::bindings::ServiceBindingSet;
use cfd_core::descriptor::{CiVariable, Image, JobDescriptor, ServiceImage};
use cfd_core::manifest::{AppManifest, RegistryAuth, RegistryRouting};
use std::path::Path;
use tracing::{debug, info};

use crate::{ConfigError, ConfigResult, EgressProxyConfig, JobEnv, PlatformContext};

/// The assembled configuration for one job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub env: JobEnv,
    pub descriptor: JobDescriptor,
    pub context: PlatformContext,
    pub bindings: ServiceBindingSet,
    pub egress: EgressProxyConfig,
    pub container_id: String,
    /// Manifest for the job container itself.
    pub manifest: AppManifest,
    pub services: Vec<JobService>,
}

/// A service container declared by the job.
#[derive(Debug, Clone)]
pub struct JobService {
    pub image: Image,
    pub variables: Vec<CiVariable>,
    pub manifest: AppManifest,
    /// Container ID of the job this service belongs to.
    pub job_container_id: String,
}

impl JobService {
    pub fn alias(&self) -> &str {
        &self.image.alias
    }

    /// The workload name, also the platform app name.
    pub fn name(&self) -> &str {
        &self.manifest.name
    }
}

/// App name for a job's service container.
pub fn service_container_id(container_id: &str, alias: &str) -> String {
    format!("{container_id}-svc-{alias}")
}

impl JobConfig {
    /// Assemble from the live process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::assemble(JobEnv::from_process_env())
    }

    /// Assemble from already-read environment settings.
    ///
    /// Stages run in order and the first failure aborts; no partial config
    /// is returned.
    pub fn assemble(env: JobEnv) -> ConfigResult<Self> {
        let descriptor = read_descriptor(&env.job_response_file)?;
        let context = PlatformContext::parse(&env.vcap_application)?;
        let bindings = parse_bindings(&env.vcap_services)?;
        let egress = EgressProxyConfig::from_bindings(
            &bindings,
            &env.egress_service_name,
            &env.proxy_auth_file,
        )?;

        let container_id = env.container_id();
        let routing = RegistryRouting {
            ci_registry: RegistryAuth::new(&env.ci_registry_user, &env.ci_registry_pass),
            docker_hub: RegistryAuth::new(&env.docker_hub_user, &env.docker_hub_token),
        };

        let base_manifest = |name: String| {
            AppManifest::new(
                name,
                &context.organization_name,
                &context.space_name,
                &env.worker_memory,
                &env.worker_disk_size,
            )
        };

        let mut manifest = base_manifest(container_id.clone());
        manifest.apply_variables(&descriptor.variables);
        manifest.apply_image(&descriptor.image, &routing);

        let services = descriptor
            .services
            .iter()
            .map(|service| {
                let mut svc_manifest =
                    base_manifest(service_container_id(&container_id, &service.image.alias));
                // Job variables first so a service's own variables shadow them.
                svc_manifest
                    .apply_variables(descriptor.variables.iter().chain(&service.variables));
                svc_manifest.apply_image(&service.image, &routing);

                build_service(service, svc_manifest, &container_id)
            })
            .collect::<Vec<_>>();

        info!(
            container_id = %container_id,
            image = %manifest.docker.image,
            services = services.len(),
            "Assembled job config"
        );

        Ok(Self {
            env,
            descriptor,
            context,
            bindings,
            egress,
            container_id,
            manifest,
            services,
        })
    }
}

fn build_service(service: &ServiceImage, manifest: AppManifest, container_id: &str) -> JobService {
    JobService {
        image: service.image.clone(),
        variables: service.variables.clone(),
        manifest,
        job_container_id: container_id.to_string(),
    }
}

fn read_descriptor(path: &str) -> ConfigResult<JobDescriptor> {
    if path.is_empty() {
        return Ok(JobDescriptor::default());
    }

    let path = Path::new(path);
    debug!(path = %path.display(), "Reading job response file");

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadDescriptor {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ConfigError::MalformedDescriptor {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_bindings(json: &str) -> ConfigResult<ServiceBindingSet> {
    if json.trim().is_empty() {
        return Ok(ServiceBindingSet::default());
    }
    ServiceBindingSet::parse(json).map_err(ConfigError::Bindings)
}
