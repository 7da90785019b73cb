//! Stage orchestrator: drives the platform through one job's lifecycle.

use cfd_config::{JobConfig, JobService};
use cfd_core::{App, PlatformApi, PlatformClient};
use std::path::Path;
use tracing::{info, warn};

use crate::ssh;
use crate::{DriverSettings, StageError, StageResult};

/// One job's stages against a connected platform.
pub struct Stage<A> {
    client: PlatformClient<A>,
    config: JobConfig,
    settings: DriverSettings,
}

impl<A: PlatformApi> Stage<A> {
    pub fn new(client: PlatformClient<A>, config: JobConfig, settings: DriverSettings) -> Self {
        Self {
            client,
            config,
            settings,
        }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn client(&self) -> &PlatformClient<A> {
        &self.client
    }

    /// Start every service, then the job container.
    ///
    /// Stops at the first failure. Apps already started stay up for
    /// `cleanup` to remove.
    pub async fn prepare(&self) -> StageResult<App> {
        self.start_services().await?;

        let manifest = &self.config.manifest;
        info!(container_id = %self.config.container_id, "Starting job container");

        let app = self.client.push(manifest).await.map_err(|e| {
            StageError::platform(format!("error pushing job app ({})", manifest.name), e)
        })?;

        info!(app = %app.name, guid = %app.guid, "Job container ready");
        Ok(app)
    }

    async fn start_services(&self) -> StageResult<Vec<App>> {
        let mut apps = Vec::with_capacity(self.config.services.len());
        for service in &self.config.services {
            apps.push(self.start_service(service).await?);
        }
        Ok(apps)
    }

    async fn start_service(&self, service: &JobService) -> StageResult<App> {
        let name = service.name();

        let existing = self.client.app_get(name).await.map_err(|e| {
            StageError::platform(format!("error checking for existing service ({name})"), e)
        })?;

        if let Some(old) = existing {
            info!(service = %name, guid = %old.guid, "Deleting stale service");
            self.client.app_delete(&old.guid).await.map_err(|e| {
                StageError::platform(format!("error deleting existing service ({name})"), e)
            })?;
        }

        info!(service = %name, alias = %service.alias(), "Starting service");
        let app = self.client.push(&service.manifest).await.map_err(|e| {
            StageError::platform(format!("error pushing service ({name})"), e)
        })?;

        self.client
            .map_service_route(&app, &self.settings.internal_domain_guid)
            .await
            .map_err(|e| StageError::platform(format!("error mapping route ({name})"), e))?;

        Ok(app)
    }

    /// Run `command` on instance 0 of the app with `guid`.
    pub async fn run_ssh(&self, guid: &str, command: &str) -> StageResult<String> {
        self.ssh(guid, command, b"").await
    }

    async fn ssh(&self, guid: &str, command: &str, input: &[u8]) -> StageResult<String> {
        let code = self
            .client
            .ssh_code()
            .await
            .map_err(|e| StageError::platform("error getting ssh code", e))?;

        let args = ssh::ssh_args(guid, &self.settings.ssh_host, &self.config.egress, command);
        ssh::execute(&self.settings.sshpass_bin, &args, &code, input).await
    }

    /// Execute one `run_exec` sub-stage script inside the job container.
    pub async fn run(&self, script_path: &Path, sub_stage: &str) -> StageResult<String> {
        let script = std::fs::read(script_path).map_err(|source| StageError::ReadScript {
            path: script_path.to_path_buf(),
            source,
        })?;

        let container_id = &self.config.container_id;
        let app = self
            .client
            .app_get(container_id)
            .await
            .map_err(|e| {
                StageError::platform(format!("error finding job app ({container_id})"), e)
            })?
            .ok_or_else(|| StageError::JobAppMissing(container_id.clone()))?;

        info!(sub_stage = %sub_stage, app = %app.name, bytes = script.len(), "Running script");

        match self.ssh(&app.guid, ssh::REMOTE_SHELL, &script).await {
            Err(StageError::Ssh { stderr, .. }) => Err(StageError::Script {
                sub_stage: sub_stage.to_string(),
                stderr,
            }),
            other => other,
        }
    }

    /// Remove every service and the job container.
    ///
    /// Keeps going after a failure and returns the first one.
    pub async fn cleanup(&self) -> StageResult<()> {
        let names = self
            .config
            .services
            .iter()
            .map(|s| s.name())
            .chain(std::iter::once(self.config.container_id.as_str()));

        let mut first_error = None;
        for name in names {
            if let Err(e) = self.remove(name).await {
                warn!(app = %name, error = %e, "Cleanup failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn remove(&self, name: &str) -> StageResult<()> {
        let app = self.client.app_get(name).await.map_err(|e| {
            StageError::platform(format!("error checking for app ({name})"), e)
        })?;

        let Some(app) = app else {
            return Ok(());
        };

        info!(app = %name, guid = %app.guid, "Deleting app");
        self.client
            .app_delete(&app.guid)
            .await
            .map_err(|e| StageError::platform(format!("error deleting app ({name})"), e))
    }
}
