//! `cfd drive` stages.

use anyhow::{Context, Result};
use cfd_config::JobConfig;
use cfd_core::{ClientOptions, PlatformClient};
use cfd_deployer::CloudFoundryApi;
use cfd_driver::{DriverSettings, ExecutorConfig, Stage};
use std::path::Path;
use tracing::info;

fn job_config() -> Result<JobConfig> {
    JobConfig::from_env().context("error creating stage")
}

/// Connect to the platform named by `api_url` or the job's own context.
async fn stage(api_url: Option<&str>) -> Result<Stage<CloudFoundryApi>> {
    let job = job_config()?;

    let url = api_url.unwrap_or(&job.context.cf_api);
    let options = ClientOptions::default().with_api_root_url(url);

    let api = CloudFoundryApi::new()?;
    let client = PlatformClient::connect(api, options)
        .await
        .context("error connecting to platform")?;

    Ok(Stage::new(client, job, DriverSettings::from_process_env()))
}

pub fn config() -> Result<()> {
    let job = job_config()?;
    println!("{}", ExecutorConfig::for_job(&job).to_json()?);
    Ok(())
}

pub async fn prepare(api_url: Option<&str>) -> Result<()> {
    let stage = stage(api_url).await?;
    let app = stage.prepare().await.context("prepare failed")?;

    info!(app = %app.name, state = %app.state, "Prepared");
    println!("Job container {} is {}", app.name, app.state);
    Ok(())
}

pub async fn run(api_url: Option<&str>, script: &Path, sub_stage: &str) -> Result<()> {
    let stage = stage(api_url).await?;
    let output = stage
        .run(script, sub_stage)
        .await
        .with_context(|| format!("run {sub_stage} failed"))?;

    print!("{output}");
    Ok(())
}

pub async fn cleanup(api_url: Option<&str>) -> Result<()> {
    let stage = stage(api_url).await?;
    stage.cleanup().await.context("cleanup failed")?;

    info!(container_id = %stage.config().container_id, "Cleaned up");
    Ok(())
}
