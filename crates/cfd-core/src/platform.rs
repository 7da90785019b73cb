//! Platform capability trait and the client façade over it.
//!
//! [`PlatformApi`] is the seam to the remote platform: one adapter talks to
//! the real thing, tests supply their own. [`PlatformClient`] composes an
//! adapter with [`ClientOptions`] and adds the checks that must happen before
//! anything goes over the wire.

use async_trait::async_trait;
use derive_more::Display;
use std::sync::Arc;
use tracing::{debug, info};

use crate::credentials::{CredentialSource, Credentials, EnvCredentialResolver};
use crate::manifest::AppManifest;
use crate::Result;

/// API endpoint used when the application context does not name one.
pub const API_ROOT_URL_DEFAULT: &str = "https://api.fr-stage.cloud.gov";

/// Lifecycle state of an application as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum AppState {
    #[display("STARTED")]
    Started,
    #[display("STOPPED")]
    Stopped,
    #[display("{_0}")]
    Other(String),
}

impl From<&str> for AppState {
    fn from(state: &str) -> Self {
        match state {
            "STARTED" => Self::Started,
            "STOPPED" => Self::Stopped,
            other => Self::Other(other.to_string()),
        }
    }
}

/// The platform's view of one application. Always re-fetched, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    pub name: String,
    pub guid: String,
    pub state: AppState,
    pub space_guid: String,
}

/// Operations the driver needs from the platform.
///
/// Every method other than `connect` fails with [`crate::Error::NotConnected`]
/// until `connect` has succeeded.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Authenticate and cache a session.
    async fn connect(&mut self, api_root_url: &str, creds: &Credentials) -> Result<()>;

    /// Look up an application. `Ok(None)` when it does not exist.
    async fn app_get(&self, id: &str) -> Result<Option<App>>;

    /// Create and start an application, returning it once it is running.
    async fn app_push(&self, manifest: &AppManifest) -> Result<App>;

    async fn app_delete(&self, guid: &str) -> Result<()>;

    async fn apps_list(&self) -> Result<Vec<App>>;

    /// One-time code for the platform's SSH proxy.
    async fn ssh_code(&self) -> Result<String>;

    /// Create a route and bind it to `app`.
    async fn map_route(
        &self,
        app: &App,
        domain_guid: &str,
        space_guid: &str,
        host: &str,
        path: &str,
        port: Option<u16>,
    ) -> Result<()>;

    /// Let `source_guid` reach `dest_guid` over TCP on each port range.
    async fn add_network_policy(
        &self,
        source_guid: &str,
        dest_guid: &str,
        port_ranges: &[String],
    ) -> Result<()>;
}

/// How a [`PlatformClient`] connects.
#[derive(Clone)]
pub struct ClientOptions {
    /// Used as-is when non-empty; otherwise `credential_source` is asked.
    pub credentials: Option<Credentials>,
    pub credential_source: Arc<dyn CredentialSource>,
    pub api_root_url: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            credentials: None,
            credential_source: Arc::new(EnvCredentialResolver::from_process_env()),
            api_root_url: None,
        }
    }
}

impl ClientOptions {
    pub fn with_credentials(mut self, creds: Credentials) -> Self {
        self.credentials = Some(creds);
        self
    }

    pub fn with_credential_source(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.credential_source = source;
        self
    }

    pub fn with_api_root_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.api_root_url = (!url.is_empty()).then_some(url);
        self
    }

    pub fn api_root_url(&self) -> &str {
        self.api_root_url.as_deref().unwrap_or(API_ROOT_URL_DEFAULT)
    }

    fn resolve_credentials(&self) -> Result<Credentials> {
        match &self.credentials {
            Some(creds) if !creds.is_empty() => Ok(creds.clone()),
            _ => self.credential_source.credentials(),
        }
    }
}

/// A connected platform client.
pub struct PlatformClient<A> {
    api: A,
    options: ClientOptions,
}

impl<A: PlatformApi> PlatformClient<A> {
    /// Resolve credentials and connect the adapter.
    pub async fn connect(mut api: A, options: ClientOptions) -> Result<Self> {
        let creds = options.resolve_credentials()?;
        let url = options.api_root_url();

        info!(api = %url, "Connecting to platform");
        api.connect(url, &creds).await?;

        Ok(Self { api, options })
    }

    pub fn api_root_url(&self) -> &str {
        self.options.api_root_url()
    }

    /// The underlying adapter.
    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn app_get(&self, id: &str) -> Result<Option<App>> {
        self.api.app_get(id).await
    }

    pub async fn app_delete(&self, guid: &str) -> Result<()> {
        self.api.app_delete(guid).await
    }

    pub async fn apps_list(&self) -> Result<Vec<App>> {
        self.api.apps_list().await
    }

    /// Push a manifest after checking it names an app, org and space.
    pub async fn push(&self, manifest: &AppManifest) -> Result<App> {
        manifest.validate()?;

        info!(app = %manifest.name, image = %manifest.docker.image, "Pushing app");
        let app = self.api.app_push(manifest).await?;
        debug!(app = %app.name, guid = %app.guid, state = %app.state, "Pushed app");

        Ok(app)
    }

    pub async fn ssh_code(&self) -> Result<String> {
        self.api.ssh_code().await
    }

    /// Give `app` an internal hostname equal to its name.
    pub async fn map_service_route(&self, app: &App, internal_domain_guid: &str) -> Result<()> {
        info!(app = %app.name, "Mapping internal route");
        self.api
            .map_route(app, internal_domain_guid, &app.space_guid, &app.name, "", None)
            .await
    }

    pub async fn add_network_policy(
        &self,
        source_guid: &str,
        dest_guid: &str,
        port_ranges: &[String],
    ) -> Result<()> {
        self.api
            .add_network_policy(source_guid, dest_guid, port_ranges)
            .await
    }
}
