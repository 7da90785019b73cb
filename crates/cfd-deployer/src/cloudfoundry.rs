//! Cloud Foundry adapter over the Cloud Controller v3 HTTP API.

use async_trait::async_trait;
use cfd_core::manifest::AppManifest;
use cfd_core::network::PortRange;
use cfd_core::platform::{App, PlatformApi};
use cfd_core::{Credentials, Error, Result};
use reqwest::header::LOCATION;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::resources::{
    AppResource, BUILD_FAILED, BUILD_STAGED, BuildResource, GuidResource, INSTANCE_CRASHED,
    INSTANCE_RUNNING, NamedResource, Paginated, ProcessStats, RootInfo, TokenResponse, megabytes,
};

/// OAuth client the `cf` CLI uses for password grants.
const CF_OAUTH_CLIENT: &str = "cf";

/// Delay between status checks while staging or starting.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Give up on staging or starting after this many checks.
const POLL_ATTEMPTS: u32 = 300;

/// An authenticated session, cached after `connect`.
#[derive(Clone)]
struct Session {
    api_root: Url,
    uaa_url: Url,
    ssh_client_id: String,
    access_token: String,
}

/// [`PlatformApi`] backed by a Cloud Foundry API endpoint.
pub struct CloudFoundryApi {
    http: reqwest::Client,
    session: Option<Session>,
    poll_interval: Duration,
}

impl CloudFoundryApi {
    pub fn new() -> Result<Self> {
        // Redirects stay visible so SSH authorization codes can be read
        // from the `Location` header.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("cfd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::platform("connect", e.to_string()))?;

        Ok(Self::with_http_client(http))
    }

    /// Use a preconfigured client. It must not follow redirects.
    pub fn with_http_client(http: reqwest::Client) -> Self {
        Self {
            http,
            session: None,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::NotConnected)
    }

    fn url(&self, operation: &'static str, path: &str) -> Result<Url> {
        self.session()?
            .api_root
            .join(path)
            .map_err(|e| Error::platform(operation, e.to_string()))
    }

    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        let session = self.session()?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(&session.access_token)
            .header("Accept", "application/json"))
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::platform(operation, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::platform(operation, format!("{status}: {text}")));
        }

        Ok(response)
    }

    async fn json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<T> {
        let mut request = self.request(method, url)?;
        if let Some(body) = body {
            request = request.json(body);
        }

        self.send(operation, request)
            .await?
            .json()
            .await
            .map_err(|e| Error::platform(operation, e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, operation: &'static str, path: &str) -> Result<T> {
        let url = self.url(operation, path)?;
        self.json(operation, Method::GET, url, None).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        body: &Value,
    ) -> Result<T> {
        let url = self.url(operation, path)?;
        self.json(operation, Method::POST, url, Some(body)).await
    }

    async fn patch<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        body: &Value,
    ) -> Result<T> {
        let url = self.url(operation, path)?;
        self.json(operation, Method::PATCH, url, Some(body)).await
    }

    /// First resource of a filtered list, if any.
    async fn first<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
    ) -> Result<Option<T>> {
        let page: Paginated<T> = self.get(operation, path).await?;
        Ok(page.resources.into_iter().next())
    }

    async fn find_space(&self, org_name: &str, space_name: &str) -> Result<NamedResource> {
        const OP: &str = "app push";

        let org: NamedResource = self
            .first(
                OP,
                &format!("/v3/organizations?names={}", urlencoding::encode(org_name)),
            )
            .await?
            .ok_or_else(|| Error::platform(OP, format!("organization {org_name} not found")))?;

        self.first(
            OP,
            &format!(
                "/v3/spaces?names={}&organization_guids={}",
                urlencoding::encode(space_name),
                org.guid
            ),
        )
        .await?
        .ok_or_else(|| {
            Error::platform(OP, format!("space {space_name} not found in {org_name}"))
        })
    }

    /// Stage `package_guid` and wait for a droplet.
    async fn stage(&self, package_guid: &str) -> Result<String> {
        const OP: &str = "app staging";

        let mut build: BuildResource = self
            .post(OP, "/v3/builds", &json!({ "package": { "guid": package_guid } }))
            .await?;

        for _ in 0..POLL_ATTEMPTS {
            match build.state.as_str() {
                BUILD_STAGED => {
                    return build
                        .droplet
                        .map(|d| d.guid)
                        .ok_or_else(|| Error::platform(OP, "staged build has no droplet"));
                }
                BUILD_FAILED => {
                    return Err(Error::platform(
                        OP,
                        build.error.unwrap_or_else(|| "build failed".to_string()),
                    ));
                }
                state => debug!(build = %build.guid, state = %state, "Waiting for build"),
            }

            tokio::time::sleep(self.poll_interval).await;
            build = self.get(OP, &format!("/v3/builds/{}", build.guid)).await?;
        }

        Err(Error::platform(
            OP,
            format!("build {} did not finish staging", build.guid),
        ))
    }

    /// Wait for instance 0 of `process_guid` to report `RUNNING`.
    async fn wait_until_running(&self, process_guid: &str) -> Result<()> {
        const OP: &str = "app start";
        let path = format!("/v3/processes/{process_guid}/stats");

        for _ in 0..POLL_ATTEMPTS {
            let stats: Paginated<ProcessStats> = self.get(OP, &path).await?;
            let state = stats
                .resources
                .into_iter()
                .find(|s| s.index == 0)
                .map(|s| s.state)
                .unwrap_or_default();

            match state.as_str() {
                INSTANCE_RUNNING => return Ok(()),
                INSTANCE_CRASHED => {
                    return Err(Error::platform(
                        OP,
                        format!("instance 0 of process {process_guid} crashed"),
                    ));
                }
                state => {
                    debug!(process = %process_guid, state = %state, "Waiting for instance");
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        Err(Error::platform(
            OP,
            format!("instance 0 of process {process_guid} did not start"),
        ))
    }
}

/// Request body for `POST /v3/packages`.
fn docker_package_body(app_guid: &str, manifest: &AppManifest) -> Value {
    let mut data = json!({ "image": manifest.docker.image });
    if let Some(username) = &manifest.docker.username {
        data["username"] = json!(username);
        data["password"] = json!(manifest.docker.password.as_deref().unwrap_or_default());
    }

    json!({
        "type": "docker",
        "data": data,
        "relationships": { "app": { "data": { "guid": app_guid } } },
    })
}

/// Request body for `POST /v3/apps`.
fn create_app_body(manifest: &AppManifest, space_guid: &str) -> Value {
    json!({
        "name": manifest.name,
        "lifecycle": { "type": "docker", "data": {} },
        "environment_variables": manifest.env,
        "relationships": { "space": { "data": { "guid": space_guid } } },
    })
}

/// Request body for `POST /v3/routes`.
fn create_route_body(
    domain_guid: &str,
    space_guid: &str,
    host: &str,
    path: &str,
    port: Option<u16>,
) -> Value {
    let mut body = json!({
        "host": host,
        "relationships": {
            "domain": { "data": { "guid": domain_guid } },
            "space": { "data": { "guid": space_guid } },
        },
    });
    if !path.is_empty() {
        body["path"] = json!(path);
    }
    if let Some(port) = port {
        body["port"] = json!(port);
    }
    body
}

/// Request body for `POST /networking/v1/external/policies`.
fn network_policies_body(source_guid: &str, dest_guid: &str, ranges: &[PortRange]) -> Value {
    let policies: Vec<Value> = ranges
        .iter()
        .map(|range| {
            json!({
                "source": { "id": source_guid },
                "destination": {
                    "id": dest_guid,
                    "protocol": "tcp",
                    "ports": { "start": range.start, "end": range.end },
                },
            })
        })
        .collect();

    json!({ "policies": policies })
}

/// The `code` query parameter of a redirect target.
fn code_from_location(base: &Url, location: &str) -> Option<String> {
    let target = base.join(location).ok()?;
    target
        .query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, code)| code.into_owned())
        .filter(|code| !code.is_empty())
}

#[async_trait]
impl PlatformApi for CloudFoundryApi {
    async fn connect(&mut self, api_root_url: &str, creds: &Credentials) -> Result<()> {
        const OP: &str = "connect";
        let err = |e: &dyn std::fmt::Display| Error::platform(OP, e.to_string());

        let api_root = Url::parse(api_root_url).map_err(|e| err(&e))?;

        let info: RootInfo = self
            .http
            .get(api_root.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| err(&e))?
            .error_for_status()
            .map_err(|e| err(&e))?
            .json()
            .await
            .map_err(|e| err(&e))?;

        let token_url = info
            .token_endpoint()
            .ok_or_else(|| Error::platform(OP, "API root does not advertise a login server"))?;
        let token_url = Url::parse(token_url)
            .and_then(|u| u.join("/oauth/token"))
            .map_err(|e| err(&e))?;
        let uaa_url = Url::parse(info.uaa_endpoint().unwrap_or_default()).map_err(|e| err(&e))?;

        let params = [
            ("grant_type", "password"),
            ("client_id", CF_OAUTH_CLIENT),
            ("username", creds.username.as_str()),
            ("password", creds.password.as_str()),
        ];

        let response = self
            .http
            .post(token_url)
            .basic_auth(CF_OAUTH_CLIENT, Some(""))
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| err(&e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::platform(OP, format!("token request {status}: {text}")));
        }

        let token: TokenResponse = response.json().await.map_err(|e| err(&e))?;
        if token.access_token.is_empty() {
            return Err(Error::platform(OP, "no access token in response"));
        }

        self.session = Some(Session {
            api_root,
            uaa_url,
            ssh_client_id: info.ssh_client_id().to_string(),
            access_token: token.access_token,
        });

        info!(api = %api_root_url, "Authenticated with platform");
        Ok(())
    }

    async fn app_get(&self, id: &str) -> Result<Option<App>> {
        const OP: &str = "app get";

        let by_name: Option<AppResource> = self
            .first(OP, &format!("/v3/apps?names={}", urlencoding::encode(id)))
            .await?;
        if let Some(app) = by_name {
            return Ok(Some(app.into()));
        }

        let url = self.url(OP, &format!("/v3/apps/{}", urlencoding::encode(id)))?;
        let response = self
            .request(Method::GET, url)?
            .send()
            .await
            .map_err(|e| Error::platform(OP, e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::platform(OP, format!("{status}: {text}")));
        }

        let app: AppResource = response
            .json()
            .await
            .map_err(|e| Error::platform(OP, e.to_string()))?;
        Ok(Some(app.into()))
    }

    async fn app_push(&self, manifest: &AppManifest) -> Result<App> {
        const OP: &str = "app push";
        self.session()?;

        // Bad quotas fail before anything is created.
        let memory = quota(&manifest.process.memory)?;
        let disk = quota(&manifest.process.disk_quota)?;

        let space = self.find_space(&manifest.org_name, &manifest.space_name).await?;

        let app: AppResource = self
            .post(OP, "/v3/apps", &create_app_body(manifest, &space.guid))
            .await?;
        info!(app = %app.name, guid = %app.guid, space = %space.name, "Created app");

        let package: GuidResource = self
            .post(OP, "/v3/packages", &docker_package_body(&app.guid, manifest))
            .await?;

        let droplet = self.stage(&package.guid).await?;
        let _: Value = self
            .patch(
                OP,
                &format!("/v3/apps/{}/relationships/current_droplet", app.guid),
                &json!({ "data": { "guid": droplet } }),
            )
            .await?;

        let process: GuidResource = self
            .get(OP, &format!("/v3/apps/{}/processes/web", app.guid))
            .await?;
        let command = (!manifest.process.command.is_empty()).then_some(&manifest.process.command);
        let _: Value = self
            .patch(
                OP,
                &format!("/v3/processes/{}", process.guid),
                &json!({
                    "command": command,
                    "health_check": { "type": manifest.process.health_check_type },
                }),
            )
            .await?;

        let mut scale = json!({ "instances": 1 });
        if let Some(memory) = memory {
            scale["memory_in_mb"] = json!(memory);
        }
        if let Some(disk) = disk {
            scale["disk_in_mb"] = json!(disk);
        }
        let _: Value = self
            .post(
                OP,
                &format!("/v3/apps/{}/processes/web/actions/scale", app.guid),
                &scale,
            )
            .await?;

        let _: Value = self
            .post(OP, &format!("/v3/apps/{}/actions/start", app.guid), &json!({}))
            .await?;
        self.wait_until_running(&process.guid).await?;

        let app: AppResource = self.get(OP, &format!("/v3/apps/{}", app.guid)).await?;
        Ok(app.into())
    }

    async fn app_delete(&self, guid: &str) -> Result<()> {
        const OP: &str = "app delete";

        let url = self.url(OP, &format!("/v3/apps/{}", urlencoding::encode(guid)))?;
        self.send(OP, self.request(Method::DELETE, url)?).await?;

        debug!(guid = %guid, "Deleted app");
        Ok(())
    }

    async fn apps_list(&self) -> Result<Vec<App>> {
        const OP: &str = "apps list";

        let mut apps = Vec::new();
        let mut url = self.url(OP, "/v3/apps?per_page=100")?;

        loop {
            let page: Paginated<AppResource> = self.json(OP, Method::GET, url, None).await?;
            apps.extend(page.resources.into_iter().map(App::from));

            match page.pagination.next {
                Some(next) => {
                    url = Url::parse(&next.href).map_err(|e| Error::platform(OP, e.to_string()))?
                }
                None => break,
            }
        }

        Ok(apps)
    }

    async fn ssh_code(&self) -> Result<String> {
        const OP: &str = "ssh code";
        let session = self.session()?;

        let mut url = session
            .uaa_url
            .join("/oauth/authorize")
            .map_err(|e| Error::platform(OP, e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &session.ssh_client_id);

        let response = self
            .request(Method::GET, url)?
            .send()
            .await
            .map_err(|e| Error::platform(OP, e.to_string()))?;

        if !response.status().is_redirection() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::platform(OP, format!("expected redirect, got {status}: {text}")));
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|loc| loc.to_str().ok())
            .and_then(|loc| code_from_location(&session.uaa_url, loc))
            .ok_or_else(|| Error::platform(OP, "no code in authorization redirect"))
    }

    async fn map_route(
        &self,
        app: &App,
        domain_guid: &str,
        space_guid: &str,
        host: &str,
        path: &str,
        port: Option<u16>,
    ) -> Result<()> {
        const OP: &str = "map route";

        let route: GuidResource = self
            .post(
                OP,
                "/v3/routes",
                &create_route_body(domain_guid, space_guid, host, path, port),
            )
            .await?;

        let _: Value = self
            .post(
                OP,
                &format!("/v3/routes/{}/destinations", route.guid),
                &json!({ "destinations": [{ "app": { "guid": app.guid } }] }),
            )
            .await?;

        debug!(app = %app.name, route = %route.guid, host = %host, "Mapped route");
        Ok(())
    }

    async fn add_network_policy(
        &self,
        source_guid: &str,
        dest_guid: &str,
        port_ranges: &[String],
    ) -> Result<()> {
        const OP: &str = "add network policy";
        self.session()?;

        let ranges = PortRange::parse_all(port_ranges)?;
        if ranges.is_empty() {
            warn!(source = %source_guid, dest = %dest_guid, "No port ranges for network policy");
            return Ok(());
        }

        let url = self.url(OP, "/networking/v1/external/policies")?;
        let request = self
            .request(Method::POST, url)?
            .json(&network_policies_body(source_guid, dest_guid, &ranges));
        self.send(OP, request).await?;

        Ok(())
    }
}

/// Empty quotas are left to the platform default.
fn quota(value: &str) -> Result<Option<u64>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    megabytes(value).map(Some)
}
