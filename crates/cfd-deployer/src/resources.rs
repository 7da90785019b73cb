//! Cloud Controller v3 and UAA wire types.

use cfd_core::platform::{App, AppState};
use cfd_core::{Error, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub href: String,
}

/// `GET /` on the API root.
#[derive(Debug, Clone, Deserialize)]
pub struct RootInfo {
    pub links: RootLinks,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RootLinks {
    pub login: Option<Link>,
    pub uaa: Option<Link>,
    pub app_ssh: Option<AppSshLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSshLink {
    pub href: String,
    #[serde(default)]
    pub meta: AppSshMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppSshMeta {
    #[serde(default)]
    pub oauth_client: String,
}

impl RootInfo {
    /// Where tokens are issued. The login server is preferred, as the CLI does.
    pub fn token_endpoint(&self) -> Option<&str> {
        self.links
            .login
            .as_ref()
            .or(self.links.uaa.as_ref())
            .map(|l| l.href.as_str())
    }

    /// The UAA itself, used for SSH authorization codes.
    pub fn uaa_endpoint(&self) -> Option<&str> {
        self.links
            .uaa
            .as_ref()
            .or(self.links.login.as_ref())
            .map(|l| l.href.as_str())
    }

    pub fn ssh_client_id(&self) -> &str {
        self.links
            .app_ssh
            .as_ref()
            .map(|s| s.meta.oauth_client.as_str())
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_SSH_CLIENT_ID)
    }
}

pub const DEFAULT_SSH_CLIENT_ID: &str = "ssh-proxy";

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paginated<T> {
    #[serde(default)]
    pub pagination: Pagination,
    pub resources: Vec<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    pub next: Option<Link>,
}

/// Any resource where only the GUID and name matter (orgs, spaces).
#[derive(Debug, Clone, Deserialize)]
pub struct NamedResource {
    pub guid: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuidResource {
    pub guid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppResource {
    pub guid: String,
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub relationships: AppRelationships,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppRelationships {
    #[serde(default)]
    pub space: ToOne,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToOne {
    pub data: Option<GuidResource>,
}

impl From<AppResource> for App {
    fn from(app: AppResource) -> Self {
        Self {
            name: app.name,
            guid: app.guid,
            state: AppState::from(app.state.as_str()),
            space_guid: app.relationships.space.data.map(|d| d.guid).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildResource {
    pub guid: String,
    pub state: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub droplet: Option<GuidResource>,
}

pub const BUILD_STAGED: &str = "STAGED";
pub const BUILD_FAILED: &str = "FAILED";

/// One instance from `GET /v3/processes/:guid/stats`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessStats {
    pub index: u32,
    #[serde(default)]
    pub state: String,
}

pub const INSTANCE_RUNNING: &str = "RUNNING";
pub const INSTANCE_CRASHED: &str = "CRASHED";

/// Convert a quota like `512M`, `1G`, `1024MB` or `2GB` to megabytes.
/// A bare number is taken as megabytes.
pub fn megabytes(quota: &str) -> Result<u64> {
    let invalid = || Error::InvalidManifest(format!("invalid quota {quota:?}"));

    let upper = quota.trim().to_ascii_uppercase();
    let digits_end = upper
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(upper.len());
    let (number, unit) = upper.split_at(digits_end);

    let number: u64 = number.parse().map_err(|_| invalid())?;
    let factor = match unit {
        "" | "M" | "MB" => 1,
        "G" | "GB" => 1024,
        "T" | "TB" => 1024 * 1024,
        _ => return Err(invalid()),
    };

    number.checked_mul(factor).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_megabytes() {
        let cases = [
            ("512M", 512),
            ("512m", 512),
            ("1G", 1024),
            ("1024MB", 1024),
            ("2GB", 2048),
            ("256", 256),
            (" 64M ", 64),
            ("1T", 1024 * 1024),
        ];
        for (input, want) in cases {
            assert_eq!(megabytes(input).unwrap(), want, "input {input:?}");
        }
    }

    #[test]
    fn test_megabytes_invalid() {
        for input in ["", "M", "12K", "1.5G", "-1G", "lots"] {
            let err = megabytes(input).unwrap_err();
            assert!(
                matches!(err, Error::InvalidManifest(_)),
                "input {input:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_root_info_endpoints() {
        let doc = r#"{"links":{
            "self":{"href":"https://api.example.com"},
            "login":{"href":"https://login.example.com"},
            "uaa":{"href":"https://uaa.example.com"},
            "app_ssh":{
                "href":"ssh.example.com:2222",
                "meta":{"host_key_fingerprint":"x","oauth_client":"ssh-proxy-test"}
            }
        }}"#;
        let info: RootInfo = serde_json::from_str(doc).unwrap();

        assert_eq!(info.token_endpoint(), Some("https://login.example.com"));
        assert_eq!(info.uaa_endpoint(), Some("https://uaa.example.com"));
        assert_eq!(info.ssh_client_id(), "ssh-proxy-test");

        let bare: RootInfo =
            serde_json::from_str(r#"{"links":{"uaa":{"href":"https://uaa.example.com"}}}"#)
                .unwrap();
        assert_eq!(bare.token_endpoint(), Some("https://uaa.example.com"));
        assert_eq!(bare.ssh_client_id(), DEFAULT_SSH_CLIENT_ID);
    }

    #[test]
    fn test_app_resource_into_app() {
        let doc = r#"{
            "guid":"app-guid","name":"glrw-p1-c0-j9","state":"STARTED",
            "relationships":{"space":{"data":{"guid":"space-guid"}}},
            "lifecycle":{"type":"docker","data":{}}
        }"#;
        let app: App = serde_json::from_str::<AppResource>(doc).unwrap().into();

        assert_eq!(
            app,
            App {
                name: "glrw-p1-c0-j9".to_string(),
                guid: "app-guid".to_string(),
                state: AppState::Started,
                space_guid: "space-guid".to_string(),
            }
        );
    }

    #[test]
    fn test_process_stats() {
        let doc = r#"{"resources":[
            {"type":"web","index":0,"state":"STARTING","usage":{}},
            {"type":"web","index":1,"state":"DOWN"}
        ]}"#;
        let stats: Paginated<ProcessStats> = serde_json::from_str(doc).unwrap();

        assert!(stats.pagination.next.is_none());
        assert_eq!(stats.resources[0].index, 0);
        assert_eq!(stats.resources[0].state, "STARTING");
        assert_eq!(stats.resources[1].state, "DOWN");
    }

    #[test]
    fn test_paginated_apps() {
        let doc = r#"{
            "pagination":{
                "total_results":2,
                "next":{"href":"https://api.example.com/v3/apps?page=2"}
            },
            "resources":[{"guid":"a","name":"one","state":"STOPPED"}]
        }"#;
        let page: Paginated<AppResource> = serde_json::from_str(doc).unwrap();

        assert_eq!(page.resources.len(), 1);
        assert_eq!(
            page.pagination.next.map(|l| l.href).as_deref(),
            Some("https://api.example.com/v3/apps?page=2")
        );
    }
}
