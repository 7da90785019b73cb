//! The runner manager's own application context (`VCAP_APPLICATION`).

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// Where the runner manager itself lives; workloads are pushed alongside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformContext {
    #[serde(default)]
    pub cf_api: String,
    #[serde(default, alias = "org_id")]
    pub organization_id: String,
    #[serde(default)]
    pub organization_name: String,
    #[serde(default)]
    pub space_id: String,
    #[serde(default)]
    pub space_name: String,
}

impl PlatformContext {
    /// Parse `VCAP_APPLICATION`; an empty payload gives the zero value.
    pub fn parse(json: &str) -> ConfigResult<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(ConfigError::MalformedContext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vcap_application() {
        let sample = r#"{"cf_api":"https://api.fr.cloud.gov","limits":{"fds":16384,"mem":128,"disk":1024},"application_name":"gitlab-runner","application_uris":[],"name":"gitlab-runner","space_name":"zjr-gl-test","space_id":"8969a4b6-01aa-431d-9790-77cc4c47e3e7","organization_id":"f0a46189-6f64-43fb-99c3-0719cf9ee255","organization_name":"gsa-tts-devtools-prototyping","uris":[],"process_id":"e905fbb9-aea0-44aa-ba10-f76aed1668d1","process_type":"web","application_id":"e905fbb9-aea0-44aa-ba10-f76aed1668d1","version":"f115779a-17a3-4700-9941-aae3fe81a4c8","application_version":"f115779a-17a3-4700-9941-aae3fe81a4c8"}"#;

        let ctx = PlatformContext::parse(sample).unwrap();

        assert_eq!(
            ctx,
            PlatformContext {
                cf_api: "https://api.fr.cloud.gov".to_string(),
                organization_id: "f0a46189-6f64-43fb-99c3-0719cf9ee255".to_string(),
                organization_name: "gsa-tts-devtools-prototyping".to_string(),
                space_id: "8969a4b6-01aa-431d-9790-77cc4c47e3e7".to_string(),
                space_name: "zjr-gl-test".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_is_zero_value() {
        assert_eq!(PlatformContext::parse("").unwrap(), PlatformContext::default());
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = PlatformContext::parse("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedContext(_)));
    }
}
