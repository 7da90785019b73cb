//! Driver-level settings that are not part of any one job.

use std::collections::HashMap;

pub const SSH_HOST_VAR: &str = "CF_SSH_HOST";
pub const INTERNAL_DOMAIN_GUID_VAR: &str = "CF_INTERNAL_DOMAIN_GUID";
pub const SSHPASS_BIN_VAR: &str = "SSHPASS_BIN";

pub const SSH_HOST_DEFAULT: &str = "ssh.fr-stage.cloud.gov";

/// GUID of the `apps.internal` domain on the default foundation.
pub const INTERNAL_DOMAIN_GUID_DEFAULT: &str = "8a5d6a8c-cfc1-4fc4-afc9-aa563ff9df5e";

pub const SSHPASS_BIN_DEFAULT: &str = "sshpass";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSettings {
    pub ssh_host: String,
    /// Domain that service apps get their internal routes on.
    pub internal_domain_guid: String,
    /// Program that feeds the one-time code to `ssh`.
    pub sshpass_bin: String,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            ssh_host: SSH_HOST_DEFAULT.to_string(),
            internal_domain_guid: INTERNAL_DOMAIN_GUID_DEFAULT.to_string(),
            sshpass_bin: SSHPASS_BIN_DEFAULT.to_string(),
        }
    }
}

impl DriverSettings {
    /// Unset or empty values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            ssh_host: var(SSH_HOST_VAR, SSH_HOST_DEFAULT),
            internal_domain_guid: var(INTERNAL_DOMAIN_GUID_VAR, INTERNAL_DOMAIN_GUID_DEFAULT),
            sshpass_bin: var(SSHPASS_BIN_VAR, SSHPASS_BIN_DEFAULT),
        }
    }

    pub fn from_process_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(map: &HashMap<String, String>) -> Self {
        Self::from_lookup(|key| map.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(DriverSettings::from_map(&HashMap::new()), DriverSettings::default());
        assert_eq!(DriverSettings::default().ssh_host, "ssh.fr-stage.cloud.gov");
    }

    #[test]
    fn test_overrides() {
        let map = HashMap::from([
            (SSH_HOST_VAR.to_string(), "ssh.fr.cloud.gov".to_string()),
            (INTERNAL_DOMAIN_GUID_VAR.to_string(), "domain-guid".to_string()),
            (SSHPASS_BIN_VAR.to_string(), String::new()),
        ]);
        let settings = DriverSettings::from_map(&map);

        assert_eq!(settings.ssh_host, "ssh.fr.cloud.gov");
        assert_eq!(settings.internal_domain_guid, "domain-guid");
        assert_eq!(settings.sshpass_bin, SSHPASS_BIN_DEFAULT);
    }
}
