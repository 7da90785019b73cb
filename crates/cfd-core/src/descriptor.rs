//! Job descriptor types, as found in GitLab Runner's `JOB_RESPONSE_FILE`.
//!
//! Only the fields the driver uses are modelled; everything else in the job
//! response is ignored. `null` and missing values decode as empty.

use serde::{Deserialize, Deserializer, Serialize};

/// The parts of a GitLab job response the driver needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    #[serde(default, deserialize_with = "null_as_default")]
    pub image: Image,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variables: Vec<CiVariable>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub services: Vec<ServiceImage>,
}

/// A container image reference with its entrypoint and command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub alias: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub command: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entrypoint: Vec<String>,
}

/// A service container declared by the job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceImage {
    #[serde(flatten)]
    pub image: Image,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variables: Vec<CiVariable>,
}

/// A CI/CD variable. Duplicate keys are allowed; the last one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiVariable {
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
}

impl CiVariable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
