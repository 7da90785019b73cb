//! Platform credentials and where they come from.

use std::fmt;

use crate::bindings::{SERVICE_ACCOUNT_CATEGORY, ServiceBindingSet};
use crate::{Error, Result};

pub const USERNAME_VAR: &str = "CF_USERNAME";
pub const PASSWORD_VAR: &str = "CF_PASSWORD";
pub const SERVICES_VAR: &str = "VCAP_SERVICES";

/// Username/password pair for the platform's UAA.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Empty when either half is missing.
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() || self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Something that can produce platform credentials on demand.
pub trait CredentialSource: Send + Sync {
    fn credentials(&self) -> Result<Credentials>;
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves credentials from `CF_USERNAME`/`CF_PASSWORD`, falling back to the
/// service account bound in `VCAP_SERVICES`.
pub struct EnvCredentialResolver {
    lookup: Lookup,
}

impl EnvCredentialResolver {
    /// Resolver over the live process environment.
    pub fn from_process_env() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    /// Resolver over an arbitrary environment, e.g. a snapshot in tests.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn var(&self, key: &str) -> String {
        (self.lookup)(key).unwrap_or_default()
    }

    pub fn resolve(&self) -> Result<Credentials> {
        let creds = Credentials::new(self.var(USERNAME_VAR), self.var(PASSWORD_VAR));
        if !creds.is_empty() {
            return Ok(creds);
        }

        let bindings = ServiceBindingSet::parse(&self.var(SERVICES_VAR))?;

        let account = bindings
            .category(SERVICE_ACCOUNT_CATEGORY)
            .first()
            .ok_or_else(|| {
                Error::CredentialsUnavailable(format!(
                    "no {SERVICE_ACCOUNT_CATEGORY} binding in {SERVICES_VAR}"
                ))
            })?;

        let creds = Credentials::new(
            account.credential_str("username"),
            account.credential_str("password"),
        );
        if creds.is_empty() {
            return Err(Error::CredentialsUnavailable(format!(
                "{SERVICE_ACCOUNT_CATEGORY} binding has no username/password"
            )));
        }

        Ok(creds)
    }
}

impl CredentialSource for EnvCredentialResolver {
    fn credentials(&self) -> Result<Credentials> {
        self.resolve()
    }
}
