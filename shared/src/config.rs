use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::capabilities::http::{EndpointError, HostPolicy, ValidatedUrl};
use crate::validation::AgePolicy;

pub const DEFAULT_BASE_URL: &str = "http://localhost:4400";
pub const DEFAULT_REGISTER_PATH: &str = "/api/v1/user_register";
pub const DEFAULT_MINIMUM_AGE_YEARS: u32 = 18;
pub const MAX_MINIMUM_AGE_YEARS: u32 = 150;
pub const ENV_PREFIX: &str = "REGISTRATION__";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] EndpointError),

    #[error("minimum age {0} is out of range")]
    MinimumAge(u32),
}

impl ConfigError {
    #[must_use]
    pub const fn source_name(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse",
            Self::Endpoint(_) => "endpoint",
            Self::MinimumAge(_) => "minimum_age",
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Parse(e.message().to_string())
    }
}

/// Runtime settings for the registration core.
///
/// Every key is optional in TOML; missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    pub base_url: String,
    pub register_path: String,
    pub minimum_age_years: u32,
    pub age_policy: AgePolicy,
    pub enforce_required_fields: bool,
    pub allow_private_hosts: bool,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            register_path: DEFAULT_REGISTER_PATH.into(),
            minimum_age_years: DEFAULT_MINIMUM_AGE_YEARS,
            age_policy: AgePolicy::default(),
            enforce_required_fields: true,
            allow_private_hosts: true,
        }
    }
}

impl FormConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `REGISTRATION__*` variables from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any `REGISTRATION__*` lookup. Unparseable values are skipped.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = get("BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = get("REGISTER_PATH") {
            self.register_path = v;
        }
        if let Some(v) = get("MINIMUM_AGE_YEARS").and_then(|v| v.trim().parse().ok()) {
            self.minimum_age_years = v;
        }
        if let Some(v) = get("AGE_POLICY").and_then(|v| AgePolicy::parse(&v)) {
            self.age_policy = v;
        }
        if let Some(v) = get("ENFORCE_REQUIRED_FIELDS").and_then(|v| parse_flag(&v)) {
            self.enforce_required_fields = v;
        }
        if let Some(v) = get("ALLOW_PRIVATE_HOSTS").and_then(|v| parse_flag(&v)) {
            self.allow_private_hosts = v;
        }

        self
    }

    #[must_use]
    pub const fn host_policy(&self) -> HostPolicy {
        if self.allow_private_hosts {
            HostPolicy::AllowPrivate
        } else {
            HostPolicy::PublicOnly
        }
    }

    /// Full URL of the registration endpoint.
    pub fn endpoint(&self) -> Result<ValidatedUrl, ConfigError> {
        let base = ValidatedUrl::new(self.base_url.as_str(), self.host_policy())?;
        let joined = Url::parse(base.as_str())
            .and_then(|b| b.join(&self.register_path))
            .map_err(|e| EndpointError::InvalidUrl {
                url: self.register_path.clone(),
                reason: e.to_string(),
            })?;
        Ok(ValidatedUrl::new(joined.as_str(), self.host_policy())?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.minimum_age_years == 0 || self.minimum_age_years > MAX_MINIMUM_AGE_YEARS {
            return Err(ConfigError::MinimumAge(self.minimum_age_years));
        }
        self.endpoint().map(|_| ())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
