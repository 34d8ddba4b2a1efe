use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crux_http::Response;

pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 500;

/// Whether loopback and private-network hosts are acceptable endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HostPolicy {
    #[default]
    PublicOnly,
    AllowPrivate,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatedUrl {
    url: String,
    host: String,
}

impl ValidatedUrl {
    pub fn new(url: impl Into<String>, policy: HostPolicy) -> Result<Self, EndpointError> {
        let url = url.into();
        let parsed = Self::validate(&url, policy)?;

        let host = parsed.host_str().unwrap_or_default().to_lowercase();

        Ok(Self {
            url: parsed.to_string(),
            host,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    fn validate(url: &str, policy: HostPolicy) -> Result<Url, EndpointError> {
        let invalid = |reason: String| EndpointError::InvalidUrl {
            url: Self::truncate_url(url),
            reason,
        };

        if url.trim().is_empty() {
            return Err(invalid("URL cannot be empty".into()));
        }

        if url.len() > MAX_URL_LENGTH {
            return Err(invalid(format!(
                "URL exceeds maximum length of {MAX_URL_LENGTH} bytes"
            )));
        }

        let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;

        let scheme = parsed.scheme().to_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(invalid(format!(
                "invalid scheme '{scheme}', only 'http' and 'https' are allowed"
            )));
        }

        let Some(host) = parsed.host_str().map(str::to_lowercase) else {
            return Err(invalid("URL must have a host".into()));
        };

        if policy == HostPolicy::PublicOnly && Self::is_private_host(&host) {
            return Err(EndpointError::PrivateNetworkBlocked {
                url: Self::truncate_url(url),
                host,
            });
        }

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(invalid("credentials in URL are not allowed".into()));
        }

        Ok(parsed)
    }

    fn is_private_host(host: &str) -> bool {
        if matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]" | "0.0.0.0") {
            return true;
        }

        if host.ends_with(".local") || host.ends_with(".localhost") || host.ends_with(".internal") {
            return true;
        }

        if host.starts_with("10.") || host.starts_with("192.168.") || host.starts_with("169.254.") {
            return true;
        }

        if let Some(rest) = host.strip_prefix("172.") {
            let second = rest.split('.').next().and_then(|o| o.parse::<u8>().ok());
            if second.is_some_and(|o| (16..=31).contains(&o)) {
                return true;
            }
        }

        host.starts_with("[fd") || host.starts_with("[fe80:")
    }

    fn truncate_url(url: &str) -> String {
        if url.len() <= 100 {
            return url.to_string();
        }
        let mut end = 100;
        while !url.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &url[..end])
    }
}

impl std::fmt::Display for ValidatedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Json,
    Multipart,
    OctetStream,
}

impl ContentType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Multipart => "multipart/form-data",
            Self::OctetStream => "application/octet-stream",
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum EndpointError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("private network access blocked: {url} resolves to {host}")]
    PrivateNetworkBlocked { url: String, host: String },
}

/// Why a registration request did not succeed.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum SubmitFailure {
    /// The request never produced an HTTP status.
    #[error("transport failure: {reason}")]
    TransportFailure { reason: String },

    /// The server answered with a non-success status.
    #[error("server rejected submission with status {status}")]
    ServerRejection {
        status: u16,
        message: Option<String>,
    },
}

impl SubmitFailure {
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::ServerRejection { message, .. } => message.as_deref(),
            Self::TransportFailure { .. } => None,
        }
    }

    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::ServerRejection { status, .. } => Some(*status),
            Self::TransportFailure { .. } => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Pulls the `error` string out of a JSON error body. Only an empty string counts as absent;
/// anything else is shown verbatim, capped at [`MAX_ERROR_MESSAGE_LENGTH`] characters.
#[must_use]
pub fn server_error_message(body: &[u8]) -> Option<String> {
    let message = serde_json::from_slice::<ApiErrorResponse>(body).ok()?.error?;
    if message.is_empty() {
        return None;
    }
    Some(message.chars().take(MAX_ERROR_MESSAGE_LENGTH).collect())
}

/// Classifies the outcome of the registration request.
///
/// `crux_http` reports 4xx and 5xx as [`crux_http::HttpError::Http`] carrying the body; any
/// other error means no status was received. A non-2xx status that still arrives as `Ok` is
/// treated as a rejection without a message.
pub fn interpret_response(result: &crux_http::Result<Response<Vec<u8>>>) -> Result<u16, SubmitFailure> {
    match result {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                Ok(u16::from(status))
            } else {
                Err(SubmitFailure::ServerRejection {
                    status: u16::from(status),
                    message: response.body().and_then(|b| server_error_message(b)),
                })
            }
        }
        Err(crux_http::HttpError::Http { code, body, .. }) => Err(SubmitFailure::ServerRejection {
            status: u16::from(*code),
            message: body.as_deref().and_then(server_error_message),
        }),
        Err(other) => Err(SubmitFailure::TransportFailure {
            reason: other.to_string(),
        }),
    }
}
