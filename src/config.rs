use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Largest clock skew accepted for `leeway_secs`.
pub const MAX_LEEWAY_SECS: u64 = 3600;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
    #[error("Invalid identity provider URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Identity provider URL {0} is not https (set allow_insecure_transport to override)")]
    InsecureTransport(String),
    #[error("leeway_secs {0} exceeds the maximum of {max}", max = MAX_LEEWAY_SECS)]
    LeewayTooLarge(u64),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Identity provider configuration
    #[serde(default)]
    pub identity_provider: IdentityProviderConfig,
}

impl Config {
    /// Load from a TOML file. The result is not validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Override identity provider settings from the `AUTH0_*` process environment.
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override identity provider settings from an arbitrary variable source.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let idp = &mut self.identity_provider;
        let overrides: [(&str, &mut String); 6] = [
            ("AUTH0_URI", &mut idp.base_url),
            ("AUTH0_CLIENT_ID", &mut idp.client_id),
            ("AUTH0_CLIENT_SECRET", &mut idp.client_secret),
            ("AUTH0_CONNECTION", &mut idp.connection),
            ("AUTH0_AUDIENCE", &mut idp.audience),
            ("AUTH0_ISSUER", &mut idp.issuer),
        ];
        for (key, field) in overrides {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *field = value;
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.identity_provider.validate()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthStrategy {
    /// Route on the username: "JWT" verifies a token, anything else exchanges a password
    #[default]
    Auto,
    /// Bearer tokens only
    Jwt,
    /// Password exchange only
    Credentials,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Auth strategy: "auto", "jwt" or "credentials" (default: "auto")
    #[serde(default)]
    pub strategy: AuthStrategy,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct IdentityProviderConfig {
    /// Provider base URL, e.g. "https://tenant.auth0.com"
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub client_id: String,

    /// Shared HS256 secret; also used to verify issued tokens
    #[serde(default)]
    pub client_secret: String,

    /// Database connection for the password grant (default: "Devices")
    #[serde(default = "default_connection")]
    pub connection: String,

    /// Expected `aud` claim on bearer tokens
    #[serde(default)]
    pub audience: String,

    /// Expected `iss` claim on bearer tokens
    #[serde(default)]
    pub issuer: String,

    /// Whole-request timeout for the password grant (default: 10000)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Connect timeout for the password grant (default: 5000)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Clock skew tolerated when checking `exp` (default: 0, at most 3600)
    #[serde(default)]
    pub leeway_secs: u64,

    /// Permit plain http:// provider URLs (default: false)
    #[serde(default)]
    pub allow_insecure_transport: bool,
}

fn default_connection() -> String {
    "Devices".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10000
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

impl Default for IdentityProviderConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            connection: default_connection(),
            audience: String::new(),
            issuer: String::new(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            leeway_secs: 0,
            allow_insecure_transport: false,
        }
    }
}

impl fmt::Debug for IdentityProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityProviderConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("connection", &self.connection)
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("leeway_secs", &self.leeway_secs)
            .field("allow_insecure_transport", &self.allow_insecure_transport)
            .finish()
    }
}

impl IdentityProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Password-grant endpoint
    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth/ro", self.base_url.trim_end_matches('/'))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("identity_provider.base_url", &self.base_url),
            ("identity_provider.client_id", &self.client_id),
            ("identity_provider.client_secret", &self.client_secret),
            ("identity_provider.connection", &self.connection),
            ("identity_provider.audience", &self.audience),
            ("identity_provider.issuer", &self.issuer),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(name));
            }
        }

        if self.leeway_secs > MAX_LEEWAY_SECS {
            return Err(ConfigError::LeewayTooLarge(self.leeway_secs));
        }

        let url = reqwest::Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "https" => Ok(()),
            "http" if self.allow_insecure_transport => Ok(()),
            "http" => Err(ConfigError::InsecureTransport(self.base_url.clone())),
            other => Err(ConfigError::InvalidUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme {other}"),
            }),
        }
    }
}
