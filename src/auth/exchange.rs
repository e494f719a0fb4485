//! Resource-owner password grant against the identity provider.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::profile::Profile;
use crate::auth::token::{TokenVerifier, VerificationError};
use crate::config::{ConfigError, IdentityProviderConfig};

/// Scope requested on every password grant.
pub const SCOPE: &str = "openid name email";

const GRANT_TYPE: &str = "password";

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("rejected by identity provider: {error}")]
    Rejected {
        error: String,
        description: Option<String>,
        /// Any further fields of the provider's error body
        details: Map<String, Value>,
    },
    #[error("failed to extract profile: {0}")]
    ProfileExtraction(#[source] VerificationError),
}

#[derive(Debug, Serialize)]
struct PasswordGrantRequest<'a> {
    client_id: &'a str,
    username: &'a str,
    password: &'a str,
    connection: &'a str,
    grant_type: &'a str,
    scope: &'a str,
}

/// Provider response body. An `error` field wins over anything else.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenResponse {
    Rejected {
        error: String,
        #[serde(default)]
        error_description: Option<String>,
        #[serde(flatten)]
        details: Map<String, Value>,
    },
    Issued {
        id_token: String,
    },
}

impl TokenResponse {
    fn decode(status: reqwest::StatusCode, body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|e| {
            debug!("Undecodable token response ({}): {}", status, e);
            TokenResponse::Rejected {
                error: "invalid_response".to_string(),
                error_description: Some(format!("unexpected response with status {status}")),
                details: Map::new(),
            }
        })
    }
}

pub struct CredentialExchanger {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
    connection: String,
    verifier: TokenVerifier,
}

impl CredentialExchanger {
    pub fn new(config: &IdentityProviderConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .https_only(!config.allow_insecure_transport)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.token_endpoint(),
            client_id: config.client_id.clone(),
            connection: config.connection.clone(),
            verifier: TokenVerifier::signature_only(
                config.client_secret.as_bytes(),
                config.leeway_secs,
            ),
        })
    }

    /// Trade a username and password for a verified profile.
    ///
    /// Issues exactly one request; failures are never retried here.
    pub async fn exchange(&self, username: &str, password: &str) -> Result<Profile, ExchangeError> {
        let request = PasswordGrantRequest {
            client_id: &self.client_id,
            username,
            password,
            connection: &self.connection,
            grant_type: GRANT_TYPE,
            scope: SCOPE,
        };

        debug!(
            "Requesting password grant for {} via connection {}",
            username, self.connection
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(ExchangeError::Transport)?;
        let status = response.status();
        let body = response.text().await.map_err(ExchangeError::Transport)?;

        match TokenResponse::decode(status, &body) {
            TokenResponse::Rejected {
                error,
                error_description,
                mut details,
            } => {
                warn!("Identity provider rejected {}: {}", username, error);
                details.remove("id_token");
                Err(ExchangeError::Rejected {
                    error,
                    description: error_description,
                    details,
                })
            }
            TokenResponse::Issued { id_token } => self
                .verifier
                .verify(&id_token)
                .map_err(ExchangeError::ProfileExtraction),
        }
    }
}
