use async_trait::async_trait;
use tracing::{info, warn};

use crate::auth::exchange::CredentialExchanger;
use crate::auth::profile::Profile;
use crate::auth::token::TokenVerifier;
use crate::auth::traits::{AuthError, Authenticator, Credentials};
use crate::config::{AuthStrategy, Config, ConfigError};

/// Entry point for every connection attempt.
///
/// The username alone picks the strategy: the `"JWT"` sentinel verifies the
/// password as a bearer token, anything else goes through the password grant.
pub struct AuthenticationGateway {
    strategy: AuthStrategy,
    verifier: TokenVerifier,
    exchanger: CredentialExchanger,
}

impl AuthenticationGateway {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            strategy: config.auth.strategy,
            verifier: TokenVerifier::from_config(&config.identity_provider),
            exchanger: CredentialExchanger::new(&config.identity_provider)?,
        })
    }

    pub fn strategy(&self) -> AuthStrategy {
        self.strategy
    }

    fn verify_token(&self, client_id: &str, token: &str) -> Result<Profile, AuthError> {
        self.verifier.verify(token).map_err(|e| {
            warn!("Rejected token from client {}: {}", client_id, e);
            AuthError::VerificationFailed
        })
    }

    async fn exchange_password(
        &self,
        client_id: &str,
        username: &str,
        password: &str,
    ) -> Result<Profile, AuthError> {
        self.exchanger
            .exchange(username, password)
            .await
            .map_err(|e| {
                warn!(
                    "Password exchange failed for client {} (user {}): {}",
                    client_id, username, e
                );
                AuthError::ExchangeFailed
            })
    }
}

#[async_trait]
impl Authenticator for AuthenticationGateway {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Profile, AuthError> {
        let client_id = credentials.client_id.as_str();
        let username = credentials
            .username
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;
        let password = credentials
            .password_str()
            .ok_or(AuthError::InvalidCredentials)?;

        let profile = match (credentials.is_bearer(), self.strategy) {
            (true, AuthStrategy::Credentials) | (false, AuthStrategy::Jwt) => {
                warn!(
                    "Client {} used a strategy disabled by configuration ({:?})",
                    client_id, self.strategy
                );
                return Err(AuthError::InvalidCredentials);
            }
            (true, _) => self.verify_token(client_id, password)?,
            (false, _) => {
                self.exchange_password(client_id, username, password)
                    .await?
            }
        };

        info!("Authenticated client {} as {}", client_id, profile.subject());
        Ok(profile)
    }
}
