use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use thiserror::Error;

use crate::auth::profile::Profile;
use crate::session::Session;

/// Username that marks the password field as a bearer token.
pub const TOKEN_USERNAME: &str = "JWT";

/// Coarse authentication outcome handed back to the broker.
///
/// Messages are stable and never carry verification internals; the detailed
/// cause is logged where the failure happens.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("error verifying token")]
    VerificationFailed,
    #[error("error exchanging credentials")]
    ExchangeFailed,
    #[error("session already authenticated")]
    AlreadyAuthenticated,
    #[error("authentication cancelled")]
    Cancelled,
}

/// Credentials presented in a CONNECT packet.
#[derive(Clone)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<Bytes>,
    pub client_id: String,
}

impl Credentials {
    /// True when the username is the bearer-token sentinel.
    pub fn is_bearer(&self) -> bool {
        self.username.as_deref() == Some(TOKEN_USERNAME)
    }

    /// Password as UTF-8, if present and valid.
    pub fn password_str(&self) -> Option<&str> {
        self.password
            .as_ref()
            .and_then(|password| std::str::from_utf8(password).ok())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("client_id", &self.client_id)
            .finish()
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Profile, AuthError>;
}

pub trait Authorizer: Send + Sync {
    fn authorize_publish(&self, session: &Session, topic: &str) -> bool;
    fn authorize_subscribe(&self, session: &Session, topic_filter: &str) -> bool;
}
