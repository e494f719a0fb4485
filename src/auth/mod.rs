pub mod exchange;
pub mod gateway;
pub mod policy;
pub mod profile;
pub mod token;
pub mod traits;

pub use exchange::{CredentialExchanger, ExchangeError};
pub use gateway::AuthenticationGateway;
pub use policy::TopicPolicy;
pub use profile::{Profile, TopicClaim};
pub use token::{TokenVerifier, VerificationError};
pub use traits::*;

use crate::config::{Config, ConfigError};
use std::sync::Arc;

/// Create authenticator based on configuration
pub fn new(config: &Config) -> Result<Arc<dyn Authenticator>, ConfigError> {
    Ok(Arc::new(AuthenticationGateway::new(config)?))
}

/// Create the topic authorizer
pub fn authorizer() -> Arc<dyn Authorizer> {
    Arc::new(TopicPolicy)
}
