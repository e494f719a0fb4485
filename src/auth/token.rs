//! Bearer token verification.
//!
//! Tokens are HS256 JWS signed with the identity provider's client secret.
//! The declared algorithm is checked before any signature work so that
//! `none` or asymmetric headers are refused outright.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

use crate::auth::profile::Profile;
use crate::config::{IdentityProviderConfig, MAX_LEEWAY_SECS};

const ALGORITHM: Algorithm = Algorithm::HS256;
const ALGORITHM_NAME: &str = "HS256";

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    SignatureInvalid,
    #[error("token expired")]
    Expired,
    #[error("audience mismatch")]
    AudienceMismatch,
    #[error("issuer mismatch")]
    IssuerMismatch,
    #[error("algorithm not allowed")]
    AlgorithmDisallowed,
}

impl From<jsonwebtoken::errors::Error> for VerificationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => VerificationError::SignatureInvalid,
            ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => {
                VerificationError::Expired
            }
            ErrorKind::InvalidAudience => VerificationError::AudienceMismatch,
            ErrorKind::InvalidIssuer => VerificationError::IssuerMismatch,
            ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => {
                VerificationError::AudienceMismatch
            }
            ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => {
                VerificationError::IssuerMismatch
            }
            ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => {
                VerificationError::AlgorithmDisallowed
            }
            _ => VerificationError::Malformed,
        }
    }
}

#[derive(Deserialize)]
struct JoseHeader {
    alg: String,
}

#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Verifier enforcing signature, algorithm, audience and issuer.
    pub fn new(secret: &[u8], audience: &str, issuer: &str, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.set_audience(&[audience]);
        validation.set_issuer(&[issuer]);
        validation.required_spec_claims =
            HashSet::from(["aud".to_string(), "iss".to_string()]);
        validation.leeway = leeway_secs.min(MAX_LEEWAY_SECS);

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verifier enforcing signature and algorithm only.
    ///
    /// Used for tokens returned by the password grant, where the endpoint
    /// call itself already authenticated the device.
    pub fn signature_only(secret: &[u8], leeway_secs: u64) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();
        validation.leeway = leeway_secs.min(MAX_LEEWAY_SECS);

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn from_config(config: &IdentityProviderConfig) -> Self {
        Self::new(
            config.client_secret.as_bytes(),
            &config.audience,
            &config.issuer,
            config.leeway_secs,
        )
    }

    pub fn verify(&self, token: &str) -> Result<Profile, VerificationError> {
        let result = self.verify_inner(token);
        if let Err(ref e) = result {
            debug!("Token rejected: {}", e);
        }
        result
    }

    fn verify_inner(&self, token: &str) -> Result<Profile, VerificationError> {
        let token = token.trim();
        if declared_algorithm(token)? != ALGORITHM_NAME {
            return Err(VerificationError::AlgorithmDisallowed);
        }

        let data =
            jsonwebtoken::decode::<Map<String, Value>>(token, &self.key, &self.validation)?;
        // decode skips an exp it cannot read as seconds
        match data.claims.get("exp") {
            None => {}
            Some(Value::Number(exp)) if exp.is_u64() => {}
            Some(_) => return Err(VerificationError::Malformed),
        }
        Profile::from_claims(data.claims)
    }
}

/// Read the `alg` header without verifying anything.
fn declared_algorithm(token: &str) -> Result<String, VerificationError> {
    if token.is_empty() {
        return Err(VerificationError::Malformed);
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments[0].is_empty() || segments[1].is_empty() {
        return Err(VerificationError::Malformed);
    }

    let header = URL_SAFE_NO_PAD
        .decode(segments[0])
        .map_err(|_| VerificationError::Malformed)?;
    let header: JoseHeader =
        serde_json::from_slice(&header).map_err(|_| VerificationError::Malformed)?;
    Ok(header.alg)
}
