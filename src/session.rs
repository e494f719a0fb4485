use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{AuthError, Authenticator, Credentials, Profile};

/// Per-connection authentication state.
///
/// Owned by a single connection task. A profile is attached at most once,
/// and only after the authenticator returned successfully.
#[derive(Debug)]
pub struct Session {
    session_id: String,
    client_id: String,
    profile: Option<Profile>,
}

impl Session {
    pub fn new(client_id: impl Into<String>) -> Self {
        let client_id = client_id.into();
        let client_id = if client_id.is_empty() {
            // Generate a unique client ID if none provided
            format!("auto-{}", Uuid::new_v4().simple())
        } else {
            client_id
        };

        Self {
            session_id: format!("session_{}", Uuid::new_v4()),
            client_id,
            profile: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.session_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.profile.is_some()
    }

    /// Authenticate this connection and attach the resulting profile.
    ///
    /// If the returned future is dropped before completion nothing is
    /// attached. A failed attempt leaves the session untouched and may be
    /// retried.
    pub async fn authenticate<A>(
        &mut self,
        authenticator: &A,
        username: Option<String>,
        password: Option<Bytes>,
    ) -> Result<(), AuthError>
    where
        A: Authenticator + ?Sized,
    {
        if self.is_authenticated() {
            warn!("Session {} is already authenticated", self.session_id);
            return Err(AuthError::AlreadyAuthenticated);
        }

        let credentials = Credentials {
            username,
            password,
            client_id: self.client_id.clone(),
        };

        match authenticator.authenticate(&credentials).await {
            Ok(profile) => {
                self.attach_profile(profile);
                Ok(())
            }
            Err(e) => {
                info!("Client {} refused: {}", self.client_id, e);
                Err(e)
            }
        }
    }

    /// Like [`Session::authenticate`], abandoning the attempt once `cancel` fires.
    pub async fn authenticate_until<A>(
        &mut self,
        authenticator: &A,
        username: Option<String>,
        password: Option<Bytes>,
        cancel: &CancellationToken,
    ) -> Result<(), AuthError>
    where
        A: Authenticator + ?Sized,
    {
        let client_id = self.client_id.clone();
        tokio::select! {
            result = self.authenticate(authenticator, username, password) => result,
            _ = cancel.cancelled() => {
                debug!("Authentication of client {} cancelled", client_id);
                Err(AuthError::Cancelled)
            }
        }
    }

    pub(crate) fn attach_profile(&mut self, profile: Profile) {
        debug_assert!(self.profile.is_none());
        self.profile = Some(profile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Fixed {
        result: Result<Profile, AuthError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Authenticator for Fixed {
        async fn authenticate(&self, _credentials: &Credentials) -> Result<Profile, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    struct Stalled;

    #[async_trait]
    impl Authenticator for Stalled {
        async fn authenticate(&self, _credentials: &Credentials) -> Result<Profile, AuthError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(profile())
        }
    }

    fn profile() -> Profile {
        match json!({"sub": "device-1"}) {
            serde_json::Value::Object(map) => Profile::from_claims(map).unwrap(),
            _ => unreachable!(),
        }
    }

    fn fixed(result: Result<Profile, AuthError>) -> Fixed {
        Fixed {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_new_session_keeps_client_id() {
        let session = Session::new("dev42");
        assert_eq!(session.client_id(), "dev42");
        assert!(session.id().starts_with("session_"));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_empty_client_id_is_generated() {
        let a = Session::new("");
        let b = Session::new("");
        assert!(a.client_id().starts_with("auto-"));
        assert_ne!(a.client_id(), b.client_id());
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_success_attaches_profile() {
        let auth = fixed(Ok(profile()));
        let mut session = Session::new("dev42");
        session
            .authenticate(&auth, Some("JWT".to_string()), Some(Bytes::from("t")))
            .await
            .unwrap();
        assert_eq!(session.profile().unwrap().subject(), "device-1");
    }

    #[tokio::test]
    async fn test_failure_attaches_nothing_and_can_retry() {
        let mut session = Session::new("dev42");

        let failing = fixed(Err(AuthError::VerificationFailed));
        let result = session
            .authenticate(&failing, Some("JWT".to_string()), Some(Bytes::from("t")))
            .await;
        assert_eq!(result, Err(AuthError::VerificationFailed));
        assert!(session.profile().is_none());

        let succeeding = fixed(Ok(profile()));
        session
            .authenticate(&succeeding, Some("JWT".to_string()), Some(Bytes::from("t")))
            .await
            .unwrap();
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_second_authentication_is_refused() {
        let auth = fixed(Ok(profile()));
        let mut session = Session::new("dev42");
        session.authenticate(&auth, Some("JWT".to_string()), None).await.unwrap();

        let result = session.authenticate(&auth, Some("JWT".to_string()), None).await;
        assert_eq!(result, Err(AuthError::AlreadyAuthenticated));
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_credentials_carry_session_client_id() {
        struct Echo;

        #[async_trait]
        impl Authenticator for Echo {
            async fn authenticate(&self, credentials: &Credentials) -> Result<Profile, AuthError> {
                match json!({"sub": credentials.client_id}) {
                    serde_json::Value::Object(map) => {
                        Profile::from_claims(map).map_err(|_| AuthError::VerificationFailed)
                    }
                    _ => unreachable!(),
                }
            }
        }

        let mut session = Session::new("dev42");
        session.authenticate(&Echo, None, None).await.unwrap();
        assert_eq!(session.profile().unwrap().subject(), "dev42");
    }

    #[tokio::test]
    async fn test_cancel_discards_result() {
        let mut session = Session::new("dev42");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = session
            .authenticate_until(&Stalled, Some("device".to_string()), None, &cancel)
            .await;
        assert_eq!(result, Err(AuthError::Cancelled));
        assert!(session.profile().is_none());
    }

    #[tokio::test]
    async fn test_dropped_future_attaches_nothing() {
        let mut session = Session::new("dev42");
        let attempt = session.authenticate(&Stalled, Some("device".to_string()), None);
        assert!(tokio::time::timeout(Duration::from_millis(20), attempt)
            .await
            .is_err());
        assert!(session.profile().is_none());
    }
}
