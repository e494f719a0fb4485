use tracing::{debug, warn};

use crate::auth::profile::TopicClaim;
use crate::auth::traits::Authorizer;
use crate::session::Session;

/// Publish/subscribe rules derived from the session's profile.
///
/// Publish: an explicit `topics` claim is an exact-match allow-list; without
/// one, a device may publish to any topic containing its client id.
/// Subscribe: always allowed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TopicPolicy;

impl Authorizer for TopicPolicy {
    fn authorize_publish(&self, session: &Session, topic: &str) -> bool {
        let Some(profile) = session.profile() else {
            warn!(
                "Publish to {} by unauthenticated client {} denied",
                topic,
                session.client_id()
            );
            return false;
        };

        let allowed = match profile.topics() {
            TopicClaim::Absent => {
                let client_id = session.client_id();
                !client_id.is_empty() && topic.contains(client_id)
            }
            claim => claim.contains(topic),
        };

        debug!(
            "Publish to {} by client {}: {}",
            topic,
            session.client_id(),
            if allowed { "allowed" } else { "denied" }
        );
        allowed
    }

    // Subscriptions are open to every session, authenticated or not.
    // TODO: decide whether subscribe should share the publish allow-list.
    fn authorize_subscribe(&self, session: &Session, topic_filter: &str) -> bool {
        debug!(
            "Subscribe to {} by client {}: allowed",
            topic_filter,
            session.client_id()
        );
        true
    }
}
