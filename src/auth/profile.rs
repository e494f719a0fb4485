use serde_json::{Map, Value};

use crate::auth::token::VerificationError;

/// Topic allow-list carried by a verified token.
///
/// `Absent` and `Empty` must stay distinct: an absent claim falls back to the
/// client-id namespace rule, an empty one denies every publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicClaim {
    Absent,
    Empty,
    Topics(Vec<String>),
}

impl TopicClaim {
    /// Normalize the raw `topics` claim.
    ///
    /// `null` is treated as present-but-empty. Duplicates are dropped, first
    /// occurrence wins.
    fn from_claim(value: Option<&Value>) -> Result<Self, VerificationError> {
        let items = match value {
            None => return Ok(TopicClaim::Absent),
            Some(Value::Null) => return Ok(TopicClaim::Empty),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(VerificationError::Malformed),
        };

        let mut topics: Vec<String> = Vec::with_capacity(items.len());
        for item in items {
            let topic = item.as_str().ok_or(VerificationError::Malformed)?;
            if !topics.iter().any(|existing| existing == topic) {
                topics.push(topic.to_string());
            }
        }

        if topics.is_empty() {
            Ok(TopicClaim::Empty)
        } else {
            Ok(TopicClaim::Topics(topics))
        }
    }

    pub fn contains(&self, topic: &str) -> bool {
        match self {
            TopicClaim::Topics(topics) => topics.iter().any(|allowed| allowed == topic),
            TopicClaim::Absent | TopicClaim::Empty => false,
        }
    }
}

/// Identity extracted from a verified token.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    subject: String,
    topics: TopicClaim,
    claims: Map<String, Value>,
}

impl Profile {
    /// Build a profile from a verified claim set.
    ///
    /// The subject comes from `user_id`, falling back to `sub`.
    pub fn from_claims(claims: Map<String, Value>) -> Result<Self, VerificationError> {
        let subject = claims
            .get("user_id")
            .and_then(Value::as_str)
            .or_else(|| claims.get("sub").and_then(Value::as_str))
            .ok_or(VerificationError::Malformed)?
            .to_string();
        let topics = TopicClaim::from_claim(claims.get("topics"))?;

        Ok(Self {
            subject,
            topics,
            claims,
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn topics(&self) -> &TopicClaim {
        &self.topics
    }

    /// Raw claim lookup.
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }
}
