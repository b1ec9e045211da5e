//! Caller identity classification.
//!
//! The API accepts an API key, either of the two user pools and IAM
//! credentials. Authorization is enforced upstream, so the resolver only
//! classifies the identity for log context and never branches on it.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    ApiKey,
    UserPool,
    Iam,
    Unknown,
}

impl AuthMode {
    pub fn from_identity(identity: Option<&Value>) -> Self {
        let Some(identity) = identity else {
            return Self::ApiKey;
        };
        let Some(object) = identity.as_object() else {
            return if identity.is_null() {
                Self::ApiKey
            } else {
                Self::Unknown
            };
        };

        if object.contains_key("issuer") || object.contains_key("claims") {
            Self::UserPool
        } else if object.contains_key("accountId") || object.contains_key("userArn") {
            Self::Iam
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::UserPool => "user_pool",
            Self::Iam => "iam",
            Self::Unknown => "unknown",
        }
    }
}

/// Token issuer of a user pool identity, which tells the app and web pools apart.
pub fn identity_issuer(identity: Option<&Value>) -> Option<&str> {
    identity?.get("issuer")?.as_str()
}
