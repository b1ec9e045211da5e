use thiserror::Error;

/// Caller-visible failure of a single resolver invocation.
///
/// `error_type` is what the GraphQL API surfaces as `errorType`, the
/// `Display` output becomes `errorMessage`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    #[error("product '{id}' was not found")]
    NotFound { id: String },
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("product store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ResolverError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::Validation(_) => "ValidationError",
            Self::Conflict(_) => "ConflictError",
            Self::StoreUnavailable(_) => "StoreUnavailable",
            Self::Internal(_) => "InternalError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_types_match_graphql_error_names() {
        assert_eq!(ResolverError::not_found("p-1").error_type(), "NotFound");
        assert_eq!(
            ResolverError::validation("id is required").error_type(),
            "ValidationError"
        );
        assert_eq!(
            ResolverError::Conflict("dup".to_string()).error_type(),
            "ConflictError"
        );
        assert_eq!(
            ResolverError::StoreUnavailable("throttled".to_string()).error_type(),
            "StoreUnavailable"
        );
        assert_eq!(
            ResolverError::Internal("boom".to_string()).error_type(),
            "InternalError"
        );
    }

    #[test]
    fn not_found_message_names_the_product() {
        let error = ResolverError::not_found("missing-id");
        assert_eq!(error.to_string(), "product 'missing-id' was not found");
    }
}
