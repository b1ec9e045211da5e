use catalog_resolver_core::error::ResolverError;
use catalog_resolver_core::product::{Product, ProductPatch};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct ScanPage {
    pub items: Vec<Product>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("conditional write failed")]
    ConditionFailed,
    #[error("concurrent modification: {0}")]
    Conflict(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("request rejected by store: {0}")]
    Rejected(String),
    #[error("invalid pagination token: {0}")]
    InvalidToken(String),
    #[error("malformed item in store: {0}")]
    Malformed(String),
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<StoreError> for ResolverError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ConditionFailed => {
                ResolverError::Conflict("product store rejected a conditional write".to_string())
            }
            StoreError::Conflict(message) => ResolverError::Conflict(message),
            StoreError::Unavailable(message) => ResolverError::StoreUnavailable(message),
            StoreError::Rejected(message) => ResolverError::validation(message),
            StoreError::InvalidToken(message) => {
                ResolverError::validation(format!("nextToken is not valid: {message}"))
            }
            StoreError::Malformed(message) => {
                ResolverError::Internal(format!("malformed item in store: {message}"))
            }
            StoreError::Other(message) => ResolverError::Internal(message),
        }
    }
}

/// Single-item key-value access to the product table.
///
/// Implementations guarantee single-item atomicity and keep the category
/// index consistent with the table. No cross-item transactions are assumed.
pub trait ProductStore {
    fn get_item(&self, id: &str) -> Result<Option<Product>, StoreError>;

    /// Creates the item; [`StoreError::ConditionFailed`] if the id is taken.
    fn put_item(&self, product: &Product) -> Result<(), StoreError>;

    /// Applies the patch to the stored item in one atomic write and returns
    /// the full new state, `None` when the item does not exist.
    fn update_item(&self, patch: &ProductPatch) -> Result<Option<Product>, StoreError>;

    /// Removes the item and returns its prior state, `None` when it was absent.
    fn delete_item(&self, id: &str) -> Result<Option<Product>, StoreError>;

    /// Every item whose index key equals `key_value`, all pages drained.
    fn query_index(&self, index_name: &str, key_value: &str) -> Result<Vec<Product>, StoreError>;

    fn scan(&self, next_token: Option<&str>, limit: Option<u32>) -> Result<ScanPage, StoreError>;
}
