use std::time::{Duration, Instant};

use catalog_resolver_core::contract::{
    ProductPage, ResolverEvent, ResolverOperation, CATEGORY_INDEX_NAME,
};
use catalog_resolver_core::error::ResolverError;
use catalog_resolver_core::identity::{identity_issuer, AuthMode};
use lambda_runtime::{tracing, Diagnostic};
use serde::Serialize;
use serde_json::Value;

use crate::adapters::product_store::{ProductStore, StoreError};

pub const DEFAULT_LIST_LIMIT: u32 = 100;

/// Bounded retry for transient store failures. Nothing else is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling each time.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    pub category_index: String,
    pub default_list_limit: u32,
    pub retry: RetryPolicy,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            category_index: CATEGORY_INDEX_NAME.to_string(),
            default_list_limit: DEFAULT_LIST_LIMIT,
            retry: RetryPolicy::default(),
        }
    }
}

pub fn generate_product_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Resolves one invocation with server-generated ids.
pub fn handle_resolver_event(
    event: Value,
    settings: &ResolverSettings,
    store: &(impl ProductStore + ?Sized),
) -> Result<Value, ResolverError> {
    handle_resolver_event_with_ids(event, settings, store, &generate_product_id)
}

pub fn handle_resolver_event_with_ids(
    event: Value,
    settings: &ResolverSettings,
    store: &(impl ProductStore + ?Sized),
    next_id: &dyn Fn() -> String,
) -> Result<Value, ResolverError> {
    let started_at = Instant::now();
    let event = ResolverEvent::from_value(event).inspect_err(|error| {
        tracing::warn!(error_type = error.error_type(), error = %error, "resolver_rejected");
    })?;

    let field_name = event.field_name().unwrap_or("<missing>").to_string();
    let operation_type = event.operation_type_name().unwrap_or("<missing>").to_string();
    let auth_mode = AuthMode::from_identity(event.identity.as_ref());
    tracing::info!(
        field = %field_name,
        operation_type = %operation_type,
        auth_mode = auth_mode.as_str(),
        issuer = identity_issuer(event.identity.as_ref()).unwrap_or("-"),
        "resolver_started"
    );

    let result = event
        .operation()
        .and_then(|operation| execute_operation(operation, settings, store, next_id));

    let duration_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(_) => tracing::info!(
            field = %field_name,
            duration_ms = duration_ms as u64,
            "resolver_completed"
        ),
        Err(error) => tracing::error!(
            field = %field_name,
            error_type = error.error_type(),
            error = %error,
            duration_ms = duration_ms as u64,
            "resolver_failed"
        ),
    }
    result
}

/// Lambda-facing error shape: `errorType` carries the taxonomy name.
pub fn diagnostic_for(error: &ResolverError) -> Diagnostic {
    Diagnostic {
        error_type: error.error_type().to_string(),
        error_message: error.to_string(),
    }
}

fn execute_operation(
    operation: ResolverOperation,
    settings: &ResolverSettings,
    store: &(impl ProductStore + ?Sized),
    next_id: &dyn Fn() -> String,
) -> Result<Value, ResolverError> {
    let retry = &settings.retry;
    match operation {
        ResolverOperation::GetProductById { id } => {
            let product = with_retry(retry, "get_item", || store.get_item(&id))?
                .ok_or_else(|| ResolverError::not_found(&id))?;
            to_result(&product)
        }
        ResolverOperation::ListProducts { limit, next_token } => {
            let limit = limit.unwrap_or(settings.default_list_limit);
            let page = with_retry(retry, "scan", || {
                store.scan(next_token.as_deref(), Some(limit))
            })?;
            to_result(&ProductPage {
                items: page.items,
                next_token: page.next_token,
            })
        }
        ResolverOperation::ProductsByCategory { category } => {
            let products = with_retry(retry, "query_index", || {
                store.query_index(&settings.category_index, &category)
            })?;
            to_result(&products)
        }
        ResolverOperation::CreateProduct(new_product) => {
            let product = new_product.into_product(next_id);
            let created = with_retry(retry, "put_item", || store.put_item(&product));
            created.map_err(|error| match error {
                StoreError::ConditionFailed => ResolverError::Conflict(format!(
                    "product '{}' already exists",
                    product.id
                )),
                other => other.into(),
            })?;
            to_result(&product)
        }
        ResolverOperation::UpdateProduct(patch) => {
            let updated = with_retry(retry, "update_item", || store.update_item(&patch))?
                .ok_or_else(|| ResolverError::not_found(&patch.id))?;
            to_result(&updated)
        }
        ResolverOperation::DeleteProduct { id } => {
            // Not retried: a lost acknowledgement would turn into NotFound.
            let prior = store
                .delete_item(&id)?
                .ok_or_else(|| ResolverError::not_found(&id))?;
            to_result(&prior)
        }
    }
}

fn with_retry<T>(
    policy: &RetryPolicy,
    call: &str,
    mut operation: impl FnMut() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let mut attempt = 0;
    loop {
        match operation() {
            Err(error) if error.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    call,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "store_retry"
                );
                if !delay.is_zero() {
                    backoff(delay);
                }
            }
            result => return result,
        }
    }
}

/// Sleeps off a retry delay without stalling other tasks on a runtime worker.
fn backoff(delay: Duration) {
    tokio::task::block_in_place(|| std::thread::sleep(delay));
}

fn to_result(value: &impl Serialize) -> Result<Value, ResolverError> {
    serde_json::to_value(value)
        .map_err(|error| ResolverError::Internal(format!("failed to serialize result: {error}")))
}
