use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use catalog_resolver_lambda::adapters::dynamodb_store::DynamoDbProductStore;
use catalog_resolver_lambda::config::ResolverConfig;
use catalog_resolver_lambda::handlers::resolver::{
    diagnostic_for, handle_resolver_event, ResolverSettings,
};
use lambda_runtime::{service_fn, tracing, Diagnostic, Error, LambdaEvent};
use serde_json::Value;

async fn handle_request(
    event: LambdaEvent<Value>,
    settings: &ResolverSettings,
    store: &DynamoDbProductStore,
) -> Result<Value, Diagnostic> {
    handle_resolver_event(event.payload, settings, store).map_err(|error| diagnostic_for(&error))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = ResolverConfig::from_env()?;

    // Retries are owned by the resolver so the SDK must not add its own.
    let aws_config = aws_config::defaults(BehaviorVersion::latest())
        .retry_config(RetryConfig::disabled())
        .timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(config.operation_timeout)
                .build(),
        )
        .load()
        .await;
    let store = DynamoDbProductStore::new(
        aws_sdk_dynamodb::Client::new(&aws_config),
        config.table_name.clone(),
    );
    let settings = config.settings();

    tracing::info!(
        table = store.table_name(),
        category_index = %settings.category_index,
        "resolver_cold_start"
    );

    lambda_runtime::run(service_fn(|event| handle_request(event, &settings, &store))).await
}
