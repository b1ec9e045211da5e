use std::collections::HashMap;
use std::future::Future;

use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use catalog_resolver_core::product::{
    CategoryChange, Product, ProductPatch, CATEGORY_FIELD, ID_FIELD,
};
use serde_json::{Map, Number, Value};

use crate::adapters::product_store::{ProductStore, ScanPage, StoreError};

pub type Item = HashMap<String, AttributeValue>;

/// Error codes DynamoDB uses for throttling and server-side trouble.
const TRANSIENT_ERROR_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
    "InternalServerError",
    "ServiceUnavailable",
];

pub struct DynamoDbProductStore {
    client: Client,
    table_name: String,
}

impl DynamoDbProductStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

impl ProductStore for DynamoDbProductStore {
    fn get_item(&self, id: &str) -> Result<Option<Product>, StoreError> {
        let output = block_on_sdk(
            self.client
                .get_item()
                .table_name(&self.table_name)
                .key(ID_FIELD, AttributeValue::S(id.to_string()))
                .consistent_read(true)
                .send(),
        )
        .map_err(classify_sdk_error)?;

        output.item.map(product_from_item).transpose()
    }

    fn put_item(&self, product: &Product) -> Result<(), StoreError> {
        block_on_sdk(
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item_from_product(product)))
                .condition_expression("attribute_not_exists(#id)")
                .expression_attribute_names("#id", ID_FIELD)
                .send(),
        )
        .map(|_| ())
        .map_err(classify_sdk_error)
    }

    fn update_item(&self, patch: &ProductPatch) -> Result<Option<Product>, StoreError> {
        let Some(plan) = update_plan(patch) else {
            return self.get_item(&patch.id);
        };

        let mut names = plan.names;
        names.insert("#id".to_string(), ID_FIELD.to_string());
        let values = (!plan.values.is_empty()).then_some(plan.values);

        let result = block_on_sdk(
            self.client
                .update_item()
                .table_name(&self.table_name)
                .key(ID_FIELD, AttributeValue::S(patch.id.clone()))
                .update_expression(plan.expression)
                .condition_expression("attribute_exists(#id)")
                .set_expression_attribute_names(Some(names))
                .set_expression_attribute_values(values)
                .return_values(ReturnValue::AllNew)
                .send(),
        )
        .map_err(classify_sdk_error);

        match result {
            Ok(output) => output
                .attributes
                .ok_or_else(|| {
                    StoreError::Malformed("update returned no attributes".to_string())
                })
                .and_then(product_from_item)
                .map(Some),
            Err(StoreError::ConditionFailed) => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn delete_item(&self, id: &str) -> Result<Option<Product>, StoreError> {
        let output = block_on_sdk(
            self.client
                .delete_item()
                .table_name(&self.table_name)
                .key(ID_FIELD, AttributeValue::S(id.to_string()))
                .return_values(ReturnValue::AllOld)
                .send(),
        )
        .map_err(classify_sdk_error)?;

        output
            .attributes
            .filter(|attributes| !attributes.is_empty())
            .map(product_from_item)
            .transpose()
    }

    fn query_index(&self, index_name: &str, key_value: &str) -> Result<Vec<Product>, StoreError> {
        let mut products = Vec::new();
        let mut exclusive_start_key: Option<Item> = None;

        loop {
            let output = block_on_sdk(
                self.client
                    .query()
                    .table_name(&self.table_name)
                    .index_name(index_name)
                    .key_condition_expression("#category = :category")
                    .expression_attribute_names("#category", CATEGORY_FIELD)
                    .expression_attribute_values(
                        ":category",
                        AttributeValue::S(key_value.to_string()),
                    )
                    .set_exclusive_start_key(exclusive_start_key.take())
                    .send(),
            )
            .map_err(classify_sdk_error)?;

            for item in output.items.unwrap_or_default() {
                products.push(product_from_item(item)?);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key),
                _ => return Ok(products),
            }
        }
    }

    fn scan(&self, next_token: Option<&str>, limit: Option<u32>) -> Result<ScanPage, StoreError> {
        let exclusive_start_key = next_token.map(|token| {
            HashMap::from([(ID_FIELD.to_string(), AttributeValue::S(token.to_string()))])
        });
        let limit = limit
            .map(|value| {
                i32::try_from(value)
                    .map_err(|_| StoreError::Other(format!("scan limit {value} is out of range")))
            })
            .transpose()?;

        let output = block_on_sdk(
            self.client
                .scan()
                .table_name(&self.table_name)
                .set_limit(limit)
                .set_exclusive_start_key(exclusive_start_key)
                .send(),
        )
        .map_err(classify_sdk_error)?;

        let items = output
            .items
            .unwrap_or_default()
            .into_iter()
            .map(product_from_item)
            .collect::<Result<Vec<_>, _>>()?;
        let next_token = output
            .last_evaluated_key
            .as_ref()
            .map(token_from_key)
            .transpose()?
            .flatten();

        Ok(ScanPage { items, next_token })
    }
}

/// `UpdateItem` expression for one patch, with every attribute name and value
/// behind a placeholder.
#[derive(Debug, Default, PartialEq)]
pub struct UpdatePlan {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: Item,
}

/// `None` when the patch changes nothing.
pub fn update_plan(patch: &ProductPatch) -> Option<UpdatePlan> {
    let mut plan = UpdatePlan::default();
    let mut set_clauses = Vec::new();
    let mut remove_clauses = Vec::new();

    match &patch.category {
        CategoryChange::Keep => {}
        CategoryChange::Set(category) => {
            plan.names.insert("#category".to_string(), CATEGORY_FIELD.to_string());
            plan.values.insert(":category".to_string(), AttributeValue::S(category.clone()));
            set_clauses.push("#category = :category".to_string());
        }
        CategoryChange::Remove => {
            plan.names.insert("#category".to_string(), CATEGORY_FIELD.to_string());
            remove_clauses.push("#category".to_string());
        }
    }

    for (index, (name, value)) in patch.set.iter().enumerate() {
        plan.names.insert(format!("#s{index}"), name.clone());
        plan.values.insert(format!(":s{index}"), attribute_from_json(value));
        set_clauses.push(format!("#s{index} = :s{index}"));
    }
    for (index, name) in patch.remove.iter().enumerate() {
        plan.names.insert(format!("#r{index}"), name.clone());
        remove_clauses.push(format!("#r{index}"));
    }

    let mut sections = Vec::with_capacity(2);
    if !set_clauses.is_empty() {
        sections.push(format!("SET {}", set_clauses.join(", ")));
    }
    if !remove_clauses.is_empty() {
        sections.push(format!("REMOVE {}", remove_clauses.join(", ")));
    }
    if sections.is_empty() {
        return None;
    }

    plan.expression = sections.join(" ");
    Some(plan)
}

/// Runs one SDK call to completion from the synchronous store port.
fn block_on_sdk<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

pub fn classify_sdk_error<E, R>(error: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let detail = DisplayErrorContext(&error).to_string();
    match &error {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StoreError::Unavailable(detail)
        }
        _ => classify_error_code(error.code(), detail),
    }
}

pub fn classify_error_code(code: Option<&str>, detail: String) -> StoreError {
    match code {
        Some("ConditionalCheckFailedException") => StoreError::ConditionFailed,
        Some("TransactionConflictException") => StoreError::Conflict(detail),
        Some("ValidationException") => StoreError::Rejected(detail),
        Some(code) if TRANSIENT_ERROR_CODES.contains(&code) => StoreError::Unavailable(detail),
        _ => StoreError::Other(detail),
    }
}

fn token_from_key(key: &Item) -> Result<Option<String>, StoreError> {
    match key.get(ID_FIELD) {
        None => Ok(None),
        Some(AttributeValue::S(id)) => Ok(Some(id.clone())),
        Some(_) => Err(StoreError::Malformed(
            "last evaluated key has a non-string id".to_string(),
        )),
    }
}

pub fn item_from_product(product: &Product) -> Item {
    product
        .to_fields()
        .iter()
        .map(|(name, value)| (name.clone(), attribute_from_json(value)))
        .collect()
}

pub fn product_from_item(item: Item) -> Result<Product, StoreError> {
    let mut fields = Map::with_capacity(item.len());
    for (name, attribute) in item {
        let value = json_from_attribute(&attribute)
            .map_err(|message| StoreError::Malformed(format!("attribute '{name}': {message}")))?;
        fields.insert(name, value);
    }
    Product::from_fields(fields).map_err(|error| StoreError::Malformed(error.to_string()))
}

pub fn attribute_from_json(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(flag) => AttributeValue::Bool(*flag),
        Value::Number(number) => AttributeValue::N(number.to_string()),
        Value::String(text) => AttributeValue::S(text.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(attribute_from_json).collect()),
        Value::Object(fields) => AttributeValue::M(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), attribute_from_json(value)))
                .collect(),
        ),
    }
}

pub fn json_from_attribute(attribute: &AttributeValue) -> Result<Value, String> {
    match attribute {
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::Bool(flag) => Ok(Value::Bool(*flag)),
        AttributeValue::N(raw) => parse_number(raw).map(Value::Number),
        AttributeValue::S(text) => Ok(Value::String(text.clone())),
        AttributeValue::L(values) => values
            .iter()
            .map(json_from_attribute)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        AttributeValue::M(fields) => fields
            .iter()
            .map(|(name, value)| json_from_attribute(value).map(|value| (name.clone(), value)))
            .collect::<Result<Map<_, _>, _>>()
            .map(Value::Object),
        AttributeValue::Ss(values) => Ok(Value::Array(
            values.iter().cloned().map(Value::String).collect(),
        )),
        AttributeValue::Ns(values) => values
            .iter()
            .map(|raw| parse_number(raw).map(Value::Number))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        AttributeValue::B(_) | AttributeValue::Bs(_) => {
            Err("binary attributes are not supported".to_string())
        }
        _ => Err("unsupported attribute type".to_string()),
    }
}

fn parse_number(raw: &str) -> Result<Number, String> {
    serde_json::from_str::<Number>(raw.trim())
        .map_err(|error| format!("invalid number '{raw}': {error}"))
}
