use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ResolverError;
use crate::product::{key_string, NewProduct, Product, ProductPatch, CATEGORY_FIELD, ID_FIELD};

pub const CATEGORY_INDEX_NAME: &str = "productsByCategory";
pub const MAX_LIST_LIMIT: u32 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Query,
    Mutation,
}

impl OperationType {
    pub fn parse(value: &str) -> Result<Self, ResolverError> {
        match value {
            "Query" => Ok(Self::Query),
            "Mutation" => Ok(Self::Mutation),
            other => Err(ResolverError::validation(format!(
                "Unsupported operation type '{other}'"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Query => "Query",
            Self::Mutation => "Mutation",
        }
    }
}

/// The six GraphQL fields wired to the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverField {
    GetProductById,
    ListProducts,
    ProductsByCategory,
    CreateProduct,
    UpdateProduct,
    DeleteProduct,
}

impl ResolverField {
    pub const ALL: [Self; 6] = [
        Self::GetProductById,
        Self::ListProducts,
        Self::ProductsByCategory,
        Self::CreateProduct,
        Self::UpdateProduct,
        Self::DeleteProduct,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::GetProductById => "getProductById",
            Self::ListProducts => "listProducts",
            Self::ProductsByCategory => "productsByCategory",
            Self::CreateProduct => "createProduct",
            Self::UpdateProduct => "updateProduct",
            Self::DeleteProduct => "deleteProduct",
        }
    }

    pub fn operation_type(self) -> OperationType {
        match self {
            Self::GetProductById | Self::ListProducts | Self::ProductsByCategory => {
                OperationType::Query
            }
            Self::CreateProduct | Self::UpdateProduct | Self::DeleteProduct => {
                OperationType::Mutation
            }
        }
    }

    pub fn resolve(operation_type: OperationType, field_name: &str) -> Result<Self, ResolverError> {
        let field = Self::ALL
            .into_iter()
            .find(|field| field.name() == field_name)
            .ok_or_else(|| {
                ResolverError::validation(format!("Unknown field '{field_name}'"))
            })?;

        if field.operation_type() != operation_type {
            return Err(ResolverError::validation(format!(
                "Field '{field_name}' is not a {} field",
                operation_type.as_str()
            )));
        }
        Ok(field)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolverOperation {
    GetProductById { id: String },
    ListProducts {
        limit: Option<u32>,
        next_token: Option<String>,
    },
    ProductsByCategory { category: String },
    CreateProduct(NewProduct),
    UpdateProduct(ProductPatch),
    DeleteProduct { id: String },
}

impl ResolverOperation {
    pub fn parse(field: ResolverField, arguments: &Map<String, Value>) -> Result<Self, ResolverError> {
        match field {
            ResolverField::GetProductById => Ok(Self::GetProductById {
                id: required_key(arguments, &["productId", ID_FIELD], ID_FIELD)?,
            }),
            ResolverField::ListProducts => Ok(Self::ListProducts {
                limit: optional_limit(arguments.get("limit"))?,
                next_token: optional_token(arguments.get("nextToken"))?,
            }),
            ResolverField::ProductsByCategory => Ok(Self::ProductsByCategory {
                category: required_key(arguments, &[CATEGORY_FIELD], CATEGORY_FIELD)?,
            }),
            ResolverField::CreateProduct => {
                NewProduct::from_payload(product_payload(arguments)?).map(Self::CreateProduct)
            }
            ResolverField::UpdateProduct => {
                ProductPatch::from_payload(product_payload(arguments)?).map(Self::UpdateProduct)
            }
            ResolverField::DeleteProduct => Ok(Self::DeleteProduct {
                id: required_key(arguments, &["productId", ID_FIELD], ID_FIELD)?,
            }),
        }
    }

    pub fn field(&self) -> ResolverField {
        match self {
            Self::GetProductById { .. } => ResolverField::GetProductById,
            Self::ListProducts { .. } => ResolverField::ListProducts,
            Self::ProductsByCategory { .. } => ResolverField::ProductsByCategory,
            Self::CreateProduct(_) => ResolverField::CreateProduct,
            Self::UpdateProduct(_) => ResolverField::UpdateProduct,
            Self::DeleteProduct { .. } => ResolverField::DeleteProduct,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolverInfo {
    #[serde(default)]
    pub parent_type_name: Option<String>,
    #[serde(default)]
    pub field_name: Option<String>,
}

/// One resolver invocation.
///
/// Accepts the flat `{operationType, fieldName, arguments, identity}` shape
/// and the direct resolver shape that carries the type and field under
/// `info`. Top-level values win when both are present.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolverEvent {
    #[serde(default)]
    pub operation_type: Option<String>,
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub arguments: Option<Value>,
    #[serde(default)]
    pub identity: Option<Value>,
    #[serde(default)]
    pub info: Option<ResolverInfo>,
}

impl ResolverEvent {
    pub fn from_value(event: Value) -> Result<Self, ResolverError> {
        if !event.is_object() {
            return Err(ResolverError::validation(
                "Resolver event must be a JSON object",
            ));
        }
        serde_json::from_value(event)
            .map_err(|error| ResolverError::validation(format!("Malformed resolver event: {error}")))
    }

    pub fn field_name(&self) -> Option<&str> {
        self.field_name
            .as_deref()
            .or_else(|| self.info.as_ref()?.field_name.as_deref())
    }

    pub fn operation_type_name(&self) -> Option<&str> {
        self.operation_type
            .as_deref()
            .or_else(|| self.info.as_ref()?.parent_type_name.as_deref())
    }

    pub fn field(&self) -> Result<ResolverField, ResolverError> {
        let operation_type = self
            .operation_type_name()
            .ok_or_else(|| ResolverError::validation("operationType is required"))
            .and_then(OperationType::parse)?;
        let field_name = self
            .field_name()
            .ok_or_else(|| ResolverError::validation("fieldName is required"))?;
        ResolverField::resolve(operation_type, field_name)
    }

    pub fn operation(&self) -> Result<ResolverOperation, ResolverError> {
        let field = self.field()?;
        let empty = Map::new();
        let arguments = match &self.arguments {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(arguments)) => arguments,
            Some(_) => {
                return Err(ResolverError::validation("arguments must be a JSON object"));
            }
        };
        ResolverOperation::parse(field, arguments)
    }
}

/// Result shape of `listProducts`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub next_token: Option<String>,
}

fn required_key(
    arguments: &Map<String, Value>,
    names: &[&str],
    field: &str,
) -> Result<String, ResolverError> {
    let value = names
        .iter()
        .find_map(|name| arguments.get(*name).filter(|value| !value.is_null()))
        .cloned()
        .unwrap_or(Value::Null);
    key_string(field, value)?
        .ok_or_else(|| ResolverError::validation(format!("{field} is required")))
}

fn product_payload(arguments: &Map<String, Value>) -> Result<Map<String, Value>, ResolverError> {
    let nested = ["product", "input"]
        .iter()
        .find_map(|name| arguments.get(*name).filter(|value| !value.is_null()));

    match nested {
        None => Ok(arguments.clone()),
        Some(Value::Object(payload)) => Ok(payload.clone()),
        Some(_) => Err(ResolverError::validation(
            "product must be a JSON object",
        )),
    }
}

fn optional_limit(value: Option<&Value>) -> Result<Option<u32>, ResolverError> {
    let Some(value) = value.filter(|value| !value.is_null()) else {
        return Ok(None);
    };

    match value.as_u64() {
        Some(limit) if (1..=u64::from(MAX_LIST_LIMIT)).contains(&limit) => Ok(Some(limit as u32)),
        _ => Err(ResolverError::validation(format!(
            "limit must be an integer between 1 and {MAX_LIST_LIMIT}"
        ))),
    }
}

fn optional_token(value: Option<&Value>) -> Result<Option<String>, ResolverError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(token)) if !token.is_empty() => Ok(Some(token.clone())),
        Some(_) => Err(ResolverError::validation(
            "nextToken must be a non-empty string",
        )),
    }
}
