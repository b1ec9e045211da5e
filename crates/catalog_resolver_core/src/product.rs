use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ResolverError;

pub const ID_FIELD: &str = "id";
pub const CATEGORY_FIELD: &str = "category";

/// Caller-owned product fields, stored and returned verbatim.
pub type Attributes = BTreeMap<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl Product {
    /// Rebuilds a product from a flat field map, as read back from the store.
    pub fn from_fields(mut fields: Map<String, Value>) -> Result<Self, ResolverError> {
        let id = match fields.remove(ID_FIELD) {
            Some(value) => key_string(ID_FIELD, value)?.ok_or_else(|| {
                ResolverError::validation("product item has a null id attribute")
            })?,
            None => return Err(ResolverError::validation("product item has no id attribute")),
        };
        let category = match fields.remove(CATEGORY_FIELD) {
            Some(value) => key_string(CATEGORY_FIELD, value)?,
            None => None,
        };

        Ok(Self {
            id,
            category,
            attributes: fields.into_iter().collect(),
        })
    }

    /// Flattens the product back into a single field map.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::with_capacity(self.attributes.len() + 2);
        fields.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        if let Some(category) = &self.category {
            fields.insert(CATEGORY_FIELD.to_string(), Value::String(category.clone()));
        }
        for (name, value) in &self.attributes {
            fields.insert(name.clone(), value.clone());
        }
        fields
    }
}

/// Payload of `createProduct`. The id is optional and generated when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub id: Option<String>,
    pub category: Option<String>,
    pub attributes: Attributes,
}

impl NewProduct {
    pub fn from_payload(payload: Map<String, Value>) -> Result<Self, ResolverError> {
        let mut fields = payload;
        let id = match fields.remove(ID_FIELD) {
            Some(value) => key_string(ID_FIELD, value)?,
            None => None,
        };
        let category = match fields.remove(CATEGORY_FIELD) {
            Some(value) => key_string(CATEGORY_FIELD, value)?,
            None => None,
        };

        Ok(Self {
            id,
            category,
            attributes: fields.into_iter().collect(),
        })
    }

    pub fn into_product(self, generate_id: impl FnOnce() -> String) -> Product {
        Product {
            id: self.id.unwrap_or_else(generate_id),
            category: self.category,
            attributes: self.attributes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryChange {
    Keep,
    Set(String),
    Remove,
}

/// Partial update of `updateProduct`.
///
/// Non-null fields overwrite, `null` fields remove the attribute. The id only
/// selects the target and is never rewritten.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductPatch {
    pub id: String,
    pub category: CategoryChange,
    pub set: Attributes,
    pub remove: Vec<String>,
}

impl ProductPatch {
    pub fn from_payload(payload: Map<String, Value>) -> Result<Self, ResolverError> {
        let mut fields = payload;
        let id = match fields.remove(ID_FIELD) {
            Some(value) => key_string(ID_FIELD, value)?,
            None => None,
        }
        .ok_or_else(|| ResolverError::validation("id is required"))?;

        let category = match fields.remove(CATEGORY_FIELD) {
            None => CategoryChange::Keep,
            Some(Value::Null) => CategoryChange::Remove,
            Some(value) => match key_string(CATEGORY_FIELD, value)? {
                Some(category) => CategoryChange::Set(category),
                None => CategoryChange::Remove,
            },
        };

        let mut set = Attributes::new();
        let mut remove = Vec::new();
        for (name, value) in fields {
            if value.is_null() {
                remove.push(name);
            } else {
                set.insert(name, value);
            }
        }

        Ok(Self {
            id,
            category,
            set,
            remove,
        })
    }

    pub fn apply(&self, current: Product) -> Product {
        let mut updated = current;
        match &self.category {
            CategoryChange::Keep => {}
            CategoryChange::Set(category) => updated.category = Some(category.clone()),
            CategoryChange::Remove => updated.category = None,
        }
        for name in &self.remove {
            updated.attributes.remove(name);
        }
        for (name, value) in &self.set {
            updated.attributes.insert(name.clone(), value.clone());
        }
        updated
    }
}

/// Reads a key attribute (`id` or `category`). `null` counts as absent;
/// anything other than a non-blank string is rejected.
pub fn key_string(field: &str, value: Value) -> Result<Option<String>, ResolverError> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) if text.trim().is_empty() => Err(ResolverError::validation(
            format!("{field} must be a non-empty string"),
        )),
        Value::String(text) => Ok(Some(text)),
        _ => Err(ResolverError::validation(format!(
            "{field} must be a string"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test payload must be an object"),
        }
    }

    fn stored_product() -> Product {
        Product {
            id: "p-1".to_string(),
            category: Some("books".to_string()),
            attributes: Attributes::from([
                ("title".to_string(), json!("A")),
                ("price".to_string(), json!(12.5)),
                ("tags".to_string(), json!(["paper", "used"])),
            ]),
        }
    }

    #[test]
    fn product_serializes_flat_with_key_fields() {
        let value = serde_json::to_value(stored_product()).expect("product should serialize");
        assert_eq!(
            value,
            json!({
                "id": "p-1",
                "category": "books",
                "title": "A",
                "price": 12.5,
                "tags": ["paper", "used"]
            })
        );
    }

    #[test]
    fn product_without_category_omits_the_field() {
        let product = Product {
            category: None,
            ..stored_product()
        };
        let value = serde_json::to_value(product).expect("product should serialize");
        assert!(value.get("category").is_none());
    }

    #[test]
    fn fields_round_trip_through_flat_map() {
        let product = stored_product();
        let rebuilt = Product::from_fields(product.to_fields()).expect("fields should parse");
        assert_eq!(rebuilt, product);
    }

    #[test]
    fn from_fields_requires_id() {
        let error = Product::from_fields(object(json!({"title": "A"})))
            .expect_err("missing id should fail");
        assert_eq!(error.error_type(), "ValidationError");
    }

    #[test]
    fn new_product_generates_id_only_when_absent() {
        let generated = NewProduct::from_payload(object(json!({"category": "books", "id": null})))
            .expect("payload should parse")
            .into_product(|| "generated".to_string());
        assert_eq!(generated.id, "generated");

        let supplied = NewProduct::from_payload(object(json!({"id": "given", "title": "A"})))
            .expect("payload should parse")
            .into_product(|| "generated".to_string());
        assert_eq!(supplied.id, "given");
        assert_eq!(supplied.attributes.get("title"), Some(&json!("A")));
    }

    #[test]
    fn new_product_rejects_malformed_keys() {
        let blank_id = NewProduct::from_payload(object(json!({"id": "  "})))
            .expect_err("blank id should fail");
        assert_eq!(blank_id.to_string(), "id must be a non-empty string");

        let numeric_category = NewProduct::from_payload(object(json!({"category": 7})))
            .expect_err("numeric category should fail");
        assert_eq!(numeric_category.to_string(), "category must be a string");
    }

    #[test]
    fn patch_requires_id() {
        let error = ProductPatch::from_payload(object(json!({"title": "X"})))
            .expect_err("missing id should fail");
        assert_eq!(error.to_string(), "id is required");
    }

    #[test]
    fn patch_overwrites_sets_and_removes_fields() {
        let patch = ProductPatch::from_payload(object(json!({
            "id": "p-1",
            "title": "B",
            "price": null,
            "stock": 3
        })))
        .expect("patch should parse");

        let updated = patch.apply(stored_product());
        assert_eq!(updated.id, "p-1");
        assert_eq!(updated.category.as_deref(), Some("books"));
        assert_eq!(updated.attributes.get("title"), Some(&json!("B")));
        assert_eq!(updated.attributes.get("stock"), Some(&json!(3)));
        assert!(!updated.attributes.contains_key("price"));
        assert_eq!(updated.attributes.get("tags"), Some(&json!(["paper", "used"])));
    }

    #[test]
    fn patch_can_move_or_clear_category() {
        let moved = ProductPatch::from_payload(object(json!({"id": "p-1", "category": "music"})))
            .expect("patch should parse")
            .apply(stored_product());
        assert_eq!(moved.category.as_deref(), Some("music"));

        let cleared = ProductPatch::from_payload(object(json!({"id": "p-1", "category": null})))
            .expect("patch should parse")
            .apply(stored_product());
        assert_eq!(cleared.category, None);
    }

    #[test]
    fn applying_patch_twice_matches_applying_once() {
        let patch = ProductPatch::from_payload(object(json!({
            "id": "p-1",
            "title": "C",
            "tags": null
        })))
        .expect("patch should parse");

        let once = patch.apply(stored_product());
        let twice = patch.apply(once.clone());
        assert_eq!(once, twice);
    }
}
