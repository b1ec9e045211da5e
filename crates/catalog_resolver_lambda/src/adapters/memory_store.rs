use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

use catalog_resolver_core::contract::CATEGORY_INDEX_NAME;
use catalog_resolver_core::product::{Product, ProductPatch};

use crate::adapters::product_store::{ProductStore, ScanPage, StoreError};

#[derive(Debug, Default)]
struct MemoryState {
    next_sequence: u64,
    order: BTreeMap<u64, String>,
    items: HashMap<String, (u64, Product)>,
}

/// Process-local product table with the same single-item semantics as the
/// DynamoDB adapter. Scan order is insertion order; pagination tokens are
/// insertion sequence numbers, so they stay valid across deletes.
#[derive(Debug)]
pub struct InMemoryProductStore {
    category_index: String,
    state: Mutex<MemoryState>,
}

impl Default for InMemoryProductStore {
    fn default() -> Self {
        Self::new(CATEGORY_INDEX_NAME)
    }
}

impl InMemoryProductStore {
    pub fn new(category_index: impl Into<String>) -> Self {
        Self {
            category_index: category_index.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|state| state.items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All items in insertion order.
    pub fn snapshot(&self) -> Vec<Product> {
        let Ok(state) = self.lock() else {
            return Vec::new();
        };
        state
            .order
            .values()
            .filter_map(|id| state.items.get(id).map(|(_, product)| product.clone()))
            .collect()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Other("in-memory store lock poisoned".to_string()))
    }
}

impl ProductStore for InMemoryProductStore {
    fn get_item(&self, id: &str) -> Result<Option<Product>, StoreError> {
        let state = self.lock()?;
        Ok(state.items.get(id).map(|(_, product)| product.clone()))
    }

    fn put_item(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.items.contains_key(&product.id) {
            return Err(StoreError::ConditionFailed);
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.order.insert(sequence, product.id.clone());
        state
            .items
            .insert(product.id.clone(), (sequence, product.clone()));
        Ok(())
    }

    fn update_item(&self, patch: &ProductPatch) -> Result<Option<Product>, StoreError> {
        let mut state = self.lock()?;
        let Some((_, product)) = state.items.get_mut(&patch.id) else {
            return Ok(None);
        };
        *product = patch.apply(product.clone());
        Ok(Some(product.clone()))
    }

    fn delete_item(&self, id: &str) -> Result<Option<Product>, StoreError> {
        let mut state = self.lock()?;
        let Some((sequence, product)) = state.items.remove(id) else {
            return Ok(None);
        };
        state.order.remove(&sequence);
        Ok(Some(product))
    }

    fn query_index(&self, index_name: &str, key_value: &str) -> Result<Vec<Product>, StoreError> {
        if index_name != self.category_index {
            return Err(StoreError::Other(format!("unknown index '{index_name}'")));
        }

        let state = self.lock()?;
        Ok(state
            .order
            .values()
            .filter_map(|id| state.items.get(id))
            .map(|(_, product)| product)
            .filter(|product| product.category.as_deref() == Some(key_value))
            .cloned()
            .collect())
    }

    fn scan(&self, next_token: Option<&str>, limit: Option<u32>) -> Result<ScanPage, StoreError> {
        let limit = limit.map(|value| value as usize).unwrap_or(usize::MAX);

        let state = self.lock()?;
        let start = match next_token {
            Some(token) => match token.parse::<u64>() {
                // Only sequences already handed out can have been issued as tokens.
                Ok(sequence) if sequence < state.next_sequence => Bound::Excluded(sequence),
                _ => return Err(StoreError::InvalidToken(token.to_string())),
            },
            None => Bound::Unbounded,
        };
        let mut remaining = state.order.range((start, Bound::Unbounded));
        let mut items = Vec::new();
        let mut last_sequence = None;
        for (sequence, id) in remaining.by_ref() {
            if let Some((_, product)) = state.items.get(id) {
                items.push(product.clone());
                last_sequence = Some(*sequence);
            }
            if items.len() == limit {
                break;
            }
        }

        let next_token = match (remaining.next(), last_sequence) {
            (Some(_), Some(sequence)) => Some(sequence.to_string()),
            _ => None,
        };
        Ok(ScanPage { items, next_token })
    }
}

#[cfg(test)]
mod tests {
    use catalog_resolver_core::product::{Attributes, CategoryChange};
    use serde_json::json;

    use super::*;

    fn product(id: &str, category: Option<&str>) -> Product {
        Product {
            id: id.to_string(),
            category: category.map(str::to_string),
            attributes: Attributes::from([("title".to_string(), json!(id.to_uppercase()))]),
        }
    }

    #[test]
    fn create_rejects_duplicate_ids() {
        let store = InMemoryProductStore::default();
        store
            .put_item(&product("p-1", None))
            .expect("first create should pass");

        let error = store
            .put_item(&product("p-1", Some("books")))
            .expect_err("duplicate create should fail");
        assert_eq!(error, StoreError::ConditionFailed);
        assert_eq!(store.get_item("p-1"), Ok(Some(product("p-1", None))));
    }

    #[test]
    fn update_requires_existing_item_and_keeps_scan_position() {
        let store = InMemoryProductStore::default();
        let patch = ProductPatch {
            id: "p-1".to_string(),
            category: CategoryChange::Set("books".to_string()),
            set: Attributes::from([("stock".to_string(), json!(4))]),
            remove: vec!["title".to_string()],
        };
        assert_eq!(store.update_item(&patch), Ok(None));
        assert!(store.is_empty());

        store.put_item(&product("p-1", None)).expect("create should pass");
        store.put_item(&product("p-2", None)).expect("create should pass");
        let updated = store
            .update_item(&patch)
            .expect("update should pass")
            .expect("item exists");

        assert_eq!(updated.category.as_deref(), Some("books"));
        assert_eq!(
            updated.attributes,
            Attributes::from([("stock".to_string(), json!(4))])
        );
        assert_eq!(store.get_item("p-1"), Ok(Some(updated)));
        let ids: Vec<String> = store.snapshot().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["p-1", "p-2"]);
    }

    #[test]
    fn concurrent_updates_of_different_fields_all_land() {
        let store = InMemoryProductStore::default();
        store.put_item(&product("p-1", None)).expect("create should pass");

        std::thread::scope(|scope| {
            for writer in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    let patch = ProductPatch {
                        id: "p-1".to_string(),
                        category: CategoryChange::Keep,
                        set: Attributes::from([(format!("field-{writer}"), json!(writer))]),
                        remove: Vec::new(),
                    };
                    store.update_item(&patch).expect("update should pass");
                });
            }
        });

        let stored = store
            .get_item("p-1")
            .expect("get should pass")
            .expect("item exists");
        for writer in 0..8 {
            assert_eq!(
                stored.attributes.get(&format!("field-{writer}")),
                Some(&json!(writer))
            );
        }
    }

    #[test]
    fn delete_returns_prior_state_once() {
        let store = InMemoryProductStore::default();
        store
            .put_item(&product("p-1", Some("books")))
            .expect("create should pass");

        assert_eq!(
            store.delete_item("p-1"),
            Ok(Some(product("p-1", Some("books"))))
        );
        assert_eq!(store.delete_item("p-1"), Ok(None));
        assert_eq!(store.query_index(CATEGORY_INDEX_NAME, "books"), Ok(Vec::new()));
    }

    #[test]
    fn query_filters_by_category_and_rejects_unknown_index() {
        let store = InMemoryProductStore::default();
        for (id, category) in [("a", Some("books")), ("b", Some("music")), ("c", Some("books")), ("d", None)] {
            store
                .put_item(&product(id, category))
                .expect("create should pass");
        }

        let books: Vec<String> = store
            .query_index(CATEGORY_INDEX_NAME, "books")
            .expect("query should pass")
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(books, vec!["a", "c"]);

        assert!(matches!(
            store.query_index("byColour", "red"),
            Err(StoreError::Other(_))
        ));
    }

    #[test]
    fn scan_pages_survive_deletes_between_pages() {
        let store = InMemoryProductStore::default();
        for id in ["a", "b", "c", "d", "e"] {
            store
                .put_item(&product(id, None))
                .expect("create should pass");
        }

        let first = store.scan(None, Some(2)).expect("scan should pass");
        assert_eq!(first.items.len(), 2);
        let token = first.next_token.expect("more items remain");

        store.delete_item("b").expect("delete should pass");
        store.delete_item("c").expect("delete should pass");

        let second = store.scan(Some(&token), Some(2)).expect("scan should pass");
        let ids: Vec<String> = second.items.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["d", "e"]);
        assert_eq!(second.next_token, None);
    }

    #[test]
    fn scan_without_limit_returns_everything() {
        let store = InMemoryProductStore::default();
        for id in ["a", "b", "c"] {
            store
                .put_item(&product(id, None))
                .expect("create should pass");
        }

        let page = store.scan(None, None).expect("scan should pass");
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.next_token, None);
    }

    #[test]
    fn scan_rejects_foreign_tokens() {
        let store = InMemoryProductStore::default();
        assert_eq!(
            store.scan(Some("not-a-sequence"), None),
            Err(StoreError::InvalidToken("not-a-sequence".to_string()))
        );
    }

    #[test]
    fn scan_rejects_sequences_never_issued() {
        let store = InMemoryProductStore::default();
        for id in ["a", "b"] {
            store.put_item(&product(id, None)).expect("create should pass");
        }

        assert_eq!(
            store.scan(Some("999"), None),
            Err(StoreError::InvalidToken("999".to_string()))
        );
        assert_eq!(
            store.scan(Some("2"), None),
            Err(StoreError::InvalidToken("2".to_string()))
        );
        let page = store.scan(Some("0"), None).expect("issued sequence is valid");
        let ids: Vec<String> = page.items.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["b"]);
    }
}
