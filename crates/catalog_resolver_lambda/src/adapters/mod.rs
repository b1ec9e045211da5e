pub mod dynamodb_store;
pub mod memory_store;
pub mod product_store;
