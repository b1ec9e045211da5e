//! Shared product catalog resolver domain primitives.
//!
//! This crate owns the invocation contract, the product data model and the
//! resolver error taxonomy. It intentionally excludes AWS SDK and Lambda
//! runtime concerns, which live in `catalog_resolver_lambda`.

pub mod contract;
pub mod error;
pub mod identity;
pub mod product;
