//! AWS-oriented adapters and handlers for the product catalog resolver.
//!
//! This crate owns runtime integration details (Lambda handler, DynamoDB
//! store adapter, environment configuration) on top of the contract and
//! data model in `catalog_resolver_core`.

pub mod adapters;
pub mod config;
pub mod handlers;
