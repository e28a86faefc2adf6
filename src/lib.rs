//! # dynamap
//!
//! A typed item mapper and pagination driver for Amazon DynamoDB.
//!
//! This crate is a thin convenience layer over `aws-sdk-dynamodb`,
//! handling:
//! - Conversion between typed entities and DynamoDB items
//! - Statically declared entity schemas with change tracking
//! - Filter building without hand-written expression strings
//! - Lazy and eager pagination over query and scan results
//!
//! It adds no retry, no caching, and no consistency coordination of its
//! own: consistency flags pass through to the store, and every failure
//! surfaces to the immediate caller unchanged.

pub mod client;
pub mod condition;
pub mod errors;
pub mod mapper;
pub mod operations;
pub mod paginate;
pub mod schema;
pub mod value;

pub use client::{ClientConfig, DynamoClient, RuntimeConfig};
pub use condition::{Comparison, Condition, Filter, FilterExpression};
pub use errors::Error;
pub use mapper::Mapper;
pub use operations::{QueryRequest, ScanRequest};
pub use paginate::{extract_data, Page, PageSource, Paginator, TableData};
pub use schema::{Entity, EntitySchema, FieldDescriptor, NamingPolicy, Tracked};
pub use value::{FromValue, Item, Row, Value};
