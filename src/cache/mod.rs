// Cache management module
// Author: kelexine (https://github.com/kelexine)

pub mod connection;
pub mod manager;
pub mod models;
pub mod namespace;

pub use connection::{ConnectionManager, SCHEMA_VERSION};
pub use manager::ScopedCache;
pub use models::{CacheConfig, CacheMetadata, Outcome, WriteMetadata};
pub use namespace::{NamespaceFields, NamespaceResolver};
