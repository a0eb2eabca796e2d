// scopecache - Per-user persistent key/value cache with provenance metadata
// Author: kelexine (https://github.com/kelexine)

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod kv;
pub mod metrics;
pub mod session;
pub mod utils;
