//! Utility functions and helpers for scopecache.
//!
//! This module provides cross-cutting concerns like structured logging
//! and masking of identity-derived values.
//!
//! # Submodules
//!
//! - `logging`: Tracing and logging initialization with privacy filters.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod logging;
