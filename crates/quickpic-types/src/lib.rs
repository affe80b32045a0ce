//! Shared domain models and REST DTOs.
//!
//! Kept free of storage and crypto dependencies so every other crate in
//! the workspace can depend on it.

pub mod api;
pub mod models;
