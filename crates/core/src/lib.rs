//! MakerDB Core - Shared types and inventory analytics.
//!
//! This crate provides the building blocks used by every MakerDB component:
//! - `server` - REST API and search index
//! - `cli` - Migrations, seeding and maintenance commands (via the server library)
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Database encoding for the types is available behind
//! the `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, choice enums and vendor price structures
//! - [`stock`] - Stock aggregation, low-stock levels, BOM availability and valuation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod stock;
pub mod types;

pub use types::*;
