//! Core types for MakerDB.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod status;

pub use id::*;
pub use price::{
    PriceBreak, PriceError, PriceStructure, Quote, order_quantity, quote, validate_currency,
};
pub use status::*;
