//! MakerDB server library.
//!
//! REST API, `PostgreSQL` repositories, search index and seeding, exposed
//! as a library so the binary, the CLI and the integration tests share them.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod search;
pub mod seed;
pub mod state;
