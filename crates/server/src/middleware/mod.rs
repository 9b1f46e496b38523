//! HTTP middleware for the API.
//!
//! # Layer order (outermost first)
//!
//! 1. Sentry hub and HTTP transaction
//! 2. CORS (`MAKERDB_CORS_ORIGINS`)
//! 3. `TraceLayer` with an `http_request` span per request
//! 4. Request ID, recorded on that span and echoed in `x-request-id`

pub mod request_id;

pub use request_id::request_id_middleware;
