//! HTTP middleware for the storefront.
//!
//! # Layer Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request tracing)
//!
//! Authentication is an extractor ([`RequireAuth`]) rather than a layer so
//! `/health` stays open.

pub mod auth;

pub use auth::{AuthRejection, RequireAuth};
