//! # Middleware
//!
//! HTTP-level middleware shared by all routes. Tracing comes from
//! `tower_http::trace::TraceLayer` in the app assembly; this module
//! carries the Prometheus metrics middleware.

pub mod metrics;
