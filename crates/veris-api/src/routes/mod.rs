//! # Route Modules
//!
//! Thin handlers only — validation of path/query shapes, delegation to
//! the services in `AppState`, and error mapping via `AppError`. No
//! business logic lives here.

pub mod assessments;
pub mod config;
