//! # veris-cli — Veris Compliance Stack Command-Line Interface
//!
//! ## Subcommands
//!
//! - `serve` — Run the HTTP API server (PostgreSQL when `DATABASE_URL`
//!   is set, in-memory otherwise).
//! - `catalog` — Inspect the built-in control catalog.
//!
//! ## Crate Policy
//!
//! - CLI construction (argument parsing) is separated from business
//!   logic. Handler functions delegate to the domain crates.

pub mod catalog;
pub mod serve;
