//! # pathbridge-common
//!
//! Shared error definitions, settings models, constants, and domain types
//! used across the entire pathbridge workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate, so both the preload library and the overlay orchestrator
//! can link it without pulling in each other.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
