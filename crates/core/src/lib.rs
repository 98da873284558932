//! Cartflow Core - Shared cart types library.
//!
//! This crate provides the types shared by every Cartflow component:
//! - `storefront` - The cart HTTP service
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP. Cart mutation rules live here so that they can
//! be checked without a running service.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, prices, the cart model and recalculation results

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
