//! Tradedesk Core - Shared domain types.
//!
//! This crate provides the types shared by the Tradedesk components:
//! - `storefront` - Local storefront server and ERP client
//! - `cli` - Command-line login and account tools
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients. The optimistic cart prediction lives here because it is a pure
//! function of the last server quotation and the pending patches.
//!
//! # Modules
//!
//! - [`types`] - Document names, money, emails, statuses, quotations and carts

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
