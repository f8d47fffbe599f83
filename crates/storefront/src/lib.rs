//! Tradedesk Storefront library.
//!
//! This crate provides the storefront functionality as a library,
//! allowing it to be tested and reused by the CLI and the integration tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod config;
pub mod erp;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod state;
