//! Core types for Tradedesk.
//!
//! This module provides type-safe wrappers for ERP domain concepts.

pub mod catalog;
pub mod email;
pub mod id;
pub mod money;
pub mod quotation;
pub mod status;

pub use catalog::{CatalogItem, ItemPage, QuotationSummary, Statement, StatementEntry};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, Money};
pub use quotation::{
    Cart, CartChange, CartLine, CartPatch, CartTotals, LineDraft, LineId, ParentFields, Quotation,
};
pub use status::{DocStatus, WorkflowState};
