//! Quotation lifecycle statuses.

use serde::{Deserialize, Serialize};

/// ERP document status (`docstatus`).
///
/// A cart is a quotation in `Draft`. Submitting it moves it to `Submitted`;
/// only the backend can cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocStatus {
    #[default]
    Draft,
    Submitted,
    Cancelled,
}

impl DocStatus {
    /// Map the ERP's numeric `docstatus` field.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Draft),
            1 => Some(Self::Submitted),
            2 => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether the document can still be edited.
    #[must_use]
    pub const fn is_draft(self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Submitted => "Submitted",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// Approval workflow state tracked by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl WorkflowState {
    /// Parse the ERP's workflow label (case-insensitive).
    ///
    /// Returns `None` for labels outside the known lifecycle.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "pending" | "pending approval" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Expired => "Expired",
        }
    }
}
