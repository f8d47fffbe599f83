//! Conversions between ERP wire types and domain types.

use tracing::debug;

use tradedesk_core::{
    CartChange, CartLine, CartTotals, CatalogItem, CurrencyCode, DocStatus, ItemCode, ItemPage,
    LineDraft, LineId, LineName, Money, Quotation, QuotationName, QuotationSummary, Statement,
    StatementEntry, WarehouseName, WorkflowState,
};

use super::ErpError;
use super::methods::actions;
use super::types::{
    ItemDoc, ItemPageDoc, LineInput, ModifyPayload, QuotationDoc, QuotationItemDoc,
    QuotationSummaryDoc, StatementDoc,
};

// =============================================================================
// Outgoing
// =============================================================================

pub fn line_input(draft: &LineDraft) -> LineInput {
    LineInput {
        item_code: draft.item_code.as_str().to_owned(),
        qty: draft.qty,
        uom: draft.uom.clone(),
        warehouse: draft.warehouse.as_ref().map(|w| w.as_str().to_owned()),
        additional_notes: draft.note.clone(),
    }
}

/// Split a change into the `action` and `payload` of a modify call.
pub fn modify_payload(change: &CartChange) -> (&'static str, ModifyPayload) {
    match change {
        CartChange::AddItem(draft) => (actions::ADD_ITEM, ModifyPayload::AddItem(line_input(draft))),
        CartChange::UpdateItem { line, qty } => (
            actions::UPDATE_ITEM,
            ModifyPayload::UpdateItem {
                row: line.as_str().to_owned(),
                qty: *qty,
            },
        ),
        CartChange::DeleteItem { line } => (
            actions::DELETE_ITEM,
            ModifyPayload::DeleteItem {
                row: line.as_str().to_owned(),
            },
        ),
        CartChange::UpdateParent(fields) => {
            (actions::UPDATE_PARENT, ModifyPayload::UpdateParent(fields.clone()))
        }
    }
}

// =============================================================================
// Incoming
// =============================================================================

fn doc_status(code: i64, name: &str) -> Result<DocStatus, ErpError> {
    DocStatus::from_code(code)
        .ok_or_else(|| ErpError::InvalidData(format!("{name}: unknown docstatus {code}")))
}

fn workflow_state(label: Option<&str>) -> Option<WorkflowState> {
    let label = label.filter(|l| !l.trim().is_empty())?;
    let state = WorkflowState::from_label(label);
    if state.is_none() {
        debug!(label, "Ignoring unknown workflow state");
    }
    state
}

fn convert_line(item: QuotationItemDoc) -> CartLine {
    CartLine {
        id: LineId::Persisted(LineName::new(item.name)),
        item_code: ItemCode::new(item.item_code),
        item_name: item.item_name,
        qty: item.qty,
        rate: item.rate,
        amount: item.amount,
        uom: item.uom,
        warehouse: item.warehouse.map(WarehouseName::new),
        note: item.additional_notes.filter(|n| !n.is_empty()),
    }
}

pub fn convert_quotation(doc: QuotationDoc) -> Result<Quotation, ErpError> {
    let status = doc_status(doc.docstatus, &doc.name)?;
    Ok(Quotation {
        status,
        workflow_state: workflow_state(doc.workflow_state.as_deref()),
        currency: CurrencyCode::new(&doc.currency),
        lines: doc.items.into_iter().map(convert_line).collect(),
        totals: CartTotals {
            net_total: doc.total,
            discount_amount: doc.discount_amount,
            grand_total: doc.grand_total,
        },
        coupon_code: doc.coupon_code.filter(|c| !c.is_empty()),
        additional_discount_percentage: doc.additional_discount_percentage,
        notes: doc.notes.filter(|n| !n.is_empty()),
        transaction_date: doc.transaction_date,
        valid_till: doc.valid_till,
        name: QuotationName::new(doc.name),
    })
}

pub fn convert_summary(doc: QuotationSummaryDoc) -> Result<QuotationSummary, ErpError> {
    let status = doc_status(doc.docstatus, &doc.name)?;
    Ok(QuotationSummary {
        status,
        workflow_state: workflow_state(doc.workflow_state.as_deref()),
        grand_total: Money::new(doc.grand_total, CurrencyCode::new(&doc.currency)),
        transaction_date: doc.transaction_date,
        valid_till: doc.valid_till,
        name: QuotationName::new(doc.name),
    })
}

pub fn convert_item(doc: ItemDoc) -> CatalogItem {
    let price = match (doc.price_list_rate, doc.currency) {
        (Some(rate), Some(currency)) => Some(Money::new(rate, CurrencyCode::new(&currency))),
        _ => None,
    };
    CatalogItem {
        item_code: ItemCode::new(doc.item_code),
        item_name: doc.item_name,
        item_group: doc.item_group,
        description: doc.description,
        stock_uom: doc.stock_uom,
        price,
        image: doc.image.filter(|i| !i.is_empty()),
        available_qty: doc.actual_qty,
    }
}

pub fn convert_item_page(doc: ItemPageDoc, page: u32) -> ItemPage {
    ItemPage {
        items: doc.items.into_iter().map(convert_item).collect(),
        page,
        has_more: doc.has_more,
    }
}

/// Every amount on the statement is in the account currency.
pub fn convert_statement(doc: StatementDoc, page: u32) -> Statement {
    let currency = CurrencyCode::new(&doc.currency);
    let money = |amount| Money::new(amount, currency.clone());
    let entries = doc
        .entries
        .into_iter()
        .map(|entry| StatementEntry {
            posting_date: entry.posting_date,
            voucher_type: entry.voucher_type,
            voucher_no: entry.voucher_no,
            debit: money(entry.debit),
            credit: money(entry.credit),
            balance: money(entry.balance),
            remarks: entry.remarks.filter(|r| !r.is_empty()),
        })
        .collect();

    Statement {
        entries,
        closing_balance: money(doc.closing_balance),
        page,
        has_more: doc.has_more,
    }
}
