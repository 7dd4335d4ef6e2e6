//! The in-memory receipt list and its selection pointer.

use crate::model::{ReceiptField, ReceiptRecord};
use crate::Result;
use serde::Serialize;
use tracing::trace;

/// An ordered list of receipts plus a pointer to the selected one.
///
/// Mutation happens only through `update_field`, `replace_all` and `select`. Nothing is persisted.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptStore {
    receipts: Vec<ReceiptRecord>,
    selected_id: Option<String>,
}

impl ReceiptStore {
    /// Creates a store holding `initial` as its only, selected, record.
    pub fn new(initial: ReceiptRecord) -> Self {
        let selected_id = Some(initial.id.clone());
        Self {
            receipts: vec![initial],
            selected_id,
        }
    }

    pub fn receipts(&self) -> &[ReceiptRecord] {
        &self.receipts
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ReceiptRecord> {
        self.receipts.iter().find(|r| r.id == id)
    }

    /// The raw selection pointer, which may not match any record.
    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    /// The selected record. A dangling selection falls back to the first record.
    pub fn selected(&self) -> Option<&ReceiptRecord> {
        self.selected_id
            .as_deref()
            .and_then(|id| self.get(id))
            .or_else(|| self.receipts.first())
    }

    /// Replaces one field of the record with `id`. Unknown ids are a no-op and return `Ok(false)`.
    /// A value that cannot be parsed for `field` is an error and leaves the store unchanged.
    pub fn update_field(&mut self, id: &str, field: ReceiptField, value: &str) -> Result<bool> {
        match self.receipts.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.set(field, value)?;
                trace!("Set {field} on {id}");
                Ok(true)
            }
            None => {
                trace!("Ignoring update of {field} for unknown receipt {id}");
                Ok(false)
            }
        }
    }

    /// Discards the list, installs `receipts` and selects the first of them (or nothing).
    pub fn replace_all(&mut self, receipts: Vec<ReceiptRecord>) {
        self.selected_id = receipts.first().map(|r| r.id.clone());
        self.receipts = receipts;
    }

    /// Moves the selection pointer. `id` is not validated.
    pub fn select(&mut self, id: impl Into<String>) {
        self.selected_id = Some(id.into());
    }
}
