//! Item-level validation errors.
//!
//! These are not failures of the engine: they accumulate on the item during
//! the local check and flip the node's vote to negative without aborting
//! processing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Validation error classes an item can accumulate.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The item's own `check()` failed.
    FailedCheck,
    /// `created_at` is further in the past than the network accepts.
    Expired,
    /// A referenced item is not approved.
    BadRef,
    /// A revocation target could not be locked.
    BadRevoke,
    /// A declared new item failed its own check.
    BadNewItem,
    /// A declared new item already has a ledger record.
    NewItemExists,
}

/// One accumulated validation error: the class, the offending object and a
/// human-readable note.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ItemError {
    pub code: ErrorCode,
    pub object: String,
    pub message: String,
}

impl ItemError {
    pub fn new(code: ErrorCode, object: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            object: object.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({}): {}", self.code, self.object, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_code_and_object() {
        let err = ItemError::new(ErrorCode::BadRef, "deadbeef…", "reference not approved");
        let text = err.to_string();
        assert!(text.contains("BadRef"));
        assert!(text.contains("deadbeef"));
    }
}
