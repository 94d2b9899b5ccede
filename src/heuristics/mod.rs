// src/heuristics/mod.rs

mod generic;

use crate::record::PartialRecord;

/// Pattern-match whatever export fields the raw text gives up.
///
/// Never fails; fields the patterns miss stay empty. Seller/buyer names are
/// only found when labelled, and line items are left to inference.
pub fn extract_fields(text: &str) -> PartialRecord {
    generic::extract(text)
}
