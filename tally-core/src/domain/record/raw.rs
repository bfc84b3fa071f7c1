// tally-core/src/domain/record/raw.rs

use std::collections::BTreeMap;

/// One untyped input row, exactly as the source delivered it.
pub type RawRow = BTreeMap<String, serde_json::Value>;

/// Canonical field name: trimmed, lowercased, runs of non-word characters collapsed to `_`.
///
/// `"Order ID"` -> `order_id`, `"Sub-Category"` -> `sub_category`.
pub fn normalize_field_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.trim().chars() {
        if ch.is_alphanumeric() || ch == '_' {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_separator = true;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_field_name() {
        assert_eq!(normalize_field_name("Order ID"), "order_id");
        assert_eq!(normalize_field_name("  Sub-Category "), "sub_category");
        assert_eq!(normalize_field_name("Ship  Mode"), "ship_mode");
        assert_eq!(normalize_field_name("Sales ($)"), "sales");
        assert_eq!(normalize_field_name("row_id"), "row_id");
    }
}
