//! Query construction for one page request.
//!
//! Everything here is a pure function of its inputs: no network calls, no
//! validation of caller filter strings. The boundary filter is the
//! load-bearing piece — it selects exactly the records strictly after a
//! checkpoint under `(timestamp, key)` ordering.

use crate::checkpoint::Checkpoint;

/// The per-resource field names forming the compound ordering key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderingKey {
    /// Field holding the record modification timestamp.
    pub timestamp_field: String,
    /// Field holding the tie-breaking record key.
    pub key_field: String,
}

impl OrderingKey {
    /// Creates an ordering key over the given field names.
    pub fn new(timestamp_field: impl Into<String>, key_field: impl Into<String>) -> Self {
        Self {
            timestamp_field: timestamp_field.into(),
            key_field: key_field.into(),
        }
    }

    /// The ascending `$orderby` clause this key requires.
    ///
    /// Checkpoint advance is only correct under exactly this order.
    pub fn orderby_clause(&self) -> String {
        format!("{},{}", self.timestamp_field, self.key_field)
    }
}

impl Default for OrderingKey {
    fn default() -> Self {
        Self::new("ModificationTimestamp", "ListingKey")
    }
}

/// Percent-encodes a query component, www-form style.
///
/// Unreserved characters (`A-Z a-z 0-9 - _ . *`) pass through, space becomes
/// `+`, everything else is `%XX`-escaped per UTF-8 byte.
pub fn encode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'*' => {
                out.push(byte as char);
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(char::from_digit((byte >> 4) as u32, 16).unwrap_or('0').to_ascii_uppercase());
                out.push(char::from_digit((byte & 0x0F) as u32, 16).unwrap_or('0').to_ascii_uppercase());
            }
        }
    }
    out
}

/// Builds the filter selecting records strictly after `checkpoint`.
///
/// Shape: `(ts gt T) or (ts eq T and key gt K)`. The `eq`/`gt` fallback on
/// the key tolerates timestamp ties from coarse remote clock resolution;
/// a record whose `(timestamp, key)` equals the checkpoint is never
/// re-delivered. The timestamp value is URL-encoded but never interpreted.
pub fn boundary_filter(ordering: &OrderingKey, checkpoint: &Checkpoint) -> String {
    let ts = encode_component(&checkpoint.last_timestamp);
    format!(
        "({ts_field} gt {ts}) or ({ts_field} eq {ts} and {key_field} gt {key})",
        ts_field = ordering.timestamp_field,
        key_field = ordering.key_field,
        key = checkpoint.last_key.literal(),
    )
}

/// Combines an optional caller filter with the boundary filter.
///
/// Always conjunctive and parenthesized: a caller filter narrows the
/// boundary filter, it never widens it.
pub fn combined_filter(caller_filter: Option<&str>, boundary: &str) -> String {
    match caller_filter {
        Some(f) => format!("({f}) and ({boundary})"),
        None => boundary.to_string(),
    }
}

/// The transient descriptor for one page request.
///
/// Built fresh for every request and not retained; only its rendered query
/// options cross the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Remote resource name, e.g. `Property`.
    pub resource: String,
    /// Fields to select, serialized in caller order.
    pub fields: Vec<String>,
    /// The combined filter expression.
    pub filter: String,
    /// The ascending sort clause.
    pub orderby: String,
    /// Requested page size.
    pub top: u32,
}

impl PageRequest {
    /// Builds the request for the page immediately after `checkpoint`.
    pub fn after_checkpoint(
        resource: impl Into<String>,
        fields: &[String],
        caller_filter: Option<&str>,
        ordering: &OrderingKey,
        checkpoint: &Checkpoint,
        top: u32,
    ) -> Self {
        let boundary = boundary_filter(ordering, checkpoint);
        Self {
            resource: resource.into(),
            fields: fields.to_vec(),
            filter: combined_filter(caller_filter, &boundary),
            orderby: ordering.orderby_clause(),
            top,
        }
    }

    /// Renders the ordered query options for this request.
    ///
    /// Order is part of the shape: `$select`, `$filter`, `$orderby`, `$top`.
    /// An empty field list omits `$select` (select everything).
    pub fn query_options(&self) -> Vec<(String, String)> {
        let mut options = Vec::with_capacity(4);
        if !self.fields.is_empty() {
            options.push(("$select".to_string(), self.fields.join(",")));
        }
        options.push(("$filter".to_string(), self.filter.clone()));
        options.push(("$orderby".to_string(), self.orderby.clone()));
        options.push(("$top".to_string(), self.top.to_string()));
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::RecordKey;

    #[test]
    fn encode_component_escapes_reserved_bytes() {
        assert_eq!(encode_component("2025-01-01T00:00:00Z"), "2025-01-01T00%3A00%3A00Z");
        assert_eq!(encode_component("a b"), "a+b");
        assert_eq!(encode_component("abc-_.*123"), "abc-_.*123");
    }

    #[test]
    fn boundary_filter_shape() {
        let ordering = OrderingKey::default();
        let cp = Checkpoint::resume("2025-01-01T00:00:00Z", "B");
        assert_eq!(
            boundary_filter(&ordering, &cp),
            "(ModificationTimestamp gt 2025-01-01T00%3A00%3A00Z) \
             or (ModificationTimestamp eq 2025-01-01T00%3A00%3A00Z and ListingKey gt 'B')"
        );
    }

    #[test]
    fn boundary_filter_integer_sentinel_renders_bare() {
        let ordering = OrderingKey::default();
        let cp = Checkpoint::new();
        let filter = boundary_filter(&ordering, &cp);
        assert!(filter.ends_with("ListingKey gt 0)"));
        assert_eq!(cp.last_key, RecordKey::Number(0));
    }

    #[test]
    fn caller_filter_is_parenthesized_and_conjunctive() {
        let combined = combined_filter(Some("StandardStatus eq 'Active'"), "(T gt X) or (T eq X and K gt 'Y')");
        assert_eq!(
            combined,
            "(StandardStatus eq 'Active') and ((T gt X) or (T eq X and K gt 'Y'))"
        );
    }

    #[test]
    fn no_caller_filter_passes_boundary_through() {
        assert_eq!(combined_filter(None, "(a gt b)"), "(a gt b)");
    }

    #[test]
    fn query_options_in_canonical_order() {
        let ordering = OrderingKey::default();
        let cp = Checkpoint::new();
        let fields = vec!["ModificationTimestamp".to_string(), "ListingKey".to_string()];
        let request = PageRequest::after_checkpoint("Property", &fields, None, &ordering, &cp, 100);

        let options = request.query_options();
        let keys: Vec<&str> = options.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["$select", "$filter", "$orderby", "$top"]);
        assert_eq!(options[0].1, "ModificationTimestamp,ListingKey");
        assert_eq!(options[2].1, "ModificationTimestamp,ListingKey");
        assert_eq!(options[3].1, "100");
    }

    #[test]
    fn select_preserves_caller_field_order() {
        let ordering = OrderingKey::default();
        let cp = Checkpoint::new();
        let fields = vec!["ListPrice".to_string(), "ListingKey".to_string(), "City".to_string()];
        let request = PageRequest::after_checkpoint("Property", &fields, None, &ordering, &cp, 10);
        assert_eq!(request.query_options()[0].1, "ListPrice,ListingKey,City");
    }

    #[test]
    fn empty_field_list_omits_select() {
        let ordering = OrderingKey::default();
        let cp = Checkpoint::new();
        let request = PageRequest::after_checkpoint("Property", &[], None, &ordering, &cp, 10);
        assert!(request.query_options().iter().all(|(k, _)| k != "$select"));
    }

    #[test]
    fn media_ordering_key() {
        let ordering = OrderingKey::new("ModificationTimestamp", "MediaKey");
        let cp = Checkpoint::resume("2023-07-27T04:00:00Z", "M-1");
        let filter = boundary_filter(&ordering, &cp);
        assert!(filter.contains("MediaKey gt 'M-1'"));
        assert_eq!(ordering.orderby_clause(), "ModificationTimestamp,MediaKey");
    }
}
