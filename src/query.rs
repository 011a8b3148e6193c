//! Query engine
//!
//! Pure sorting, filtering, and pagination over in-memory record lists.
//! Records are JSON objects; all comparisons go through the stringified
//! field value, case-insensitively.

use std::collections::HashMap;

use serde_json::Value;

/// Field-name to search-text map. A record matches when ANY entry's text
/// is a case-insensitive substring of the record's field value.
pub type Filter = HashMap<String, String>;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Parse the front-end's order token ("ASC"/"DESC", any case).
    /// Anything unrecognized falls back to ascending.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }
}

/// Sort specification for a list request.
#[derive(Debug, Clone)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

impl Sort {
    pub fn new(field: &str, order: SortOrder) -> Self {
        Self {
            field: field.to_string(),
            order,
        }
    }
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            field: "id".to_string(),
            order: SortOrder::Asc,
        }
    }
}

/// 1-based page window.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
}

/// Stringify a record field for comparison and matching.
///
/// `None` for an absent or null field; scalars render without quotes,
/// composites fall back to their JSON text.
pub fn field_as_string(record: &Value, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Sort in place by case-insensitive string comparison of `sort.field`.
/// Records missing the field compare as the empty string. Equal keys keep
/// no particular relative order.
pub fn sort_records(records: &mut [Value], sort: &Sort) {
    records.sort_unstable_by(|a, b| {
        let a_key = field_as_string(a, &sort.field)
            .unwrap_or_default()
            .to_lowercase();
        let b_key = field_as_string(b, &sort.field)
            .unwrap_or_default()
            .to_lowercase();
        let ordering = a_key.cmp(&b_key);
        match sort.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

/// Keep records where at least one filter field matches.
///
/// Matching is a case-insensitive substring test against the stringified
/// field value; a null or absent field never matches its entry. Multiple
/// filter fields combine with logical OR. An empty filter keeps everything.
pub fn filter_records(records: &[Value], filter: &Filter) -> Vec<Value> {
    if filter.is_empty() {
        return records.to_vec();
    }

    records
        .iter()
        .filter(|record| {
            filter.iter().any(|(field, search)| {
                let search = search.to_lowercase();
                match field_as_string(record, field) {
                    Some(value) => value.to_lowercase().contains(&search),
                    None => false,
                }
            })
        })
        .cloned()
        .collect()
}

/// Slice out the requested page, returning `(page, total)` where `total`
/// is the pre-pagination count. Without a pagination the whole list is
/// the page.
pub fn paginate(records: Vec<Value>, pagination: Option<Pagination>) -> (Vec<Value>, usize) {
    let total = records.len();
    let Some(window) = pagination else {
        return (records, total);
    };

    let start = window.page.saturating_sub(1).saturating_mul(window.per_page);
    let end = start.saturating_add(window.per_page);

    let start = start.min(total);
    let end = end.min(total);
    (records[start..end].to_vec(), total)
}

/// Exact-equality match on a single field, used by reference lookups.
pub fn match_field(records: &[Value], field: &str, value: &Value) -> Vec<Value> {
    records
        .iter()
        .filter(|record| record.get(field) == Some(value))
        .cloned()
        .collect()
}
