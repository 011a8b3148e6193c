//! Property-based tests for the query engine using proptest
//!
//! These pin down the sorting, filtering, and pagination invariants the
//! list operations rely on, over randomized record sets.

use proptest::prelude::*;
use serde_json::{json, Value};

use docmirror::query::{filter_records, paginate, sort_records, Filter, Pagination, Sort, SortOrder};

/// Generate an arbitrary record in the shape the provider serves
fn arb_record() -> impl Strategy<Value = Value> {
    (
        "[a-z][a-z0-9-]{0,12}", // id
        prop_oneof!["Alpha", "beta", "GAMMA", "delta", "Omega"],
        prop_oneof![
            Just(Some("draft")),
            Just(Some("published")),
            Just(Some("archived")),
            Just(None)
        ],
        0u32..100,
    )
        .prop_map(|(id, name, status, rank)| match status {
            Some(status) => json!({
                "id": id,
                "name": name,
                "status": status,
                "rank": rank
            }),
            // Some records miss the status field entirely.
            None => json!({
                "id": id,
                "name": name,
                "rank": rank
            }),
        })
}

fn arb_record_list() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(arb_record(), 0..60)
}

/// The comparison key sort_records orders by
fn sort_key(record: &Value, field: &str) -> String {
    match record.get(field) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.to_lowercase(),
        Some(other) => other.to_string().to_lowercase(),
    }
}

proptest! {
    /// Ascending keys are the exact reverse of descending keys
    #[test]
    fn sort_asc_keys_reverse_desc_keys(records in arb_record_list()) {
        let mut asc = records.clone();
        let mut desc = records;
        sort_records(&mut asc, &Sort::new("name", SortOrder::Asc));
        sort_records(&mut desc, &Sort::new("name", SortOrder::Desc));

        let asc_keys: Vec<String> = asc.iter().map(|r| sort_key(r, "name")).collect();
        let mut desc_keys: Vec<String> = desc.iter().map(|r| sort_key(r, "name")).collect();
        desc_keys.reverse();
        prop_assert_eq!(asc_keys, desc_keys);
    }

    /// Sorting permutes, never adds or drops
    #[test]
    fn sort_preserves_the_multiset(records in arb_record_list()) {
        let mut sorted = records.clone();
        sort_records(&mut sorted, &Sort::new("status", SortOrder::Asc));
        prop_assert_eq!(sorted.len(), records.len());

        let mut expected: Vec<String> = records.iter().map(|r| r.to_string()).collect();
        let mut actual: Vec<String> = sorted.iter().map(|r| r.to_string()).collect();
        expected.sort();
        actual.sort();
        prop_assert_eq!(actual, expected);
    }

    /// Records missing the sort field order as empty strings, i.e. first
    /// in ascending order
    #[test]
    fn missing_field_sorts_first_ascending(records in arb_record_list()) {
        let mut sorted = records;
        sort_records(&mut sorted, &Sort::new("status", SortOrder::Asc));
        let keys: Vec<String> = sorted.iter().map(|r| sort_key(r, "status")).collect();
        let mut expected = keys.clone();
        expected.sort();
        prop_assert_eq!(keys, expected);
    }

    /// An empty filter map keeps every record
    #[test]
    fn empty_filter_returns_all(records in arb_record_list()) {
        let filtered = filter_records(&records, &Filter::new());
        prop_assert_eq!(filtered.len(), records.len());
    }

    /// Filtering never increases the record count
    #[test]
    fn filter_never_increases_count(records in arb_record_list(), text in "[a-z]{0,6}") {
        let filter = Filter::from([("name".to_string(), text)]);
        prop_assert!(filter_records(&records, &filter).len() <= records.len());
    }

    /// Filtering twice with the same filter is idempotent
    #[test]
    fn filter_is_idempotent(records in arb_record_list(), text in "[a-z]{0,6}") {
        let filter = Filter::from([("name".to_string(), text)]);
        let once = filter_records(&records, &filter);
        let twice = filter_records(&once, &filter);
        prop_assert_eq!(once, twice);
    }

    /// Matching is case-insensitive in the search text
    #[test]
    fn filter_is_case_insensitive(records in arb_record_list(), text in "[a-zA-Z]{1,5}") {
        let lower = Filter::from([("name".to_string(), text.to_lowercase())]);
        let upper = Filter::from([("name".to_string(), text.to_uppercase())]);
        prop_assert_eq!(
            filter_records(&records, &lower).len(),
            filter_records(&records, &upper).len()
        );
    }

    /// Two filter fields match the union of their single-field matches
    /// (OR semantics - inherited behavior, pinned on purpose)
    #[test]
    fn multi_field_filter_is_the_union(records in arb_record_list()) {
        let by_name = Filter::from([("name".to_string(), "alpha".to_string())]);
        let by_status = Filter::from([("status".to_string(), "pub".to_string())]);
        let combined = Filter::from([
            ("name".to_string(), "alpha".to_string()),
            ("status".to_string(), "pub".to_string()),
        ]);

        let name_count = filter_records(&records, &by_name).len();
        let status_count = filter_records(&records, &by_status).len();
        let both = records
            .iter()
            .filter(|r| {
                sort_key(r, "name").contains("alpha") && sort_key(r, "status").contains("pub")
            })
            .count();

        prop_assert_eq!(
            filter_records(&records, &combined).len(),
            name_count + status_count - both
        );
    }

    /// A page never exceeds per_page records
    #[test]
    fn page_size_is_bounded(
        records in arb_record_list(),
        page in 1usize..10,
        per_page in 1usize..10
    ) {
        let (data, _) = paginate(records, Some(Pagination { page, per_page }));
        prop_assert!(data.len() <= per_page);
    }

    /// Concatenating all pages in order reconstructs the input
    #[test]
    fn pages_concatenate_to_the_whole(records in arb_record_list(), per_page in 1usize..7) {
        let mut rebuilt = Vec::new();
        let mut page = 1;
        loop {
            let (data, total) = paginate(records.clone(), Some(Pagination { page, per_page }));
            prop_assert_eq!(total, records.len());
            if data.is_empty() {
                break;
            }
            rebuilt.extend(data);
            page += 1;
        }
        prop_assert_eq!(rebuilt, records);
    }

    /// The reported total ignores the page window
    #[test]
    fn total_is_independent_of_the_window(
        records in arb_record_list(),
        page in 1usize..10,
        per_page in 1usize..10
    ) {
        let (_, windowed) = paginate(records.clone(), Some(Pagination { page, per_page }));
        let (_, unwindowed) = paginate(records.clone(), None);
        prop_assert_eq!(windowed, records.len());
        prop_assert_eq!(unwindowed, records.len());
    }
}
