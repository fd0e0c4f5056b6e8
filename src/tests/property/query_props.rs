//! Property-based tests for the Query Builder
//!
//! Tests invariants:
//! - Every request ends its sort with `pid` ascending
//! - The page window is `(page - 1) * size` and never exceeds the size cap
//! - Consonant-only queries never produce mixed-mode clauses

use proptest::prelude::*;
use serde_json::json;

use crate::core::trademark::chosung::CHOSUNG;
use crate::core::trademark::query::{
    MatchMode, QueryBuilder, SearchParams, SortField, SortOption, SortOrder,
};

fn arb_sort_option() -> impl Strategy<Value = SortOption> {
    let field = prop::sample::select(vec![
        SortField::ApplicationDate,
        SortField::RegistrationDate,
        SortField::ProductName,
        SortField::ProductNameEng,
        SortField::ViewCount,
        SortField::Pid,
    ]);
    let order = prop::sample::select(vec![SortOrder::Asc, SortOrder::Desc]);
    (field, order).prop_map(|(field, order)| SortOption::new(field, order))
}

proptest! {
    #[test]
    fn prop_pid_tie_break_is_last(
        sort in prop::collection::vec(arb_sort_option(), 0..4),
        query in prop::option::of("[a-z가-힣ㄱ-ㅎ ]{0,12}"),
    ) {
        let params = SearchParams { query, sort, ..Default::default() };
        let request = QueryBuilder::default().build(&params).unwrap();
        prop_assert_eq!(request.sort.last(), Some(&json!({ "pid": { "order": "asc" } })));
    }

    #[test]
    fn prop_page_window(page in 1u32..1000, size in 1u32..=100) {
        let params = SearchParams { page, size: Some(size), ..Default::default() };
        let request = QueryBuilder::default().build(&params).unwrap();
        prop_assert_eq!(request.size, size as usize);
        prop_assert_eq!(request.from, (page as usize - 1) * size as usize);
    }

    #[test]
    fn prop_oversized_pages_rejected(size in 101u32..10_000) {
        let params = SearchParams { size: Some(size), ..Default::default() };
        prop_assert!(QueryBuilder::default().build(&params).is_err());
    }

    #[test]
    fn prop_consonant_queries_use_chosung_mode(
        consonants in prop::collection::vec(prop::sample::select(CHOSUNG.to_vec()), 1..10)
    ) {
        let query: String = consonants.into_iter().collect();
        let builder = QueryBuilder::default();
        prop_assert_eq!(builder.match_mode(&query), MatchMode::Chosung);

        let clause = builder.text_clause(&query);
        let should = clause["bool"]["should"].as_array().unwrap();
        prop_assert_eq!(should.len(), 2);
        prop_assert!(should.iter().all(|c| c.get("match_phrase_prefix").is_some()));
    }
}
