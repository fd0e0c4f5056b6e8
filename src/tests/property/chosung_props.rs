//! Property-based tests for chosung extraction
//!
//! Tests invariants:
//! - One output character per syllable block
//! - Every output character is one of the 19 leading consonants, or the
//!   unchanged non-syllable input character
//! - Extraction is idempotent
//! - Consonant-only detection matches its definition

use proptest::prelude::*;

use crate::core::trademark::chosung::{
    extract_chosung, has_korean, is_chosung, is_chosung_query, is_hangul_syllable, CHOSUNG,
};

// ============================================================================
// Strategies
// ============================================================================

fn arb_syllable() -> impl Strategy<Value = char> {
    (0xAC00u32..=0xD7A3).prop_map(|c| char::from_u32(c).unwrap_or('가'))
}

fn arb_syllables() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_syllable(), 0..40).prop_map(|v| v.into_iter().collect())
}

/// Syllables mixed with Latin letters, digits, spaces, bare consonants,
/// conjoining jamo and combining marks.
fn arb_mixed() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        3 => arb_syllable(),
        1 => prop::char::range('a', 'z'),
        1 => prop::char::range('0', '9'),
        1 => Just(' '),
        1 => prop::sample::select(CHOSUNG.to_vec()),
        1 => prop::char::range('\u{1100}', '\u{11FF}'),
        1 => prop::char::range('\u{0300}', '\u{036F}'),
    ];
    prop::collection::vec(piece, 0..40).prop_map(|v| v.into_iter().collect())
}

fn arb_chosung_query() -> impl Strategy<Value = String> {
    let piece = prop_oneof![4 => prop::sample::select(CHOSUNG.to_vec()), 1 => Just(' ')];
    prop::collection::vec(piece, 1..20).prop_map(|v| v.into_iter().collect())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_one_consonant_per_syllable(s in arb_syllables()) {
        let out = extract_chosung(&s);
        prop_assert_eq!(out.chars().count(), s.chars().count());
        prop_assert!(out.chars().all(is_chosung));
    }

    #[test]
    fn prop_non_syllables_pass_through(s in arb_mixed()) {
        let out: Vec<char> = extract_chosung(&s).chars().collect();
        let input: Vec<char> = s.chars().collect();
        prop_assert_eq!(out.len(), input.len());
        for (before, after) in input.iter().zip(out.iter()) {
            if is_hangul_syllable(*before) {
                prop_assert!(is_chosung(*after));
            } else {
                prop_assert_eq!(before, after);
            }
        }
    }

    #[test]
    fn prop_extraction_is_idempotent(s in arb_mixed()) {
        let once = extract_chosung(&s);
        prop_assert_eq!(extract_chosung(&once), once);
    }

    #[test]
    fn prop_extracted_syllables_are_chosung_queries(s in arb_syllables()) {
        prop_assume!(!s.is_empty());
        prop_assert!(is_chosung_query(&extract_chosung(&s)));
    }

    #[test]
    fn prop_consonant_queries_detected(q in arb_chosung_query()) {
        prop_assert!(is_chosung_query(&q));
    }

    #[test]
    fn prop_latin_is_never_chosung_query(s in "[a-zA-Z0-9]{1,20}") {
        prop_assert!(!is_chosung_query(&s));
        prop_assert!(!has_korean(&s));
    }

    #[test]
    fn prop_syllables_are_korean(s in arb_syllables()) {
        prop_assert_eq!(has_korean(&s), !s.is_empty());
    }
}
