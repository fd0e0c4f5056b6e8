//! Chosung (Initial Consonant) Utilities
//!
//! Maps precomposed Hangul syllables to their leading consonant so that
//! abbreviated searches such as "ㅅㅅㅈㅈ" can match "삼성전자".
//!
//! The same functions run on the indexing side (derived `*_chosung` fields)
//! and on the query side (mode selection), so both must stay in lockstep.

// ============================================================================
// Tables
// ============================================================================

/// The 19 leading consonants in Unicode syllable-block order.
pub const CHOSUNG: [char; 19] = [
    'ㄱ', 'ㄲ', 'ㄴ', 'ㄷ', 'ㄸ', 'ㄹ', 'ㅁ', 'ㅂ', 'ㅃ', 'ㅅ', 'ㅆ', 'ㅇ', 'ㅈ', 'ㅉ', 'ㅊ', 'ㅋ',
    'ㅌ', 'ㅍ', 'ㅎ',
];

/// First precomposed syllable ('가').
const SYLLABLE_BASE: u32 = 0xAC00;
/// Last precomposed syllable ('힣').
const SYLLABLE_LAST: u32 = 0xD7A3;
/// Syllables sharing one leading consonant (21 vowels x 28 finals).
const SYLLABLES_PER_CHOSUNG: u32 = 588;

// ============================================================================
// Character Classification
// ============================================================================

/// True for a precomposed Hangul syllable block.
pub fn is_hangul_syllable(c: char) -> bool {
    (SYLLABLE_BASE..=SYLLABLE_LAST).contains(&(c as u32))
}

/// True for one of the 19 bare leading consonants.
pub fn is_chosung(c: char) -> bool {
    CHOSUNG.contains(&c)
}

/// Leading consonant of a syllable block, `None` for anything else.
pub fn leading_consonant(c: char) -> Option<char> {
    if !is_hangul_syllable(c) {
        return None;
    }
    let index = (c as u32 - SYLLABLE_BASE) / SYLLABLES_PER_CHOSUNG;
    CHOSUNG.get(index as usize).copied()
}

// ============================================================================
// Public API
// ============================================================================

/// Replace every syllable block with its leading consonant.
///
/// Non-syllable characters (Latin letters, digits, punctuation, whitespace and
/// bare jamo, including conjoining jamo and combining marks) pass through
/// unchanged, one output character per input character. An empty string
/// yields an empty string.
///
/// ```
/// use trademark_search::core::trademark::chosung::extract_chosung;
///
/// assert_eq!(extract_chosung("삼성전자"), "ㅅㅅㅈㅈ");
/// assert_eq!(extract_chosung("LG전자"), "LGㅈㅈ");
/// ```
pub fn extract_chosung(text: &str) -> String {
    text.chars()
        .map(|c| leading_consonant(c).unwrap_or(c))
        .collect()
}

/// True when the query is non-empty and every non-space character is a bare
/// leading consonant.
pub fn is_chosung_query(query: &str) -> bool {
    if query.is_empty() {
        return false;
    }
    query.chars().filter(|c| *c != ' ').all(is_chosung)
}

/// True when the text contains a syllable block or a bare leading consonant.
pub fn has_korean(text: &str) -> bool {
    text.chars().any(|c| is_hangul_syllable(c) || is_chosung(c))
}
