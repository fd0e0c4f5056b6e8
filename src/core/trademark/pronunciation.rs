//! Phonetic Transliteration
//!
//! Converts Latin-script trademark names into a Korean pronunciation
//! approximation ("samsung" -> "삼성") so that users typing Hangul can find
//! English marks.
//!
//! Conversion is two-tier:
//!
//! 1. A primary [`PhoneticConverter`] bound at startup. The default is
//!    [`RuleBasedConverter`]; [`NoPrimaryConverter`] disables the tier.
//! 2. A deterministic fallback that spells each letter by its Korean alphabet
//!    name ("lg" -> "엘지"). It runs for every word the primary tier rejects.
//!
//! # Usage
//!
//! ```
//! use trademark_search::core::trademark::pronunciation::Transliterator;
//!
//! let transliterator = Transliterator::rule_based();
//! assert_eq!(transliterator.transliterate("Samsung").as_deref(), Some("삼성"));
//! assert_eq!(transliterator.transliterate("LG").as_deref(), Some("엘지"));
//! assert_eq!(transliterator.transliterate(""), None);
//! ```

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use crate::config::{PhoneticConfig, PrimaryConverter};

// ============================================================================
// Errors
// ============================================================================

/// Reasons a converter declines a word. Every variant sends the word to the
/// alphabet-name fallback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PhoneticError {
    #[error("no primary converter is bound")]
    Unavailable,

    #[error("empty word")]
    EmptyWord,

    #[error("unsupported characters in '{0}'")]
    Unsupported(String),

    #[error("no vowel to build syllables from in '{0}'")]
    NoVowel(String),

    #[error("jamo index out of range")]
    Compose,
}

// ============================================================================
// Converter Capability
// ============================================================================

/// Word-level grapheme-to-phoneme conversion into Hangul.
pub trait PhoneticConverter: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Convert one lowercase word with no whitespace.
    fn convert_word(&self, word: &str) -> Result<String, PhoneticError>;
}

/// Primary tier that always defers to the fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrimaryConverter;

impl PhoneticConverter for NoPrimaryConverter {
    fn name(&self) -> &'static str {
        "none"
    }

    fn convert_word(&self, _word: &str) -> Result<String, PhoneticError> {
        Err(PhoneticError::Unavailable)
    }
}

// ============================================================================
// Alphabet-Name Fallback
// ============================================================================

/// Korean names of the Latin letters a..z.
const LETTER_NAMES: [&str; 26] = [
    "에이", "비", "시", "디", "이", "에프", "지", "에이치", "아이", "제이", "케이", "엘", "엠", "엔",
    "오", "피", "큐", "알", "에스", "티", "유", "브이", "더블유", "엑스", "와이", "지",
];

/// Korean alphabet name for a Latin letter (either case).
pub fn letter_name(c: char) -> Option<&'static str> {
    if c.is_ascii_alphabetic() {
        let index = (c.to_ascii_lowercase() as u8 - b'a') as usize;
        LETTER_NAMES.get(index).copied()
    } else {
        None
    }
}

/// Spell a word letter by letter; anything that is not a Latin letter is
/// kept as-is.
pub fn spell_out(word: &str) -> String {
    let mut out = String::with_capacity(word.len() * 6);
    for c in word.chars() {
        match letter_name(c) {
            Some(name) => out.push_str(name),
            None => out.push(c),
        }
    }
    out
}

// ============================================================================
// Transliterator
// ============================================================================

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));

/// Two-tier transliterator shared by indexing and querying.
#[derive(Clone)]
pub struct Transliterator {
    primary: Arc<dyn PhoneticConverter>,
}

impl Transliterator {
    pub fn new(primary: Arc<dyn PhoneticConverter>) -> Self {
        Self { primary }
    }

    /// Bound to [`RuleBasedConverter`].
    pub fn rule_based() -> Self {
        Self::new(Arc::new(RuleBasedConverter))
    }

    /// Alphabet-name spelling only.
    pub fn fallback_only() -> Self {
        Self::new(Arc::new(NoPrimaryConverter))
    }

    pub fn from_config(config: &PhoneticConfig) -> Self {
        match config.primary {
            PrimaryConverter::Rules => Self::rule_based(),
            PrimaryConverter::None => Self::fallback_only(),
        }
    }

    pub fn primary_name(&self) -> &'static str {
        self.primary.name()
    }

    /// Lowercase, drop punctuation, convert word by word and join with single
    /// spaces. `None` for empty input or input with no words left.
    pub fn transliterate(&self, text: &str) -> Option<String> {
        if text.is_empty() {
            return None;
        }

        let lowered = text.to_lowercase();
        let cleaned = NON_WORD.replace_all(&lowered, "");
        let words: Vec<String> = cleaned
            .split_whitespace()
            .map(|word| self.convert_word(word))
            .collect();

        if words.is_empty() {
            None
        } else {
            Some(words.join(" "))
        }
    }

    fn convert_word(&self, word: &str) -> String {
        match self.primary.convert_word(word) {
            Ok(converted) => converted,
            Err(e) => {
                log::debug!(
                    "{} converter declined '{}' ({}), spelling it out",
                    self.primary.name(),
                    word,
                    e
                );
                spell_out(word)
            }
        }
    }
}

impl Default for Transliterator {
    fn default() -> Self {
        Self::rule_based()
    }
}

impl fmt::Debug for Transliterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transliterator")
            .field("primary", &self.primary.name())
            .finish()
    }
}

// ============================================================================
// Rule-Based Converter
// ============================================================================

/// Onset index of ㅇ (silent initial).
const IEUNG: u32 = 11;
/// Medial indices used by the rules below.
const A: u32 = 0;
const AE: u32 = 1;
const EO: u32 = 4;
const E: u32 = 5;
const O: u32 = 8;
const U: u32 = 13;
const YU: u32 = 17;
const EU: u32 = 18;
const I: u32 = 20;

/// Loanword-style grapheme-to-phoneme approximation for ASCII words.
///
/// Scans the word into consonant, glide and vowel units, then lays them onto
/// onset/nucleus/coda slots:
///
/// - nasal and liquid codas always close the previous syllable
/// - stop codas (k, p, t) only after a short vowel, at the end of the word or
///   before a consonant other than l, r, m, n
/// - intervocalic `l` doubles as coda and onset ("hello" -> "헬로")
/// - post-vocalic `r` is dropped
/// - any other stranded consonant gets an epenthetic ㅡ (ㅣ after ch, j, sh)
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedConverter;

impl PhoneticConverter for RuleBasedConverter {
    fn name(&self) -> &'static str {
        "rules"
    }

    fn convert_word(&self, word: &str) -> Result<String, PhoneticError> {
        let units = scan(word)?;
        render(&compose(&units))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Consonant {
    B,
    Ch,
    D,
    F,
    G,
    H,
    J,
    K,
    L,
    M,
    N,
    Ng,
    P,
    R,
    S,
    Sh,
    T,
    Th,
    V,
    Z,
}

impl Consonant {
    fn onset(self) -> u32 {
        use Consonant::*;
        match self {
            G | Ng => 0,
            N => 2,
            D => 3,
            L | R => 5,
            M => 6,
            B | V => 7,
            S | Sh | Th => 9,
            J | Z => 12,
            Ch => 14,
            K => 15,
            T => 16,
            F | P => 17,
            H => 18,
        }
    }

    /// Final slot when this consonant closes an open syllable.
    fn coda(self, after_short_vowel: bool, next: Next) -> Option<u32> {
        use Consonant::*;
        match self {
            N => Some(4),
            L => Some(8),
            M => Some(16),
            Ng => Some(21),
            K if after_short_vowel && next.allows_stop_coda() => Some(1),
            P if after_short_vowel && next.allows_stop_coda() => Some(17),
            T if after_short_vowel && next.allows_stop_coda() => Some(19),
            _ => None,
        }
    }

    /// Final copied onto the previous syllable when this consonant also
    /// starts the next one.
    fn carried_coda(self) -> Option<u32> {
        match self {
            Consonant::L => Some(8),
            Consonant::Ng => Some(21),
            _ => None,
        }
    }

    fn epenthetic_vowel(self) -> u32 {
        match self {
            Consonant::Ch | Consonant::J | Consonant::Sh => I,
            _ => EU,
        }
    }

    fn is_sonorant(self) -> bool {
        matches!(
            self,
            Consonant::L | Consonant::R | Consonant::M | Consonant::N
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Glide {
    Y,
    W,
}

impl Glide {
    fn apply(self, medial: u32) -> u32 {
        match (self, medial) {
            (Glide::Y, A) => 2,
            (Glide::Y, AE) => 3,
            (Glide::Y, EO) => 6,
            (Glide::Y, E) => 7,
            (Glide::Y, O) => 12,
            (Glide::Y, U) => YU,
            (Glide::W, A) => 9,
            (Glide::W, AE) => 10,
            (Glide::W, EO) | (Glide::W, O) => 14,
            (Glide::W, E) => 15,
            (Glide::W, I) => 16,
            (_, m) => m,
        }
    }

    /// Vowel for a glide with nothing to attach to.
    fn bare(self) -> u32 {
        match self {
            Glide::Y => I,
            Glide::W => U,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Nucleus {
    medials: &'static [u32],
    short: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Consonant(Consonant),
    Glide(Glide),
    Vowel(Nucleus),
}

/// What follows a consonant being resolved.
#[derive(Debug, Clone, Copy)]
enum Next {
    End,
    Consonant(Consonant),
    Glide,
}

impl Next {
    fn allows_stop_coda(self) -> bool {
        match self {
            Next::End => true,
            Next::Consonant(c) => !c.is_sonorant(),
            Next::Glide => false,
        }
    }
}

const VOWEL_TRIGRAPHS: &[(&str, &[u32])] = &[("igh", &[A, I])];

const VOWEL_DIGRAPHS: &[(&str, &[u32])] = &[
    ("ee", &[I]),
    ("ea", &[I]),
    ("ie", &[I]),
    ("oo", &[U]),
    ("ue", &[U]),
    ("ew", &[YU]),
    ("ou", &[A, U]),
    ("ow", &[A, U]),
    ("ai", &[E, I]),
    ("ay", &[E, I]),
    ("ei", &[E, I]),
    ("ey", &[E, I]),
    ("oi", &[O, I]),
    ("oy", &[O, I]),
    ("au", &[O]),
    ("aw", &[O]),
    ("oa", &[O]),
];

fn is_vowel_letter(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

fn short_vowel(c: char) -> &'static [u32] {
    match c {
        'a' => &[A],
        'e' => &[E],
        'i' => &[I],
        'o' => &[O],
        _ => &[EO],
    }
}

fn long_vowel(c: char) -> &'static [u32] {
    match c {
        'a' => &[E, I],
        'e' => &[I],
        'i' => &[A, I],
        'o' => &[O],
        _ => &[YU],
    }
}

/// Drop a silent final `e`. Returns the index of the vowel it lengthens, if
/// any ("nike", "cake"). A consonant + "le" ending only loses the `e`.
fn strip_silent_e(chars: &mut Vec<char>) -> Option<usize> {
    let len = chars.len();
    if len < 3 || chars[len - 1] != 'e' {
        return None;
    }
    let before = chars[len - 2];
    if is_vowel_letter(before) || matches!(before, 'w' | 'y') {
        return None;
    }

    let vowel_at = len - 3;
    let lengthens = is_vowel_letter(chars[vowel_at])
        && (vowel_at == 0 || !is_vowel_letter(chars[vowel_at - 1]));
    if lengthens {
        chars.pop();
        return Some(vowel_at);
    }
    if before == 'l' {
        chars.pop();
    }
    None
}

/// Doubled letters ("ll", "ss", "tt") sound once.
fn push_consonant(units: &mut Vec<Unit>, c: Consonant) {
    if units.last() != Some(&Unit::Consonant(c)) {
        units.push(Unit::Consonant(c));
    }
}

fn scan(word: &str) -> Result<Vec<Unit>, PhoneticError> {
    let mut chars: Vec<char> = word.chars().map(|c| c.to_ascii_lowercase()).collect();
    if chars.is_empty() {
        return Err(PhoneticError::EmptyWord);
    }
    if chars.iter().any(|c| !c.is_ascii_lowercase()) {
        return Err(PhoneticError::Unsupported(word.to_string()));
    }
    if !chars.iter().any(|&c| is_vowel_letter(c) || c == 'y') {
        return Err(PhoneticError::NoVowel(word.to_string()));
    }

    let long_at = strip_silent_e(&mut chars);
    let vowel_at = |i: usize| chars.get(i).map_or(false, |&c| is_vowel_letter(c));

    let mut units: Vec<Unit> = Vec::with_capacity(chars.len());

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if is_vowel_letter(c) {
            let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
            let grapheme = VOWEL_TRIGRAPHS
                .iter()
                .chain(VOWEL_DIGRAPHS.iter())
                .find(|(spelling, _)| rest.starts_with(spelling));
            if let Some(&(spelling, medials)) = grapheme {
                units.push(Unit::Vowel(Nucleus {
                    medials,
                    short: false,
                }));
                i += spelling.len();
            } else {
                let nucleus = if long_at == Some(i) {
                    Nucleus {
                        medials: long_vowel(c),
                        short: false,
                    }
                } else {
                    Nucleus {
                        medials: short_vowel(c),
                        short: true,
                    }
                };
                units.push(Unit::Vowel(nucleus));
                i += 1;
            }
            continue;
        }

        let step = match (c, next) {
            ('t', Some('c')) if chars.get(i + 2) == Some(&'h') => {
                push_consonant(&mut units, Consonant::Ch);
                3
            }
            ('c', Some('h')) => {
                push_consonant(&mut units, Consonant::Ch);
                2
            }
            ('s', Some('h')) => {
                push_consonant(&mut units, Consonant::Sh);
                2
            }
            ('t', Some('h')) => {
                push_consonant(&mut units, Consonant::Th);
                2
            }
            ('p', Some('h')) => {
                push_consonant(&mut units, Consonant::F);
                2
            }
            ('c', Some('k')) => {
                push_consonant(&mut units, Consonant::K);
                2
            }
            ('n', Some('g')) => {
                push_consonant(&mut units, Consonant::Ng);
                2
            }
            ('w', Some('h')) => {
                if vowel_at(i + 2) {
                    units.push(Unit::Glide(Glide::W));
                } else {
                    push_consonant(&mut units, Consonant::H);
                }
                2
            }
            ('q', Some('u')) if vowel_at(i + 2) => {
                push_consonant(&mut units, Consonant::K);
                units.push(Unit::Glide(Glide::W));
                2
            }
            ('k', Some('n')) if i == 0 => {
                push_consonant(&mut units, Consonant::N);
                2
            }
            ('w', Some('r')) if i == 0 => {
                push_consonant(&mut units, Consonant::R);
                2
            }
            ('g', Some('h')) => {
                if i == 0 {
                    push_consonant(&mut units, Consonant::G);
                }
                2
            }
            ('x', _) => {
                if i == 0 {
                    push_consonant(&mut units, Consonant::Z);
                } else {
                    push_consonant(&mut units, Consonant::K);
                    push_consonant(&mut units, Consonant::S);
                }
                1
            }
            ('c', next) => {
                let soft = matches!(next, Some('e' | 'i' | 'y'));
                push_consonant(&mut units, if soft { Consonant::S } else { Consonant::K });
                1
            }
            ('y', _) => {
                if vowel_at(i + 1) {
                    units.push(Unit::Glide(Glide::Y));
                } else {
                    units.push(Unit::Vowel(Nucleus {
                        medials: &[I],
                        short: true,
                    }));
                }
                1
            }
            ('w', _) => {
                if vowel_at(i + 1) {
                    units.push(Unit::Glide(Glide::W));
                } else {
                    units.push(Unit::Vowel(Nucleus {
                        medials: &[U],
                        short: false,
                    }));
                }
                1
            }
            (c, _) => {
                let consonant = match c {
                    'b' => Consonant::B,
                    'd' => Consonant::D,
                    'f' => Consonant::F,
                    'g' => Consonant::G,
                    'h' => Consonant::H,
                    'j' => Consonant::J,
                    'k' | 'q' => Consonant::K,
                    'l' => Consonant::L,
                    'm' => Consonant::M,
                    'n' => Consonant::N,
                    'p' => Consonant::P,
                    'r' => Consonant::R,
                    's' => Consonant::S,
                    't' => Consonant::T,
                    'v' => Consonant::V,
                    _ => Consonant::Z,
                };
                push_consonant(&mut units, consonant);
                1
            }
        };
        i += step;
    }

    Ok(units)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Syllable {
    cho: u32,
    jung: u32,
    jong: u32,
}

/// State of the last emitted syllable with respect to taking a final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    Closed,
    Vowel { short: bool },
    Epenthetic,
}

fn compose(units: &[Unit]) -> Vec<Syllable> {
    let mut out: Vec<Syllable> = Vec::new();
    let mut open = Open::Closed;
    let mut onset: Option<Consonant> = None;
    let mut glide: Option<Glide> = None;

    for unit in units {
        match *unit {
            Unit::Consonant(c) => {
                if let Some(prev) = onset.take() {
                    close(&mut out, &mut open, prev, Next::Consonant(c));
                }
                onset = Some(c);
            }
            Unit::Glide(g) => {
                // "sw", "tw": the consonant keeps its own syllable.
                if g == Glide::W {
                    if let Some(prev) = onset {
                        if !matches!(prev, Consonant::K | Consonant::G | Consonant::H) {
                            onset = None;
                            close(&mut out, &mut open, prev, Next::Glide);
                        }
                    }
                }
                glide = Some(g);
            }
            Unit::Vowel(nucleus) => {
                let consonant = onset.take();
                if let Some(carried) = consonant.and_then(Consonant::carried_coda) {
                    let takes_final = match open {
                        Open::Vowel { .. } => true,
                        Open::Epenthetic => consonant == Some(Consonant::L),
                        Open::Closed => false,
                    };
                    if let Some(last) = out.last_mut().filter(|s| takes_final && s.jong == 0) {
                        last.jong = carried;
                    }
                }

                let mut medials = nucleus.medials.iter().copied();
                let mut first = medials.next().unwrap_or(EU);
                if let Some(g) = glide.take() {
                    first = g.apply(first);
                } else if consonant == Some(Consonant::Sh) {
                    first = Glide::Y.apply(first);
                }

                out.push(Syllable {
                    cho: consonant.map_or(IEUNG, Consonant::onset),
                    jung: first,
                    jong: 0,
                });
                for medial in medials {
                    out.push(Syllable {
                        cho: IEUNG,
                        jung: medial,
                        jong: 0,
                    });
                }
                open = Open::Vowel {
                    short: nucleus.short,
                };
            }
        }
    }

    if let Some(c) = onset.take() {
        close(&mut out, &mut open, c, Next::End);
    }
    if let Some(g) = glide {
        out.push(Syllable {
            cho: IEUNG,
            jung: g.bare(),
            jong: 0,
        });
    }
    out
}

/// Resolve a consonant that no vowel follows directly.
fn close(out: &mut Vec<Syllable>, open: &mut Open, c: Consonant, next: Next) {
    let state = *open;
    *open = Open::Closed;

    if let Some(last) = out.last_mut().filter(|s| s.jong == 0) {
        match state {
            Open::Vowel { short } => {
                if c == Consonant::R {
                    return;
                }
                if let Some(jong) = c.coda(short, next) {
                    last.jong = jong;
                    return;
                }
            }
            Open::Epenthetic if c == Consonant::L => {
                last.jong = 8;
                return;
            }
            _ => {}
        }
    }

    out.push(Syllable {
        cho: c.onset(),
        jung: c.epenthetic_vowel(),
        jong: 0,
    });
    *open = Open::Epenthetic;
}

/// Lay syllables out as conjoining jamo and let NFC compose the blocks.
fn render(syllables: &[Syllable]) -> Result<String, PhoneticError> {
    let mut jamo = String::with_capacity(syllables.len() * 3);
    for s in syllables {
        jamo.push(char::from_u32(0x1100 + s.cho).ok_or(PhoneticError::Compose)?);
        jamo.push(char::from_u32(0x1161 + s.jung).ok_or(PhoneticError::Compose)?);
        if s.jong > 0 {
            jamo.push(char::from_u32(0x11A7 + s.jong).ok_or(PhoneticError::Compose)?);
        }
    }
    Ok(jamo.nfc().collect())
}
