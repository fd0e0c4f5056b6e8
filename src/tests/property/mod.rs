//! Property-based tests
//!
//! Invariants checked with proptest over generated input rather than
//! hand-picked cases.
//!
//! ## Test Modules
//!
//! - `chosung_props`: leading consonant extraction
//!   - Output length equals input length for syllable strings
//!   - Every output character is a leading consonant or unchanged input
//!   - Consonant-only detection agrees with the character classes
//!
//! - `query_props`: query building
//!   - Every sort list ends with the ascending `pid` tie-break
//!   - Page window arithmetic stays within the configured bounds
//!
//! Run with more cases:
//!
//! ```sh
//! PROPTEST_CASES=1000 cargo test property --release
//! ```

mod chosung_props;
mod query_props;
