//! Trademark search core: Korean text helpers, document normalization,
//! query building, identifier allocation and the service tying them to a
//! document store.

pub mod chosung;
pub mod error;
pub mod mapping;
pub mod models;
pub mod normalize;
pub mod pid;
pub mod pronunciation;
pub mod query;
pub mod service;

pub use error::{NormalizationFieldError, Result, TrademarkError};
pub use normalize::DocumentNormalizer;
pub use pid::{is_valid_pid, FallbackSequence, PidAllocator};
pub use pronunciation::Transliterator;
pub use query::{QueryBuilder, SearchParams};
pub use service::TrademarkService;
