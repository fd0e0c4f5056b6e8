//! Identifier Allocation
//!
//! Trademarks are keyed by a human-readable sequential `pid`. The next value
//! is one past the largest numeric `pid` in the index; when the index cannot
//! answer, an in-process [`FallbackSequence`] supplies one instead.
//!
//! The fallback is owned by whoever builds the allocator (normally the
//! service root) and survives only as long as the process. Concurrent
//! callers can observe duplicate ids across the two sources; ingestion
//! reserves a whole [`PidBlock`] up front, above every numeric id the batch
//! already carries, so a batch at least stays internally consistent.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::core::store::DocumentStore;

/// Numeric sub-field of `pid` the max aggregation runs on.
pub const PID_MAX_FIELD: &str = "pid.numeric";

static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid regex")
});

/// True for all-digit ids and for legacy UUIDs.
pub fn is_valid_pid(pid: &str) -> bool {
    (!pid.is_empty() && pid.chars().all(|c| c.is_ascii_digit())) || UUID_PATTERN.is_match(pid)
}

// ============================================================================
// Fallback Sequence
// ============================================================================

/// Process-lifetime counter used when the store cannot supply the next id.
#[derive(Debug)]
pub struct FallbackSequence {
    next: AtomicU64,
}

impl FallbackSequence {
    /// Starts at 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Current value; advances the sequence.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// `count` consecutive values, returning the first.
    pub fn take(&self, count: u64) -> u64 {
        self.next.fetch_add(count.max(1), Ordering::SeqCst)
    }

    /// Skip ahead so the next value is at least `first`.
    pub fn raise_to(&self, first: u64) {
        self.next.fetch_max(first, Ordering::SeqCst);
    }
}

impl Default for FallbackSequence {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Allocator
// ============================================================================

/// Consecutive ids reserved for one ingestion batch.
#[derive(Debug, Clone)]
pub struct PidBlock {
    next: u64,
}

impl PidBlock {
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    pub fn next_pid(&mut self) -> String {
        let pid = self.next;
        self.next += 1;
        pid.to_string()
    }
}

/// Where the next id came from.
enum Lookup {
    Missing,
    Max(u64),
    Fallback,
}

pub struct PidAllocator {
    store: Arc<dyn DocumentStore>,
    index: String,
    fallback: Arc<FallbackSequence>,
}

impl PidAllocator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        index: impl Into<String>,
        fallback: Arc<FallbackSequence>,
    ) -> Self {
        Self {
            store,
            index: index.into(),
            fallback,
        }
    }

    /// Next sequential id as a string.
    ///
    /// `"1"` when the index does not exist yet, `max + 1` when the index
    /// holds a numeric `pid`, otherwise the fallback sequence.
    pub async fn next_id(&self) -> String {
        match self.lookup().await {
            Lookup::Missing => "1".to_string(),
            Lookup::Max(max) => (max + 1).to_string(),
            Lookup::Fallback => self.fallback.next().to_string(),
        }
    }

    /// Reserve `count` consecutive ids, all greater than `floor`.
    ///
    /// `floor` is the largest numeric id the caller is about to write
    /// alongside the block (0 for none).
    pub async fn reserve(&self, count: usize, floor: u64) -> PidBlock {
        let first = match self.lookup().await {
            Lookup::Missing => 1,
            Lookup::Max(max) => max + 1,
            Lookup::Fallback => {
                self.fallback.raise_to(floor.saturating_add(1));
                self.fallback.take(count as u64)
            }
        };
        PidBlock::starting_at(first.max(floor.saturating_add(1)))
    }

    async fn lookup(&self) -> Lookup {
        match self.store.exists(&self.index).await {
            Ok(false) => return Lookup::Missing,
            Ok(true) => {}
            Err(e) => {
                log::error!("pid lookup: cannot check index '{}': {}", self.index, e);
                return Lookup::Fallback;
            }
        }

        match self.store.max_value(&self.index, PID_MAX_FIELD).await {
            Ok(Some(value)) => match parse_max(&value) {
                Some(max) => Lookup::Max(max),
                None => {
                    log::warn!("pid lookup: max pid {} is not an integer, using fallback", value);
                    Lookup::Fallback
                }
            },
            Ok(None) => Lookup::Fallback,
            Err(e) => {
                log::error!("pid lookup: max aggregation failed: {}", e);
                Lookup::Fallback
            }
        }
    }
}

/// Aggregations report numbers as doubles; keyword maxima arrive as text.
fn parse_max(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
