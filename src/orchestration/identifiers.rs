//! Business identifier minting.
//!
//! Identifiers are passed in as an [`IdGenerator`] rather than minted from a
//! process-wide helper, so builders and tests can choose their own source.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Produces globally unique, roughly creation-ordered identifiers
pub trait IdGenerator: Send + Sync + fmt::Debug {
    fn next_id(&self) -> String;
}

/// UUIDv7 identifiers: time-ordered and unique without coordination
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeOrderedIdGenerator;

impl IdGenerator for TimeOrderedIdGenerator {
    fn next_id(&self) -> String {
        Uuid::now_v7().to_string()
    }
}

/// Deterministic `<prefix>-<n>` identifiers for fixtures and reproducible runs
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        // Zero padding keeps lexical order equal to creation order
        format!("{}-{n:06}", self.prefix)
    }
}
