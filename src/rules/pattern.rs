//! Process-lifetime cache of compiled rule patterns.
//!
//! Rule evaluation runs once per loaded type, so pattern compilation must
//! happen once per distinct pattern string, not once per query. The cache is a
//! pure memoization layer: the same source string always yields the same
//! compiled pattern for the lifetime of the process, and entries are never
//! evicted (pattern sets are small and static per run).
//!
//! Malformed patterns are memoized too - a pattern that failed to compile is
//! remembered as invalid so it is neither recompiled nor reported more than
//! once, and it never matches anything.

use std::sync::Arc;

use dashmap::DashMap;
use regex::Regex;

use crate::{Error, Result};

/// A cached compilation outcome.
///
/// Compilation failures are kept in the cache alongside successes so that a
/// bad rule degrades to "never matches" without being retried on the hot path.
#[derive(Clone)]
enum CachedPattern {
    Compiled(Arc<Regex>),
    Invalid,
}

/// Compiles and caches regular-expression rule patterns by source string.
///
/// Owned by the rule engine (or shared between engines via `Arc`); not global
/// state. Concurrent lookups of the same new pattern are safe: the underlying
/// map guarantees a single insertion, and every caller observes the same
/// compiled pattern.
///
/// # Examples
///
/// ```rust
/// use dotcov::rules::PatternCache;
///
/// let cache = PatternCache::new();
/// let pattern = cache.get_regex(r"^MyApp\.").unwrap();
/// assert!(pattern.is_match("MyApp.Core.Engine"));
///
/// // Malformed patterns never match and never raise on lookup
/// assert!(cache.get_regex("([unclosed").is_none());
/// ```
pub struct PatternCache {
    patterns: DashMap<String, CachedPattern>,
}

impl PatternCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        PatternCache {
            patterns: DashMap::new(),
        }
    }

    /// Returns the compiled pattern for `pattern`, compiling and inserting it
    /// on first use.
    ///
    /// Returns `None` for patterns that do not compile; such patterns are
    /// treated by the engine as never matching. Use [`PatternCache::compile`]
    /// when the failure itself is of interest.
    #[must_use]
    pub fn get_regex(&self, pattern: &str) -> Option<Arc<Regex>> {
        let entry = self
            .patterns
            .entry(pattern.to_string())
            .or_insert_with(|| match Regex::new(pattern) {
                Ok(regex) => CachedPattern::Compiled(Arc::new(regex)),
                Err(_) => CachedPattern::Invalid,
            });

        match entry.value() {
            CachedPattern::Compiled(regex) => Some(regex.clone()),
            CachedPattern::Invalid => None,
        }
    }

    /// Like [`PatternCache::get_regex`], but reports a compilation failure as
    /// an error so configuration code can log it.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPattern`] if the pattern does not compile. The
    /// failure is memoized; subsequent lookups return the cached outcome
    /// without recompiling.
    pub fn compile(&self, pattern: &str) -> Result<Arc<Regex>> {
        self.get_regex(pattern).ok_or_else(|| Error::InvalidPattern {
            pattern: pattern.to_string(),
        })
    }

    /// Number of distinct pattern strings seen so far, valid or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns true if no pattern has been requested yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new()
    }
}
