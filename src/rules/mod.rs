//! Inclusion/exclusion rules controlling instrumentation scope.
//!
//! This module decides, for every type the runtime loads, whether that type
//! is in scope for coverage instrumentation. It is organized leaf-first:
//!
//! # Key Components
//!
//! - [`PatternCache`] - compiles and memoizes rule patterns by source string
//! - [`RuleItem`] - the registration-time classification of raw item strings
//!   into plain names, patterns and attribute references
//! - [`Rules`] - the rule set and engine: registration, one-time
//!   normalization, and the hot per-type decision path
//! - [`ProfilerMode`] - profiler capability flags carried with the rule set
//!
//! # Decision Policy
//!
//! Exclude beats include at every stage. With no include entries registered
//! the engine default-allows; with any registered, a candidate must match at
//! least one include entry. Malformed patterns degrade to "never matches" -
//! a configuration mistake must not fault the profiled process.

mod engine;
mod item;
mod pattern;

pub use engine::{ProfilerMode, Rules};
pub use item::{extract_namespace, wildcard_to_pattern, RuleItem, ATTRIBUTE_MARKER};
pub use pattern::PatternCache;
