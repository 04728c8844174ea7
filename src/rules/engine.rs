//! The rule engine: per-type inclusion decisions for the profiler.
//!
//! [`Rules`] owns the complete include/exclude configuration of a profiling
//! session and answers, once per loaded type, whether that type is in scope
//! for instrumentation. The decision path is hot - it runs on whichever
//! runtime thread reports the load event - so all string classification and
//! pattern compilation happens up front in [`Rules::prepare_item_rules`] and
//! queries only walk prepared lists.
//!
//! # Decision Policy
//!
//! Exclude beats include at every stage ("deny overrides allow"), and when
//! any include list is non-empty a candidate must match at least one include
//! entry to be in scope. A malformed pattern is reported once at preparation
//! time and never matches afterwards; it cannot fault a query.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use regex::Regex;

use crate::logging::DriverLog;
use crate::metadata::{MetadataImport, Token};
use crate::rules::item::{extract_namespace, RuleItem};
use crate::rules::pattern::PatternCache;
use crate::transfer::{MessageKind, MessagePipe, Parser, Payload};
use crate::Result;

bitflags! {
    /// Profiler capability flags, independent of item/rule matching.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ProfilerMode: u32 {
        /// Collect block coverage counts
        const COVERAGE = 0x01;
        /// Record the call tree
        const CALL_TREE = 0x02;
    }
}

/// Item lists partitioned and compiled for the query path.
///
/// Built by [`Rules::prepare_item_rules`]; queries never touch the raw
/// registration strings.
#[derive(Default, Clone)]
struct Prepared {
    include_names: Vec<String>,
    exclude_names: Vec<String>,
    include_item_patterns: Vec<Arc<Regex>>,
    exclude_item_patterns: Vec<Arc<Regex>>,
    include_rule_patterns: Vec<Arc<Regex>>,
    exclude_rule_patterns: Vec<Arc<Regex>>,
    include_attributes: Vec<String>,
    exclude_attributes: Vec<String>,
    has_includes: bool,
}

/// The rule set and its evaluation engine.
///
/// Configuration happens in three steps on the controller side: register
/// items and rules ([`Rules::include_item`], [`Rules::exclude_item`],
/// [`Rules::include_rule`], [`Rules::exclude_rule`]), enable capability modes
/// ([`Rules::enable_mode`]), then normalize once with
/// [`Rules::prepare_item_rules`]. After preparation the engine is immutable
/// and safe to query from concurrent runtime threads.
///
/// Verdicts are deterministic: the same rule set and candidate always yield
/// the same answer. The only shared state behind a query is the
/// [`PatternCache`], a pure memoization layer.
///
/// # Examples
///
/// ```rust
/// use dotcov::logging::DriverLog;
/// use dotcov::rules::Rules;
///
/// let log = DriverLog::new();
/// let mut rules = Rules::new();
/// rules.include_item("MyApp.*");
/// rules.exclude_item("MyApp.Internal");
/// rules.prepare_item_rules(&log);
///
/// assert!(rules.is_assembly_included_in_rules("MyApp"));
/// ```
#[derive(Clone)]
pub struct Rules {
    coverage_enabled: bool,
    call_tree_enabled: bool,
    profiler_level: ProfilerMode,

    include_items: Vec<String>,
    exclude_items: Vec<String>,
    include_rules: Vec<String>,
    exclude_rules: Vec<String>,

    prepared: Prepared,
    cache: Arc<PatternCache>,
}

impl Rules {
    /// Creates an empty rule set with its own pattern cache.
    #[must_use]
    pub fn new() -> Self {
        Rules::with_cache(Arc::new(PatternCache::new()))
    }

    /// Creates an empty rule set sharing a pattern cache with other engines.
    #[must_use]
    pub fn with_cache(cache: Arc<PatternCache>) -> Self {
        Rules {
            coverage_enabled: false,
            call_tree_enabled: false,
            profiler_level: ProfilerMode::empty(),
            include_items: Vec::new(),
            exclude_items: Vec::new(),
            include_rules: Vec::new(),
            exclude_rules: Vec::new(),
            prepared: Prepared::default(),
            cache,
        }
    }

    /// Registers an include item (plain name, wildcard name or
    /// `attribute:` reference).
    pub fn include_item<S: Into<String>>(&mut self, item: S) {
        self.include_items.push(item.into());
    }

    /// Registers an exclude item (plain name, wildcard name or
    /// `attribute:` reference).
    pub fn exclude_item<S: Into<String>>(&mut self, item: S) {
        self.exclude_items.push(item.into());
    }

    /// Registers an include rule (regular expression or `attribute:`
    /// reference).
    pub fn include_rule<S: Into<String>>(&mut self, rule: S) {
        self.include_rules.push(rule.into());
    }

    /// Registers an exclude rule (regular expression or `attribute:`
    /// reference).
    pub fn exclude_rule<S: Into<String>>(&mut self, rule: S) {
        self.exclude_rules.push(rule.into());
    }

    /// Enables profiler capability modes.
    pub fn enable_mode(&mut self, mode: ProfilerMode) {
        self.profiler_level |= mode;
        if mode.contains(ProfilerMode::COVERAGE) {
            self.coverage_enabled = true;
        }
        if mode.contains(ProfilerMode::CALL_TREE) {
            self.call_tree_enabled = true;
        }
    }

    /// Returns whether all of the given modes are enabled.
    #[must_use]
    pub fn is_enabled_mode(&self, mode: ProfilerMode) -> bool {
        self.profiler_level.contains(mode)
    }

    /// Returns whether coverage profiling is enabled.
    #[must_use]
    pub fn coverage_enabled(&self) -> bool {
        self.coverage_enabled
    }

    /// Returns whether call-tree profiling is enabled.
    #[must_use]
    pub fn call_tree_enabled(&self) -> bool {
        self.call_tree_enabled
    }

    /// The enabled capability mask.
    #[must_use]
    pub fn profiler_level(&self) -> ProfilerMode {
        self.profiler_level
    }

    /// Registered include items, in registration order.
    #[must_use]
    pub fn include_items(&self) -> &[String] {
        &self.include_items
    }

    /// Registered exclude items, in registration order.
    #[must_use]
    pub fn exclude_items(&self) -> &[String] {
        &self.exclude_items
    }

    /// Registered include rules, in registration order.
    #[must_use]
    pub fn include_rules(&self) -> &[String] {
        &self.include_rules
    }

    /// Registered exclude rules, in registration order.
    #[must_use]
    pub fn exclude_rules(&self) -> &[String] {
        &self.exclude_rules
    }

    /// One-time normalization pass, invoked after registration and before any
    /// query.
    ///
    /// Partitions raw items into plain-name lists and compiled pattern or
    /// attribute lists, so the per-type query path never re-classifies
    /// strings. Malformed patterns are reported to `log` and dropped; such a
    /// rule never matches. Calling this again rebuilds the partition from the
    /// raw registrations.
    pub fn prepare_item_rules(&mut self, log: &DriverLog) {
        let mut prepared = Prepared {
            has_includes: !self.include_items.is_empty() || !self.include_rules.is_empty(),
            ..Prepared::default()
        };

        for item in &self.include_items {
            match RuleItem::parse(item) {
                RuleItem::Plain(name) => prepared.include_names.push(name),
                RuleItem::Pattern(pattern) => {
                    if let Some(regex) = compile_pattern(&self.cache, &pattern, log) {
                        prepared.include_item_patterns.push(regex);
                    }
                }
                RuleItem::Attribute(name) => prepared.include_attributes.push(name),
            }
        }
        for item in &self.exclude_items {
            match RuleItem::parse(item) {
                RuleItem::Plain(name) => prepared.exclude_names.push(name),
                RuleItem::Pattern(pattern) => {
                    if let Some(regex) = compile_pattern(&self.cache, &pattern, log) {
                        prepared.exclude_item_patterns.push(regex);
                    }
                }
                RuleItem::Attribute(name) => prepared.exclude_attributes.push(name),
            }
        }
        for rule in &self.include_rules {
            match RuleItem::from_rule(rule) {
                RuleItem::Pattern(pattern) => {
                    if let Some(regex) = compile_pattern(&self.cache, &pattern, log) {
                        prepared.include_rule_patterns.push(regex);
                    }
                }
                RuleItem::Attribute(name) => prepared.include_attributes.push(name),
                RuleItem::Plain(_) => {}
            }
        }
        for rule in &self.exclude_rules {
            match RuleItem::from_rule(rule) {
                RuleItem::Pattern(pattern) => {
                    if let Some(regex) = compile_pattern(&self.cache, &pattern, log) {
                        prepared.exclude_rule_patterns.push(regex);
                    }
                }
                RuleItem::Attribute(name) => prepared.exclude_attributes.push(name),
                RuleItem::Plain(_) => {}
            }
        }

        self.prepared = prepared;
    }

    /// Quick assembly-level pre-filter, evaluated before the per-type check.
    ///
    /// Applies exclusions only: an assembly whose name is hit by an exclude
    /// item (plain or wildcard) is out of scope along with all of its types.
    /// Include constraints are enforced per type - a flat item name cannot
    /// prove that no namespace-level include applies inside an assembly.
    #[must_use]
    pub fn is_assembly_included_in_rules(&self, assembly: &str) -> bool {
        let prepared = &self.prepared;
        if prepared.exclude_names.iter().any(|name| name == assembly) {
            return false;
        }
        !prepared
            .exclude_item_patterns
            .iter()
            .any(|pattern| pattern.is_match(assembly))
    }

    /// The full per-type decision: is this type in scope for instrumentation?
    ///
    /// Stages, in order: assembly pre-filter, namespace extraction, plain and
    /// wildcard item evaluation against assembly/namespace/class name, rule
    /// evaluation (regular expressions over the fully qualified class name,
    /// attribute references against the type's metadata). An exclude match at
    /// any stage wins; with at least one registered include entry, a
    /// candidate matching none of them is out of scope.
    ///
    /// Attribute lookups go through `metadata` on every call and are never
    /// cached; a failed lookup counts as "attribute absent".
    #[must_use]
    pub fn is_item_valid_for_report(
        &self,
        assembly: &str,
        class_name: &str,
        type_def: Token,
        metadata: &dyn MetadataImport,
    ) -> bool {
        if !self.is_assembly_included_in_rules(assembly) {
            return false;
        }

        let namespace = extract_namespace(class_name);
        let prepared = &self.prepared;
        let name_hit =
            |name: &String| name == assembly || name == namespace || name == class_name;
        let pattern_hit = |pattern: &Arc<Regex>| {
            pattern.is_match(class_name)
                || pattern.is_match(namespace)
                || pattern.is_match(assembly)
        };

        if prepared.exclude_names.iter().any(name_hit) {
            return false;
        }
        if prepared.exclude_item_patterns.iter().any(pattern_hit) {
            return false;
        }

        let mut included = prepared.include_names.iter().any(name_hit)
            || prepared.include_item_patterns.iter().any(pattern_hit);

        if prepared
            .exclude_rule_patterns
            .iter()
            .any(|pattern| pattern.is_match(class_name))
        {
            return false;
        }
        if prepared.exclude_attributes.iter().any(|attribute| {
            metadata
                .has_custom_attribute(type_def, attribute)
                .unwrap_or(false)
        }) {
            return false;
        }

        if !included {
            included = prepared
                .include_rule_patterns
                .iter()
                .any(|pattern| pattern.is_match(class_name))
                || prepared.include_attributes.iter().any(|attribute| {
                    metadata
                        .has_custom_attribute(type_def, attribute)
                        .unwrap_or(false)
                });
        }

        included || !prepared.has_includes
    }

    /// Writes the configured rule set to the driver log.
    pub fn dump(&self, log: &DriverLog) {
        log.write_line(&format!(
            "rules: coverage={} call-tree={} level={:#x}",
            self.coverage_enabled,
            self.call_tree_enabled,
            self.profiler_level.bits()
        ));
        for item in &self.include_items {
            log.write_line(&format!("rules: include item '{item}'"));
        }
        for item in &self.exclude_items {
            log.write_line(&format!("rules: exclude item '{item}'"));
        }
        for rule in &self.include_rules {
            log.write_line(&format!("rules: include rule '{rule}'"));
        }
        for rule in &self.exclude_rules {
            log.write_line(&format!("rules: exclude rule '{rule}'"));
        }
    }

    /// Serializes this rule set and writes it as one frame.
    ///
    /// # Errors
    /// Returns [`crate::Error::ChannelInactive`] if the pipe is disconnected.
    /// Callers must treat this as fatal to the profiling session.
    pub fn send_data(&self, pipe: &MessagePipe) -> Result<()> {
        let mut payload = Payload::new();
        payload.write_u32(MessageKind::Rules as u32);
        self.encode_body(&mut payload);
        pipe.write(payload.as_bytes())
    }

    /// Reads one frame from the pipe and replaces this rule set with the
    /// received one.
    ///
    /// The prepared lists are reset; call [`Rules::prepare_item_rules`]
    /// before querying. A frame carrying a different message kind is a
    /// protocol error and deactivates the channel.
    ///
    /// # Errors
    /// Returns [`crate::Error::ChannelInactive`] for a disconnected channel
    /// or [`crate::Error::Malformed`] for a tag or body violating the wire
    /// contract.
    pub fn receive_data(&mut self, pipe: &MessagePipe) -> Result<()> {
        let frame = pipe.read()?;
        let mut parser = Parser::new(&frame);

        let decoded = parser.read_u32().and_then(|tag| {
            if tag == MessageKind::Rules as u32 {
                Rules::decode_body(&mut parser)
            } else {
                Err(malformed_error!("Expected rules message, got tag {}", tag))
            }
        });

        match decoded {
            Ok(received) => {
                self.adopt(received);
                Ok(())
            }
            Err(error) => {
                pipe.deactivate();
                Err(error)
            }
        }
    }

    /// Field order is the wire contract: flags, mode, then the four string
    /// lists, each length-prefixed.
    pub(crate) fn encode_body(&self, payload: &mut Payload) {
        payload.write_u8(u8::from(self.coverage_enabled));
        payload.write_u8(u8::from(self.call_tree_enabled));
        payload.write_u32(self.profiler_level.bits());
        write_string_list(payload, &self.include_items);
        write_string_list(payload, &self.exclude_items);
        write_string_list(payload, &self.include_rules);
        write_string_list(payload, &self.exclude_rules);
    }

    pub(crate) fn decode_body(parser: &mut Parser) -> Result<Rules> {
        let mut rules = Rules::new();
        rules.coverage_enabled = parser.read_u8()? != 0;
        rules.call_tree_enabled = parser.read_u8()? != 0;
        rules.profiler_level = ProfilerMode::from_bits_retain(parser.read_u32()?);
        rules.include_items = read_string_list(parser)?;
        rules.exclude_items = read_string_list(parser)?;
        rules.include_rules = read_string_list(parser)?;
        rules.exclude_rules = read_string_list(parser)?;
        Ok(rules)
    }

    fn adopt(&mut self, other: Rules) {
        self.coverage_enabled = other.coverage_enabled;
        self.call_tree_enabled = other.call_tree_enabled;
        self.profiler_level = other.profiler_level;
        self.include_items = other.include_items;
        self.exclude_items = other.exclude_items;
        self.include_rules = other.include_rules;
        self.exclude_rules = other.exclude_rules;
        self.prepared = Prepared::default();
    }
}

impl Default for Rules {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Rules {
    fn eq(&self, other: &Self) -> bool {
        self.coverage_enabled == other.coverage_enabled
            && self.call_tree_enabled == other.call_tree_enabled
            && self.profiler_level == other.profiler_level
            && self.include_items == other.include_items
            && self.exclude_items == other.exclude_items
            && self.include_rules == other.include_rules
            && self.exclude_rules == other.exclude_rules
    }
}

impl Eq for Rules {}

impl fmt::Debug for Rules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rules")
            .field("coverage_enabled", &self.coverage_enabled)
            .field("call_tree_enabled", &self.call_tree_enabled)
            .field("profiler_level", &self.profiler_level)
            .field("include_items", &self.include_items)
            .field("exclude_items", &self.exclude_items)
            .field("include_rules", &self.include_rules)
            .field("exclude_rules", &self.exclude_rules)
            .finish_non_exhaustive()
    }
}

fn compile_pattern(cache: &PatternCache, pattern: &str, log: &DriverLog) -> Option<Arc<Regex>> {
    match cache.compile(pattern) {
        Ok(regex) => Some(regex),
        Err(error) => {
            log.write_error("Rules", "prepare_item_rules", &error.to_string());
            None
        }
    }
}

fn write_string_list(payload: &mut Payload, list: &[String]) {
    payload.write_u32(list.len() as u32);
    for entry in list {
        payload.write_prefixed_string(entry);
    }
}

fn read_string_list(parser: &mut Parser) -> Result<Vec<String>> {
    let count = parser.read_u32()?;
    let mut list = Vec::new();
    for _ in 0..count {
        list.push(parser.read_prefixed_string()?);
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::stubs::{FailingMetadata, StubMetadata};

    const TYPE: Token = Token(0x02000001);

    fn prepared(setup: impl FnOnce(&mut Rules)) -> Rules {
        let log = DriverLog::new();
        let mut rules = Rules::new();
        setup(&mut rules);
        rules.prepare_item_rules(&log);
        rules
    }

    fn verdict(rules: &Rules, assembly: &str, class_name: &str) -> bool {
        rules.is_item_valid_for_report(assembly, class_name, TYPE, &StubMetadata::new())
    }

    #[test]
    fn test_default_allow_without_any_lists() {
        let rules = prepared(|_| {});
        assert!(verdict(&rules, "MyApp", "MyApp.Core.Engine"));
    }

    #[test]
    fn test_include_wildcard_exclude_namespace_scenario() {
        let rules = prepared(|rules| {
            rules.include_item("MyApp.*");
            rules.exclude_item("MyApp.Internal");
        });

        assert!(!verdict(&rules, "MyApp", "MyApp.Internal.Foo"));
        assert!(verdict(&rules, "MyApp", "MyApp.Public.Bar"));
    }

    #[test]
    fn test_regex_exclude_rule_scenario() {
        let rules = prepared(|rules| {
            rules.exclude_rule(r"^Test\.");
        });

        assert!(!verdict(&rules, "Test", "Test.Helpers"));
        assert!(verdict(&rules, "App", "App.Core"));
    }

    #[test]
    fn test_exclude_overrides_include_regardless_of_order() {
        let exclude_first = prepared(|rules| {
            rules.exclude_item("MyApp.Internal.Foo");
            rules.include_item("MyApp.Internal.Foo");
        });
        let include_first = prepared(|rules| {
            rules.include_item("MyApp.Internal.Foo");
            rules.exclude_item("MyApp.Internal.Foo");
        });

        assert!(!verdict(&exclude_first, "MyApp", "MyApp.Internal.Foo"));
        assert!(!verdict(&include_first, "MyApp", "MyApp.Internal.Foo"));
    }

    #[test]
    fn test_include_item_with_exclude_rule_is_excluded() {
        // Open question resolved: exclude wins across list kinds as well
        let rules = prepared(|rules| {
            rules.include_item("MyApp.*");
            rules.exclude_rule(r"\.Generated\.");
        });

        assert!(!verdict(&rules, "MyApp", "MyApp.Generated.Model"));
        assert!(verdict(&rules, "MyApp", "MyApp.Core.Model"));
    }

    #[test]
    fn test_nonempty_include_list_rejects_unmatched() {
        let rules = prepared(|rules| {
            rules.include_item("MyApp.*");
        });

        assert!(!verdict(&rules, "Vendor", "Vendor.Tools.Helper"));
    }

    #[test]
    fn test_verdict_is_idempotent() {
        let rules = prepared(|rules| {
            rules.include_item("MyApp.*");
            rules.exclude_item("MyApp.Internal");
        });

        let first = verdict(&rules, "MyApp", "MyApp.Internal.Foo");
        for _ in 0..16 {
            assert_eq!(verdict(&rules, "MyApp", "MyApp.Internal.Foo"), first);
        }
    }

    #[test]
    fn test_assembly_prefilter_short_circuits() {
        let rules = prepared(|rules| {
            rules.exclude_item("LegacyVendor");
        });

        assert!(!rules.is_assembly_included_in_rules("LegacyVendor"));
        assert!(!verdict(&rules, "LegacyVendor", "Anything.At.All"));
        assert!(rules.is_assembly_included_in_rules("MyApp"));
    }

    #[test]
    fn test_assembly_prefilter_wildcard() {
        let rules = prepared(|rules| {
            rules.exclude_item("LegacyVendor.*");
        });

        assert!(!rules.is_assembly_included_in_rules("LegacyVendor.Db"));
        assert!(rules.is_assembly_included_in_rules("MyApp"));
    }

    #[test]
    fn test_malformed_pattern_never_matches_and_never_faults() {
        let rules = prepared(|rules| {
            rules.exclude_rule("([unclosed");
        });

        // The malformed exclude cannot hit anything; default-allow applies
        assert!(verdict(&rules, "MyApp", "MyApp.Core.Engine"));
    }

    #[test]
    fn test_malformed_include_still_counts_as_include_list() {
        let rules = prepared(|rules| {
            rules.include_rule("([unclosed");
        });

        // A non-empty include list that can match nothing puts everything
        // out of scope rather than falling back to default-allow
        assert!(!verdict(&rules, "MyApp", "MyApp.Core.Engine"));
    }

    #[test]
    fn test_attribute_exclude_rule() {
        let rules = prepared(|rules| {
            rules.exclude_rule("attribute:System.ObsoleteAttribute");
        });

        let marked = StubMetadata::new().with_attribute(TYPE, "System.ObsoleteAttribute");
        assert!(!rules.is_item_valid_for_report("MyApp", "MyApp.Old.Widget", TYPE, &marked));

        let unmarked = StubMetadata::new();
        assert!(rules.is_item_valid_for_report("MyApp", "MyApp.Old.Widget", TYPE, &unmarked));
    }

    #[test]
    fn test_attribute_include_rule() {
        let rules = prepared(|rules| {
            rules.include_rule("attribute:MyApp.CoveredAttribute");
        });

        let marked = StubMetadata::new().with_attribute(TYPE, "MyApp.CoveredAttribute");
        assert!(rules.is_item_valid_for_report("MyApp", "MyApp.Core.Engine", TYPE, &marked));
        assert!(!rules.is_item_valid_for_report(
            "MyApp",
            "MyApp.Core.Engine",
            TYPE,
            &StubMetadata::new()
        ));
    }

    #[test]
    fn test_metadata_failure_reads_as_attribute_absent() {
        let rules = prepared(|rules| {
            rules.exclude_rule("attribute:System.ObsoleteAttribute");
        });

        assert!(rules.is_item_valid_for_report(
            "MyApp",
            "MyApp.Core.Engine",
            TYPE,
            &FailingMetadata
        ));
    }

    #[test]
    fn test_enable_mode_and_flags() {
        let mut rules = Rules::new();
        assert!(!rules.is_enabled_mode(ProfilerMode::COVERAGE));

        rules.enable_mode(ProfilerMode::COVERAGE);
        assert!(rules.is_enabled_mode(ProfilerMode::COVERAGE));
        assert!(rules.coverage_enabled());
        assert!(!rules.call_tree_enabled());

        rules.enable_mode(ProfilerMode::CALL_TREE);
        assert!(rules.is_enabled_mode(ProfilerMode::COVERAGE | ProfilerMode::CALL_TREE));
        assert!(rules.call_tree_enabled());
    }

    #[test]
    fn test_encode_decode_body_field_for_field() {
        let log = DriverLog::new();
        let mut rules = Rules::new();
        rules.enable_mode(ProfilerMode::COVERAGE);
        rules.include_item("MyApp.*");
        rules.exclude_item("MyApp.Internal");
        rules.include_rule(r"^MyApp\.Web\.");
        rules.exclude_rule("attribute:System.ObsoleteAttribute");
        rules.prepare_item_rules(&log);

        let mut payload = Payload::new();
        rules.encode_body(&mut payload);
        let bytes = payload.into_bytes();
        let decoded = Rules::decode_body(&mut Parser::new(&bytes)).unwrap();

        assert_eq!(decoded, rules);
    }
}
