//! Classification of raw include/exclude item strings.
//!
//! Items arrive from the controller as plain strings. Classifying them on
//! every per-type query would put string parsing on the hot path, so the
//! engine parses each item exactly once at registration time into a
//! [`RuleItem`] variant; queries then dispatch on the variant.
//!
//! # Item Syntax
//!
//! - `MyApp.Core.Engine` - plain name, matched exactly (case-sensitive)
//!   against the assembly name, the namespace, or the fully qualified class
//!   name
//! - `MyApp.*` - wildcard name; `*` matches any run of characters. Translated
//!   into an anchored regular expression over the fully qualified class name
//! - `attribute:Some.AttributeName` - attribute rule; matches when the type's
//!   metadata declares the named custom attribute

/// Marker prefix identifying an attribute-based rule.
pub const ATTRIBUTE_MARKER: &str = "attribute:";

/// A classified include/exclude entry.
///
/// Produced once per raw item by [`RuleItem::parse`] during
/// [`crate::rules::Rules::prepare_item_rules`], so the per-type query path
/// never re-parses strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleItem {
    /// A literal name, matched exactly against assembly, namespace or class name.
    Plain(String),
    /// An anchored regular-expression pattern over the fully qualified class name.
    Pattern(String),
    /// A custom-attribute reference, matched against the type's metadata.
    Attribute(String),
}

impl RuleItem {
    /// Classifies a raw item string.
    ///
    /// Recognizes the `attribute:` marker and wildcard syntax; everything else
    /// is a plain name. Raw regular-expression rules registered through the
    /// rule lists are represented as [`RuleItem::Pattern`] with the pattern
    /// taken verbatim (see [`RuleItem::from_rule`]).
    #[must_use]
    pub fn parse(item: &str) -> RuleItem {
        if let Some(attribute) = item.strip_prefix(ATTRIBUTE_MARKER) {
            return RuleItem::Attribute(attribute.to_string());
        }
        if item.contains('*') {
            return RuleItem::Pattern(wildcard_to_pattern(item));
        }
        RuleItem::Plain(item.to_string())
    }

    /// Classifies an entry of the rule lists, where non-attribute entries are
    /// already regular expressions and must not be escaped.
    #[must_use]
    pub fn from_rule(rule: &str) -> RuleItem {
        if let Some(attribute) = rule.strip_prefix(ATTRIBUTE_MARKER) {
            return RuleItem::Attribute(attribute.to_string());
        }
        RuleItem::Pattern(rule.to_string())
    }

    /// Returns true for entries that require a compiled regular expression.
    #[must_use]
    pub fn is_pattern(&self) -> bool {
        matches!(self, RuleItem::Pattern(_))
    }
}

/// Translates a wildcard item into an anchored regular expression.
///
/// Every character except `*` is matched literally; `*` matches any run of
/// characters, including the empty one.
#[must_use]
pub fn wildcard_to_pattern(item: &str) -> String {
    let mut pattern = String::with_capacity(item.len() + 8);
    pattern.push('^');
    for part in item.split('*') {
        if !part.is_empty() {
            pattern.push_str(&regex::escape(part));
        }
        pattern.push_str(".*");
    }
    // split() yields one trailing part more than there are stars
    pattern.truncate(pattern.len() - 2);
    pattern.push('$');
    pattern
}

/// Extracts the namespace portion of a fully qualified class name.
///
/// The namespace is the substring up to the last `.` separator; a name
/// without separator has an empty namespace.
#[must_use]
pub fn extract_namespace(class_name: &str) -> &str {
    match class_name.rfind('.') {
        Some(index) => &class_name[..index],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_parse_plain() {
        assert_eq!(
            RuleItem::parse("MyApp.Core.Engine"),
            RuleItem::Plain("MyApp.Core.Engine".to_string())
        );
    }

    #[test]
    fn test_parse_attribute_marker() {
        assert_eq!(
            RuleItem::parse("attribute:System.ObsoleteAttribute"),
            RuleItem::Attribute("System.ObsoleteAttribute".to_string())
        );
    }

    #[test]
    fn test_parse_wildcard_becomes_pattern() {
        let item = RuleItem::parse("MyApp.*");
        assert_eq!(item, RuleItem::Pattern("^MyApp\\..*$".to_string()));
    }

    #[test]
    fn test_from_rule_keeps_regex_verbatim() {
        assert_eq!(
            RuleItem::from_rule(r"^Test\."),
            RuleItem::Pattern(r"^Test\.".to_string())
        );
    }

    #[test]
    fn test_wildcard_translation_matches() {
        let pattern = Regex::new(&wildcard_to_pattern("MyApp.*")).unwrap();
        assert!(pattern.is_match("MyApp.Public.Bar"));
        assert!(pattern.is_match("MyApp.Internal.Foo"));
        assert!(!pattern.is_match("OtherApp.Public.Bar"));

        let infix = Regex::new(&wildcard_to_pattern("*.Internal.*")).unwrap();
        assert!(infix.is_match("MyApp.Internal.Foo"));
        assert!(!infix.is_match("MyApp.Public.Bar"));
    }

    #[test]
    fn test_wildcard_escapes_literals() {
        // The dot before the star must not act as a regex metacharacter
        let pattern = Regex::new(&wildcard_to_pattern("MyApp.*")).unwrap();
        assert!(!pattern.is_match("MyAppXCore"));
    }

    #[test]
    fn test_extract_namespace() {
        assert_eq!(extract_namespace("MyApp.Internal.Foo"), "MyApp.Internal");
        assert_eq!(extract_namespace("Foo"), "");
        assert_eq!(extract_namespace(""), "");
    }
}
