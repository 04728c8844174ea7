//! Read-only metadata query capability used by attribute-based rules.
//!
//! The instrumentation layer owns the actual metadata reader for each loaded
//! module; the rule engine only ever asks one question of it - whether a type
//! declares a given custom attribute. Keeping this behind a trait keeps the
//! engine free of any runtime plumbing and makes the decision path trivially
//! testable.

use crate::{metadata::Token, Result};

/// Capability for querying type metadata during rule evaluation.
///
/// Implemented by the runtime-instrumentation layer on top of whatever
/// metadata reader it holds for the module that defined the type. Lookups are
/// performed per query and never cached by the engine - attribute sets differ
/// per type, and the engine must not hold metadata state of its own.
///
/// Lookup failures are not fatal: the engine treats an `Err` from
/// [`MetadataImport::has_custom_attribute`] as "attribute absent" and keeps
/// evaluating.
pub trait MetadataImport {
    /// Returns whether the type identified by `type_def` declares the custom
    /// attribute with the given fully qualified name.
    ///
    /// # Arguments
    /// * `type_def` - Token of the type definition under evaluation
    /// * `attribute_name` - Fully qualified attribute type name, e.g.
    ///   `System.Runtime.CompilerServices.CompilerGeneratedAttribute`
    ///
    /// # Errors
    /// Returns an error if the underlying metadata reader fails; callers in
    /// this crate degrade such failures to a non-match.
    fn has_custom_attribute(&self, type_def: Token, attribute_name: &str) -> Result<bool>;
}

#[cfg(test)]
pub(crate) mod stubs {
    use super::*;
    use std::collections::HashMap;

    /// Metadata stub mapping tokens to their declared attribute names.
    #[derive(Default)]
    pub struct StubMetadata {
        attributes: HashMap<u32, Vec<String>>,
    }

    impl StubMetadata {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_attribute(mut self, type_def: Token, attribute: &str) -> Self {
            self.attributes
                .entry(type_def.value())
                .or_default()
                .push(attribute.to_string());
            self
        }
    }

    impl MetadataImport for StubMetadata {
        fn has_custom_attribute(&self, type_def: Token, attribute_name: &str) -> Result<bool> {
            Ok(self
                .attributes
                .get(&type_def.value())
                .is_some_and(|names| names.iter().any(|n| n == attribute_name)))
        }
    }

    /// Metadata stub whose lookups always fail, for degradation tests.
    pub struct FailingMetadata;

    impl MetadataImport for FailingMetadata {
        fn has_custom_attribute(&self, _type_def: Token, _attribute_name: &str) -> Result<bool> {
            Err(crate::Error::Error("metadata reader unavailable".into()))
        }
    }
}
