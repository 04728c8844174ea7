// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # dotcov
//!
//! The decision-and-transport core of an in-process .NET code coverage
//! profiler. `dotcov` answers, for every type the runtime loads, whether that
//! type is in scope for instrumentation, and it moves that decision's
//! configuration - plus diagnostic telemetry - across the process boundary
//! between the instrumented target and the controlling host.
//!
//! ## Features
//!
//! - **Rule engine** - include/exclude decisions over assemblies, namespaces
//!   and types, with plain names, wildcards, regular expressions and
//!   attribute-based rules; exclude always beats include
//! - **Hot-path friendly** - items are classified and patterns compiled once,
//!   before the first query; per-type decisions only walk prepared lists
//! - **Transfer protocol** - a tagged, length-prefixed wire format and a
//!   framed duplex [`MessagePipe`](transfer::MessagePipe) carrying rule sets,
//!   commands and log records
//! - **Fault isolation** - malformed rules degrade to "never matches" and a
//!   dropped controller degrades telemetry to no-ops; profiling logic never
//!   takes the target process down
//!
//! ## Quick Start
//!
//! Controller side - build a rule set and ship it:
//!
//! ```rust,no_run
//! use dotcov::prelude::*;
//! use std::net::TcpStream;
//!
//! let transport = TcpStream::connect("127.0.0.1:9000")?;
//! let pipe = MessagePipe::new(transport);
//!
//! let log = DriverLog::new();
//! let mut rules = Rules::new();
//! rules.enable_mode(ProfilerMode::COVERAGE);
//! rules.include_item("MyApp.*");
//! rules.exclude_item("MyApp.Internal");
//! rules.prepare_item_rules(&log);
//!
//! rules.send_data(&pipe)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Target side - receive the configuration and answer load events:
//!
//! ```rust,no_run
//! use dotcov::prelude::*;
//! # use std::net::TcpStream;
//! # let pipe = MessagePipe::new(TcpStream::connect("127.0.0.1:9000")?);
//! # struct NoMetadata;
//! # impl MetadataImport for NoMetadata {
//! #     fn has_custom_attribute(&self, _: Token, _: &str) -> dotcov::Result<bool> { Ok(false) }
//! # }
//!
//! let log = DriverLog::new();
//! let mut rules = Rules::new();
//! rules.receive_data(&pipe)?;
//! rules.prepare_item_rules(&log);
//!
//! // Called once per loaded type by the instrumentation layer
//! let in_scope = rules.is_item_valid_for_report(
//!     "MyApp",
//!     "MyApp.Core.Engine",
//!     Token::new(0x02000001),
//!     &NoMetadata,
//! );
//! # let _ = in_scope;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! `dotcov` is organized into four modules along the data flow:
//!
//! - [`rules`] - rule classification, the pattern cache, and the per-type
//!   decision engine
//! - [`transfer`] - wire codec, the transferrable message contract, and the
//!   framed message pipe
//! - [`logging`] - the driver log context routing lines to a file and/or the
//!   pipe
//! - [`metadata`] - the token and metadata-query seam to the runtime layer
//!
//! The controller builds a [`rules::Rules`], serializes it over the pipe; the
//! instrumented process deserializes it into its own engine and streams
//! [`transfer::LogRecord`] telemetry back over the same channel.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, Error>`](Result). The overriding
//! policy is degradation over failure: a profiling-logic fault must never
//! crash or hang the process being profiled. See [`Error`] for the taxonomy.

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use dotcov::prelude::*;
///
/// let mut rules = Rules::new();
/// rules.enable_mode(ProfilerMode::COVERAGE);
/// assert!(rules.is_enabled_mode(ProfilerMode::COVERAGE));
/// ```
pub mod prelude;

/// Metadata tokens and the read-only metadata-query capability.
///
/// The seam between the rule engine and the runtime-instrumentation layer:
/// load events carry a [`metadata::Token`] and an implementation of
/// [`metadata::MetadataImport`] for attribute lookups.
pub mod metadata;

/// The rule engine deciding instrumentation scope per loaded type.
///
/// # Key Types
///
/// - [`rules::Rules`] - the rule set and decision engine
/// - [`rules::PatternCache`] - compiled-pattern memoization
/// - [`rules::RuleItem`] - registration-time item classification
/// - [`rules::ProfilerMode`] - capability flags
pub mod rules;

/// The transfer protocol between target and controller.
///
/// # Key Types
///
/// - [`transfer::MessagePipe`] - framed, ordered, duplex channel
/// - [`transfer::Message`] / [`transfer::MessageKind`] - the transferrable
///   payload union and its wire tag
/// - [`transfer::Parser`] / [`transfer::Payload`] - codec primitives
pub mod transfer;

/// The driver's logging context and trace categories.
pub mod logging;

/// Typed session options populated by the controlling host.
pub mod options;

/// Result type-alias for this crate, wrapping `Result<T, Error>`
pub type Result<T> = std::result::Result<T, Error>;

/// Error type of this crate, see [`Error`] for detailed information
pub use error::Error;
