//! # dotcov Prelude
//!
//! This module provides a convenient prelude for the most commonly used types
//! and traits, allowing for a single glob import on both ends of the channel:
//!
//! ```rust
//! use dotcov::prelude::*;
//! ```

pub use crate::logging::{DriverLog, TraceLevel};
pub use crate::metadata::{MetadataImport, Token};
pub use crate::options::ProfilerOptions;
pub use crate::rules::{PatternCache, ProfilerMode, Rules};
pub use crate::transfer::{
    Command, LogRecord, Message, MessageKind, MessagePipe, MessageVisitor,
};
pub use crate::{Error, Result};
