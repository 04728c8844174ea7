//! The transfer protocol: serialization contract and pipe channel.
//!
//! This module moves configuration and telemetry between the instrumented
//! process and its controller. It has three layers, bottom up:
//!
//! # Key Components
//!
//! - [`Parser`] / [`Payload`] - little-endian wire primitives (codec)
//! - [`Message`] / [`MessageKind`] / [`MessageVisitor`] - the closed set of
//!   transferrable payloads and their tag-dispatched decode
//! - [`MessagePipe`] - the framed, ordered, duplex byte channel with a
//!   write-serialization guarantee
//!
//! # Data Flow
//!
//! The controller builds a rule set, serializes it and sends it over the
//! pipe; the instrumented process decodes it into its rule engine and streams
//! log records back over the same channel.
//!
//! # Thread Safety
//!
//! [`MessagePipe`] serializes all transport access internally and is meant to
//! be shared behind an `Arc` between the log sink and the transfer path.

pub mod codec;
pub mod message;
pub mod pipe;

pub use codec::{Parser, Payload};
pub use message::{Command, LogRecord, Message, MessageKind, MessageVisitor};
pub use pipe::{MessagePipe, PipeTransport, MAX_FRAME_SIZE};
