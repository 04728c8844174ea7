//! The transferrable message contract and its wire dispatch.
//!
//! Heterogeneous payloads (a rule set, a log record, a session command) cross
//! the pipe through a single closed set of message kinds. Each frame starts
//! with the [`MessageKind`] tag as a little-endian `u32`, followed by the
//! kind-specific body in a fixed field order. The receiving side reads the
//! tag, decodes the matching variant and hands it to a [`MessageVisitor`].
//!
//! Version skew between the two ends is not negotiated - both ends must agree
//! on the schema out of band. A frame with an unknown tag or a short body
//! desynchronizes the channel (see [`crate::transfer::MessagePipe`]).

use strum::{Display, FromRepr};

use crate::rules::Rules;
use crate::transfer::codec::{Parser, Payload};
use crate::transfer::pipe::MessagePipe;
use crate::Result;

/// Wire discriminator for transferrable payloads.
///
/// The numeric values are part of the wire contract and must never be reused
/// for a different payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Display)]
#[repr(u32)]
pub enum MessageKind {
    /// A complete rule set (configuration transfer, controller to target).
    Rules = 1,
    /// A forwarded diagnostic line (target to controller).
    LogRecord = 2,
    /// A session control verb.
    Command = 3,
}

/// A diagnostic line forwarded over the pipe instead of (or besides) the
/// local log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Milliseconds since the log context was created.
    pub elapsed_ms: u64,
    /// The formatted line, without trailing newline.
    pub text: String,
}

impl LogRecord {
    /// Serializes this record and writes it as one frame.
    ///
    /// # Errors
    /// Returns [`crate::Error::ChannelInactive`] if the pipe is disconnected.
    pub fn send_data(&self, pipe: &MessagePipe) -> Result<()> {
        let mut payload = Payload::new();
        payload.write_u32(MessageKind::LogRecord as u32);
        self.encode_body(&mut payload);
        pipe.write(payload.as_bytes())
    }

    pub(crate) fn encode_body(&self, payload: &mut Payload) {
        payload.write_u64(self.elapsed_ms);
        payload.write_prefixed_string(&self.text);
    }

    pub(crate) fn decode_body(parser: &mut Parser) -> Result<LogRecord> {
        Ok(LogRecord {
            elapsed_ms: parser.read_u64()?,
            text: parser.read_prefixed_string()?,
        })
    }
}

/// Session control verbs exchanged between controller and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, Display)]
#[repr(u32)]
pub enum Command {
    /// Begin the profiling session.
    Start = 1,
    /// Tear the session down.
    Shutdown = 2,
}

impl Command {
    /// Serializes this command and writes it as one frame.
    ///
    /// # Errors
    /// Returns [`crate::Error::ChannelInactive`] if the pipe is disconnected.
    pub fn send_data(self, pipe: &MessagePipe) -> Result<()> {
        let mut payload = Payload::new();
        payload.write_u32(MessageKind::Command as u32);
        payload.write_u32(self as u32);
        pipe.write(payload.as_bytes())
    }

    pub(crate) fn decode_body(parser: &mut Parser) -> Result<Command> {
        let verb = parser.read_u32()?;
        Command::from_repr(verb).ok_or_else(|| malformed_error!("Unknown command verb {}", verb))
    }
}

/// Visitor for kind-specific dispatch on the receiving side.
///
/// The message set is closed, so the trait has one method per kind; all
/// methods default to no-ops and receivers override what they handle.
pub trait MessageVisitor {
    /// Called for a received rule set.
    fn on_rules(&mut self, _rules: &Rules) {}

    /// Called for a received log record.
    fn on_log_record(&mut self, _record: &LogRecord) {}

    /// Called for a received command.
    fn on_command(&mut self, _command: Command) {}
}

/// A decoded transferrable payload.
///
/// The tagged union over every message kind the channel can carry. Sending
/// sides usually call `send_data` on the concrete payload type directly;
/// receiving sides call [`Message::receive_data`] and either match on the
/// variant or dispatch through [`Message::accept`].
#[derive(Debug, Clone)]
pub enum Message {
    /// A complete rule set.
    Rules(Rules),
    /// A forwarded diagnostic line.
    LogRecord(LogRecord),
    /// A session control verb.
    Command(Command),
}

impl Message {
    /// The wire tag of this payload.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Rules(_) => MessageKind::Rules,
            Message::LogRecord(_) => MessageKind::LogRecord,
            Message::Command(_) => MessageKind::Command,
        }
    }

    /// Encodes tag and body into a frame payload.
    #[must_use]
    pub fn encode(&self) -> Payload {
        let mut payload = Payload::new();
        payload.write_u32(self.kind() as u32);
        match self {
            Message::Rules(rules) => rules.encode_body(&mut payload),
            Message::LogRecord(record) => record.encode_body(&mut payload),
            Message::Command(command) => payload.write_u32(*command as u32),
        }
        payload
    }

    /// Decodes a full frame (tag plus body).
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an unknown tag or a body that
    /// does not match the tagged schema.
    pub fn decode(frame: &[u8]) -> Result<Message> {
        let mut parser = Parser::new(frame);
        let tag = parser.read_u32()?;
        let kind = MessageKind::from_repr(tag)
            .ok_or_else(|| malformed_error!("Unknown message tag {}", tag))?;

        match kind {
            MessageKind::Rules => Ok(Message::Rules(Rules::decode_body(&mut parser)?)),
            MessageKind::LogRecord => Ok(Message::LogRecord(LogRecord::decode_body(&mut parser)?)),
            MessageKind::Command => Ok(Message::Command(Command::decode_body(&mut parser)?)),
        }
    }

    /// Serializes this payload and writes it as one frame.
    ///
    /// # Errors
    /// Returns [`crate::Error::ChannelInactive`] if the pipe is disconnected.
    pub fn send_data(&self, pipe: &MessagePipe) -> Result<()> {
        pipe.write(self.encode().as_bytes())
    }

    /// Reads one frame from the pipe and decodes it.
    ///
    /// A protocol violation (unknown tag, short body) deactivates the channel
    /// before the error is returned - the stream position is unknown and
    /// further reads would misinterpret bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::ChannelInactive`] for a disconnected channel or
    /// [`crate::Error::Malformed`] for a frame violating the wire contract.
    pub fn receive_data(pipe: &MessagePipe) -> Result<Message> {
        let frame = pipe.read()?;
        match Message::decode(&frame) {
            Ok(message) => Ok(message),
            Err(error) => {
                pipe.deactivate();
                Err(error)
            }
        }
    }

    /// Dispatches this payload to the matching visitor method.
    pub fn accept(&self, visitor: &mut dyn MessageVisitor) {
        match self {
            Message::Rules(rules) => visitor.on_rules(rules),
            Message::LogRecord(record) => visitor.on_log_record(record),
            Message::Command(command) => visitor.on_command(*command),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_kind_tags_are_stable() {
        assert_eq!(MessageKind::Rules as u32, 1);
        assert_eq!(MessageKind::LogRecord as u32, 2);
        assert_eq!(MessageKind::Command as u32, 3);
    }

    #[test]
    fn test_log_record_roundtrip() {
        let record = LogRecord {
            elapsed_ms: 1234,
            text: "instrumenting MyApp.Core.Engine".to_string(),
        };

        let frame = Message::LogRecord(record.clone()).encode();
        match Message::decode(frame.as_bytes()).unwrap() {
            Message::LogRecord(decoded) => assert_eq!(decoded, record),
            other => panic!("wrong variant: {:?}", other.kind()),
        }
    }

    #[test]
    fn test_command_roundtrip() {
        let frame = Message::Command(Command::Shutdown).encode();
        match Message::decode(frame.as_bytes()).unwrap() {
            Message::Command(command) => assert_eq!(command, Command::Shutdown),
            other => panic!("wrong variant: {:?}", other.kind()),
        }
    }

    #[test]
    fn test_unknown_tag_is_malformed() {
        let mut payload = Payload::new();
        payload.write_u32(99);
        assert!(matches!(
            Message::decode(payload.as_bytes()),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_unknown_command_verb_is_malformed() {
        let mut payload = Payload::new();
        payload.write_u32(MessageKind::Command as u32);
        payload.write_u32(77);
        assert!(matches!(
            Message::decode(payload.as_bytes()),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_visitor_dispatch() {
        #[derive(Default)]
        struct Recorder {
            commands: Vec<Command>,
            lines: Vec<String>,
        }

        impl MessageVisitor for Recorder {
            fn on_log_record(&mut self, record: &LogRecord) {
                self.lines.push(record.text.clone());
            }

            fn on_command(&mut self, command: Command) {
                self.commands.push(command);
            }
        }

        let mut recorder = Recorder::default();
        Message::Command(Command::Start).accept(&mut recorder);
        Message::LogRecord(LogRecord {
            elapsed_ms: 0,
            text: "line".to_string(),
        })
        .accept(&mut recorder);

        assert_eq!(recorder.commands, vec![Command::Start]);
        assert_eq!(recorder.lines, vec!["line".to_string()]);
    }
}
