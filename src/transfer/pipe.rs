//! Framed duplex channel between the instrumented process and its controller.
//!
//! The pipe knows nothing about message semantics - it moves length-prefixed
//! byte frames over whatever transport the host established (a named pipe, a
//! Unix socket, a loopback TCP connection in tests). Message encoding and
//! dispatch live in [`crate::transfer::message`].
//!
//! # Framing
//!
//! Every logical message is one frame: a little-endian `u32` length prefix
//! followed by that many payload bytes. The reader reassembles exactly one
//! message per [`MessagePipe::read`] call even when the transport delivers
//! partial chunks. Frames above [`MAX_FRAME_SIZE`] are rejected as protocol
//! errors.
//!
//! # Concurrency
//!
//! A single internal mutex serializes access to the transport, so concurrent
//! writers (the log sink and the rule-transfer path) never interleave partial
//! frames. Messages from one writer arrive in write order; across writers only
//! the frame boundary is guaranteed.
//!
//! # Failure model
//!
//! A broken transport marks the channel inactive; it never recovers. Writes
//! and reads on an inactive channel fail fast with
//! [`crate::Error::ChannelInactive`] - telemetry callers drop that silently,
//! configuration transfer treats it as fatal to the profiling session. The
//! host should configure bounded I/O timeouts on the transport so a hung
//! controller cannot stall the instrumented process; a timeout surfaces as an
//! I/O error here and deactivates the channel.

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::{Error, Result};

/// Upper bound on a single frame's payload size.
///
/// Rule sets and log lines are far smaller; a length prefix beyond this bound
/// means the two ends disagree on the wire schema.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// The byte transport a [`MessagePipe`] runs on.
///
/// Blanket-implemented for everything that is `Read + Write + Send`, e.g.
/// `TcpStream`, `UnixStream` or a platform named-pipe handle.
pub trait PipeTransport: Read + Write + Send {}

impl<T: Read + Write + Send> PipeTransport for T {}

/// A bidirectional, message-framed channel to the controller process.
///
/// Created at profiler attach, torn down at detach. Cheap to share behind an
/// `Arc`; all operations take `&self`.
pub struct MessagePipe {
    transport: Mutex<Box<dyn PipeTransport>>,
    active: AtomicBool,
}

impl MessagePipe {
    /// Wraps an established duplex transport.
    pub fn new<T: PipeTransport + 'static>(transport: T) -> Self {
        MessagePipe {
            transport: Mutex::new(Box::new(transport)),
            active: AtomicBool::new(true),
        }
    }

    /// Returns whether the channel is still connected.
    ///
    /// Disconnection is detected lazily - the flag flips on the first I/O
    /// attempt that fails, not the moment the peer goes away.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Marks the channel unusable.
    ///
    /// Called internally on I/O failure and on protocol desynchronization;
    /// also available to the host at profiler detach.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Writes one logical message as a single frame.
    ///
    /// The length prefix and payload are flushed under the internal lock, so
    /// a frame is never interleaved with another writer's.
    ///
    /// # Errors
    /// Returns [`Error::ChannelInactive`] if the channel is (or just became)
    /// disconnected, or [`crate::Error::Malformed`] for a payload above
    /// [`MAX_FRAME_SIZE`] (the channel stays usable in that case).
    pub fn write(&self, payload: &[u8]) -> Result<()> {
        if !self.is_active() {
            return Err(Error::ChannelInactive);
        }
        if payload.len() > MAX_FRAME_SIZE {
            return Err(malformed_error!(
                "Frame of {} bytes exceeds the {} byte limit",
                payload.len(),
                MAX_FRAME_SIZE
            ));
        }

        let mut frame = Vec::with_capacity(4 + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(payload);

        let mut transport = self.transport.lock().map_err(|_| Error::LockError)?;
        if transport.write_all(&frame).is_err() || transport.flush().is_err() {
            self.deactivate();
            return Err(Error::ChannelInactive);
        }
        Ok(())
    }

    /// Reads exactly one logical message.
    ///
    /// Blocks until a full frame arrived (subject to the transport's timeout
    /// configuration), looping over partial chunks as needed.
    ///
    /// # Errors
    /// Returns [`Error::ChannelInactive`] if the channel is disconnected or
    /// the peer closed it cleanly between frames, or
    /// [`crate::Error::Malformed`] for an oversized length prefix or a frame
    /// truncated mid-payload. Both protocol failures deactivate the channel -
    /// a desynchronized stream cannot be safely resumed.
    pub fn read(&self) -> Result<Vec<u8>> {
        if !self.is_active() {
            return Err(Error::ChannelInactive);
        }

        let mut transport = self.transport.lock().map_err(|_| Error::LockError)?;

        let mut prefix = [0u8; 4];
        if transport.read_exact(&mut prefix).is_err() {
            // EOF on a frame boundary is a plain disconnect
            self.deactivate();
            return Err(Error::ChannelInactive);
        }

        let length = u32::from_le_bytes(prefix) as usize;
        if length > MAX_FRAME_SIZE {
            self.deactivate();
            return Err(malformed_error!(
                "Frame length {} exceeds the {} byte limit",
                length,
                MAX_FRAME_SIZE
            ));
        }

        let mut payload = vec![0u8; length];
        if let Err(error) = transport.read_exact(&mut payload) {
            self.deactivate();
            return Err(match error.kind() {
                ErrorKind::UnexpectedEof => {
                    malformed_error!("Frame truncated - expected {} payload bytes", length)
                }
                _ => Error::ChannelInactive,
            });
        }

        Ok(payload)
    }
}
