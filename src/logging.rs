//! Diagnostic and coverage-trace logging for the profiler driver.
//!
//! The instrumented process cannot write to stdout or attach a debugger, so
//! every diagnostic goes through one sink: a local log file, optionally
//! mirrored across the message pipe to the controller as
//! [`crate::transfer::LogRecord`] frames.
//!
//! [`DriverLog`] is an explicitly owned context - the process entry point
//! creates it at session start, injects it where needed and tears it down at
//! session end. There is no global logger.
//!
//! # Trace Categories
//!
//! Verbose output is gated by [`TraceLevel`], a mask of independent category
//! bits. A message is emitted only if its category bit is set in the active
//! mask; error lines always pass.
//!
//! # Failure Model
//!
//! Logging must never take the profiled process down: file write failures are
//! swallowed, and a dropped pipe turns forwarding into a silent no-op while
//! file logging continues.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bitflags::bitflags;

use crate::transfer::{LogRecord, MessagePipe};
use crate::Result;

bitflags! {
    /// Independent trace categories selectable in the active level mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TraceLevel: u32 {
        /// Dump per-assembly results at session end
        const DUMP_RESULTS = 1;
        /// Dump each method picked up for coverage
        const DUMP_METHOD = 2;
        /// Dump instrumentation details per body
        const DUMP_INSTRUMENTATION = 4;
        /// Trace method instrumentation decisions
        const METHOD_INSTRUMENT = 8;
        /// Trace inner steps of body rewriting
        const METHOD_INNER = 16;
        /// Trace types skipped because of profiler state
        const SKIP_BY_STATE = 32;
        /// Trace types skipped by the rule engine
        const SKIP_BY_RULES = 64;
        /// Trace profiler callback invocations
        const PROFILER_CALL_METHOD = 128;
    }
}

struct LogSinks {
    file: Option<File>,
    pipe: Option<Arc<MessagePipe>>,
}

/// The driver's logging context.
///
/// Routes formatted lines to the local log file and, when a pipe is attached,
/// forwards them to the controller. [`DriverLog::active`] is the single
/// predicate gating all writes: nothing is emitted before
/// [`DriverLog::initialize`], and nothing garbled is emitted when pipe mode is
/// configured but disconnected.
///
/// All methods take `&self`; share the context behind an `Arc`.
///
/// # Examples
///
/// ```rust,no_run
/// use dotcov::logging::{DriverLog, TraceLevel};
///
/// let log = DriverLog::new();
/// log.initialize("profiler.log")?;
/// log.set_info_level(TraceLevel::SKIP_BY_RULES.bits());
///
/// log.write_info(TraceLevel::SKIP_BY_RULES, "skipped MyApp.Internal.Foo");
/// log.write_error("Rules", "prepare_item_rules", "invalid pattern '(['");
/// log.deinitialize();
/// # Ok::<(), dotcov::Error>(())
/// ```
pub struct DriverLog {
    start: Instant,
    info_level: AtomicU32,
    sinks: Mutex<LogSinks>,
}

impl DriverLog {
    /// Creates an inactive context; no output until [`DriverLog::initialize`].
    #[must_use]
    pub fn new() -> Self {
        DriverLog {
            start: Instant::now(),
            info_level: AtomicU32::new(0),
            sinks: Mutex::new(LogSinks {
                file: None,
                pipe: None,
            }),
        }
    }

    /// Opens the local log file and activates the context.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be created.
    pub fn initialize<P: AsRef<Path>>(&self, file_name: P) -> Result<()> {
        let file = File::create(file_name)?;
        if let Ok(mut sinks) = self.sinks.lock() {
            sinks.file = Some(file);
        }
        Ok(())
    }

    /// Attaches the message pipe; subsequent lines are also forwarded to the
    /// controller as [`LogRecord`] frames.
    pub fn set_pipe(&self, pipe: Arc<MessagePipe>) {
        if let Ok(mut sinks) = self.sinks.lock() {
            sinks.pipe = Some(pipe);
        }
    }

    /// Closes both sinks. Subsequent writes are no-ops.
    pub fn deinitialize(&self) {
        if let Ok(mut sinks) = self.sinks.lock() {
            if let Some(mut file) = sinks.file.take() {
                let _ = file.flush();
            }
            sinks.pipe = None;
        }
    }

    /// Returns whether writes currently reach a sink.
    ///
    /// True when the log file is open and, if pipe forwarding is configured,
    /// the pipe is still connected.
    #[must_use]
    pub fn active(&self) -> bool {
        match self.sinks.lock() {
            Ok(sinks) => {
                sinks.file.is_some() && sinks.pipe.as_ref().map_or(true, |pipe| pipe.is_active())
            }
            Err(_) => false,
        }
    }

    /// Replaces the active trace-category mask.
    pub fn set_info_level(&self, info_level: u32) {
        self.info_level.store(info_level, Ordering::Relaxed);
    }

    /// Returns whether any of the given categories is enabled.
    #[must_use]
    pub fn can_write(&self, level: TraceLevel) -> bool {
        self.info_level.load(Ordering::Relaxed) & level.bits() != 0
    }

    /// Writes an unconditional line (not gated by the category mask).
    pub fn write_line(&self, message: &str) {
        self.emit(message);
    }

    /// Writes a line if its trace category is enabled.
    pub fn write_info(&self, level: TraceLevel, message: &str) {
        if self.can_write(level) {
            self.emit(message);
        }
    }

    /// Writes an error line. Errors bypass the category mask.
    pub fn write_error(&self, class_name: &str, method_name: &str, message: &str) {
        self.emit(&format!("error at {class_name}::{method_name} - {message}"));
    }

    /// Milliseconds elapsed since this context was created.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn emit(&self, message: &str) {
        let elapsed_ms = self.elapsed_ms();
        let Ok(mut sinks) = self.sinks.lock() else {
            return;
        };

        // Single gate for both sinks, so a misconfigured session emits nothing
        let connected = sinks.pipe.as_ref().map_or(true, |pipe| pipe.is_active());
        if sinks.file.is_none() || !connected {
            return;
        }

        if let Some(file) = sinks.file.as_mut() {
            let _ = writeln!(file, "[{elapsed_ms:>8}ms] {message}");
        }
        if let Some(pipe) = sinks.pipe.as_ref() {
            let record = LogRecord {
                elapsed_ms,
                text: message.to_string(),
            };
            // Fire and forget; a failed send has already deactivated the pipe
            let _ = record.send_data(pipe);
        }
    }
}

impl Default for DriverLog {
    fn default() -> Self {
        Self::new()
    }
}
