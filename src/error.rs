use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The profiler core distinguishes four failure classes, mirroring how each one is
/// handled at runtime:
///
/// - **Configuration errors** ([`Error::InvalidPattern`]) - a malformed rule pattern.
///   Logged once, after which the rule simply never matches; queries keep running.
/// - **Channel errors** ([`Error::ChannelInactive`]) - the controller end of the
///   message pipe is gone. Telemetry writers swallow this, configuration transfer
///   must surface it to the caller.
/// - **Protocol errors** ([`Error::Malformed`]) - an unexpected message tag or a
///   truncated frame. The channel is desynchronized and must not be read further.
/// - **I/O and internal errors** ([`Error::FileError`], [`Error::LockError`]).
///
/// # Examples
///
/// ```rust
/// use dotcov::{Error, rules::PatternCache};
///
/// let cache = PatternCache::new();
/// match cache.compile("([unclosed") {
///     Err(Error::InvalidPattern { pattern }) => {
///         eprintln!("bad rule pattern: {}", pattern);
///     }
///     Err(e) => eprintln!("other error: {}", e),
///     Ok(_) => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A rule pattern could not be compiled.
    ///
    /// Raised at configuration time when an include/exclude rule carries a
    /// regular expression that fails to compile. The engine treats such a rule
    /// as never matching; profiling of the target process continues.
    #[error("Invalid rule pattern - {pattern}")]
    InvalidPattern {
        /// The pattern string that failed to compile
        pattern: String,
    },

    /// The message pipe is not connected.
    ///
    /// The controller end is absent or the connection dropped. Log forwarding
    /// treats this as a silent no-op; rule-set transfer must treat it as a hard
    /// failure for the profiling session.
    #[error("Message pipe is not connected")]
    ChannelInactive,

    /// A received frame violated the wire contract.
    ///
    /// This covers unexpected message tags, truncated payloads and oversized
    /// frames. Once raised, the channel is considered desynchronized - partial
    /// frames cannot be safely skipped, so callers must not retry the read.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// File I/O error.
    ///
    /// Wraps standard I/O errors from the log file sink or the pipe transport.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Failed to lock target.
    ///
    /// This error occurs when thread synchronization fails, typically when a
    /// mutex guarding the pipe or the log sink was poisoned.
    #[error("Failed to lock target")]
    LockError,

    /// Generic error for miscellaneous failures.
    ///
    /// Used for errors that don't fit into other categories.
    #[error("{0}")]
    Error(String),
}
