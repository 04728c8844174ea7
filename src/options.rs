//! Typed profiler options populated by the controlling host.
//!
//! The driver is configured from outside the process (command line of the
//! controller, environment of the target); parsing those sources is the
//! host's job. This module only defines the typed option set the host hands
//! to the process entry point before the session starts.

use std::path::PathBuf;

use crate::logging::DriverLog;

/// Options for a profiling session.
///
/// Every field is optional; an unset field means the built-in default. The
/// entry point uses these to initialize the [`DriverLog`] and to decide
/// whether log lines are forwarded over the message pipe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilerOptions {
    /// Path of the local driver log file.
    pub log_file: Option<PathBuf>,
    /// Whether log lines are mirrored to the controller over the pipe.
    pub use_pipe: Option<bool>,
    /// Initial trace-category mask, see [`crate::logging::TraceLevel`].
    pub log_level: Option<u32>,
}

impl ProfilerOptions {
    /// Creates an option set with nothing set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether pipe logging was explicitly requested.
    #[must_use]
    pub fn use_pipe_logging(&self) -> bool {
        self.use_pipe == Some(true)
    }

    /// Writes the effective option values to the driver log.
    pub fn dump(&self, log: &DriverLog) {
        match &self.log_file {
            Some(path) => log.write_line(&format!("options: log file '{}'", path.display())),
            None => log.write_line("options: log file not set"),
        }
        log.write_line(&format!(
            "options: pipe logging {}",
            if self.use_pipe_logging() { "on" } else { "off" }
        ));
        match self.log_level {
            Some(level) => log.write_line(&format!("options: log level {level:#x}")),
            None => log.write_line("options: log level not set"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_unset() {
        let options = ProfilerOptions::new();
        assert_eq!(options.log_file, None);
        assert!(!options.use_pipe_logging());
    }

    #[test]
    fn test_use_pipe_logging_requires_explicit_true() {
        let mut options = ProfilerOptions::new();
        options.use_pipe = Some(false);
        assert!(!options.use_pipe_logging());

        options.use_pipe = Some(true);
        assert!(options.use_pipe_logging());
    }
}
