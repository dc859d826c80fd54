//! Named component logger
//!
//! A thin, copyable handle over `tracing` that tags every event with the
//! component it came from. It keeps no state between calls, so a single
//! `const` per module is enough:
//!
//! ```
//! use smashit_core::Logger;
//!
//! const LOG: Logger = Logger::new("bookings");
//! LOG.info(format_args!("created booking {}", 42));
//! ```
//!
//! Output formatting and filtering belong to whichever subscriber the binary
//! installs.

use std::fmt;

/// Process-wide logger bound to a component name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Logger {
    name: &'static str,
}

impl Logger {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Successful completion of an operation.
    pub fn log(&self, message: impl fmt::Display) {
        tracing::info!(logger = self.name, outcome = "ok", "{}", message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        tracing::info!(logger = self.name, "{}", message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        tracing::warn!(logger = self.name, "{}", message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        tracing::error!(logger = self.name, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn captured(f: impl FnOnce()) -> String {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, f);
        capture.contents()
    }

    #[test]
    fn events_carry_the_logger_name() {
        const LOG: Logger = Logger::new("spaces");
        let out = captured(|| LOG.warn("space is full"));

        assert!(out.contains("WARN"));
        assert!(out.contains("logger="));
        assert!(out.contains("spaces"));
        assert!(out.contains("space is full"));
    }

    #[test]
    fn log_marks_success() {
        let out = captured(|| Logger::new("users").log(format_args!("created {}", 7)));

        assert!(out.contains("outcome="));
        assert!(out.contains("created 7"));
    }

    #[test]
    fn loggers_are_stateless_values() {
        let a = Logger::new("organizations");
        let b = a;
        assert_eq!(a, b);
        assert_eq!(b.name(), "organizations");
    }
}
