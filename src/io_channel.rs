#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Scoped substitution of standard input and output.
//!
//! An [`IoChannel`] is a single slot. While a [`Substitution`] is alive the
//! slot is taken: input comes from a scripted list of lines and everything
//! written goes to in-memory buffers instead of the grader's console. The slot
//! is released by a drop guard, so it is freed on normal return, on error
//! return and while unwinding from a panic.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use serde::Serialize;
use tracing::trace;

use crate::error::UsageError;

/// A single input/output slot that can be substituted for one scope at a time.
#[derive(Debug, Clone)]
pub struct IoChannel {
    /// Name used in diagnostics.
    name:   String,
    /// Whether a substitution currently holds the slot.
    active: Arc<AtomicBool>,
}

impl Default for IoChannel {
    fn default() -> Self {
        Self::new("stdio")
    }
}

impl IoChannel {
    /// Creates an idle channel.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:   name.into(),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true while a substitution scope holds the slot.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Takes the slot and returns the handle for the substitution scope.
    ///
    /// Fails with [`UsageError::NestedSubstitution`] when the slot is already
    /// taken; scopes are never layered.
    pub fn acquire<I, S>(&self, input_lines: I) -> Result<Substitution, UsageError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| UsageError::NestedSubstitution(self.name.clone()))?;
        trace!(channel = %self.name, "substitution acquired");

        Ok(Substitution {
            _slot:  SlotGuard {
                name:   self.name.clone(),
                active: Arc::clone(&self.active),
            },
            input:  input_lines.into_iter().map(Into::into).collect(),
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    /// Runs `body` with input replaced by `input_lines` and output captured.
    ///
    /// Returns the body's result together with everything it wrote.
    pub fn with_substitution<I, S, R, F>(
        &self,
        input_lines: I,
        body: F,
    ) -> Result<(R, CapturedOutput), UsageError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnOnce(&mut Substitution) -> R,
    {
        let mut scope = self.acquire(input_lines)?;
        let result = body(&mut scope);
        Ok((result, scope.finish()))
    }
}

/// Releases the channel slot when dropped.
#[derive(Debug)]
struct SlotGuard {
    /// Channel name, for tracing.
    name:   String,
    /// Flag shared with the owning channel.
    active: Arc<AtomicBool>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        trace!(channel = %self.name, "substitution released");
    }
}

/// Handle for one substitution scope: scripted input plus captured output.
#[derive(Debug)]
pub struct Substitution {
    /// Keeps the slot taken for as long as the scope lives.
    _slot:  SlotGuard,
    /// Remaining input lines, consumed front to back.
    input:  VecDeque<String>,
    /// Captured standard output.
    stdout: String,
    /// Captured standard error.
    stderr: String,
}

impl Substitution {
    /// Returns the next input line, or `None` once input is exhausted.
    pub fn read_line(&mut self) -> Option<String> {
        self.input.pop_front()
    }

    /// Number of input lines not yet consumed.
    pub fn remaining_input(&self) -> usize {
        self.input.len()
    }

    /// Appends text to captured standard output.
    pub fn print(&mut self, text: impl AsRef<str>) {
        self.stdout.push_str(text.as_ref());
    }

    /// Appends text and a newline to captured standard output.
    pub fn println(&mut self, text: impl AsRef<str>) {
        self.print(text);
        self.stdout.push('\n');
    }

    /// Appends text to captured standard error.
    pub fn eprint(&mut self, text: impl AsRef<str>) {
        self.stderr.push_str(text.as_ref());
    }

    /// Output captured so far.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Error output captured so far.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Drains the remaining input as newline-terminated bytes, for feeding a
    /// child process.
    pub(crate) fn drain_input_bytes(&mut self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for line in self.input.drain(..) {
            bytes.extend_from_slice(line.as_bytes());
            bytes.push(b'\n');
        }
        bytes
    }

    /// Ends the scope, releasing the slot and returning the captured text.
    pub fn finish(self) -> CapturedOutput {
        CapturedOutput {
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

impl std::io::Write for Substitution {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stdout.push_str(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Text captured by a finished substitution scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapturedOutput {
    /// Everything written to standard output.
    pub stdout: String,
    /// Everything written to standard error.
    pub stderr: String,
}

#[cfg(test)]
mod tests {
    use std::{io::Write, panic::AssertUnwindSafe};

    use super::*;

    #[test]
    fn input_is_consumed_in_order_then_hits_eof() {
        let channel = IoChannel::default();
        let (lines, _) = channel
            .with_substitution(["a", "b"], |io| {
                let mut seen = Vec::new();
                while let Some(line) = io.read_line() {
                    seen.push(line);
                }
                seen.push(format!("{:?}", io.read_line()));
                seen
            })
            .expect("substitute");

        assert_eq!(lines, vec!["a", "b", "None"]);
    }

    #[test]
    fn output_is_captured_not_printed() {
        let channel = IoChannel::default();
        let (_, captured) = channel
            .with_substitution(Vec::<String>::new(), |io| {
                io.println("hello");
                write!(io, "{}", 42).expect("write");
                io.eprint("oops");
            })
            .expect("substitute");

        assert_eq!(captured.stdout, "hello\n42");
        assert_eq!(captured.stderr, "oops");
    }

    #[test]
    fn nested_scopes_are_rejected() {
        let channel = IoChannel::new("nested");
        let result = channel
            .with_substitution(["x"], |_| channel.with_substitution(["y"], |_| ()).map(|_| ()))
            .expect("outer scope");

        assert!(matches!(result.0, Err(UsageError::NestedSubstitution(name)) if name == "nested"));
        assert!(!channel.is_active());
    }

    #[test]
    fn slot_is_released_after_error_return() {
        let channel = IoChannel::default();
        let (result, _) = channel
            .with_substitution(["1"], |io| -> Result<(), String> {
                io.read_line();
                Err("student code failed".into())
            })
            .expect("substitute");

        assert!(result.is_err());
        assert!(!channel.is_active());
        assert!(channel.with_substitution(["again"], |_| ()).is_ok());
    }

    #[test]
    fn slot_is_released_after_panic() {
        let channel = IoChannel::default();
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            channel.with_substitution(["boom"], |_| -> () { panic!("student code panicked") })
        }));

        assert!(outcome.is_err());
        assert!(!channel.is_active());
        let (line, _) = channel
            .with_substitution(["next"], |io| io.read_line())
            .expect("second scope succeeds");
        assert_eq!(line.as_deref(), Some("next"));
    }

    #[test]
    fn drained_input_is_newline_terminated() {
        let channel = IoChannel::default();
        let mut scope = channel.acquire(["a", "b"]).expect("acquire");
        assert_eq!(scope.drain_input_bytes(), b"a\nb\n".to_vec());
        assert_eq!(scope.remaining_input(), 0);
        drop(scope);
        assert!(!channel.is_active());
    }
}
