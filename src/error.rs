use std::time::Duration;

/// The single error type for all Monomi operations.
///
/// Every fallible Monomi API returns `monomi::Result<T>` (alias for
/// `Result<T, monomi::Error>`). Assertion verbs, expectation verifiers and
/// the async runner all surface failures through variants of this enum, so
/// test code only needs to handle one error type.
///
/// Variants fall into two families, distinguished by
/// [`is_test_failure`](Self::is_test_failure):
///
/// - **Expected test failures** — an assertion or expectation did not hold,
///   or an async body ran out of time. These are the normal currency of a
///   failing test.
/// - **Usage errors** — the toolkit itself was misused (e.g. `pause` outside
///   `run_async`). These indicate a bug in the test, not the code under test.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("expectation violated: {0}")]
    Expectation(String),

    #[error("call sequence mismatch: {0}")]
    SequenceMismatch(String),

    #[error("async operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("usage error: {0}")]
    Usage(String),
}

/// Discriminant of [`Error`], for matching without destructuring messages.
///
/// Used by [`ThrowAssertion::with_kind`](crate::ThrowAssertion::with_kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Assertion,
    Expectation,
    SequenceMismatch,
    Timeout,
    Usage,
}

impl Error {
    pub(crate) fn assertion(message: impl Into<String>) -> Self {
        Error::Assertion(message.into())
    }

    pub(crate) fn expectation(message: impl Into<String>) -> Self {
        Error::Expectation(message.into())
    }

    pub(crate) fn usage(message: impl Into<String>) -> Self {
        Error::Usage(message.into())
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Assertion(_) => ErrorKind::Assertion,
            Error::Expectation(_) => ErrorKind::Expectation,
            Error::SequenceMismatch(_) => ErrorKind::SequenceMismatch,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Usage(_) => ErrorKind::Usage,
        }
    }

    /// Returns true for expected test failures (assertions, expectations,
    /// sequence mismatches, timeouts) as opposed to toolkit misuse.
    pub fn is_test_failure(&self) -> bool {
        !matches!(self, Error::Usage(_))
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Assertion(a), Self::Assertion(b)) => a == b,
            (Self::Expectation(a), Self::Expectation(b)) => a == b,
            (Self::SequenceMismatch(a), Self::SequenceMismatch(b)) => a == b,
            (Self::Timeout(a), Self::Timeout(b)) => a == b,
            (Self::Usage(a), Self::Usage(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(Error::assertion("x").kind(), ErrorKind::Assertion);
        assert_eq!(Error::expectation("x").kind(), ErrorKind::Expectation);
        assert_eq!(
            Error::Timeout(Duration::from_millis(50)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(Error::usage("x").kind(), ErrorKind::Usage);
    }

    #[test]
    fn usage_is_not_a_test_failure() {
        assert!(!Error::usage("pause outside run_async").is_test_failure());
        assert!(Error::assertion("1 != 2").is_test_failure());
        assert!(Error::Timeout(Duration::from_millis(50)).is_test_failure());
    }

    #[test]
    fn timeout_message_names_the_duration() {
        let message = Error::Timeout(Duration::from_millis(50)).to_string();
        assert!(message.contains("timed out"), "got: {message}");
        assert!(message.contains("50ms"), "got: {message}");
    }
}
