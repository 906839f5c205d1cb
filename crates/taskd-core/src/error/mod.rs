//! Error taxonomy for the retry/failure-isolation subsystem.
//!
//! Classification is by an explicit [`ErrorClassifier`] rather than by
//! reflecting on a runtime type name: a [`TaskError`] carries its own
//! [`ErrorClass`] tag, set by whatever raised it.

use std::fmt;

/// Semantic error class, used to pick a retry strategy and whether a
/// failure is retryable at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Malformed input or unknown kind; non-retryable, user-visible.
    Validation,
    /// Connection/timeout/network failure; retryable with exponential backoff.
    TransientNetwork,
    /// Rate limited by a downstream dependency; retryable with jitter.
    RateLimit,
    /// Database/connection-pool failure; retryable with linear backoff.
    TransientStorage,
    /// Anything the classifier did not recognize; retryable with exponential
    /// backoff by default.
    Unknown,
}

impl ErrorClass {
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Validation)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::TransientNetwork => "transient_network",
            Self::RateLimit => "rate_limit",
            Self::TransientStorage => "transient_storage",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// An error raised by a task handler during execution.
///
/// `kind` is a short machine-readable tag (e.g. `"TimeoutError"`) persisted
/// verbatim as the task's `error_kind`; `class` is what the retry engine and
/// breaker act on.
#[derive(Debug, Clone)]
pub struct TaskError {
    pub kind: String,
    pub message: String,
    pub class: ErrorClass,
}

impl TaskError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>, class: ErrorClass) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            class,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("ValidationError", message, ErrorClass::Validation)
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TaskError {}

/// Classifies a raised [`TaskError`] by its `kind` tag into an [`ErrorClass`].
///
/// Implementors may consult the error's kind tag, the task's recognized
/// kind, or a user-provided taxonomy; the default implementation matches
/// the error-kind tag against the taxonomy's named classes.
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: &TaskError) -> ErrorClass;
}

/// Maps the error-kind tag to the taxonomy. Any kind already carrying a
/// non-[`ErrorClass::Unknown`] class (set by the raiser) is passed through
/// unchanged; ties are broken by this tag table only when the raiser did
/// not already know its class.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultClassifier;

impl ErrorClassifier for DefaultClassifier {
    fn classify(&self, error: &TaskError) -> ErrorClass {
        if error.class != ErrorClass::Unknown {
            return error.class;
        }
        match error.kind.as_str() {
            "ConnectionError" | "TimeoutError" | "NetworkError" => ErrorClass::TransientNetwork,
            "RateLimitError" | "TooManyRequestsError" => ErrorClass::RateLimit,
            "DatabaseError" | "ConnectionPoolError" => ErrorClass::TransientStorage,
            "ValidationError" => ErrorClass::Validation,
            _ => ErrorClass::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_maps_known_kinds() {
        let c = DefaultClassifier;
        let cases = [
            ("TimeoutError", ErrorClass::TransientNetwork),
            ("ConnectionError", ErrorClass::TransientNetwork),
            ("NetworkError", ErrorClass::TransientNetwork),
            ("RateLimitError", ErrorClass::RateLimit),
            ("TooManyRequestsError", ErrorClass::RateLimit),
            ("DatabaseError", ErrorClass::TransientStorage),
            ("ConnectionPoolError", ErrorClass::TransientStorage),
            ("ValidationError", ErrorClass::Validation),
        ];
        for (kind, expected) in cases {
            let err = TaskError::new(kind, "boom", ErrorClass::Unknown);
            assert_eq!(c.classify(&err), expected);
        }
    }

    #[test]
    fn classifier_defaults_unrecognized_to_unknown() {
        let c = DefaultClassifier;
        let err = TaskError::new("SomethingElse", "boom", ErrorClass::Unknown);
        assert_eq!(c.classify(&err), ErrorClass::Unknown);
    }

    #[test]
    fn classifier_passes_through_preset_class() {
        let c = DefaultClassifier;
        let err = TaskError::new("CustomKind", "boom", ErrorClass::RateLimit);
        assert_eq!(c.classify(&err), ErrorClass::RateLimit);
    }

    #[test]
    fn only_validation_is_non_retryable() {
        assert!(!ErrorClass::Validation.is_retryable());
        assert!(ErrorClass::TransientNetwork.is_retryable());
        assert!(ErrorClass::RateLimit.is_retryable());
        assert!(ErrorClass::TransientStorage.is_retryable());
        assert!(ErrorClass::Unknown.is_retryable());
    }
}
