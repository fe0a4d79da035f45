//! Error handling policy.
//!
//! The handler maps a structured error to an action. Retry budgets are
//! tracked per (component, kind) pair and survive across invocations until
//! explicitly reset.

use crate::errors::{ComponentError, ErrorKind, Severity};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Action chosen by the error handler for a given error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Proceed as if the call succeeded.
    Continue,
    /// Retry the call.
    Retry,
    /// Skip the component.
    Skip,
    /// Abort the run.
    Abort,
}

impl std::fmt::Display for ErrorAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Continue => "CONTINUE",
            Self::Retry => "RETRY",
            Self::Skip => "SKIP",
            Self::Abort => "ABORT",
        };
        f.write_str(s)
    }
}

/// Chooses an action per error.
pub trait ErrorHandler: Send + Sync {
    /// Decides what to do about the error.
    fn handle(&self, err: &ComponentError) -> ErrorAction;

    /// Returns true if the error is recoverable under this policy.
    fn can_recover(&self, err: &ComponentError) -> bool;
}

/// The default policy table:
///
/// | Severity | Recoverable | Budget left | Action   |
/// |----------|-------------|-------------|----------|
/// | Critical | any         | any         | Abort    |
/// | Error    | true        | yes         | Retry    |
/// | Error    | true        | no          | Abort    |
/// | Error    | false       | any         | Abort    |
/// | Warning  | true        | any         | Continue |
/// | Warning  | false       | any         | Skip     |
/// | Info     | any         | any         | Continue |
#[derive(Debug)]
pub struct DefaultErrorHandler {
    max_retries: u32,
    retry_attempts: Mutex<HashMap<String, u32>>,
}

impl DefaultErrorHandler {
    /// Creates a handler with the given retry budget per (component, kind).
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            retry_attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the number of retries consumed for a (component, kind) pair.
    #[must_use]
    pub fn retry_count(&self, component: &str, kind: ErrorKind) -> u32 {
        self.retry_attempts
            .lock()
            .get(&key(component, kind))
            .copied()
            .unwrap_or(0)
    }

    /// Resets the retry budget for a (component, kind) pair.
    pub fn reset_retry_count(&self, component: &str, kind: ErrorKind) {
        self.retry_attempts.lock().remove(&key(component, kind));
    }
}

fn key(component: &str, kind: ErrorKind) -> String {
    format!("{component}:{kind}")
}

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, err: &ComponentError) -> ErrorAction {
        match err.severity {
            Severity::Critical => ErrorAction::Abort,
            Severity::Error => {
                if !err.recoverable {
                    return ErrorAction::Abort;
                }
                let mut attempts = self.retry_attempts.lock();
                let count = attempts.entry(key(&err.component, err.kind)).or_insert(0);
                if *count < self.max_retries {
                    *count += 1;
                    ErrorAction::Retry
                } else {
                    ErrorAction::Abort
                }
            }
            Severity::Warning => {
                if err.recoverable {
                    ErrorAction::Continue
                } else {
                    ErrorAction::Skip
                }
            }
            Severity::Info => ErrorAction::Continue,
        }
    }

    fn can_recover(&self, err: &ComponentError) -> bool {
        err.recoverable && err.severity != Severity::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime_error() -> ComponentError {
        ComponentError::runtime("boom", "comp")
    }

    #[test]
    fn test_critical_always_aborts() {
        let handler = DefaultErrorHandler::new(5);
        let err = runtime_error().with_severity(Severity::Critical);
        assert_eq!(handler.handle(&err), ErrorAction::Abort);
        assert!(!handler.can_recover(&err));
    }

    #[test]
    fn test_recoverable_error_retries_until_budget_exhausted() {
        let handler = DefaultErrorHandler::new(2);
        let err = runtime_error();

        assert_eq!(handler.handle(&err), ErrorAction::Retry);
        assert_eq!(handler.handle(&err), ErrorAction::Retry);
        assert_eq!(handler.handle(&err), ErrorAction::Abort);
        assert_eq!(handler.retry_count("comp", ErrorKind::Runtime), 2);
    }

    #[test]
    fn test_non_recoverable_error_aborts() {
        let handler = DefaultErrorHandler::new(3);
        let err = ComponentError::validation("bad input", "comp");
        assert_eq!(handler.handle(&err), ErrorAction::Abort);
    }

    #[test]
    fn test_warning_continue_or_skip() {
        let handler = DefaultErrorHandler::new(3);

        let recoverable = ComponentError::new(
            "slow",
            "comp",
            ErrorKind::Runtime,
            Severity::Warning,
            true,
        );
        assert_eq!(handler.handle(&recoverable), ErrorAction::Continue);

        let unrecoverable = ComponentError::new(
            "odd",
            "comp",
            ErrorKind::Runtime,
            Severity::Warning,
            false,
        );
        assert_eq!(handler.handle(&unrecoverable), ErrorAction::Skip);
    }

    #[test]
    fn test_info_continues() {
        let handler = DefaultErrorHandler::new(0);
        let err = runtime_error().with_severity(Severity::Info);
        assert_eq!(handler.handle(&err), ErrorAction::Continue);
    }

    #[test]
    fn test_budgets_keyed_by_component_and_kind() {
        let handler = DefaultErrorHandler::new(1);

        let a = ComponentError::runtime("x", "a");
        let b = ComponentError::runtime("x", "b");
        let a_net = ComponentError::new("x", "a", ErrorKind::Network, Severity::Error, true);

        assert_eq!(handler.handle(&a), ErrorAction::Retry);
        assert_eq!(handler.handle(&b), ErrorAction::Retry);
        assert_eq!(handler.handle(&a_net), ErrorAction::Retry);
        assert_eq!(handler.handle(&a), ErrorAction::Abort);
    }

    #[test]
    fn test_reset_restores_budget() {
        let handler = DefaultErrorHandler::new(1);
        let err = runtime_error();

        assert_eq!(handler.handle(&err), ErrorAction::Retry);
        assert_eq!(handler.handle(&err), ErrorAction::Abort);

        handler.reset_retry_count("comp", ErrorKind::Runtime);
        assert_eq!(handler.handle(&err), ErrorAction::Retry);
    }
}
