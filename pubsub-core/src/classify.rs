//! Turns session errors into [`Failure`]s
use crate::{
    error::{SessionError, ValidationError},
    outcome::{Failure, FailureKind, FaultContext},
};

/// Classify `err` raised while doing `summary` on the subject in `context`.
///
/// A server fault keeps its condition, type, text and application condition;
/// everything else is reported as a transport failure with the error's text.
pub fn classify(summary: impl Into<String>, err: SessionError, context: FaultContext) -> Failure {
    let kind = match err {
        SessionError::Fault(fault) => FailureKind::Fault {
            condition: fault.condition,
            error_type: fault.error_type,
            text: fault.text,
            app_condition: fault.app_condition,
        },
        other => FailureKind::Transport {
            reason: other.to_string(),
        },
    };
    Failure {
        summary: summary.into(),
        kind,
        context,
    }
}

/// classify a request that never left the client
pub fn invalid(summary: impl Into<String>, err: ValidationError, context: FaultContext) -> Failure {
    Failure {
        summary: summary.into(),
        kind: FailureKind::Invalid {
            reason: err.to_string(),
        },
        context,
    }
}
