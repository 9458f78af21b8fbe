use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const MESSAGE_PREFIX: &str = "wheelship";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: CommandStatus,
    pub message: String,
    #[serde(default)]
    pub details: Value,
}

impl ExecutionOutcome {
    pub fn success(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::Ok,
            message: message.into(),
            details,
        }
    }

    pub fn failure(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::Failure,
            message: message.into(),
            details,
        }
    }

    pub fn user_error(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::UserError,
            message: message.into(),
            details,
        }
    }

    /// Process exit code for this outcome. Every stop, whether caused by the
    /// caller or by a tool, exits 1.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.status {
            CommandStatus::Ok => 0,
            CommandStatus::UserError | CommandStatus::Failure => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Ok,
    UserError,
    Failure,
}

/// Expected ways a release can stop. Anything else surfaces as a plain
/// `anyhow::Error`.
#[derive(thiserror::Error, Debug)]
pub enum ReleaseError {
    /// The checkout or configuration is not in a state a release can start from.
    #[error("{message}")]
    Precondition { message: String, details: Value },
    /// An external tool ran but reported failure, or produced unexpected artifacts.
    #[error("{message}")]
    Tool { message: String, details: Value },
}

impl ReleaseError {
    pub fn precondition(message: impl Into<String>, details: Value) -> Self {
        Self::Precondition {
            message: message.into(),
            details,
        }
    }

    pub fn tool(message: impl Into<String>, details: Value) -> Self {
        Self::Tool {
            message: message.into(),
            details,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Precondition { message, .. } | Self::Tool { message, .. } => message,
        }
    }

    #[must_use]
    pub fn details(&self) -> &Value {
        match self {
            Self::Precondition { details, .. } | Self::Tool { details, .. } => details,
        }
    }

    #[must_use]
    pub fn status(&self) -> CommandStatus {
        match self {
            Self::Precondition { .. } => CommandStatus::UserError,
            Self::Tool { .. } => CommandStatus::Failure,
        }
    }
}

#[must_use]
pub fn format_status_message(message: &str) -> String {
    if message.is_empty() {
        MESSAGE_PREFIX.to_string()
    } else if message.starts_with(MESSAGE_PREFIX) {
        message.to_string()
    } else {
        format!("{MESSAGE_PREFIX}: {message}")
    }
}

/// The `--json` envelope: `status`, `message`, and an object of `details`.
#[must_use]
pub fn to_json_response(outcome: &ExecutionOutcome) -> Value {
    let status = match outcome.status {
        CommandStatus::Ok => "ok",
        CommandStatus::UserError => "user-error",
        CommandStatus::Failure => "error",
    };
    let details = match &outcome.details {
        Value::Object(_) => outcome.details.clone(),
        Value::Null => json!({}),
        other => json!({ "value": other }),
    };
    json!({
        "status": status,
        "message": format_status_message(&outcome.message),
        "details": details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_onto_statuses() {
        let stop = ReleaseError::precondition("wrong branch", json!({}));
        assert_eq!(stop.status(), CommandStatus::UserError);
        let failed = ReleaseError::tool("auditwheel repair failed (exit 1)", json!({}));
        assert_eq!(failed.status(), CommandStatus::Failure);
        assert_eq!(failed.to_string(), "auditwheel repair failed (exit 1)");
    }

    #[test]
    fn every_stop_exits_one() {
        assert_eq!(ExecutionOutcome::success("ok", Value::Null).exit_code(), 0);
        assert_eq!(ExecutionOutcome::user_error("no", Value::Null).exit_code(), 1);
        assert_eq!(ExecutionOutcome::failure("no", Value::Null).exit_code(), 1);
    }

    #[test]
    fn json_envelope_wraps_scalar_details() {
        let outcome = ExecutionOutcome::failure("tests failed", json!("tail"));
        let value = to_json_response(&outcome);
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "wheelship: tests failed");
        assert_eq!(value["details"]["value"], "tail");
    }
}
