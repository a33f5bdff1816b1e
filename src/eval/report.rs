use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use uuid::Uuid;

use super::value::Value;
use crate::error::{ErrorKind, EvalError};

/// Phase of one `execute()` call. A report always carries one of the last three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum RunStatus {
    Registering,
    Running,
    Completed,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub message: String,
    /// Functions the error passed through, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub function_trail: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind: None,
            message: message.into(),
            function_trail: Vec::new(),
            line: None,
            column: None,
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind: Some(kind),
            ..Self::warning(message)
        }
    }

    pub fn from_eval(error: &EvalError, severity: Severity) -> Self {
        Self {
            severity,
            kind: Some(error.kind()),
            message: error.to_string(),
            function_trail: error
                .function_trail()
                .into_iter()
                .map(str::to_string)
                .collect(),
            line: None,
            column: None,
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracePhase {
    Enter,
    Exit,
}

/// One call entry or exit, recorded when tracing is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub phase: TracePhase,
    pub function: String,
    pub depth: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub warnings: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<TraceEvent>,
    /// Calls that were active when the run failed, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub call_stack: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub run_id: Uuid,
    pub success: bool,
    pub status: RunStatus,
    /// Non-null values of top-level expression statements, in order.
    pub results: Vec<Value>,
    pub exports: BTreeMap<String, Value>,
    pub diagnostics: Diagnostics,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Diagnostic>,
}

impl ExecutionReport {
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().and_then(|e| e.kind)
    }

    pub fn export(&self, name: &str) -> Option<&Value> {
        self.exports.get(name)
    }
}
