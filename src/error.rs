use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::formatter::error::FormatterError;

/// Error taxonomy shared by parse time and run time. The display names are the stable
/// identifiers reported in diagnostics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum ErrorKind {
    SyntaxError,
    UndefinedVariableError,
    UndefinedFunctionError,
    ArityError,
    RecursionError,
    StackDepthError,
    TimeoutError,
    ConfigurationError,
    RuntimeError,
}

/// First parse error of a program. Lines and columns are 1-based.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("syntax error at line {line}, column {column}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    #[error("undefined function '{0}'")]
    UndefinedFunction(String),
    #[error("function '{function}' expects {expected} argument(s), got {actual}")]
    Arity {
        function: String,
        expected: String,
        actual: usize,
    },
    #[error("function '{function}' exceeded {limit} nested activations")]
    Recursion { function: String, limit: usize },
    #[error("call stack depth limit of {limit} reached calling '{function}'")]
    StackDepth { function: String, limit: usize },
    #[error("execution timed out after {elapsed_ms} ms (limit {timeout_ms} ms)")]
    Timeout { elapsed_ms: u64, timeout_ms: u64 },
    #[error("host service '{0}' is not bound")]
    Configuration(String),
    #[error("{0}")]
    Runtime(String),
    /// Annotates an error raised inside a user-defined function with that function's name.
    #[error("in function '{function}': {source}")]
    InFunction {
        function: String,
        source: Box<EvalError>,
    },
}

impl EvalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::UndefinedVariable(_) => ErrorKind::UndefinedVariableError,
            EvalError::UndefinedFunction(_) => ErrorKind::UndefinedFunctionError,
            EvalError::Arity { .. } => ErrorKind::ArityError,
            EvalError::Recursion { .. } => ErrorKind::RecursionError,
            EvalError::StackDepth { .. } => ErrorKind::StackDepthError,
            EvalError::Timeout { .. } => ErrorKind::TimeoutError,
            EvalError::Configuration(_) => ErrorKind::ConfigurationError,
            EvalError::Runtime(_) => ErrorKind::RuntimeError,
            EvalError::InFunction { source, .. } => source.kind(),
        }
    }

    pub fn in_function(function: impl Into<String>, source: EvalError) -> Self {
        EvalError::InFunction {
            function: function.into(),
            source: Box::new(source),
        }
    }

    /// The error without any function annotations.
    pub fn root(&self) -> &EvalError {
        match self {
            EvalError::InFunction { source, .. } => source.root(),
            other => other,
        }
    }

    /// Function names from the outermost annotation inwards.
    pub fn function_trail(&self) -> Vec<&str> {
        let mut trail = Vec::new();
        let mut current = self;
        while let EvalError::InFunction { function, source } = current {
            trail.push(function.as_str());
            current = source;
        }
        trail
    }

    /// Errors that end the run even when top-level failures are tolerated.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TimeoutError | ErrorKind::StackDepthError
        )
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Crate-level error for the embedding surface and the command line.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("formatter error: {0}")]
    Format(#[from] FormatterError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuleError::Syntax(_) => ErrorKind::SyntaxError,
            RuleError::Eval(e) => e.kind(),
            RuleError::Config(_) => ErrorKind::ConfigurationError,
            RuleError::Format(_) | RuleError::Io(_) => ErrorKind::RuntimeError,
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        RuleError::Config(message.into())
    }
}

pub type RuleResult<T> = Result<T, RuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_survives_function_annotation() {
        let err = EvalError::in_function(
            "OUTER",
            EvalError::in_function(
                "INNER",
                EvalError::Arity {
                    function: "ADD".to_string(),
                    expected: "2".to_string(),
                    actual: 3,
                },
            ),
        );
        assert_eq!(err.kind(), ErrorKind::ArityError);
        assert_eq!(err.function_trail(), vec!["OUTER", "INNER"]);
        assert!(matches!(err.root(), EvalError::Arity { actual: 3, .. }));
        assert_eq!(
            err.to_string(),
            "in function 'OUTER': in function 'INNER': function 'ADD' expects 2 argument(s), got 3"
        );
    }

    #[test]
    fn test_fatal_kinds() {
        assert!(EvalError::Timeout {
            elapsed_ms: 10,
            timeout_ms: 5
        }
        .is_fatal());
        assert!(EvalError::in_function(
            "F",
            EvalError::StackDepth {
                function: "F".to_string(),
                limit: 3
            }
        )
        .is_fatal());
        assert!(!EvalError::UndefinedVariable("x".to_string()).is_fatal());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ErrorKind::StackDepthError.to_string(), "StackDepthError");
        assert_eq!(
            "ConfigurationError".parse::<ErrorKind>().unwrap(),
            ErrorKind::ConfigurationError
        );
    }

    #[test]
    fn test_syntax_error_display() {
        let err = SyntaxError::new("expected ')', found ';'", 3, 14);
        assert_eq!(
            err.to_string(),
            "syntax error at line 3, column 14: expected ')', found ';'"
        );
        assert_eq!(RuleError::from(err).kind(), ErrorKind::SyntaxError);
    }
}
