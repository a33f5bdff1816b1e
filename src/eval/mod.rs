//! Rule interpreter.
//!
//! A run goes through two passes over the top-level statements of a [`Program`]:
//!
//! 1. every `RULE` definition is registered in the run's function table, so calls may refer
//!    to rules defined further down the source;
//! 2. every other statement is executed in source order against the global scope.
//!
//! The [`Evaluator`] keeps no state between runs. Scopes, the call stack, the deadline and
//! the collected diagnostics belong to the [`context::RunState`] of one `execute()` call.
//!
//! [`Program`]: crate::ast::Program
//! [`Evaluator`]: evaluator::Evaluator

use std::collections::HashMap;

pub mod context;
pub mod evaluator;
pub mod expression;
pub mod report;
pub mod statement;
pub mod value;

pub use evaluator::Evaluator;
pub use report::{Diagnostic, ExecutionReport, RunStatus};
pub use value::Value;

/// Initial bindings of a run's global scope.
pub type Variables = HashMap<String, Value>;
