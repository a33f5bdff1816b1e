//! # finrule: an embeddable rule language for financial calculations
//!
//! Business users write calculation logic as small programs of `RULE` definitions, variable
//! assignments, calls and exports. The host application parses them once, binds its data
//! access functions, and executes them many times against different inputs.
//!
//! ```text
//! RULE MARGIN(revenue, cost) RETURN revenue == 0 ? 0 : (revenue - cost) / revenue; ENDRULE
//! SET m = CALL MARGIN(GET_DATA("ACME", "2024-Q1", "Actual", "v1"), 800);
//! EXPORT m;
//! ```
//!
//! ## Processing pipeline
//!
//! ```text
//! Source → Tokenizer → Preprocessor → Parser → AST (cached) → Evaluator → ExecutionReport
//! ```
//!
//! - Tokenization ([`tokenizer`]) turns text into tokens carrying line and column.
//! - Preprocessing ([`preprocessor`]) drops whitespace and comments.
//! - Parsing ([`analyzer`]) builds the [`ast`] with parser combinators over tokens.
//! - The [`ast_registry`] ties these together and caches parsed programs by source text.
//! - Evaluation ([`eval`]) runs a program in two passes and reports results, exports and
//!   diagnostics without raising runtime failures to the caller.
//!
//! Functions a rule calls without defining them resolve through the
//! [`function_registry`]: the [`builtins`] and the host services bound by the embedding
//! application. `LOG` output goes to a [`log_sink`].
//!
//! [`engine::RuleEngine`] bundles all of the above behind one configuration.

pub mod analysis;
pub mod analyzer;
pub mod ast;
pub mod ast_registry;
pub mod builtins;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod formatter;
pub mod function_registry;
pub mod log_sink;
pub mod preprocessor;
pub mod stack;
pub mod tokenizer;

// Re-exports
pub use ast::*;
pub use engine::RuleEngine;
pub use error::*;
pub use eval::*;
