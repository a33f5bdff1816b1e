//! Canonical source printer.
//!
//! Formatting a parsed program and parsing the output again yields the same tree. Parentheses
//! are emitted only where operator precedence requires them.

pub mod config;
pub mod error;
pub mod visitor;

use crate::ast::Program;
use config::FormatterConfig;
use error::FormatterError;
use visitor::FormatterVisitor;

#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: FormatterConfig,
}

impl Formatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    pub fn format(&self, program: &Program) -> Result<String, FormatterError> {
        FormatterVisitor::new(self.config.clone()).format_program(program)
    }
}
