//! Static summary of a parsed program, used by tooling and the `analyze` command.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ast::{Expression, MemberProperty, Program, Statement};
use crate::stack::ensure_sufficient_stack;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgramAnalysis {
    pub statement_count: usize,
    pub function_count: usize,
    /// Call statements plus call expressions, inside rule bodies included.
    pub call_count: usize,
    /// Distinct variable names read or assigned anywhere in the program.
    pub variable_count: usize,
    /// Deepest expression nesting found.
    pub max_expression_depth: usize,
    pub functions: Vec<FunctionAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionAnalysis {
    pub name: String,
    pub parameter_count: usize,
    /// Number of conditional and binary expression nodes in the body.
    pub complexity: usize,
}

#[derive(Default)]
struct Counter {
    calls: usize,
    complexity: usize,
    max_depth: usize,
    variables: BTreeSet<String>,
}

impl Counter {
    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::FunctionDefinition(def) => {
                self.variables.extend(def.parameters.iter().cloned());
                self.statements(&def.body.statements);
            }
            Statement::Call { arguments, .. } => {
                self.calls += 1;
                for argument in arguments {
                    self.expression(argument, 1);
                }
            }
            Statement::Expression(e) | Statement::Return(e) | Statement::Log(e) => {
                self.expression(e, 1)
            }
            Statement::Block(block) => self.statements(&block.statements),
            Statement::Set { name, value } => {
                self.variables.insert(name.clone());
                self.expression(value, 1);
            }
            Statement::Export(name) => {
                self.variables.insert(name.clone());
            }
        }
    }

    fn statements(&mut self, statements: &[Statement]) {
        for statement in statements {
            self.statement(statement);
        }
    }

    fn expression(&mut self, expression: &Expression, depth: usize) {
        ensure_sufficient_stack(|| self.expression_node(expression, depth))
    }

    fn expression_node(&mut self, expression: &Expression, depth: usize) {
        self.max_depth = self.max_depth.max(depth);
        match expression {
            Expression::Literal(_) => {}
            Expression::Variable(name) => {
                self.variables.insert(name.clone());
            }
            Expression::Binary { left, right, .. } => {
                self.complexity += 1;
                self.expression(left, depth + 1);
                self.expression(right, depth + 1);
            }
            Expression::Unary { operand, .. } => self.expression(operand, depth + 1),
            Expression::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                self.complexity += 1;
                self.expression(condition, depth + 1);
                self.expression(then_branch, depth + 1);
                self.expression(else_branch, depth + 1);
            }
            Expression::FunctionCall { arguments, .. } => {
                self.calls += 1;
                for argument in arguments {
                    self.expression(argument, depth + 1);
                }
            }
            Expression::Array(elements) => {
                for element in elements {
                    self.expression(element, depth + 1);
                }
            }
            Expression::Member { object, property } => {
                self.expression(object, depth + 1);
                if let MemberProperty::Computed(index) = property {
                    self.expression(index, depth + 1);
                }
            }
        }
    }
}

pub fn analyze(program: &Program) -> ProgramAnalysis {
    let mut counter = Counter::default();
    counter.statements(&program.statements);

    let functions = program
        .functions()
        .map(|def| {
            let mut body = Counter::default();
            body.statements(&def.body.statements);
            FunctionAnalysis {
                name: def.name.clone(),
                parameter_count: def.parameters.len(),
                complexity: body.complexity,
            }
        })
        .collect::<Vec<_>>();

    ProgramAnalysis {
        statement_count: program.statements.len(),
        function_count: functions.len(),
        call_count: counter.calls,
        variable_count: counter.variables.len(),
        max_expression_depth: counter.max_depth,
        functions,
    }
}
