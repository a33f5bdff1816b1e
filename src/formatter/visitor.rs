use std::fmt::Write;

use crate::ast::{
    Expression, FunctionDef, Literal, MemberProperty, Precedence, Program, Statement,
};
use crate::formatter::config::FormatterConfig;
use crate::formatter::error::FormatterError;
use crate::stack::ensure_sufficient_stack;

pub struct FormatterVisitor {
    config: FormatterConfig,
    indent_level: usize,
    output: String,
    /// Where the last statement ended, while a `;` there is still optional.
    open_end: Option<usize>,
}

impl FormatterVisitor {
    pub fn new(config: FormatterConfig) -> Self {
        Self {
            config,
            indent_level: 0,
            output: String::new(),
            open_end: None,
        }
    }

    pub fn format_program(&mut self, program: &Program) -> Result<String, FormatterError> {
        self.open_end = None;
        let statements = flatten(&program.statements);
        for (i, statement) in statements.iter().enumerate() {
            // blank line around rule definitions
            if i > 0
                && (matches!(statement, Statement::FunctionDefinition(_))
                    || matches!(statements[i - 1], Statement::FunctionDefinition(_)))
            {
                self.output.push('\n');
            }
            self.format_statement(statement)?;
        }
        Ok(std::mem::take(&mut self.output))
    }

    fn format_statement(&mut self, statement: &Statement) -> Result<(), FormatterError> {
        if let Statement::Block(block) = statement {
            for inner in flatten(&block.statements) {
                self.format_statement(inner)?;
            }
            return Ok(());
        }
        self.write_indent();
        let start = self.output.len();
        match statement {
            Statement::FunctionDefinition(def) => {
                self.open_end = None;
                return self.format_rule(def);
            }
            Statement::Block(_) => return Ok(()),
            Statement::Call { name, arguments } => {
                self.write("CALL ");
                self.format_call(name, arguments)?;
            }
            Statement::Expression(expression) => self.format_expression(expression)?,
            Statement::Return(expression) => {
                self.write("RETURN ");
                self.format_expression(expression)?;
            }
            Statement::Set { name, value } => {
                write!(self.output, "SET {} = ", name)?;
                self.format_expression(value)?;
            }
            Statement::Log(expression) => {
                self.write("LOG ");
                self.format_expression(expression)?;
            }
            Statement::Export(name) => write!(self.output, "EXPORT {}", name)?,
        }
        self.terminate_previous(start);
        if self.config.semicolons {
            self.write(";");
            self.open_end = None;
        } else {
            self.open_end = Some(self.output.len());
        }
        self.newline();
        Ok(())
    }

    /// Without semicolons, a statement starting with a token that could continue the previous
    /// expression would merge into it. Such a statement gets a `;` before it after all.
    fn terminate_previous(&mut self, start: usize) {
        let continues = self.output[start..].starts_with(['-', '+', '(', '[', '!'])
            || self.output[start..].starts_with("NOT ");
        if let Some(end) = self.open_end.take() {
            if continues {
                self.output.insert(end, ';');
            }
        }
    }

    fn format_rule(&mut self, def: &FunctionDef) -> Result<(), FormatterError> {
        write!(
            self.output,
            "RULE {}({})",
            def.name,
            def.parameters.join(", ")
        )?;
        self.newline();
        self.indent();
        for statement in flatten(&def.body.statements) {
            self.format_statement(statement)?;
        }
        self.dedent();
        self.open_end = None;
        self.write_indent();
        self.write("ENDRULE");
        self.newline();
        Ok(())
    }

    fn format_expression(&mut self, expression: &Expression) -> Result<(), FormatterError> {
        ensure_sufficient_stack(|| self.format_expression_node(expression))
    }

    fn format_expression_node(&mut self, expression: &Expression) -> Result<(), FormatterError> {
        match expression {
            Expression::Literal(literal) => self.format_literal(literal)?,
            Expression::Variable(name) => self.write(name),
            Expression::Binary { op, left, right } => {
                let precedence = op.precedence();
                // every binary level is left-associative
                self.format_operand(left, precedence, false)?;
                write!(self.output, " {} ", op)?;
                self.format_operand(right, precedence, true)?;
            }
            Expression::Unary { op, operand } => {
                self.write(&op.to_string());
                self.format_operand(operand, Precedence::Unary, false)?;
            }
            Expression::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                self.format_operand(condition, Precedence::Conditional, true)?;
                self.write(" ? ");
                self.format_expression(then_branch)?;
                self.write(" : ");
                self.format_expression(else_branch)?;
            }
            Expression::FunctionCall {
                function,
                arguments,
            } => self.format_call(function, arguments)?,
            Expression::Array(elements) => {
                self.write("[");
                self.format_list(elements)?;
                self.write("]");
            }
            Expression::Member { object, property } => {
                self.format_operand(object, Precedence::Postfix, false)?;
                match property {
                    MemberProperty::Named(name) => write!(self.output, ".{}", name)?,
                    MemberProperty::Computed(index) => {
                        self.write("[");
                        self.format_expression(index)?;
                        self.write("]");
                    }
                }
            }
        }
        Ok(())
    }

    /// Writes `expression` as an operand of a construct binding at `parent`, wrapping it in
    /// parentheses when it binds looser (or equally loose, for `strict`).
    fn format_operand(
        &mut self,
        expression: &Expression,
        parent: Precedence,
        strict: bool,
    ) -> Result<(), FormatterError> {
        let own = precedence_of(expression);
        let wrap = own < parent || (strict && own == parent);
        if wrap {
            self.write("(");
        }
        self.format_expression(expression)?;
        if wrap {
            self.write(")");
        }
        Ok(())
    }

    fn format_call(&mut self, name: &str, arguments: &[Expression]) -> Result<(), FormatterError> {
        write!(self.output, "{}(", name)?;
        self.format_list(arguments)?;
        self.write(")");
        Ok(())
    }

    fn format_list(&mut self, items: &[Expression]) -> Result<(), FormatterError> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.format_expression(item)?;
        }
        Ok(())
    }

    fn format_literal(&mut self, literal: &Literal) -> Result<(), FormatterError> {
        match literal {
            Literal::Number(n) if !n.is_finite() => return Err(FormatterError::NonFiniteNumber(*n)),
            Literal::Number(n) if *n < 0.0 => write!(self.output, "-{}", -n)?,
            Literal::Number(n) => write!(self.output, "{}", n)?,
            Literal::String(s) => {
                self.output.push('"');
                for c in s.chars() {
                    match c {
                        '"' => self.write("\\\""),
                        '\\' => self.write("\\\\"),
                        '\n' => self.write("\\n"),
                        '\r' => self.write("\\r"),
                        '\t' => self.write("\\t"),
                        c if c.is_control() => write!(self.output, "\\u{:04x}", c as u32)?,
                        c => self.output.push(c),
                    }
                }
                self.output.push('"');
            }
            Literal::Boolean(_) | Literal::Null => write!(self.output, "{}", literal)?,
        }
        Ok(())
    }

    fn write(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn write_indent(&mut self) {
        let width = self.indent_level * self.config.indent_spaces;
        self.output.extend(std::iter::repeat(' ').take(width));
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }

    fn newline(&mut self) {
        self.output.push('\n');
    }
}

/// Binding strength of an expression as printed.
fn precedence_of(expression: &Expression) -> Precedence {
    match expression {
        Expression::Binary { op, .. } => op.precedence(),
        Expression::Conditional { .. } => Precedence::Conditional,
        Expression::Unary { .. } => Precedence::Unary,
        // a negative number prints with a leading '-'
        Expression::Literal(Literal::Number(n)) if *n < 0.0 => Precedence::Unary,
        _ => Precedence::Postfix,
    }
}

/// Inlines nested blocks, which have no surface syntax of their own.
fn flatten(statements: &[Statement]) -> Vec<&Statement> {
    let mut flat = Vec::with_capacity(statements.len());
    for statement in statements {
        match statement {
            Statement::Block(block) => flat.extend(flatten(&block.statements)),
            other => flat.push(other),
        }
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOperator, Block, UnaryOperator};
    use pretty_assertions::assert_eq;

    fn format(statements: Vec<Statement>) -> String {
        FormatterVisitor::new(FormatterConfig::default())
            .format_program(&Program::new(statements))
            .unwrap()
    }

    fn format_expr(expression: Expression) -> String {
        format(vec![Statement::Expression(expression)])
    }

    #[test]
    fn test_parentheses_follow_precedence() {
        let sum = Expression::binary(
            BinaryOperator::Add,
            Expression::variable("a"),
            Expression::variable("b"),
        );
        assert_eq!(
            format_expr(Expression::binary(
                BinaryOperator::Multiply,
                sum.clone(),
                Expression::variable("c")
            )),
            "(a + b) * c;\n"
        );
        assert_eq!(
            format_expr(Expression::binary(
                BinaryOperator::Add,
                sum.clone(),
                Expression::variable("c")
            )),
            "a + b + c;\n"
        );
        assert_eq!(
            format_expr(Expression::binary(
                BinaryOperator::Subtract,
                Expression::variable("c"),
                sum
            )),
            "c - (a + b);\n"
        );
    }

    #[test]
    fn test_unary_and_member() {
        let expression = Expression::Member {
            object: Box::new(Expression::Unary {
                op: UnaryOperator::Minus,
                operand: Box::new(Expression::variable("x")),
            }),
            property: MemberProperty::Named("y".to_string()),
        };
        assert_eq!(format_expr(expression), "(-x).y;\n");
        assert_eq!(
            format_expr(Expression::Unary {
                op: UnaryOperator::Not,
                operand: Box::new(Expression::binary(
                    BinaryOperator::And,
                    Expression::variable("a"),
                    Expression::variable("b"),
                )),
            }),
            "!(a AND b);\n"
        );
    }

    #[test]
    fn test_conditional_as_operand() {
        let conditional = Expression::Conditional {
            condition: Box::new(Expression::variable("c")),
            then_branch: Box::new(Expression::number(1.0)),
            else_branch: Box::new(Expression::number(2.5)),
        };
        assert_eq!(
            format_expr(Expression::binary(
                BinaryOperator::Add,
                conditional,
                Expression::number(1.0)
            )),
            "(c ? 1 : 2.5) + 1;\n"
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            format_expr(Expression::string("say \"hi\"\n\\")),
            "\"say \\\"hi\\\"\\n\\\\\";\n"
        );
    }

    #[test]
    fn test_rule_layout() {
        let output = format(vec![
            Statement::FunctionDefinition(FunctionDef {
                name: "DOUBLE".to_string(),
                parameters: vec!["x".to_string()],
                body: Block::new(vec![Statement::Block(Block::new(vec![Statement::Return(
                    Expression::binary(
                        BinaryOperator::Multiply,
                        Expression::variable("x"),
                        Expression::number(2.0),
                    ),
                )]))]),
            }),
            Statement::Call {
                name: "DOUBLE".to_string(),
                arguments: vec![Expression::number(3.0)],
            },
            Statement::Export("y".to_string()),
        ]);
        assert_eq!(
            output,
            "RULE DOUBLE(x)\n    RETURN x * 2;\nENDRULE\n\nCALL DOUBLE(3);\nEXPORT y;\n"
        );
    }

    #[test]
    fn test_without_semicolons() {
        let config = FormatterConfig {
            indent_spaces: 2,
            semicolons: false,
        };
        let output = FormatterVisitor::new(config)
            .format_program(&Program::new(vec![Statement::Log(Expression::Literal(
                Literal::Null,
            ))]))
            .unwrap();
        assert_eq!(output, "LOG NULL\n");
    }

    #[test]
    fn test_without_semicolons_keeps_statements_apart() {
        let config = FormatterConfig {
            indent_spaces: 4,
            semicolons: false,
        };
        let minus_one = Expression::Unary {
            op: UnaryOperator::Minus,
            operand: Box::new(Expression::number(1.0)),
        };
        let output = FormatterVisitor::new(config)
            .format_program(&Program::new(vec![
                Statement::Set {
                    name: "a".to_string(),
                    value: Expression::number(1.0),
                },
                Statement::Expression(minus_one),
                Statement::Expression(Expression::Array(vec![])),
                Statement::Expression(Expression::variable("b")),
                Statement::Export("a".to_string()),
            ]))
            .unwrap();
        assert_eq!(output, "SET a = 1;\n-1;\n[]\nb\nEXPORT a\n");
    }

    #[test]
    fn test_non_finite_number_rejected() {
        let err = FormatterVisitor::new(FormatterConfig::default())
            .format_program(&Program::new(vec![Statement::Expression(
                Expression::number(f64::NAN),
            )]))
            .unwrap_err();
        assert!(matches!(err, FormatterError::NonFiniteNumber(_)));
    }
}
