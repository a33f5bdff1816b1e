use std::sync::Arc;

use async_recursion::async_recursion;
use futures::future::BoxFuture;
use tracing::warn;

use super::{
    context::ExecutionContext, evaluator::Evaluator, report::Diagnostic, value::Value,
};
use crate::ast::{Expression, Statement};
use crate::error::EvalResult;
use crate::log_sink::LogLevel;
use crate::stack::GrowingStack;

/// Outcome of executing one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementResult {
    /// Normal completion with the statement's value (`Null` for statements without one).
    Value(Value),

    /// Control flow that unwinds enclosing blocks.
    Control(ControlFlow),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    /// `RETURN`: stops every enclosing block up to the function call boundary.
    Return(Value),
}

impl StatementResult {
    pub fn into_value(self) -> Value {
        match self {
            StatementResult::Value(value) => value,
            StatementResult::Control(ControlFlow::Return(value)) => value,
        }
    }
}

impl Evaluator {
    pub fn eval_statement<'a>(
        &'a self,
        statement: &'a Statement,
        context: Arc<ExecutionContext>,
    ) -> GrowingStack<BoxFuture<'a, EvalResult<StatementResult>>> {
        GrowingStack::new(self.eval_statement_node(statement, context))
    }

    #[async_recursion]
    async fn eval_statement_node(
        &self,
        statement: &Statement,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<StatementResult> {
        context.run().check_deadline()?;
        match statement {
            // definitions are registered before execution starts
            Statement::FunctionDefinition(_) => Ok(StatementResult::Value(Value::Null)),
            Statement::Call { name, arguments } => {
                self.eval_call(name, arguments, context).await?;
                Ok(StatementResult::Value(Value::Null))
            }
            Statement::Expression(expr) => Ok(StatementResult::Value(
                self.eval_expression(expr, context).await?,
            )),
            Statement::Return(expr) => Ok(StatementResult::Control(ControlFlow::Return(
                self.eval_expression(expr, context).await?,
            ))),
            Statement::Block(block) => self.eval_block(&block.statements, context).await,
            Statement::Set { name, value } => {
                self.eval_set(name, value, context).await?;
                Ok(StatementResult::Value(Value::Null))
            }
            Statement::Log(expr) => {
                self.eval_log(expr, context).await?;
                Ok(StatementResult::Value(Value::Null))
            }
            Statement::Export(name) => {
                // a rule's locals are gone once it returns
                let snapshot = if context.is_global() {
                    None
                } else {
                    context.lookup_local(name)
                };
                context.run().mark_export(name, snapshot);
                Ok(StatementResult::Value(Value::Null))
            }
        }
    }

    /// Runs `statements` in order. A `RETURN` stops the block and is passed up unchanged;
    /// otherwise the block yields the value of its last statement.
    #[async_recursion]
    pub async fn eval_block(
        &self,
        statements: &[Statement],
        context: Arc<ExecutionContext>,
    ) -> EvalResult<StatementResult> {
        let mut last = StatementResult::Value(Value::Null);
        for statement in statements {
            last = self.eval_statement(statement, context.clone()).await?;
            if let StatementResult::Control(_) = last {
                break;
            }
        }
        Ok(last)
    }

    async fn eval_set(
        &self,
        name: &str,
        value: &Expression,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<()> {
        let value = self.eval_expression(value, context.clone()).await?;
        context.set(name, value);
        Ok(())
    }

    /// Forwards the stringified value to the log sink. A failing sink only costs a warning.
    async fn eval_log(&self, expr: &Expression, context: Arc<ExecutionContext>) -> EvalResult<()> {
        let value = self.eval_expression(expr, context.clone()).await?;
        let message = value.to_string();
        if let Err(e) = self.log_sink().log(LogLevel::Info, &message).await {
            warn!("log sink failed: {}", e);
            context
                .run()
                .warn(Diagnostic::warning(format!("LOG failed: {}", e)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOperator, Block};
    use crate::config::ExecutionOptions;
    use crate::eval::context::RunState;
    use crate::log_sink::{MockLogSink, SinkError};
    use std::collections::HashMap;
    use uuid::Uuid;

    fn global() -> Arc<ExecutionContext> {
        ExecutionContext::new_global(
            HashMap::new(),
            Arc::new(RunState::new(Uuid::new_v4(), ExecutionOptions::default())),
        )
    }

    #[tokio::test]
    async fn test_block_stops_at_return() {
        let evaluator = Evaluator::default();
        let context = global();
        let block = vec![
            Statement::Set {
                name: "a".to_string(),
                value: Expression::number(1.0),
            },
            Statement::Block(Block::new(vec![Statement::Return(Expression::variable("a"))])),
            Statement::Set {
                name: "a".to_string(),
                value: Expression::number(2.0),
            },
        ];
        let result = evaluator.eval_block(&block, context.clone()).await.unwrap();
        assert_eq!(
            result,
            StatementResult::Control(ControlFlow::Return(Value::Number(1.0)))
        );
        assert_eq!(context.get("a").unwrap(), Value::Number(1.0));
    }

    #[tokio::test]
    async fn test_block_yields_last_value() {
        let evaluator = Evaluator::default();
        let block = vec![
            Statement::Expression(Expression::number(1.0)),
            Statement::Expression(Expression::binary(
                BinaryOperator::Add,
                Expression::number(1.0),
                Expression::number(2.0),
            )),
        ];
        let result = evaluator.eval_block(&block, global()).await.unwrap();
        assert_eq!(result.into_value(), Value::Number(3.0));
    }

    #[tokio::test]
    async fn test_export_marks_name() {
        let evaluator = Evaluator::default();
        let context = global();
        evaluator
            .eval_statement(&Statement::Export("x".to_string()), context.clone())
            .await
            .unwrap();
        assert_eq!(context.run().exports(), vec![("x".to_string(), None)]);
    }

    #[tokio::test]
    async fn test_export_in_rule_pins_local_value() {
        let evaluator = Evaluator::default();
        let global = global();
        let local = global.create_child([("t".to_string(), Value::Number(5.0))]);
        evaluator
            .eval_statement(&Statement::Export("t".to_string()), local)
            .await
            .unwrap();
        let other = global.create_child(Vec::new());
        evaluator
            .eval_statement(&Statement::Export("g".to_string()), other)
            .await
            .unwrap();
        assert_eq!(
            global.run().exports(),
            vec![
                ("t".to_string(), Some(Value::Number(5.0))),
                ("g".to_string(), None)
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_sink_is_a_warning() {
        let mut sink = MockLogSink::new();
        sink.expect_log()
            .times(1)
            .returning(|_, _| Err(SinkError::Unavailable("down".to_string())));
        let evaluator = Evaluator::default().with_log_sink(Arc::new(sink));
        let context = global();
        let result = evaluator
            .eval_statement(&Statement::Log(Expression::string("hi")), context.clone())
            .await;
        assert!(result.is_ok());
        let warnings = context.run().take_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("down"));
    }
}
