use std::{collections::BTreeMap, sync::Arc};

use async_recursion::async_recursion;
use futures::future::BoxFuture;
use tracing::debug;

use super::{
    context::{ExecutionContext, RunState},
    evaluator::Evaluator,
    value::Value,
};
use crate::ast::{BinaryOperator, Expression, FunctionDef, MemberProperty, UnaryOperator};
use crate::error::{EvalError, EvalResult};
use crate::function_registry::{Arity, Resolution};
use crate::stack::GrowingStack;

impl Evaluator {
    pub fn eval_expression<'a>(
        &'a self,
        expr: &'a Expression,
        context: Arc<ExecutionContext>,
    ) -> GrowingStack<BoxFuture<'a, EvalResult<Value>>> {
        GrowingStack::new(self.eval_expression_node(expr, context))
    }

    #[async_recursion]
    async fn eval_expression_node(
        &self,
        expr: &Expression,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        context.run().check_deadline()?;
        match expr {
            Expression::Literal(literal) => Ok(Value::from(literal)),
            Expression::Variable(name) => context.get(name),
            Expression::Binary { .. } => self.eval_binary_chain(expr, context).await,
            Expression::Unary { op, operand } => {
                let operand = self.eval_expression(operand, context).await?;
                Ok(eval_unary(*op, &operand))
            }
            Expression::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                // only the selected branch runs
                let condition = self.eval_expression(condition, context.clone()).await?;
                if condition.is_truthy() {
                    self.eval_expression(then_branch, context).await
                } else {
                    self.eval_expression(else_branch, context).await
                }
            }
            Expression::FunctionCall {
                function,
                arguments,
            } => self.eval_call(function, arguments, context).await,
            Expression::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval_expression(element, context.clone()).await?);
                }
                Ok(Value::List(values))
            }
            Expression::Member { object, property } => {
                let object = self.eval_expression(object, context.clone()).await?;
                let key = match property {
                    MemberProperty::Named(name) => Value::String(name.clone()),
                    MemberProperty::Computed(index) => {
                        self.eval_expression(index, context).await?
                    }
                };
                member(&object, &key)
            }
        }
    }

    /// Binary operators nest on the left, so a long chain like `a + b + c + ...` is walked
    /// down its left spine instead of recursing once per operator. Both operands are always
    /// evaluated, left first, `AND` and `OR` included.
    async fn eval_binary_chain(
        &self,
        expr: &Expression,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        let mut spine = Vec::new();
        let mut current = expr;
        while let Expression::Binary { op, left, right } = current {
            spine.push((*op, right.as_ref()));
            current = left;
        }

        let mut accumulated = self.eval_expression(current, context.clone()).await?;
        for (op, right) in spine.into_iter().rev() {
            let right = self.eval_expression(right, context.clone()).await?;
            accumulated = eval_binary(op, &accumulated, &right);
        }
        Ok(accumulated)
    }

    /// Evaluates the arguments left to right, then dispatches: user-defined functions first,
    /// then the registry.
    pub(crate) async fn eval_call(
        &self,
        name: &str,
        arguments: &[Expression],
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            values.push(self.eval_expression(argument, context.clone()).await?);
        }
        context.run().check_deadline()?;

        if let Some(def) = context.run().function(name) {
            return self.call_user_function(&def, values, context).await;
        }

        match self.registry().resolve(name) {
            Resolution::Native(function) => {
                check_arity(name, function.arity(), values.len())?;
                let _guard = context.push_call(name, &values)?;
                let run = context.run().clone();
                match tokio::time::timeout(run.remaining(), function.call(values, &context)).await
                {
                    Ok(result) => result.map_err(|e| host_failure(name, e.to_string(), &run)),
                    Err(_) => Err(run.timeout_error()),
                }
            }
            Resolution::Host { service, arity } => {
                check_arity(name, arity, values.len())?;
                let _guard = context.push_call(name, &values)?;
                let run = context.run().clone();
                match tokio::time::timeout(run.remaining(), service.invoke(values)).await {
                    Ok(result) => result.map_err(|e| host_failure(name, e.to_string(), &run)),
                    Err(_) => Err(run.timeout_error()),
                }
            }
            Resolution::Unbound => Err(EvalError::Configuration(name.to_string())),
            Resolution::NotFound => Err(EvalError::UndefinedFunction(name.to_string())),
        }
    }

    /// Binds the parameters in a fresh child of the global scope and runs the body. Errors
    /// leaving the body are annotated with the function name.
    async fn call_user_function(
        &self,
        def: &FunctionDef,
        arguments: Vec<Value>,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        check_arity(&def.name, Arity::Exact(def.parameters.len()), arguments.len())?;
        let _guard = context.push_call(&def.name, &arguments)?;
        debug!(function = %def.name, "enter rule");

        let child = context.create_child(def.parameters.iter().cloned().zip(arguments));
        match self.eval_block(&def.body.statements, child).await {
            Ok(result) => Ok(result.into_value()),
            Err(e) => {
                context.run().record_failure_stack();
                Err(EvalError::in_function(def.name.clone(), e))
            }
        }
    }
}

/// A builtin or host service failed. The failure keeps the callee's name.
fn host_failure(name: &str, message: String, run: &RunState) -> EvalError {
    run.record_failure_stack();
    EvalError::in_function(name, EvalError::Runtime(message))
}

fn check_arity(name: &str, arity: Arity, actual: usize) -> EvalResult<()> {
    if arity.accepts(actual) {
        Ok(())
    } else {
        Err(EvalError::Arity {
            function: name.to_string(),
            expected: arity.to_string(),
            actual,
        })
    }
}

pub fn eval_unary(op: UnaryOperator, operand: &Value) -> Value {
    match op {
        UnaryOperator::Plus => Value::Number(operand.to_number()),
        UnaryOperator::Minus => Value::Number(-operand.to_number()),
        UnaryOperator::Not => Value::Boolean(!operand.is_truthy()),
    }
}

pub fn eval_binary(op: BinaryOperator, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOperator::Add => match (left, right) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Value::String(format!("{}{}", left, right))
            }
            _ => Value::Number(left.to_number() + right.to_number()),
        },
        BinaryOperator::Subtract => Value::Number(left.to_number() - right.to_number()),
        BinaryOperator::Multiply => Value::Number(left.to_number() * right.to_number()),
        BinaryOperator::Divide => {
            let divisor = right.to_number();
            if divisor == 0.0 {
                Value::Number(0.0)
            } else {
                Value::Number(left.to_number() / divisor)
            }
        }
        BinaryOperator::Modulo => {
            let divisor = right.to_number();
            if divisor == 0.0 {
                Value::Number(0.0)
            } else {
                Value::Number(left.to_number() % divisor)
            }
        }
        BinaryOperator::Power => Value::Number(left.to_number().powf(right.to_number())),
        BinaryOperator::Equal => Value::Boolean(left == right),
        BinaryOperator::NotEqual => Value::Boolean(left != right),
        BinaryOperator::LessThan => compare(left, right, |o| o.is_lt()),
        BinaryOperator::LessThanEqual => compare(left, right, |o| o.is_le()),
        BinaryOperator::GreaterThan => compare(left, right, |o| o.is_gt()),
        BinaryOperator::GreaterThanEqual => compare(left, right, |o| o.is_ge()),
        BinaryOperator::And => Value::Boolean(left.is_truthy() && right.is_truthy()),
        BinaryOperator::Or => Value::Boolean(left.is_truthy() || right.is_truthy()),
    }
}

/// Orders two numbers or two strings; any other pairing compares false.
fn compare(left: &Value, right: &Value, test: fn(std::cmp::Ordering) -> bool) -> Value {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };
    Value::Boolean(ordering.is_some_and(test))
}

/// Lists take integer indexes, records take keys. Missing members and a null object give
/// `null`.
fn member(object: &Value, key: &Value) -> EvalResult<Value> {
    match object {
        Value::Null => Ok(Value::Null),
        Value::List(items) => Ok(list_index(key)
            .and_then(|index| items.get(index))
            .cloned()
            .unwrap_or_default()),
        Value::Record(fields) => Ok(record_field(fields, key)),
        other => Err(EvalError::Runtime(format!(
            "cannot read member '{}' of a {}",
            key,
            other.type_name()
        ))),
    }
}

fn list_index(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
        _ => None,
    }
}

fn record_field(fields: &BTreeMap<String, Value>, key: &Value) -> Value {
    fields.get(&key.to_string()).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;
    use crate::config::ExecutionOptions;
    use crate::eval::context::RunState;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn global(variables: HashMap<String, Value>) -> Arc<ExecutionContext> {
        ExecutionContext::new_global(
            variables,
            Arc::new(RunState::new(Uuid::new_v4(), ExecutionOptions::default())),
        )
    }

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn test_division_by_zero_is_zero() {
        assert_eq!(eval_binary(BinaryOperator::Divide, &num(10.0), &num(0.0)), num(0.0));
        assert_eq!(eval_binary(BinaryOperator::Modulo, &num(10.0), &num(0.0)), num(0.0));
        assert_eq!(
            eval_binary(BinaryOperator::Divide, &num(1.0), &Value::Null),
            num(0.0)
        );
        assert_eq!(eval_binary(BinaryOperator::Divide, &num(9.0), &num(3.0)), num(3.0));
    }

    #[test]
    fn test_addition_concatenates_strings() {
        assert_eq!(
            eval_binary(BinaryOperator::Add, &Value::from("n="), &num(5.0)),
            Value::from("n=5")
        );
        assert_eq!(
            eval_binary(BinaryOperator::Add, &Value::Boolean(true), &num(1.0)),
            num(2.0)
        );
    }

    #[test]
    fn test_strict_equality() {
        assert_eq!(
            eval_binary(BinaryOperator::Equal, &num(1.0), &Value::from("1")),
            Value::Boolean(false)
        );
        assert_eq!(
            eval_binary(BinaryOperator::NotEqual, &Value::Null, &Value::Boolean(false)),
            Value::Boolean(true)
        );
        assert_eq!(
            eval_binary(BinaryOperator::Equal, &Value::from("a"), &Value::from("a")),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_relational_needs_matching_types() {
        assert_eq!(
            eval_binary(BinaryOperator::LessThan, &num(1.0), &num(2.0)),
            Value::Boolean(true)
        );
        assert_eq!(
            eval_binary(BinaryOperator::LessThan, &Value::from("a"), &Value::from("b")),
            Value::Boolean(true)
        );
        assert_eq!(
            eval_binary(BinaryOperator::LessThan, &num(1.0), &Value::from("2")),
            Value::Boolean(false)
        );
        assert_eq!(
            eval_binary(BinaryOperator::GreaterThanEqual, &num(f64::NAN), &num(1.0)),
            Value::Boolean(false)
        );
    }

    #[test]
    fn test_logical_and_unary() {
        assert_eq!(
            eval_binary(BinaryOperator::And, &num(1.0), &Value::from("")),
            Value::Boolean(false)
        );
        assert_eq!(
            eval_binary(BinaryOperator::Or, &Value::Null, &num(2.0)),
            Value::Boolean(true)
        );
        assert_eq!(eval_unary(UnaryOperator::Minus, &Value::from("3")), num(-3.0));
        assert_eq!(eval_unary(UnaryOperator::Not, &num(0.0)), Value::Boolean(true));
    }

    #[test]
    fn test_member_access() {
        let list = Value::List(vec![num(1.0), num(2.0)]);
        assert_eq!(member(&list, &num(1.0)).unwrap(), num(2.0));
        assert_eq!(member(&list, &num(5.0)).unwrap(), Value::Null);
        assert_eq!(member(&list, &num(0.5)).unwrap(), Value::Null);

        let record = Value::Record(BTreeMap::from([("a".to_string(), num(1.0))]));
        assert_eq!(member(&record, &Value::from("a")).unwrap(), num(1.0));
        assert_eq!(member(&record, &Value::from("b")).unwrap(), Value::Null);
        assert_eq!(member(&Value::Null, &Value::from("a")).unwrap(), Value::Null);
        assert!(member(&num(1.0), &Value::from("a")).is_err());
    }

    #[tokio::test]
    async fn test_conditional_evaluates_one_branch() {
        let evaluator = Evaluator::default();
        let context = global(HashMap::new());
        // the untaken branch would fail on an undefined variable
        let expr = Expression::Conditional {
            condition: Box::new(Expression::Literal(Literal::Boolean(true))),
            then_branch: Box::new(Expression::number(1.0)),
            else_branch: Box::new(Expression::variable("missing")),
        };
        assert_eq!(evaluator.eval_expression(&expr, context).await.unwrap(), num(1.0));
    }

    #[tokio::test]
    async fn test_logical_operators_evaluate_both_sides() {
        let evaluator = Evaluator::default();
        let context = global(HashMap::new());
        let expr = Expression::binary(
            BinaryOperator::And,
            Expression::Literal(Literal::Boolean(false)),
            Expression::FunctionCall {
                function: "SETVAR".to_string(),
                arguments: vec![Expression::string("touched"), Expression::number(1.0)],
            },
        );
        assert_eq!(
            evaluator.eval_expression(&expr, context.clone()).await.unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(context.get("touched").unwrap(), num(1.0));
    }

    #[tokio::test]
    async fn test_long_chain() {
        let evaluator = Evaluator::default();
        let expr = (0..5000).fold(Expression::number(0.0), |acc, _| {
            Expression::binary(BinaryOperator::Add, acc, Expression::number(1.0))
        });
        assert_eq!(
            evaluator
                .eval_expression(&expr, global(HashMap::new()))
                .await
                .unwrap(),
            num(5000.0)
        );
    }

    #[tokio::test]
    async fn test_undefined_names() {
        let evaluator = Evaluator::default();
        let context = global(HashMap::from([("x".to_string(), num(1.0))]));
        assert_eq!(
            evaluator
                .eval_expression(&Expression::variable("y"), context.clone())
                .await
                .unwrap_err(),
            EvalError::UndefinedVariable("y".to_string())
        );
        let call = Expression::FunctionCall {
            function: "NOPE".to_string(),
            arguments: vec![],
        };
        assert_eq!(
            evaluator.eval_expression(&call, context.clone()).await.unwrap_err(),
            EvalError::UndefinedFunction("NOPE".to_string())
        );
        let unbound = Expression::FunctionCall {
            function: "GET_MEMBER".to_string(),
            arguments: vec![Expression::string("h"), Expression::string("m")],
        };
        assert_eq!(
            evaluator.eval_expression(&unbound, context).await.unwrap_err(),
            EvalError::Configuration("GET_MEMBER".to_string())
        );
    }
}
