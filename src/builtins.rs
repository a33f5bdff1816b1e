//! Default native functions. A small set that demonstrates the registry boundary; hosts add
//! their own with [`FunctionRegistry::register_native`].

use async_trait::async_trait;

use crate::{
    eval::{context::ExecutionContext, value::Value},
    function_registry::{Arity, FunctionError, FunctionRegistry, FunctionResult, NativeFunction},
};

/// A builtin that only looks at its arguments.
struct PureBuiltin {
    arity: Arity,
    f: fn(&[Value]) -> FunctionResult,
}

#[async_trait]
impl NativeFunction for PureBuiltin {
    fn arity(&self) -> Arity {
        self.arity
    }

    async fn call(&self, arguments: Vec<Value>, _context: &ExecutionContext) -> FunctionResult {
        (self.f)(&arguments)
    }
}

/// `SETVAR(name, value)` binds `name` in the scope of the caller. The scope arrives with each
/// call; the builtin itself holds nothing between calls.
struct SetVar;

#[async_trait]
impl NativeFunction for SetVar {
    fn arity(&self) -> Arity {
        Arity::Exact(2)
    }

    async fn call(&self, arguments: Vec<Value>, context: &ExecutionContext) -> FunctionResult {
        let mut arguments = arguments.into_iter();
        let name = match arguments.next() {
            Some(Value::String(name)) if !name.is_empty() => name,
            other => {
                return Err(FunctionError::InvalidArgument(format!(
                    "SETVAR expects a variable name, got {}",
                    other.as_ref().map_or("nothing", Value::type_name)
                )))
            }
        };
        let value = arguments.next().unwrap_or_default();
        context.set(name, value.clone());
        Ok(value)
    }
}

pub fn register_builtins(registry: &FunctionRegistry) {
    let pure: [(&str, Arity, fn(&[Value]) -> FunctionResult); 8] = [
        ("SUM", Arity::Any, sum),
        ("AVG", Arity::Any, avg),
        ("MIN", Arity::AtLeast(1), min),
        ("MAX", Arity::AtLeast(1), max),
        ("ABS", Arity::Exact(1), abs),
        ("ROUND", Arity::Between(1, 2), round),
        ("LEN", Arity::Exact(1), len),
        ("CONCAT", Arity::Any, concat),
    ];
    for (name, arity, f) in pure {
        registry.register_native(name, PureBuiltin { arity, f });
    }
    registry.register_native("SETVAR", SetVar);
}

/// Arguments as numbers, with list arguments spread one level.
fn numbers(arguments: &[Value]) -> Vec<f64> {
    let mut numbers = Vec::with_capacity(arguments.len());
    for argument in arguments {
        match argument {
            Value::List(items) => numbers.extend(items.iter().map(Value::to_number)),
            other => numbers.push(other.to_number()),
        }
    }
    numbers
}

fn sum(arguments: &[Value]) -> FunctionResult {
    Ok(Value::Number(numbers(arguments).iter().sum()))
}

fn avg(arguments: &[Value]) -> FunctionResult {
    let numbers = numbers(arguments);
    if numbers.is_empty() {
        return Ok(Value::Number(0.0));
    }
    Ok(Value::Number(
        numbers.iter().sum::<f64>() / numbers.len() as f64,
    ))
}

fn min(arguments: &[Value]) -> FunctionResult {
    Ok(numbers(arguments)
        .into_iter()
        .reduce(f64::min)
        .map_or(Value::Null, Value::Number))
}

fn max(arguments: &[Value]) -> FunctionResult {
    Ok(numbers(arguments)
        .into_iter()
        .reduce(f64::max)
        .map_or(Value::Null, Value::Number))
}

fn abs(arguments: &[Value]) -> FunctionResult {
    Ok(Value::Number(
        arguments.first().map_or(0.0, Value::to_number).abs(),
    ))
}

/// Rounds half away from zero to the given number of decimal places (default 0).
fn round(arguments: &[Value]) -> FunctionResult {
    let x = arguments.first().map_or(0.0, Value::to_number);
    let digits = arguments.get(1).map_or(0.0, Value::to_number);
    if !digits.is_finite() || digits.fract() != 0.0 || !(0.0..=15.0).contains(&digits) {
        return Err(FunctionError::InvalidArgument(format!(
            "ROUND digits must be an integer between 0 and 15, got {}",
            digits
        )));
    }
    let factor = 10f64.powi(digits as i32);
    Ok(Value::Number((x * factor).round() / factor))
}

fn len(arguments: &[Value]) -> FunctionResult {
    match arguments.first() {
        Some(Value::String(s)) => Ok(Value::Number(s.chars().count() as f64)),
        Some(Value::List(items)) => Ok(Value::Number(items.len() as f64)),
        Some(Value::Record(fields)) => Ok(Value::Number(fields.len() as f64)),
        Some(Value::Null) | None => Ok(Value::Number(0.0)),
        Some(other) => Err(FunctionError::InvalidArgument(format!(
            "LEN is not defined for a {}",
            other.type_name()
        ))),
    }
}

fn concat(arguments: &[Value]) -> FunctionResult {
    Ok(Value::String(
        arguments.iter().map(|value| value.to_string()).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ExecutionOptions,
        eval::context::RunState,
        function_registry::Resolution,
    };
    use std::{collections::HashMap, sync::Arc};
    use uuid::Uuid;

    fn context() -> Arc<ExecutionContext> {
        ExecutionContext::new_global(
            HashMap::new(),
            Arc::new(RunState::new(Uuid::new_v4(), ExecutionOptions::default())),
        )
    }

    async fn call(name: &str, arguments: Vec<Value>) -> FunctionResult {
        let registry = FunctionRegistry::with_builtins();
        match registry.resolve(name) {
            Resolution::Native(function) => {
                assert!(function.arity().accepts(arguments.len()));
                function.call(arguments, &context()).await
            }
            other => panic!("{} resolved to {:?}", name, other),
        }
    }

    fn list(numbers: &[f64]) -> Value {
        Value::List(numbers.iter().copied().map(Value::Number).collect())
    }

    #[tokio::test]
    async fn test_aggregates() {
        assert_eq!(
            call("SUM", vec![Value::Number(1.0), list(&[2.0, 3.0])])
                .await
                .unwrap(),
            Value::Number(6.0)
        );
        assert_eq!(
            call("AVG", vec![list(&[1.0, 2.0, 6.0])]).await.unwrap(),
            Value::Number(3.0)
        );
        assert_eq!(call("AVG", vec![]).await.unwrap(), Value::Number(0.0));
        assert_eq!(
            call("MIN", vec![Value::Number(4.0), list(&[-1.0, 9.0])])
                .await
                .unwrap(),
            Value::Number(-1.0)
        );
        assert_eq!(
            call("MAX", vec![list(&[4.0, 9.0])]).await.unwrap(),
            Value::Number(9.0)
        );
        assert_eq!(call("MAX", vec![list(&[])]).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_scalars() {
        assert_eq!(
            call("ABS", vec![Value::Number(-2.5)]).await.unwrap(),
            Value::Number(2.5)
        );
        assert_eq!(
            call("ROUND", vec![Value::Number(2.346), Value::Number(2.0)])
                .await
                .unwrap(),
            Value::Number(2.35)
        );
        assert_eq!(
            call("ROUND", vec![Value::Number(-2.5)]).await.unwrap(),
            Value::Number(-3.0)
        );
        assert!(call("ROUND", vec![Value::Number(1.0), Value::Number(0.5)])
            .await
            .is_err());
        assert_eq!(
            call("LEN", vec![Value::from("héllo")]).await.unwrap(),
            Value::Number(5.0)
        );
        assert!(call("LEN", vec![Value::Boolean(true)]).await.is_err());
        assert_eq!(
            call("CONCAT", vec![Value::from("a"), Value::Number(1.0), Value::Null])
                .await
                .unwrap(),
            Value::from("a1null")
        );
    }

    #[tokio::test]
    async fn test_setvar_writes_the_given_context() {
        let global = context();
        let local = global.create_child([]);
        SetVar
            .call(vec![Value::from("x"), Value::Number(7.0)], &local)
            .await
            .unwrap();
        assert_eq!(local.get("x").unwrap(), Value::Number(7.0));
        assert!(global.lookup("x").is_none());

        let err = SetVar
            .call(vec![Value::Number(1.0), Value::Null], &global)
            .await
            .unwrap_err();
        assert!(matches!(err, FunctionError::InvalidArgument(_)));
    }
}
