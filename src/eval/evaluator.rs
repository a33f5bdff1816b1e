use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;

use super::{
    context::{ExecutionContext, RunState},
    report::{Diagnostic, Diagnostics, ExecutionReport, RunStatus, Severity},
    statement::StatementResult,
    value::Value,
    Variables,
};
use crate::{
    ast::{Program, Statement},
    config::ExecutionOptions,
    error::{ErrorKind, EvalError},
    function_registry::{FunctionRegistry, HostService},
    log_sink::{LogSink, TracingLogSink},
};

/// Tree-walking interpreter. Holds only the function registry and the log sink; everything a
/// run mutates lives in contexts created by [`Evaluator::execute`], so one evaluator can serve
/// any number of concurrent runs.
#[derive(Clone)]
pub struct Evaluator {
    registry: Arc<FunctionRegistry>,
    log_sink: Arc<dyn LogSink>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(
            Arc::new(FunctionRegistry::with_builtins()),
            Arc::new(TracingLogSink),
        )
    }
}

impl Evaluator {
    pub fn new(registry: Arc<FunctionRegistry>, log_sink: Arc<dyn LogSink>) -> Self {
        Self { registry, log_sink }
    }

    pub fn with_log_sink(mut self, log_sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = log_sink;
        self
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    pub fn log_sink(&self) -> &Arc<dyn LogSink> {
        &self.log_sink
    }

    pub fn bind_host_service(&self, name: impl Into<String>, service: impl HostService + 'static) {
        self.registry.bind_host_service(name, service);
    }

    /// Runs `program` against `variables`. Runtime failures are reported in the returned
    /// report, never raised.
    pub async fn execute(
        &self,
        program: &Program,
        variables: Variables,
        options: &ExecutionOptions,
    ) -> ExecutionReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("execute", %run_id);
        self.execute_run(run_id, program, variables, options)
            .instrument(span)
            .await
    }

    async fn execute_run(
        &self,
        run_id: Uuid,
        program: &Program,
        variables: Variables,
        options: &ExecutionOptions,
    ) -> ExecutionReport {
        let run = Arc::new(RunState::new(run_id, options.clone()));
        if let Err(e) = options.validate() {
            let error = Diagnostic::error(ErrorKind::ConfigurationError, e.to_string());
            return finish(&run, RunStatus::Failed, Vec::new(), BTreeMap::new(), Some(error));
        }
        let global = ExecutionContext::new_global(variables, run.clone());

        debug!(status = %RunStatus::Registering);
        for statement in &program.statements {
            if let Statement::FunctionDefinition(def) = statement {
                if run.define_function(def.clone()) {
                    warn!(rule = %def.name, "rule redefined");
                    run.warn(Diagnostic::warning(format!(
                        "RULE '{}' is defined more than once; the last definition wins",
                        def.name
                    )));
                }
            }
        }

        debug!(status = %RunStatus::Running);
        let mut results = Vec::new();
        let mut failure: Option<EvalError> = None;
        for statement in &program.statements {
            if let Statement::FunctionDefinition(_) = statement {
                continue;
            }
            match self.eval_statement(statement, global.clone()).await {
                Ok(StatementResult::Value(value)) => {
                    if matches!(statement, Statement::Expression(_)) && !value.is_null() {
                        results.push(value);
                    }
                }
                Ok(StatementResult::Control(_)) => {}
                Err(e) if options.continue_on_error && !e.is_fatal() => {
                    warn!(error = %e, "statement failed, continuing");
                    run.take_failure_stack();
                    run.warn(Diagnostic::from_eval(&e, Severity::Warning));
                }
                Err(e) => {
                    error!(error = %e, kind = %e.kind(), "run failed");
                    failure = Some(e);
                    break;
                }
            }
        }

        let status = match &failure {
            None => RunStatus::Completed,
            Some(e) if e.kind() == ErrorKind::TimeoutError => RunStatus::TimedOut,
            Some(_) => RunStatus::Failed,
        };

        let keep = failure.is_none() || options.partial_results;
        let exports = if keep {
            collect_exports(&run, &global)
        } else {
            BTreeMap::new()
        };
        if !keep {
            results.clear();
        }
        let error = failure
            .as_ref()
            .map(|e| Diagnostic::from_eval(e, Severity::Error));
        finish(&run, status, results, exports, error)
    }
}

/// Resolves every exported name: a value pinned inside a rule, else the global scope. A name
/// that was never assigned exports `null` with a warning.
fn collect_exports(run: &RunState, global: &ExecutionContext) -> BTreeMap<String, Value> {
    run.exports()
        .into_iter()
        .map(|(name, snapshot)| {
            let value = snapshot.or_else(|| global.lookup(&name)).unwrap_or_else(|| {
                run.warn(Diagnostic::warning(format!(
                    "exported variable '{}' was never assigned",
                    name
                )));
                Value::Null
            });
            (name, value)
        })
        .collect()
}

fn finish(
    run: &RunState,
    status: RunStatus,
    results: Vec<Value>,
    exports: BTreeMap<String, Value>,
    error: Option<Diagnostic>,
) -> ExecutionReport {
    let elapsed_ms = run.elapsed().as_millis() as u64;
    debug!(%status, elapsed_ms, "run finished");
    let call_stack = if error.is_some() {
        run.take_failure_stack()
    } else {
        Vec::new()
    };
    ExecutionReport {
        run_id: run.run_id(),
        success: status == RunStatus::Completed,
        status,
        results,
        exports,
        diagnostics: Diagnostics {
            warnings: run.take_warnings(),
            errors: error.iter().cloned().collect(),
            trace: run.take_trace(),
            call_stack,
        },
        elapsed_ms,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast_registry::AstRegistry;
    use crate::log_sink::MemoryLogSink;
    use std::time::Duration;

    async fn run(source: &str, options: &ExecutionOptions) -> ExecutionReport {
        let program = AstRegistry::default().parse_uncached(source).unwrap();
        Evaluator::default()
            .execute(&program, Variables::new(), options)
            .await
    }

    #[tokio::test]
    async fn test_forward_references() {
        let report = run(
            "SET r = CALL FIRST(2); EXPORT r;\n\
             RULE FIRST(x) RETURN SECOND(x) * 10; ENDRULE\n\
             RULE SECOND(x) RETURN x + 1; ENDRULE",
            &ExecutionOptions::default(),
        )
        .await;
        assert!(report.success, "{:?}", report.error);
        assert_eq!(report.export("r"), Some(&Value::Number(30.0)));
    }

    #[tokio::test]
    async fn test_results_are_non_null_expression_values() {
        let report = run(
            "1 + 1; NULL; SET a = 5; \"x\"; CALL SUM(1, 2);",
            &ExecutionOptions::default(),
        )
        .await;
        assert_eq!(
            report.results,
            vec![Value::Number(2.0), Value::String("x".to_string())]
        );
        assert_eq!(report.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_duplicate_rule_last_wins() {
        let report = run(
            "RULE F() RETURN 1; ENDRULE RULE F() RETURN 2; ENDRULE F()",
            &ExecutionOptions::default(),
        )
        .await;
        assert_eq!(report.results, vec![Value::Number(2.0)]);
        assert_eq!(report.diagnostics.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_user_function_shadows_builtin() {
        let report = run(
            "RULE SUM(a, b) RETURN a - b; ENDRULE SUM(5, 3)",
            &ExecutionOptions::default(),
        )
        .await;
        assert_eq!(report.results, vec![Value::Number(2.0)]);
    }

    #[tokio::test]
    async fn test_function_sees_globals_not_caller_locals() {
        let report = run(
            "SET g = 1;\n\
             RULE INNER() RETURN CALL SETVAR(\"seen\", 1) + g; ENDRULE\n\
             RULE OUTER() SET local = 5; RETURN INNER(); ENDRULE\n\
             RULE PEEK() RETURN local; ENDRULE\n\
             OUTER();\n\
             CALL PEEK();",
            &ExecutionOptions::default(),
        )
        .await;
        assert!(!report.success);
        assert_eq!(report.results, Vec::<Value>::new());
        assert_eq!(report.error_kind(), Some(ErrorKind::UndefinedVariableError));
        assert_eq!(
            report.error.unwrap().function_trail,
            vec!["PEEK".to_string()]
        );
        assert_eq!(report.diagnostics.call_stack, vec!["PEEK".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_discards_results_unless_partial() {
        let source = "1; SET x = 2; EXPORT x; missing; 3;";
        let report = run(source, &ExecutionOptions::default()).await;
        assert_eq!(report.status, RunStatus::Failed);
        assert!(report.results.is_empty());
        assert!(report.exports.is_empty());

        let options = ExecutionOptions {
            partial_results: true,
            ..ExecutionOptions::default()
        };
        let report = run(source, &options).await;
        assert_eq!(report.results, vec![Value::Number(1.0)]);
        assert_eq!(report.export("x"), Some(&Value::Number(2.0)));
    }

    #[tokio::test]
    async fn test_continue_on_error() {
        let options = ExecutionOptions::default().with_continue_on_error(true);
        let report = run("1; missing; CALL NOPE(); 2;", &options).await;
        assert!(report.success);
        assert_eq!(report.results, vec![Value::Number(1.0), Value::Number(2.0)]);
        let kinds: Vec<_> = report
            .diagnostics
            .warnings
            .iter()
            .map(|w| w.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                Some(ErrorKind::UndefinedVariableError),
                Some(ErrorKind::UndefinedFunctionError)
            ]
        );
    }

    #[tokio::test]
    async fn test_continue_on_error_stops_on_fatal() {
        let options = ExecutionOptions {
            continue_on_error: true,
            max_same_function_recursion: 1000,
            ..ExecutionOptions::default().with_max_depth(5)
        };
        let report = run(
            "RULE LOOP(n) RETURN LOOP(n + 1); ENDRULE LOOP(0); 7;",
            &options,
        )
        .await;
        assert!(!report.success);
        assert_eq!(report.error_kind(), Some(ErrorKind::StackDepthError));
        assert_eq!(report.diagnostics.call_stack.len(), 4);
    }

    #[tokio::test]
    async fn test_invalid_options_are_a_configuration_error() {
        let options = ExecutionOptions::default().with_timeout(Duration::ZERO);
        let report = run("1", &options).await;
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.error_kind(), Some(ErrorKind::ConfigurationError));
    }

    #[tokio::test]
    async fn test_trace() {
        let options = ExecutionOptions::default().with_trace(true);
        let report = run("RULE F(x) RETURN ABS(x); ENDRULE F(-1)", &options).await;
        let events: Vec<_> = report
            .diagnostics
            .trace
            .iter()
            .map(|event| (event.phase.to_string(), event.function.clone(), event.depth))
            .collect();
        assert_eq!(
            events,
            vec![
                ("Enter".to_string(), "F".to_string(), 1),
                ("Enter".to_string(), "ABS".to_string(), 2),
                ("Exit".to_string(), "ABS".to_string(), 2),
                ("Exit".to_string(), "F".to_string(), 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_log_order() {
        let sink = Arc::new(MemoryLogSink::new());
        let evaluator = Evaluator::default().with_log_sink(sink.clone());
        let program = AstRegistry::default()
            .parse_uncached("LOG \"a\"; LOG 1 + 1; LOG [1, \"b\"];")
            .unwrap();
        let report = evaluator
            .execute(&program, Variables::new(), &ExecutionOptions::default())
            .await;
        assert!(report.success);
        assert_eq!(sink.messages(), vec!["a", "2", "[1,\"b\"]"]);
    }
}
