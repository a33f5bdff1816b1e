//! One-stop embedding surface: parse cache, function registry, evaluator and formatter
//! configured from a single [`EngineConfig`].

use std::sync::Arc;

use tracing::debug;

use crate::{
    analysis::{analyze, ProgramAnalysis},
    ast::Program,
    ast_registry::{AstRegistry, Validation},
    config::{EngineConfig, ExecutionOptions},
    error::{RuleResult, SyntaxError},
    eval::{
        report::ExecutionReport,
        Evaluator, Variables,
    },
    formatter::Formatter,
    function_registry::{FunctionRegistry, HostService},
    log_sink::{LogSink, TracingLogSink},
};

#[derive(Clone)]
pub struct RuleEngine {
    asts: AstRegistry,
    evaluator: Evaluator,
    formatter: Formatter,
    options: ExecutionOptions,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl RuleEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(FunctionRegistry::with_builtins()),
            Arc::new(TracingLogSink),
        )
    }

    /// An engine using the given registry and log sink instead of the defaults.
    pub fn with_collaborators(
        config: EngineConfig,
        registry: Arc<FunctionRegistry>,
        log_sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            asts: AstRegistry::new(config.parser),
            evaluator: Evaluator::new(registry, log_sink),
            formatter: Formatter::new(config.formatter),
            options: config.execution,
        }
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        self.evaluator.registry()
    }

    pub fn parse(&self, source: &str) -> Result<Arc<Program>, SyntaxError> {
        self.asts.parse(source)
    }

    /// Runs an already parsed program with the engine's default options.
    pub async fn execute(&self, program: &Program, variables: Variables) -> ExecutionReport {
        self.evaluator
            .execute(program, variables, &self.options)
            .await
    }

    pub async fn execute_with(
        &self,
        program: &Program,
        variables: Variables,
        options: &ExecutionOptions,
    ) -> ExecutionReport {
        self.evaluator.execute(program, variables, options).await
    }

    /// Parses (through the cache) and executes. A syntax error stops before anything runs.
    pub async fn run(&self, source: &str, variables: Variables) -> RuleResult<ExecutionReport> {
        let program = self.parse(source)?;
        debug!(statements = program.statements.len(), "parsed");
        Ok(self.execute(&program, variables).await)
    }

    pub fn validate(&self, source: &str) -> Validation {
        self.asts.validate(source)
    }

    pub fn analyze(&self, source: &str) -> RuleResult<ProgramAnalysis> {
        let program = self.parse(source)?;
        Ok(analyze(&program))
    }

    pub fn format(&self, source: &str) -> RuleResult<String> {
        let program = self.parse(source)?;
        Ok(self.formatter.format(&program)?)
    }

    pub fn clear_cache(&self) {
        self.asts.clear_cache();
    }

    pub fn cache_len(&self) -> usize {
        self.asts.cache_len()
    }

    pub fn bind_host_service(&self, name: impl Into<String>, service: impl HostService + 'static) {
        self.evaluator.bind_host_service(name, service);
    }

    pub fn unbind_host_service(&self, name: &str) -> bool {
        self.registry().unbind_host_service(name)
    }
}
