use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::{
    report::{Diagnostic, TraceEvent, TracePhase},
    value::Value,
};
use crate::{
    ast::FunctionDef,
    config::ExecutionOptions,
    error::{EvalError, EvalResult},
};

/// One active invocation on the call stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallFrame {
    pub name: String,
    pub arguments: Vec<Value>,
    pub timestamp: DateTime<Utc>,
}

/// Bookkeeping shared by every context of one run: the function table, the call stack,
/// the deadline and the diagnostics collected along the way.
#[derive(Debug)]
pub struct RunState {
    run_id: Uuid,
    options: ExecutionOptions,
    started: Instant,
    deadline: Instant,
    functions: DashMap<String, Arc<FunctionDef>>,
    call_stack: Mutex<Vec<CallFrame>>,
    failure_stack: Mutex<Option<Vec<String>>>,
    exports: Mutex<Vec<(String, Option<Value>)>>,
    warnings: Mutex<Vec<Diagnostic>>,
    trace: Mutex<Vec<TraceEvent>>,
}

/// Locks `mutex`, recovering the guard if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RunState {
    pub fn new(run_id: Uuid, options: ExecutionOptions) -> Self {
        let started = Instant::now();
        Self {
            run_id,
            deadline: started + options.timeout,
            options,
            started,
            functions: DashMap::new(),
            call_stack: Mutex::new(Vec::new()),
            failure_stack: Mutex::new(None),
            exports: Mutex::new(Vec::new()),
            warnings: Mutex::new(Vec::new()),
            trace: Mutex::new(Vec::new()),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Fails once the wall-clock budget is spent.
    pub fn check_deadline(&self) -> EvalResult<()> {
        if Instant::now() >= self.deadline {
            return Err(self.timeout_error());
        }
        Ok(())
    }

    pub fn timeout_error(&self) -> EvalError {
        EvalError::Timeout {
            elapsed_ms: self.elapsed().as_millis() as u64,
            timeout_ms: self.options.timeout.as_millis() as u64,
        }
    }

    /// Registers a user-defined function, returning true if it replaced an earlier one.
    pub fn define_function(&self, def: FunctionDef) -> bool {
        self.functions
            .insert(def.name.clone(), Arc::new(def))
            .is_some()
    }

    pub fn function(&self, name: &str) -> Option<Arc<FunctionDef>> {
        self.functions.get(name).map(|entry| entry.value().clone())
    }

    pub fn call_depth(&self) -> usize {
        lock(&self.call_stack).len()
    }

    pub fn call_stack_names(&self) -> Vec<String> {
        lock(&self.call_stack)
            .iter()
            .map(|frame| frame.name.clone())
            .collect()
    }

    /// Remembers the active calls the first time a failure crosses a call boundary.
    pub fn record_failure_stack(&self) {
        let mut failure = lock(&self.failure_stack);
        if failure.is_none() {
            *failure = Some(self.call_stack_names());
        }
    }

    pub fn take_failure_stack(&self) -> Vec<String> {
        lock(&self.failure_stack).take().unwrap_or_default()
    }

    /// Marks `name` for export. A `snapshot` pins the value exported; without one the name is
    /// read from the global scope when the run ends. The latest `EXPORT` of a name decides.
    pub fn mark_export(&self, name: &str, snapshot: Option<Value>) {
        let mut exports = lock(&self.exports);
        match exports.iter_mut().find(|(existing, _)| existing == name) {
            Some(entry) => entry.1 = snapshot,
            None => exports.push((name.to_string(), snapshot)),
        }
    }

    pub fn exports(&self) -> Vec<(String, Option<Value>)> {
        lock(&self.exports).clone()
    }

    pub fn warn(&self, diagnostic: Diagnostic) {
        lock(&self.warnings).push(diagnostic);
    }

    pub fn take_warnings(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *lock(&self.warnings))
    }

    pub fn take_trace(&self) -> Vec<TraceEvent> {
        std::mem::take(&mut *lock(&self.trace))
    }

    fn record_trace(&self, phase: TracePhase, function: &str, depth: usize, arguments: &[Value]) {
        if self.options.trace {
            lock(&self.trace).push(TraceEvent {
                phase,
                function: function.to_string(),
                depth,
                arguments: arguments.to_vec(),
                timestamp: Utc::now(),
            });
        }
    }
}

/// Pops its call frame when dropped, including on error propagation and on cancellation by
/// the run timeout.
#[derive(Debug)]
pub struct CallGuard {
    run: Arc<RunState>,
    name: String,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        let depth = {
            let mut stack = lock(&self.run.call_stack);
            stack.pop();
            stack.len()
        };
        self.run
            .record_trace(TracePhase::Exit, &self.name, depth + 1, &[]);
    }
}

/// A variable scope. The global context of a run has no parent; every function call gets a
/// child whose parent is the global context, never the caller's scope.
#[derive(Debug)]
pub struct ExecutionContext {
    variables: DashMap<String, Value>,
    parent: Option<Arc<ExecutionContext>>,
    run: Arc<RunState>,
}

impl ExecutionContext {
    pub fn new_global(variables: HashMap<String, Value>, run: Arc<RunState>) -> Arc<Self> {
        Arc::new(Self {
            variables: variables.into_iter().collect(),
            parent: None,
            run,
        })
    }

    /// A fresh scope for a function body, holding `bindings` and reading through to the
    /// global context.
    pub fn create_child(
        self: &Arc<Self>,
        bindings: impl IntoIterator<Item = (String, Value)>,
    ) -> Arc<Self> {
        let global = match &self.parent {
            Some(global) => global.clone(),
            None => self.clone(),
        };
        Arc::new(Self {
            variables: bindings.into_iter().collect(),
            parent: Some(global),
            run: self.run.clone(),
        })
    }

    pub fn run(&self) -> &Arc<RunState> {
        &self.run
    }

    pub fn is_global(&self) -> bool {
        self.parent.is_none()
    }

    /// Innermost scope first, then the parent chain.
    pub fn get(&self, name: &str) -> EvalResult<Value> {
        self.lookup(name)
            .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.variables.get(name) {
            return Some(value.value().clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    /// This scope only, without the parent chain.
    pub fn lookup_local(&self, name: &str) -> Option<Value> {
        self.variables.get(name).map(|value| value.value().clone())
    }

    /// Binds `name` in this scope.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Pushes a frame for `name` after checking the depth and same-function limits. The frame
    /// is popped when the returned guard is dropped.
    pub fn push_call(&self, name: &str, arguments: &[Value]) -> EvalResult<CallGuard> {
        let options = &self.run.options;
        let depth = {
            let mut stack = lock(&self.run.call_stack);
            if stack.len() + 1 >= options.max_depth {
                return Err(EvalError::StackDepth {
                    function: name.to_string(),
                    limit: options.max_depth,
                });
            }
            let active = stack.iter().filter(|frame| frame.name == name).count();
            if active >= options.max_same_function_recursion {
                return Err(EvalError::Recursion {
                    function: name.to_string(),
                    limit: options.max_same_function_recursion,
                });
            }
            stack.push(CallFrame {
                name: name.to_string(),
                arguments: arguments.to_vec(),
                timestamp: Utc::now(),
            });
            stack.len()
        };
        debug!(function = name, depth, "call");
        self.run
            .record_trace(TracePhase::Enter, name, depth, arguments);
        Ok(CallGuard {
            run: self.run.clone(),
            name: name.to_string(),
        })
    }
}
