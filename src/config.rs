//! Configuration for parsing, execution and formatting.
//!
//! Every field has a documented default and may be omitted from JSON configuration files.

use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

use crate::{error::RuleError, formatter::config::FormatterConfig, RuleResult};

/// Per-run options, passed to every `execute()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// Ceiling on the call stack, counting user-defined and builtin calls.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Ceiling on simultaneously active calls of one function name.
    #[serde(default = "default_max_same_function_recursion")]
    pub max_same_function_recursion: usize,

    /// Wall-clock budget for one run.
    #[serde(
        rename = "timeout_ms",
        default = "default_timeout",
        with = "duration_ms"
    )]
    pub timeout: Duration,

    /// Record failing top-level statements as warnings and carry on.
    #[serde(default)]
    pub continue_on_error: bool,

    /// Record every call entry and exit in the diagnostics.
    #[serde(default)]
    pub trace: bool,

    /// Keep results and exports gathered before a failure or timeout.
    #[serde(default)]
    pub partial_results: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_same_function_recursion: default_max_same_function_recursion(),
            timeout: default_timeout(),
            continue_on_error: false,
            trace: false,
            partial_results: false,
        }
    }
}

impl ExecutionOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn validate(&self) -> RuleResult<()> {
        if self.max_depth == 0 {
            return Err(RuleError::config("max_depth must be at least 1"));
        }
        if self.max_same_function_recursion == 0 {
            return Err(RuleError::config(
                "max_same_function_recursion must be at least 1",
            ));
        }
        if self.timeout.is_zero() {
            return Err(RuleError::config("timeout_ms must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Deepest bracket, unary or conditional nesting accepted in one expression.
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,

    /// Most binary operators and member accesses accepted in one statement.
    #[serde(default = "default_max_expression_length")]
    pub max_expression_length: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: default_max_nesting_depth(),
            max_expression_length: default_max_expression_length(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub execution: ExecutionOptions,

    #[serde(default)]
    pub parser: ParserConfig,

    #[serde(default)]
    pub formatter: FormatterConfig,
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> RuleResult<Self> {
        let config: Self = from_file(path)?;
        config.execution.validate()?;
        Ok(config)
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> RuleResult<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        RuleError::config(format!("failed to open {}: {}", path.display(), e))
    })?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| RuleError::config(format!("failed to parse {}: {}", path.display(), e)))
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> RuleResult<T> {
    serde_json::from_str(s).map_err(|e| RuleError::config(format!("failed to parse: {}", e)))
}

fn default_max_depth() -> usize {
    100
}

fn default_max_same_function_recursion() -> usize {
    50
}

fn default_timeout() -> Duration {
    Duration::from_millis(5000)
}

fn default_max_nesting_depth() -> usize {
    64
}

fn default_max_expression_length() -> usize {
    4096
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
