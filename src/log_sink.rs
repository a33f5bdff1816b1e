//! The logging collaborator behind `LOG` statements.
//!
//! Rule output is not the engine's own logging: [`TracingLogSink`] forwards it to `tracing`
//! under the `finrule::rule` target so hosts can route it separately, and [`MemoryLogSink`]
//! keeps it for inspection.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("log sink unavailable: {0}")]
    Unavailable(String),
    #[error("log sink rejected message: {0}")]
    Rejected(String),
}

#[automock]
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn log(&self, level: LogLevel, message: &str) -> Result<(), SinkError>;
}

#[derive(Debug, Default, Clone)]
pub struct TracingLogSink;

#[async_trait]
impl LogSink for TracingLogSink {
    async fn log(&self, level: LogLevel, message: &str) -> Result<(), SinkError> {
        match level {
            LogLevel::Debug => tracing::debug!(target: "finrule::rule", "{}", message),
            LogLevel::Info => tracing::info!(target: "finrule::rule", "{}", message),
            LogLevel::Warn => tracing::warn!(target: "finrule::rule", "{}", message),
            LogLevel::Error => tracing::error!(target: "finrule::rule", "{}", message),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .map(|(_, message)| message)
            .collect()
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn log(&self, level: LogLevel, message: &str) -> Result<(), SinkError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
        Ok(())
    }
}
