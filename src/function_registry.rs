//! Name to callable lookup for everything a rule can call that it did not define itself.
//!
//! Two kinds of callables live here:
//!
//! * native functions ([`NativeFunction`]), the builtins, which receive the calling
//!   [`ExecutionContext`] explicitly on every invocation;
//! * host services ([`HostService`]), data-access functions supplied by the embedding
//!   application. Their names are declared up front and bound at run time; calling a declared
//!   but unbound service is a configuration error rather than an unknown function.
//!
//! User-defined `RULE`s are not registered here. They shadow same-named entries.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::eval::{context::ExecutionContext, value::Value};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Failed(String),
}

pub type FunctionResult = Result<Value, FunctionError>;

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Between(usize, usize),
    Any,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == *n,
            Arity::AtLeast(n) => count >= *n,
            Arity::Between(min, max) => (*min..=*max).contains(&count),
            Arity::Any => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
            Arity::Between(min, max) => write!(f, "{} to {}", min, max),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

#[async_trait]
pub trait NativeFunction: Send + Sync {
    fn arity(&self) -> Arity;

    async fn call(&self, arguments: Vec<Value>, context: &ExecutionContext) -> FunctionResult;
}

#[async_trait]
pub trait HostService: Send + Sync {
    async fn invoke(&self, arguments: Vec<Value>) -> FunctionResult;
}

type HostHandler = Box<dyn Fn(Vec<Value>) -> BoxFuture<'static, FunctionResult> + Send + Sync>;

/// A host service backed by a closure returning a boxed future.
pub struct FnHostService {
    handler: HostHandler,
}

impl FnHostService {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> BoxFuture<'static, FunctionResult> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
        }
    }
}

#[async_trait]
impl HostService for FnHostService {
    async fn invoke(&self, arguments: Vec<Value>) -> FunctionResult {
        (self.handler)(arguments).await
    }
}

/// Outcome of [`FunctionRegistry::resolve`].
#[derive(Clone)]
pub enum Resolution {
    Native(Arc<dyn NativeFunction>),
    Host {
        service: Arc<dyn HostService>,
        arity: Arity,
    },
    /// Declared host service with no implementation bound.
    Unbound,
    NotFound,
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Native(_) => write!(f, "Native"),
            Resolution::Host { arity, .. } => write!(f, "Host({})", arity),
            Resolution::Unbound => write!(f, "Unbound"),
            Resolution::NotFound => write!(f, "NotFound"),
        }
    }
}

/// Host services every engine declares: read and write a data point, read a hierarchy member,
/// format a value.
pub const DEFAULT_HOST_SERVICES: &[(&str, Arity)] = &[
    ("GET_DATA", Arity::Exact(4)),
    ("SET_DATA", Arity::Exact(5)),
    ("GET_MEMBER", Arity::Exact(2)),
    ("FORMAT_VALUE", Arity::Exact(2)),
];

/// A single flat namespace. Safe to share; bindings may change between runs.
#[derive(Default)]
pub struct FunctionRegistry {
    natives: DashMap<String, Arc<dyn NativeFunction>>,
    declared: DashMap<String, Arity>,
    bound: DashMap<String, Arc<dyn HostService>>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default builtins plus the declared host services, none bound.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::builtins::register_builtins(&registry);
        for (name, arity) in DEFAULT_HOST_SERVICES {
            registry.declare_host_service(*name, *arity);
        }
        registry
    }

    pub fn register_native(&self, name: impl Into<String>, function: impl NativeFunction + 'static) {
        self.natives.insert(name.into(), Arc::new(function));
    }

    pub fn declare_host_service(&self, name: impl Into<String>, arity: Arity) {
        self.declared.insert(name.into(), arity);
    }

    /// Binds an implementation. Names that were never declared accept any argument count.
    pub fn bind_host_service(&self, name: impl Into<String>, service: impl HostService + 'static) {
        let name = name.into();
        self.declared.entry(name.clone()).or_insert(Arity::Any);
        self.bound.insert(name, Arc::new(service));
    }

    pub fn unbind_host_service(&self, name: &str) -> bool {
        self.bound.remove(name).is_some()
    }

    pub fn resolve(&self, name: &str) -> Resolution {
        if let Some(native) = self.natives.get(name) {
            return Resolution::Native(native.value().clone());
        }
        match self.declared.get(name) {
            Some(arity) => match self.bound.get(name) {
                Some(service) => Resolution::Host {
                    service: service.value().clone(),
                    arity: *arity.value(),
                },
                None => Resolution::Unbound,
            },
            None => Resolution::NotFound,
        }
    }

    /// All callable names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .natives
            .iter()
            .map(|entry| entry.key().clone())
            .chain(self.declared.iter().map(|entry| entry.key().clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[test]
    fn test_resolution_kinds() {
        let registry = FunctionRegistry::with_builtins();
        assert!(matches!(registry.resolve("SUM"), Resolution::Native(_)));
        assert!(matches!(registry.resolve("GET_DATA"), Resolution::Unbound));
        assert!(matches!(registry.resolve("NOPE"), Resolution::NotFound));

        registry.bind_host_service(
            "GET_DATA",
            FnHostService::new(|_| async { Ok::<_, FunctionError>(Value::Number(42.0)) }.boxed()),
        );
        assert!(matches!(
            registry.resolve("GET_DATA"),
            Resolution::Host {
                arity: Arity::Exact(4),
                ..
            }
        ));

        assert!(registry.unbind_host_service("GET_DATA"));
        assert!(matches!(registry.resolve("GET_DATA"), Resolution::Unbound));
    }

    #[tokio::test]
    async fn test_fn_host_service() {
        let service = FnHostService::new(|arguments| {
            async move { Ok::<_, FunctionError>(Value::Number(arguments.len() as f64)) }.boxed()
        });
        assert_eq!(
            service
                .invoke(vec![Value::Null, Value::Null])
                .await
                .unwrap(),
            Value::Number(2.0)
        );
    }

    #[test]
    fn test_undeclared_binding_accepts_any_arity() {
        let registry = FunctionRegistry::new();
        registry.bind_host_service(
            "CUSTOM",
            FnHostService::new(|_| async { Ok::<_, FunctionError>(Value::Null) }.boxed()),
        );
        assert!(matches!(
            registry.resolve("CUSTOM"),
            Resolution::Host {
                arity: Arity::Any,
                ..
            }
        ));
        assert_eq!(registry.names(), vec!["CUSTOM".to_string()]);
    }

    #[test]
    fn test_arity() {
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(3));
        assert!(Arity::AtLeast(1).accepts(5));
        assert!(!Arity::AtLeast(1).accepts(0));
        assert!(Arity::Between(1, 2).accepts(2));
        assert!(!Arity::Between(1, 2).accepts(3));
        assert_eq!(Arity::AtLeast(1).to_string(), "at least 1");
    }
}
