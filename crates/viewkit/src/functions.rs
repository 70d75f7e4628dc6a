//! Function registry shared by every compiled template.
//!
//! Functions are stored as callable minijinja [`Value`]s, so any Rust closure
//! that minijinja accepts as a template function can be registered. Each
//! compile takes a [`snapshot`](FunctionRegistry::snapshot); templates that
//! are already compiled never see later registrations.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use minijinja::functions::Function;
use minijinja::value::{FunctionArgs, FunctionResult};
use minijinja::Value;

/// Thread-safe mapping from function name to callable.
///
/// # Example
///
/// ```rust
/// use viewkit::FunctionRegistry;
///
/// let registry = FunctionRegistry::new();
/// registry.register("upper", |s: String| s.to_uppercase());
/// registry.register("is_admin", |user: String| user == "admin");
///
/// assert!(registry.names().contains("upper"));
/// assert_eq!(registry.snapshot().len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: RwLock<HashMap<String, Value>>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `f` under `name`, replacing any previous binding.
    pub fn register<F, Rv, Args>(&self, name: impl Into<String>, f: F)
    where
        F: Function<Rv, Args>,
        Rv: FunctionResult,
        Args: for<'a> FunctionArgs<'a>,
    {
        self.register_value(name, Value::from_function(f));
    }

    /// Registers an already-built callable value under `name`.
    pub fn register_value(&self, name: impl Into<String>, value: Value) {
        self.write().insert(name.into(), value);
    }

    /// Registers every `(name, callable)` pair. Later entries win on duplicates.
    pub fn register_all<I, K>(&self, functions: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut map = self.write();
        for (name, value) in functions {
            map.insert(name.into(), value);
        }
    }

    /// Returns a consistent copy of the current bindings.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the registered function names.
    pub fn names(&self) -> BTreeSet<String> {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Value>> {
        self.functions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
