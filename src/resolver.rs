//! Name → middleware resolution for deferred frames.
//!
//! A deferred frame only stores a reference string. The first time a
//! request reaches it, and on every later traversal too, the frame asks its
//! [`Resolver`] for a unit. Units therefore do not need to exist, or be
//! constructible, while the chain is being assembled.
//!
//! ```rust
//! use strata::{Registry, middleware::{Recover, Trace}};
//!
//! let mut registry = Registry::new();
//! registry
//!     .register("trace", Trace::new)
//!     .instance("recover", Recover::new());
//!
//! assert!(registry.contains("trace"));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{BoxError, ResolveError};
use crate::middleware::{BoxedMiddleware, Middleware};

/// Turns a reference into a concrete middleware unit.
pub trait Resolver: Send + Sync + 'static {
    fn resolve(&self, reference: &str) -> Result<BoxedMiddleware, ResolveError>;
}

/// Any `Fn(&str) -> Option<BoxedMiddleware>` closure resolves references;
/// `None` means the name is unknown.
impl<F> Resolver for F
where
    F: Fn(&str) -> Option<BoxedMiddleware> + Send + Sync + 'static,
{
    fn resolve(&self, reference: &str) -> Result<BoxedMiddleware, ResolveError> {
        self(reference).ok_or_else(|| ResolveError::NotFound(reference.to_owned()))
    }
}

type Factory = Box<dyn Fn() -> Result<BoxedMiddleware, BoxError> + Send + Sync>;

/// A name → factory table.
///
/// Names are assigned at configuration time; factories run lazily, once per
/// resolution. Use [`instance`](Registry::instance) for a unit whose state
/// must be shared by every traversal.
#[derive(Default)]
pub struct Registry {
    factories: HashMap<String, Factory>,
}

impl Registry {
    pub fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    /// Registers a factory building a fresh unit on each resolution.
    /// A later registration under the same name replaces the earlier one.
    pub fn register<F, M>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: Middleware,
    {
        self.try_register(name, move || Ok::<_, BoxError>(factory()))
    }

    /// Registers a factory that may fail to build its unit. The failure
    /// surfaces as [`ResolveError::Failed`] when a request reaches the frame.
    pub fn try_register<F, M, E>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Result<M, E> + Send + Sync + 'static,
        M: Middleware,
        E: Into<BoxError>,
    {
        let factory: Factory = Box::new(move || {
            factory()
                .map(|unit| Arc::new(unit) as BoxedMiddleware)
                .map_err(Into::into)
        });
        self.factories.insert(name.into(), factory);
        self
    }

    /// Registers one unit shared by every resolution of `name`.
    pub fn instance(&mut self, name: impl Into<String>, unit: impl Middleware) -> &mut Self {
        let unit: BoxedMiddleware = Arc::new(unit);
        let factory: Factory = Box::new(move || Ok(Arc::clone(&unit)));
        self.factories.insert(name.into(), factory);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Resolver for Registry {
    fn resolve(&self, reference: &str) -> Result<BoxedMiddleware, ResolveError> {
        let factory = self
            .factories
            .get(reference)
            .ok_or_else(|| ResolveError::NotFound(reference.to_owned()))?;

        factory().map_err(|source| ResolveError::Failed {
            reference: reference.to_owned(),
            source,
        })
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("names", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::Trace;

    #[test]
    fn missing_name_is_not_found() {
        let err = Registry::new().resolve("Missing\\Class").err().unwrap();
        assert!(matches!(err, ResolveError::NotFound(ref name) if name == "Missing\\Class"));
    }

    #[test]
    fn failing_factory_reports_reference() {
        let mut registry = Registry::new();
        registry.try_register("db", || Err::<Trace, _>("pool exhausted"));

        let err = registry.resolve("db").err().unwrap();
        assert_eq!(err.to_string(), "failed to build middleware `db`: pool exhausted");
    }

    #[test]
    fn instance_is_shared() {
        let mut registry = Registry::new();
        registry.instance("trace", Trace::new());

        let a = registry.resolve("trace").unwrap();
        let b = registry.resolve("trace").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn factory_builds_fresh_units() {
        let mut registry = Registry::new();
        registry.register("trace", Trace::new);

        let a = registry.resolve("trace").unwrap();
        let b = registry.resolve("trace").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn closures_are_resolvers() {
        let resolver = |name: &str| (name == "trace").then(|| Arc::new(Trace) as BoxedMiddleware);
        assert!(resolver.resolve("trace").is_ok());
        assert!(matches!(resolver.resolve("auth"), Err(ResolveError::NotFound(_))));
    }
}
