//! Endpoint descriptors and the API map.
//!
//! An [`ApiMap`] is the registration step: it takes named call functions,
//! derives every endpoint's identifiers once, checks them for collisions and
//! freezes the result. Everything downstream (reducer dispatch table,
//! watchers, initial state) is built from it.
//!
//! # Example
//!
//! ```
//! use rascl_core::endpoint::ApiMap;
//! use serde_json::{json, Value};
//!
//! # fn main() -> Result<(), rascl_core::error::ConfigError> {
//! let api = ApiMap::builder()
//!     .endpoint("getExample", |_args: Vec<Value>| async {
//!         Ok(json!(["apples", "bananas", "coconuts"]))
//!     })
//!     .build()?;
//!
//! assert_eq!(api.len(), 1);
//! assert_eq!(api.types()["getExample"].success, "GET_EXAMPLE_SUCCESS");
//! # Ok(())
//! # }
//! ```

use crate::action::ActionCreators;
use crate::error::{CallError, ConfigError};
use crate::identifiers::{derive_identifiers, LifecycleIds, Phase};
use crate::state::ApiState;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Future returned by an endpoint call
pub type CallFuture = BoxFuture<'static, Result<Value, CallError>>;

/// Type-erased endpoint call function
pub type CallFn = Arc<dyn Fn(Vec<Value>) -> CallFuture + Send + Sync>;

/// Box a closure returning a future into a [`CallFn`]
pub fn call_fn<F, Fut>(f: F) -> CallFn
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, CallError>> + Send + 'static,
{
    Arc::new(move |args| f(args).boxed())
}

/// One named asynchronous call and its derived identifiers
#[derive(Clone)]
pub struct Endpoint {
    name: Arc<str>,
    ids: Arc<LifecycleIds>,
    call: CallFn,
}

impl Endpoint {
    fn new(name: &str, call: CallFn) -> Self {
        Self {
            name: Arc::from(name),
            ids: Arc::new(derive_identifiers(name)),
            call,
        }
    }

    /// Endpoint name, as registered
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lifecycle identifiers
    #[must_use]
    pub fn ids(&self) -> &LifecycleIds {
        &self.ids
    }

    /// Event constructors for this endpoint
    #[must_use]
    pub fn actions(&self) -> ActionCreators {
        ActionCreators::new(Arc::clone(&self.name), Arc::clone(&self.ids))
    }

    /// Invoke the call function with positional arguments
    #[must_use]
    pub fn call(&self, args: Vec<Value>) -> CallFuture {
        (self.call)(args)
    }

    /// Shared handle to the call function
    #[must_use]
    pub fn call_fn(&self) -> CallFn {
        Arc::clone(&self.call)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

/// Frozen set of endpoints, keyed by name
#[derive(Debug, Clone)]
pub struct ApiMap {
    endpoints: Vec<Endpoint>,
    by_name: HashMap<Arc<str>, usize>,
    by_type: HashMap<String, (usize, Phase)>,
}

impl ApiMap {
    /// Start registering endpoints
    #[must_use]
    pub fn builder() -> ApiMapBuilder {
        ApiMapBuilder::default()
    }

    /// Endpoint by name
    #[must_use]
    pub fn get(&self, name: impl AsRef<str>) -> Option<&Endpoint> {
        self.by_name
            .get(name.as_ref())
            .and_then(|&index| self.endpoints.get(index))
    }

    /// Which endpoint and phase an event type belongs to
    #[must_use]
    pub fn lookup(&self, event_type: &str) -> Option<(&Endpoint, Phase)> {
        self.by_type
            .get(event_type)
            .and_then(|&(index, phase)| self.endpoints.get(index).map(|e| (e, phase)))
    }

    /// Endpoints in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }

    /// Number of endpoints
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// True when nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Endpoint name → identifiers
    #[must_use]
    pub fn types(&self) -> BTreeMap<String, LifecycleIds> {
        self.endpoints
            .iter()
            .map(|e| (e.name().to_string(), e.ids().clone()))
            .collect()
    }

    /// Initial global state with one slot per endpoint
    #[must_use]
    pub fn initial_state(&self) -> ApiState {
        ApiState::new(self.endpoints.iter().map(Endpoint::name))
    }
}

/// Builder for [`ApiMap`]
#[derive(Default)]
pub struct ApiMapBuilder {
    entries: Vec<(String, CallFn)>,
}

impl ApiMapBuilder {
    /// Register an endpoint from an async closure
    #[must_use]
    pub fn endpoint<F, Fut>(self, name: impl AsRef<str>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CallError>> + Send + 'static,
    {
        self.endpoint_fn(name, call_fn(f))
    }

    /// Register an endpoint from an already boxed call function
    #[must_use]
    pub fn endpoint_fn(mut self, name: impl AsRef<str>, call: CallFn) -> Self {
        self.entries.push((name.as_ref().to_string(), call));
        self
    }

    /// Validate names and freeze the map
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EmptyName`] for an empty name
    /// - [`ConfigError::DuplicateEndpoint`] when a name is registered twice
    /// - [`ConfigError::IdentifierCollision`] when two names derive the same identifier
    pub fn build(self) -> Result<ApiMap, ConfigError> {
        let mut endpoints = Vec::with_capacity(self.entries.len());
        let mut by_name: HashMap<Arc<str>, usize> = HashMap::new();
        let mut by_type: HashMap<String, (usize, Phase)> = HashMap::new();

        for (name, call) in self.entries {
            if name.is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if by_name.contains_key(name.as_str()) {
                return Err(ConfigError::DuplicateEndpoint(name));
            }

            let index = endpoints.len();
            let endpoint = Endpoint::new(&name, call);

            for (phase, id) in endpoint.ids().iter() {
                if let Some(&(other, _)) = by_type.get(id) {
                    let first = endpoints
                        .get(other)
                        .map_or_else(String::new, |e: &Endpoint| e.name().to_string());
                    return Err(ConfigError::IdentifierCollision {
                        first,
                        second: name,
                        identifier: id.to_string(),
                    });
                }
                by_type.insert(id.to_string(), (index, phase));
            }

            by_name.insert(Arc::clone(&endpoint.name), index);
            endpoints.push(endpoint);
        }

        Ok(ApiMap {
            endpoints,
            by_name,
            by_type,
        })
    }
}
