//! Provider registration. A [`Registry`] is assembled once by the process entry
//! point and frozen into a [`Container`] by [`Registry::build`].

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::debug;

use crate::container::Container;
use crate::coordinator::Lifecycle;
use crate::dependency::{Dependencies, Requirement, Scope};
use crate::error::{AssemblyError, BoxError};
use crate::hook::{Component, Hook};

pub(crate) type Instance = Arc<dyn Any + Send + Sync>;
pub(crate) type ConstructFn =
    Box<dyn FnOnce(&Scope<'_>) -> Result<Instance, AssemblyError> + Send>;

fn instance<T: Send + Sync + 'static>(value: Arc<T>) -> Instance {
    value
}

/// Identity of a produced or required type. Equality and hashing use the
/// `TypeId` only; the name is kept for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A registered constructor and the requirements derived from its argument type.
pub(crate) struct Provider {
    pub(crate) label: &'static str,
    pub(crate) requirements: Vec<Requirement>,
    pub(crate) construct: ConstructFn,
}

impl Provider {
    fn new<D, F>(label: &'static str, construct: F) -> Self
    where
        D: Dependencies,
        F: FnOnce(D) -> Result<Instance, BoxError> + Send + 'static,
    {
        Self {
            label,
            requirements: D::requirements(),
            construct: Box::new(move |scope| {
                let deps = D::extract(scope)?;
                construct(deps).map_err(|source| AssemblyError::Construction {
                    type_name: label,
                    source,
                })
            }),
        }
    }
}

/// Stores constructors keyed by the type they produce.
///
/// At most one provider (or supplied value) may exist per type. Value groups
/// accept any number of contributions and keep them in registration order.
/// The [`Lifecycle`] coordinator is pre-supplied, so constructors can take an
/// `Arc<Lifecycle>` argument and append hooks.
pub struct Registry {
    pub(crate) lifecycle: Arc<Lifecycle>,
    pub(crate) providers: HashMap<TypeKey, Provider>,
    pub(crate) supplied: HashMap<TypeKey, Instance>,
    pub(crate) groups: HashMap<TypeKey, Vec<Provider>>,
    pub(crate) invocations: Vec<Provider>,
}

impl Registry {
    pub fn new() -> Self {
        let lifecycle = Arc::new(Lifecycle::new());
        let mut supplied: HashMap<TypeKey, Instance> = HashMap::new();
        supplied.insert(TypeKey::of::<Lifecycle>(), lifecycle.clone());
        Self {
            lifecycle,
            providers: HashMap::new(),
            supplied,
            groups: HashMap::new(),
            invocations: Vec::new(),
        }
    }

    /// The coordinator every hook contributed through this registry lands in.
    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        self.lifecycle.clone()
    }

    /// Register an already-built value, e.g. a configuration section.
    pub fn supply<T>(&mut self, value: T) -> Result<(), AssemblyError>
    where
        T: Send + Sync + 'static,
    {
        self.supply_arc(Arc::new(value))
    }

    pub fn supply_arc<T>(&mut self, value: Arc<T>) -> Result<(), AssemblyError>
    where
        T: Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        self.ensure_vacant(key)?;
        debug!(provides = key.name(), "Lifecycle: value supplied");
        self.supplied.insert(key, value);
        Ok(())
    }

    /// Register an infallible constructor for `T`.
    pub fn provide<T, D, F>(&mut self, constructor: F) -> Result<(), AssemblyError>
    where
        T: Send + Sync + 'static,
        D: Dependencies,
        F: FnOnce(D) -> T + Send + 'static,
    {
        self.try_provide(move |deps: D| Ok::<_, Infallible>(constructor(deps)))
    }

    /// Register a constructor for `T` that may fail.
    pub fn try_provide<T, D, E, F>(&mut self, constructor: F) -> Result<(), AssemblyError>
    where
        T: Send + Sync + 'static,
        D: Dependencies,
        E: Into<BoxError>,
        F: FnOnce(D) -> Result<T, E> + Send + 'static,
    {
        let key = TypeKey::of::<T>();
        self.ensure_vacant(key)?;
        let provider = Provider::new(key.name(), move |deps: D| {
            let value = constructor(deps).map_err(Into::<BoxError>::into)?;
            Ok(instance(Arc::new(value)))
        });
        debug!(provides = key.name(), "Lifecycle: provider registered");
        self.providers.insert(key, provider);
        Ok(())
    }

    /// Register a constructor whose product takes part in the start/stop
    /// sequence: once built, a hook for it is appended to the coordinator.
    pub fn provide_component<T, D, F>(&mut self, constructor: F) -> Result<(), AssemblyError>
    where
        T: Component,
        D: Dependencies,
        F: FnOnce(D) -> T + Send + 'static,
    {
        self.try_provide_component(move |deps: D| Ok::<_, Infallible>(constructor(deps)))
    }

    pub fn try_provide_component<T, D, E, F>(
        &mut self,
        constructor: F,
    ) -> Result<(), AssemblyError>
    where
        T: Component,
        D: Dependencies,
        E: Into<BoxError>,
        F: FnOnce(D) -> Result<T, E> + Send + 'static,
    {
        let key = TypeKey::of::<T>();
        self.ensure_vacant(key)?;
        let lifecycle = self.lifecycle.clone();
        let provider = Provider::new(key.name(), move |deps: D| {
            let component = Arc::new(constructor(deps).map_err(Into::<BoxError>::into)?);
            lifecycle.append(Hook::for_component(component.clone()))?;
            Ok(instance(component))
        });
        debug!(provides = key.name(), "Lifecycle: component provider registered");
        self.providers.insert(key, provider);
        Ok(())
    }

    /// Add an infallible constructor to the value group `G`.
    pub fn contribute<G, D, F>(&mut self, constructor: F)
    where
        G: Send + Sync + 'static,
        D: Dependencies,
        F: FnOnce(D) -> G + Send + 'static,
    {
        self.try_contribute(move |deps: D| Ok::<_, Infallible>(constructor(deps)))
    }

    pub fn try_contribute<G, D, E, F>(&mut self, constructor: F)
    where
        G: Send + Sync + 'static,
        D: Dependencies,
        E: Into<BoxError>,
        F: FnOnce(D) -> Result<G, E> + Send + 'static,
    {
        self.try_contribute_as(type_name::<G>(), constructor)
    }

    /// Like [`try_contribute`](Registry::try_contribute), labelling the member
    /// for diagnostics (adapters pass the concrete type they wrap).
    pub fn try_contribute_as<G, D, E, F>(&mut self, label: &'static str, constructor: F)
    where
        G: Send + Sync + 'static,
        D: Dependencies,
        E: Into<BoxError>,
        F: FnOnce(D) -> Result<G, E> + Send + 'static,
    {
        let key = TypeKey::of::<G>();
        let provider = Provider::new(label, move |deps: D| {
            let value = constructor(deps).map_err(Into::<BoxError>::into)?;
            Ok(instance(Arc::new(value)))
        });
        let members = self.groups.entry(key).or_default();
        members.push(provider);
        debug!(
            group = key.name(),
            member = label,
            position = members.len() - 1,
            "Lifecycle: group member registered"
        );
    }

    /// Register a function run for its side effects when the registry is
    /// built. Invocations run in registration order and drive construction:
    /// providers not reachable from an invocation or an explicit resolve are
    /// never built.
    pub fn invoke<D, E, F>(&mut self, function: F)
    where
        D: Dependencies,
        E: Into<BoxError>,
        F: FnOnce(D) -> Result<(), E> + Send + 'static,
    {
        let label = type_name::<F>();
        self.invocations.push(Provider::new(label, move |deps: D| {
            function(deps).map_err(Into::<BoxError>::into)?;
            Ok(instance(Arc::new(())))
        }));
    }

    /// Freeze the registry and run every invocation.
    pub fn build(self) -> Result<Container, AssemblyError> {
        Container::build(self)
    }

    fn ensure_vacant(&self, key: TypeKey) -> Result<(), AssemblyError> {
        if self.providers.contains_key(&key) || self.supplied.contains_key(&key) {
            return Err(AssemblyError::DuplicateProvider {
                type_name: key.name(),
            });
        }
        Ok(())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
