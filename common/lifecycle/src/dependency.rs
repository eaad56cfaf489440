//! Dependency extractors: the argument types a constructor may declare.
//!
//! A constructor's argument type doubles as its dependency declaration:
//! `Arc<T>` requires a `T`, `Option<Arc<T>>` takes one if registered, and
//! [`Group<T>`] collects every contribution to the group `T`. Tuples combine
//! up to eight of these.

use std::any::type_name;
use std::collections::HashMap;
use std::slice;
use std::sync::Arc;

use crate::error::AssemblyError;
use crate::registry::{Instance, TypeKey};

/// A vertex of the dependency graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Node {
    Single(TypeKey),
    Group(TypeKey),
    Member(TypeKey, usize),
    Invocation(usize),
}

/// One declared edge of a provider.
#[derive(Clone, Copy, Debug)]
pub struct Requirement {
    pub(crate) node: Node,
    pub(crate) optional: bool,
}

impl Requirement {
    fn single(key: TypeKey, optional: bool) -> Self {
        Self {
            node: Node::Single(key),
            optional,
        }
    }

    pub(crate) fn member(key: TypeKey, index: usize) -> Self {
        Self {
            node: Node::Member(key, index),
            optional: false,
        }
    }
}

/// Values built so far.
#[derive(Default)]
pub(crate) struct Instances {
    pub(crate) singles: HashMap<TypeKey, Instance>,
    pub(crate) members: HashMap<(TypeKey, usize), Instance>,
    pub(crate) groups: HashMap<TypeKey, Vec<Instance>>,
}

/// Read-only view of the built values, handed to extractors while a single
/// provider runs.
pub struct Scope<'a> {
    instances: &'a Instances,
    requester: &'static str,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(instances: &'a Instances, requester: &'static str) -> Self {
        Self {
            instances,
            requester,
        }
    }

    fn single<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.instances
            .singles
            .get(&TypeKey::of::<T>())
            .and_then(|instance| instance.clone().downcast::<T>().ok())
    }

    fn group<T: Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        self.instances
            .groups
            .get(&TypeKey::of::<T>())
            .map(|members| {
                members
                    .iter()
                    .filter_map(|instance| instance.clone().downcast::<T>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn required<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, AssemblyError> {
        self.single::<T>()
            .ok_or(AssemblyError::MissingProvider {
                type_name: type_name::<T>(),
                required_by: self.requester,
            })
    }
}

/// Every value contributed to the group `T`, in registration order.
pub struct Group<T>(Vec<Arc<T>>);

impl<T> Group<T> {
    pub fn iter(&self) -> slice::Iter<'_, Arc<T>> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<Arc<T>> {
        self.0
    }
}

impl<T> IntoIterator for Group<T> {
    type Item = Arc<T>;
    type IntoIter = std::vec::IntoIter<Arc<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Group<T> {
    type Item = &'a Arc<T>;
    type IntoIter = slice::Iter<'a, Arc<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A single constructor argument.
pub trait Dependency: Sized + Send + 'static {
    fn requirement() -> Requirement;
    fn extract(scope: &Scope<'_>) -> Result<Self, AssemblyError>;
}

impl<T: Send + Sync + 'static> Dependency for Arc<T> {
    fn requirement() -> Requirement {
        Requirement::single(TypeKey::of::<T>(), false)
    }

    fn extract(scope: &Scope<'_>) -> Result<Self, AssemblyError> {
        scope.required::<T>()
    }
}

impl<T: Send + Sync + 'static> Dependency for Option<Arc<T>> {
    fn requirement() -> Requirement {
        Requirement::single(TypeKey::of::<T>(), true)
    }

    fn extract(scope: &Scope<'_>) -> Result<Self, AssemblyError> {
        Ok(scope.single::<T>())
    }
}

impl<T: Send + Sync + 'static> Dependency for Group<T> {
    fn requirement() -> Requirement {
        Requirement {
            node: Node::Group(TypeKey::of::<T>()),
            optional: false,
        }
    }

    fn extract(scope: &Scope<'_>) -> Result<Self, AssemblyError> {
        Ok(Group(scope.group::<T>()))
    }
}

/// The full argument of a constructor: nothing, one extractor, or a tuple of them.
pub trait Dependencies: Sized + Send + 'static {
    fn requirements() -> Vec<Requirement>;
    fn extract(scope: &Scope<'_>) -> Result<Self, AssemblyError>;
}

impl Dependencies for () {
    fn requirements() -> Vec<Requirement> {
        Vec::new()
    }

    fn extract(_: &Scope<'_>) -> Result<Self, AssemblyError> {
        Ok(())
    }
}

macro_rules! impl_dependencies_for_extractor {
    ($($ty:ty),+) => {
        $(
            impl<T: Send + Sync + 'static> Dependencies for $ty {
                fn requirements() -> Vec<Requirement> {
                    vec![<Self as Dependency>::requirement()]
                }

                fn extract(scope: &Scope<'_>) -> Result<Self, AssemblyError> {
                    <Self as Dependency>::extract(scope)
                }
            }
        )+
    };
}

impl_dependencies_for_extractor!(Arc<T>, Option<Arc<T>>, Group<T>);

macro_rules! impl_dependencies_for_tuple {
    ($($name:ident),+) => {
        impl<$($name: Dependency),+> Dependencies for ($($name,)+) {
            fn requirements() -> Vec<Requirement> {
                vec![$(<$name as Dependency>::requirement()),+]
            }

            fn extract(scope: &Scope<'_>) -> Result<Self, AssemblyError> {
                Ok(($(<$name as Dependency>::extract(scope)?,)+))
            }
        }
    };
}

impl_dependencies_for_tuple!(A);
impl_dependencies_for_tuple!(A, B);
impl_dependencies_for_tuple!(A, B, C);
impl_dependencies_for_tuple!(A, B, C, D);
impl_dependencies_for_tuple!(A, B, C, D, E);
impl_dependencies_for_tuple!(A, B, C, D, E, F);
impl_dependencies_for_tuple!(A, B, C, D, E, F, G);
impl_dependencies_for_tuple!(A, B, C, D, E, F, G, H);
