//! The dependency resolver.
//!
//! Resolution is two-phase. A planner first walks the declared dependency
//! lists depth-first, siblings in declaration order, marking every node it is
//! currently resolving; revisiting a marked node is a cycle, and a required
//! node without a provider is missing. Only when the whole plan is valid are
//! constructors run, in plan order, so an assembly error never leaves a
//! half-run constructor behind. Plan order is a topological order of the
//! graph and is the order in which hooks get appended.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::coordinator::Lifecycle;
use crate::dependency::{Dependencies, Group, Instances, Node, Requirement, Scope};
use crate::error::AssemblyError;
use crate::registry::{Instance, Provider, Registry, TypeKey};

/// The frozen object graph. Singletons are built at most once and cached for
/// the life of the container.
pub struct Container {
    providers: HashMap<TypeKey, Provider>,
    members: HashMap<TypeKey, Vec<Option<Provider>>>,
    invocations: Vec<Option<Provider>>,
    instances: Instances,
    constructed: Vec<&'static str>,
    lifecycle: Arc<Lifecycle>,
}

impl Container {
    pub(crate) fn build(registry: Registry) -> Result<Self, AssemblyError> {
        let Registry {
            lifecycle,
            providers,
            supplied,
            groups,
            invocations,
        } = registry;

        let mut container = Self {
            providers,
            members: groups
                .into_iter()
                .map(|(key, members)| (key, members.into_iter().map(Some).collect()))
                .collect(),
            invocations: invocations.into_iter().map(Some).collect(),
            instances: Instances {
                singles: supplied,
                ..Default::default()
            },
            constructed: Vec::new(),
            lifecycle,
        };

        info!(
            providers = container.providers.len(),
            groups = container.members.len(),
            invocations = container.invocations.len(),
            "Lifecycle: assembling application"
        );

        for index in 0..container.invocations.len() {
            container.realize(Node::Invocation(index))?;
        }

        Ok(container)
    }

    /// Return the singleton for `T`, building it and its dependencies first
    /// if needed.
    pub fn resolve<T: Send + Sync + 'static>(&mut self) -> Result<Arc<T>, AssemblyError> {
        self.realize(Node::Single(TypeKey::of::<T>()))?;
        <Arc<T> as Dependencies>::extract(&Scope::new(&self.instances, "container"))
    }

    /// Return every member of the group `T`, building them first if needed.
    pub fn resolve_group<T: Send + Sync + 'static>(&mut self) -> Result<Group<T>, AssemblyError> {
        self.realize(Node::Group(TypeKey::of::<T>()))?;
        <Group<T> as Dependencies>::extract(&Scope::new(&self.instances, "container"))
    }

    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        self.lifecycle.clone()
    }

    /// Labels of every value built so far, in construction order.
    pub fn construction_order(&self) -> &[&'static str] {
        &self.constructed
    }

    fn realize(&mut self, root: Node) -> Result<(), AssemblyError> {
        let plan = Planner::new(self).plan(root)?;
        for node in plan {
            self.construct(node)?;
        }
        Ok(())
    }

    fn is_built(&self, node: Node) -> bool {
        match node {
            Node::Single(key) => self.instances.singles.contains_key(&key),
            Node::Group(key) => self.instances.groups.contains_key(&key),
            Node::Member(key, index) => self.instances.members.contains_key(&(key, index)),
            Node::Invocation(index) => matches!(self.invocations.get(index), Some(None)),
        }
    }

    fn group_size(&self, key: TypeKey) -> usize {
        self.members.get(&key).map_or(0, Vec::len)
    }

    /// Label and outgoing edges of a node, or `None` if nothing provides it.
    fn describe(&self, node: Node) -> Option<(&'static str, Vec<Requirement>)> {
        let provider = match node {
            Node::Single(key) => self.providers.get(&key),
            Node::Group(key) => {
                let edges = (0..self.group_size(key))
                    .map(|index| Requirement::member(key, index))
                    .collect();
                return Some((key.name(), edges));
            }
            Node::Member(key, index) => self
                .members
                .get(&key)
                .and_then(|members| members.get(index))
                .and_then(Option::as_ref),
            Node::Invocation(index) => self.invocations.get(index).and_then(Option::as_ref),
        }?;
        Some((provider.label, provider.requirements.clone()))
    }

    fn construct(&mut self, node: Node) -> Result<(), AssemblyError> {
        match node {
            Node::Single(key) => {
                let provider = self
                    .providers
                    .remove(&key)
                    .ok_or_else(|| missing(key.name()))?;
                let instance = self.run(provider, true)?;
                self.instances.singles.insert(key, instance);
            }
            Node::Member(key, index) => {
                let provider = self
                    .members
                    .get_mut(&key)
                    .and_then(|members| members.get_mut(index))
                    .and_then(Option::take)
                    .ok_or_else(|| missing(key.name()))?;
                let instance = self.run(provider, true)?;
                self.instances.members.insert((key, index), instance);
            }
            Node::Group(key) => {
                let values: Vec<Instance> = (0..self.group_size(key))
                    .filter_map(|index| self.instances.members.get(&(key, index)).cloned())
                    .collect();
                self.instances.groups.insert(key, values);
            }
            Node::Invocation(index) => {
                let provider = self
                    .invocations
                    .get_mut(index)
                    .and_then(Option::take)
                    .ok_or_else(|| missing("invocation"))?;
                self.run(provider, false)?;
            }
        }
        Ok(())
    }

    fn run(&mut self, provider: Provider, record: bool) -> Result<Instance, AssemblyError> {
        let Provider {
            label, construct, ..
        } = provider;
        let instance = construct(&Scope::new(&self.instances, label))?;
        if record {
            debug!(provider = label, "Lifecycle: constructed");
            self.constructed.push(label);
        } else {
            debug!(invocation = label, "Lifecycle: invoked");
        }
        Ok(instance)
    }
}

fn missing(type_name: &'static str) -> AssemblyError {
    AssemblyError::MissingProvider {
        type_name,
        required_by: "container",
    }
}

/// Depth-first planner with a "currently resolving" marker stack.
struct Planner<'a> {
    container: &'a Container,
    resolving: Vec<(Node, &'static str)>,
    planned: HashSet<Node>,
    order: Vec<Node>,
}

impl<'a> Planner<'a> {
    fn new(container: &'a Container) -> Self {
        Self {
            container,
            resolving: Vec::new(),
            planned: HashSet::new(),
            order: Vec::new(),
        }
    }

    fn plan(mut self, root: Node) -> Result<Vec<Node>, AssemblyError> {
        self.visit(root, false, "container")?;
        Ok(self.order)
    }

    fn visit(
        &mut self,
        node: Node,
        optional: bool,
        required_by: &'static str,
    ) -> Result<(), AssemblyError> {
        if self.planned.contains(&node) || self.container.is_built(node) {
            return Ok(());
        }

        if let Some(position) = self.resolving.iter().position(|(n, _)| *n == node) {
            let mut path: Vec<&'static str> = self.resolving[position..]
                .iter()
                .map(|(_, label)| *label)
                .collect();
            path.push(self.resolving[position].1);
            return Err(AssemblyError::CyclicDependency { path });
        }

        let Some((label, requirements)) = self.container.describe(node) else {
            if optional {
                return Ok(());
            }
            return Err(AssemblyError::MissingProvider {
                type_name: node_name(node),
                required_by,
            });
        };

        self.resolving.push((node, label));
        for requirement in requirements {
            self.visit(requirement.node, requirement.optional, label)?;
        }
        self.resolving.pop();

        self.planned.insert(node);
        self.order.push(node);
        Ok(())
    }
}

fn node_name(node: Node) -> &'static str {
    match node {
        Node::Single(key) | Node::Group(key) | Node::Member(key, _) => key.name(),
        Node::Invocation(_) => "invocation",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Config {
        name: &'static str,
    }
    struct Database {
        config: Arc<Config>,
    }
    struct Cache;
    struct Service {
        database: Arc<Database>,
    }
    struct Plugin(&'static str);

    #[test]
    fn resolves_dependencies_before_dependents() {
        let mut registry = Registry::new();
        registry.supply(Config { name: "test" }).unwrap();
        registry
            .provide(|config: Arc<Config>| Database { config })
            .unwrap();
        registry
            .provide(|(database, _cache): (Arc<Database>, Arc<Cache>)| Service { database })
            .unwrap();
        registry.provide(|()| Cache).unwrap();

        let mut container = registry.build().unwrap();
        let service = container.resolve::<Service>().unwrap();
        assert_eq!(service.database.config.name, "test");

        let order = container.construction_order();
        assert_eq!(order.len(), 3);
        assert!(order[0].ends_with("Database"));
        assert!(order[1].ends_with("Cache"));
        assert!(order[2].ends_with("Service"));
    }

    #[test]
    fn singletons_are_cached() {
        let mut registry = Registry::new();
        registry.provide(|()| Cache).unwrap();
        let mut container = registry.build().unwrap();

        let first = container.resolve::<Cache>().unwrap();
        let second = container.resolve::<Cache>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(container.construction_order().len(), 1);
    }

    #[test]
    fn unreachable_providers_are_never_built() {
        let built = Arc::new(Mutex::new(false));
        let flag = built.clone();
        let mut registry = Registry::new();
        registry
            .provide(move |()| {
                *flag.lock().unwrap() = true;
                Cache
            })
            .unwrap();
        let container = registry.build().unwrap();

        assert!(container.construction_order().is_empty());
        assert!(!*built.lock().unwrap());
    }

    #[test]
    fn optional_dependency_is_none_without_provider() {
        struct Consumer(bool);
        let mut registry = Registry::new();
        registry
            .provide(|cache: Option<Arc<Cache>>| Consumer(cache.is_some()))
            .unwrap();
        let mut container = registry.build().unwrap();
        assert!(!container.resolve::<Consumer>().unwrap().0);
    }

    #[test]
    fn optional_dependency_is_built_when_registered() {
        struct Consumer(bool);
        let mut registry = Registry::new();
        registry
            .provide(|cache: Option<Arc<Cache>>| Consumer(cache.is_some()))
            .unwrap();
        registry.provide(|()| Cache).unwrap();
        let mut container = registry.build().unwrap();
        assert!(container.resolve::<Consumer>().unwrap().0);
    }

    #[test]
    fn group_members_keep_registration_order() {
        let mut registry = Registry::new();
        registry.contribute(|()| Plugin("first"));
        registry.supply(Config { name: "second" }).unwrap();
        registry.contribute(|config: Arc<Config>| Plugin(config.name));
        registry.contribute(|()| Plugin("third"));

        let mut container = registry.build().unwrap();
        let plugins = container.resolve_group::<Plugin>().unwrap();
        let names: Vec<_> = plugins.iter().map(|p| p.0).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn empty_group_resolves_to_no_members() {
        let mut registry = Registry::new();
        registry
            .provide(|plugins: Group<Plugin>| plugins.len())
            .unwrap();
        let mut container = registry.build().unwrap();
        assert_eq!(*container.resolve::<usize>().unwrap(), 0);
    }

    #[test]
    fn missing_provider_names_the_requester() {
        let mut registry = Registry::new();
        registry
            .provide(|config: Arc<Config>| Database { config })
            .unwrap();
        let mut container = registry.build().unwrap();

        match container.resolve::<Database>() {
            Err(AssemblyError::MissingProvider {
                type_name,
                required_by,
            }) => {
                assert!(type_name.ends_with("Config"));
                assert!(required_by.ends_with("Database"));
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn invocations_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = Registry::new();
        registry.provide(|()| Cache).unwrap();
        let first = log.clone();
        registry.invoke(move |_: Arc<Cache>| {
            first.lock().unwrap().push("first");
            Ok::<_, AssemblyError>(())
        });
        let second = log.clone();
        registry.invoke(move |()| {
            second.lock().unwrap().push("second");
            Ok::<_, AssemblyError>(())
        });

        let container = registry.build().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(container.construction_order().len(), 1);
    }

    #[test]
    fn failing_invocation_aborts_build() {
        let mut registry = Registry::new();
        registry.invoke(|()| Err::<(), _>("no database"));

        match registry.build() {
            Err(AssemblyError::Construction { source, .. }) => {
                assert_eq!(source.to_string(), "no database");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("build should fail"),
        }
    }

    #[test]
    fn duplicate_provider_is_rejected() {
        let mut registry = Registry::new();
        registry.provide(|()| Cache).unwrap();
        let err = registry.provide(|()| Cache).unwrap_err();
        assert!(matches!(err, AssemblyError::DuplicateProvider { type_name } if type_name.ends_with("Cache")));

        let err = registry.supply(Lifecycle::new()).unwrap_err();
        assert!(matches!(err, AssemblyError::DuplicateProvider { .. }));
    }

    #[test]
    fn cycle_is_reported_before_any_constructor_runs() {
        struct Left(#[allow(dead_code)] Arc<Right>);
        struct Right(#[allow(dead_code)] Arc<Left>);

        let calls = Arc::new(Mutex::new(0));
        let mut registry = Registry::new();
        let counter = calls.clone();
        registry
            .provide(move |right: Arc<Right>| {
                *counter.lock().unwrap() += 1;
                Left(right)
            })
            .unwrap();
        let counter = calls.clone();
        registry
            .provide(move |left: Arc<Left>| {
                *counter.lock().unwrap() += 1;
                Right(left)
            })
            .unwrap();
        let mut container = registry.build().unwrap();

        match container.resolve::<Left>() {
            Err(AssemblyError::CyclicDependency { path }) => {
                assert_eq!(path.len(), 3);
                assert!(path[0].ends_with("Left"));
                assert!(path[1].ends_with("Right"));
                assert!(path[2].ends_with("Left"));
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert_eq!(*calls.lock().unwrap(), 0);
        assert!(container.construction_order().is_empty());
    }
}
