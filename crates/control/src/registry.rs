use jambda_models::FunctionResource;
use std::sync::{Arc, PoisonError, RwLock};

/// Local cache of known functions, ordered newest first.
///
/// The registry never talks to the control plane; it is mutated only by the
/// mutation coordinator.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    resources: Vec<FunctionResource>,
    generation: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_all(&mut self, resources: Vec<FunctionResource>) {
        let mut resources = resources;
        resources.sort_by(|a, b| b.id.cmp(&a.id));
        self.resources = resources;
    }

    /// Installs a server listing stamped with the refresh `generation` that
    /// fetched it. Listings older than the last one applied are dropped.
    pub fn apply_listing(&mut self, generation: u64, resources: Vec<FunctionResource>) -> bool {
        if generation <= self.generation {
            return false;
        }
        self.generation = generation;
        self.replace_all(resources);
        true
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, external_id: &str) -> Option<&FunctionResource> {
        self.resources
            .iter()
            .find(|resource| resource.external_id == external_id)
    }

    pub fn contains(&self, external_id: &str) -> bool {
        self.get(external_id).is_some()
    }

    pub fn remove(&mut self, external_id: &str) -> Option<FunctionResource> {
        let index = self
            .resources
            .iter()
            .position(|resource| resource.external_id == external_id)?;
        Some(self.resources.remove(index))
    }

    pub fn snapshot(&self) -> Vec<FunctionResource> {
        self.resources.clone()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Registry handle shared between the console and in-flight mutations.
///
/// The lock is only ever held for a single synchronous registry call.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<Registry>>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn apply_listing(&self, generation: u64, resources: Vec<FunctionResource>) -> bool {
        self.write(|registry| registry.apply_listing(generation, resources))
    }

    pub fn get(&self, external_id: &str) -> Option<FunctionResource> {
        self.read(|registry| registry.get(external_id).cloned())
    }

    pub fn remove(&self, external_id: &str) -> Option<FunctionResource> {
        self.write(|registry| registry.remove(external_id))
    }

    pub fn snapshot(&self) -> Vec<FunctionResource> {
        self.read(Registry::snapshot)
    }

    pub fn len(&self) -> usize {
        self.read(Registry::len)
    }

    pub fn is_empty(&self) -> bool {
        self.read(Registry::is_empty)
    }
}
