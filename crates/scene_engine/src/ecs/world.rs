//! Entity storage for one scene
//!
//! Entities live in a `slotmap` arena reserved up front. The store also keeps
//! insertion order, which doubles as each entity's dense object index, and a
//! scene generation counter stamped into every [`EntityHandle`].

use std::collections::HashSet;

use slotmap::SlotMap;
use thiserror::Error;

use super::component::Component;
use super::entity::{Entity, EntityHandle, EntityKey};

/// Entity store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The hard entity ceiling was reached
    #[error("entity capacity of {capacity} exceeded")]
    CapacityExceeded {
        /// Configured ceiling
        capacity: usize,
    },
}

/// Owner of all entities of the current scene generation
#[derive(Debug, Clone)]
pub struct EntityStore {
    entities: SlotMap<EntityKey, Entity>,
    order: Vec<EntityKey>,
    names: HashSet<String>,
    capacity: usize,
    generation: u32,
}

impl EntityStore {
    /// Create a store that refuses to grow past `capacity` entities
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entities: SlotMap::with_capacity_and_key(capacity),
            order: Vec::with_capacity(capacity),
            names: HashSet::with_capacity(capacity),
            capacity,
            generation: 0,
        }
    }

    /// Create an empty store that continues after `previous`'s generation,
    /// so handles issued by `previous` never resolve here
    pub fn successor_of(previous: &Self) -> Self {
        let mut store = Self::with_capacity(previous.capacity);
        store.generation = previous.generation.wrapping_add(1);
        store
    }

    /// Append a new entity.
    ///
    /// Names are unique per generation: a taken `name` becomes the first free
    /// of `"{name} 0"`, `"{name} 1"`, ...
    pub fn add_entity(&mut self, name: &str) -> Result<EntityHandle, StoreError> {
        if self.order.len() >= self.capacity {
            return Err(StoreError::CapacityExceeded { capacity: self.capacity });
        }

        let name = self.unique_name(name);
        let index = self.order.len() as u32;
        self.names.insert(name.clone());
        let key = self.entities.insert(Entity::new(name, index));
        self.order.push(key);

        Ok(EntityHandle {
            key,
            generation: self.generation,
        })
    }

    fn unique_name(&self, name: &str) -> String {
        if !self.names.contains(name) {
            return name.to_string();
        }
        (0u32..)
            .map(|n| format!("{name} {n}"))
            .find(|candidate| !self.names.contains(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    /// Whether `handle` belongs to this generation and still resolves
    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Resolve a handle
    pub fn get(&self, handle: EntityHandle) -> Option<&Entity> {
        if handle.generation != self.generation {
            return None;
        }
        self.entities.get(handle.key)
    }

    /// Resolve a handle mutably
    pub fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut Entity> {
        if handle.generation != self.generation {
            return None;
        }
        self.entities.get_mut(handle.key)
    }

    /// Handle of the entity with dense index `index`
    pub fn handle_at(&self, index: u32) -> Option<EntityHandle> {
        self.order.get(index as usize).map(|&key| EntityHandle {
            key,
            generation: self.generation,
        })
    }

    /// Entity with dense index `index`
    pub fn by_index(&self, index: u32) -> Option<&Entity> {
        self.order.get(index as usize).and_then(|&key| self.entities.get(key))
    }

    /// First entity with a name equal to `name`
    pub fn find_by_name(&self, name: &str) -> Option<EntityHandle> {
        self.iter().find(|(_, entity)| entity.name() == name).map(|(handle, _)| handle)
    }

    /// First entity, in insertion order, carrying a record of kind `T`
    pub fn find_first_with<T: Component>(&self) -> Option<EntityHandle> {
        self.iter().find(|(_, entity)| entity.has::<T>()).map(|(handle, _)| handle)
    }

    /// Entities in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, &Entity)> + '_ {
        let generation = self.generation;
        self.order.iter().filter_map(move |&key| {
            self.entities
                .get(key)
                .map(|entity| (EntityHandle { key, generation }, entity))
        })
    }

    /// Entities in insertion order, mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityHandle, &mut Entity)> + '_ {
        let generation = self.generation;
        // Arena slots are reused after a clear, so order by dense index
        let mut entries: Vec<_> = self
            .entities
            .iter_mut()
            .map(|(key, entity)| (EntityHandle { key, generation }, entity))
            .collect();
        entries.sort_unstable_by_key(|(_, entity)| entity.index());
        entries.into_iter()
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the store holds no entities
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entity ceiling
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current scene generation
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Drop every entity and start a new generation.
    ///
    /// Handles issued before the clear stop resolving and dense indices
    /// restart at zero.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.order.clear();
        self.names.clear();
        self.generation = self.generation.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{DirectionalLight, Transform};

    #[test]
    fn test_duplicate_names_get_numeric_suffix() {
        let mut store = EntityStore::with_capacity(8);
        let first = store.add_entity("Light").unwrap();
        let second = store.add_entity("Light").unwrap();
        let third = store.add_entity("Light").unwrap();

        assert_eq!(store.get(first).unwrap().name(), "Light");
        assert_eq!(store.get(second).unwrap().name(), "Light 0");
        assert_eq!(store.get(third).unwrap().name(), "Light 1");
    }

    #[test]
    fn test_capacity_ceiling_is_enforced() {
        let mut store = EntityStore::with_capacity(2);
        store.add_entity("a").unwrap();
        store.add_entity("b").unwrap();
        assert_eq!(
            store.add_entity("c"),
            Err(StoreError::CapacityExceeded { capacity: 2 })
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_dense_indices_follow_insertion_order() {
        let mut store = EntityStore::with_capacity(4);
        let a = store.add_entity("a").unwrap();
        let b = store.add_entity("b").unwrap();

        assert_eq!(store.get(a).unwrap().index(), 0);
        assert_eq!(store.get(b).unwrap().index(), 1);
        assert_eq!(store.handle_at(1), Some(b));
        assert_eq!(store.by_index(0).unwrap().name(), "a");
    }

    #[test]
    fn test_find_first_with_scans_in_insertion_order() {
        let mut store = EntityStore::with_capacity(4);
        store.add_entity("plain").unwrap();
        let sun = store.add_entity("sun").unwrap();
        let moon = store.add_entity("moon").unwrap();
        store.get_mut(sun).unwrap().add(DirectionalLight::default());
        store.get_mut(moon).unwrap().add(DirectionalLight::default());

        assert_eq!(store.find_first_with::<DirectionalLight>(), Some(sun));
        assert_eq!(store.find_first_with::<Transform>(), None);
    }

    #[test]
    fn test_clear_invalidates_handles_and_restarts_indices() {
        let mut store = EntityStore::with_capacity(4);
        let stale = store.add_entity("old").unwrap();
        store.clear();

        assert!(store.is_empty());
        assert!(store.get(stale).is_none());

        let fresh = store.add_entity("old").unwrap();
        assert_ne!(stale, fresh);
        assert!(store.get(stale).is_none());
        assert_eq!(store.get(fresh).unwrap().index(), 0);
        assert_eq!(store.get(fresh).unwrap().name(), "old");
    }

    #[test]
    fn test_iter_mut_follows_insertion_order_after_clear() {
        let mut store = EntityStore::with_capacity(8);
        for name in ["A", "B", "C"] {
            store.add_entity(name).unwrap();
        }
        store.clear();
        for name in ["X", "Y", "Z", "W"] {
            store.add_entity(name).unwrap();
        }

        let names: Vec<String> = store.iter_mut().map(|(_, entity)| entity.name().to_string()).collect();
        assert_eq!(names, ["X", "Y", "Z", "W"]);
        let indices: Vec<u32> = store.iter_mut().map(|(_, entity)| entity.index()).collect();
        assert_eq!(indices, [0, 1, 2, 3]);
        let shared: Vec<String> = store.iter().map(|(_, entity)| entity.name().to_string()).collect();
        assert_eq!(shared, names);
    }

    #[test]
    fn test_successor_store_rejects_previous_handles() {
        let mut previous = EntityStore::with_capacity(4);
        let old = previous.add_entity("a").unwrap();

        let mut next = EntityStore::successor_of(&previous);
        next.add_entity("a").unwrap();

        assert_eq!(next.generation(), previous.generation() + 1);
        assert!(next.get(old).is_none());
    }
}
