//! Systems: observers of the entities matching a required component set.
//!
//! A system declares its required component types when it is registered with
//! [`EntityManager::create_system`](crate::manager::EntityManager::create_system).
//! From then on the manager keeps a [`SystemTracker`] for it: the required mask
//! plus the set of entities whose mask currently contains it. Every structural
//! change re-evaluates just the touched entity, never the whole population.
//!
//! The system itself only sees transitions. [`System::on_entity_addition`]
//! fires once when an entity starts matching, [`System::on_entity_removal`] once
//! when it stops. [`System::update`] is the system's own logic, run on demand
//! with a [`SystemContext`] exposing the matching entities and their data.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use crate::bitset::{BitWord, Bitset};
use crate::bundle::ComponentSet;
use crate::component::Component;
use crate::entity::Entity;
use crate::storage::{ComponentRef, ComponentStore};
use crate::stores::ComponentStores;
use crate::EcsError;

// ---------------------------------------------------------------------------
// System trait
// ---------------------------------------------------------------------------

/// Logic attached to the entities matching a required component set.
///
/// Every method has a no-op default.
pub trait System: Send + Sync + 'static {
    /// Called once when `entity` starts matching the required set.
    ///
    /// The triggering component values are already in storage.
    fn on_entity_addition(&mut self, _entity: Entity) {}

    /// Called once when `entity` stops matching: it lost a required component
    /// or was removed. The removed values are already gone from storage.
    fn on_entity_removal(&mut self, _entity: Entity) {}

    /// Per-run logic. See [`EntityManager::run_system`](crate::manager::EntityManager::run_system).
    fn update(&mut self, _ctx: &mut SystemContext<'_>) {}
}

/// Object-safe view of a boxed system that can be downcast back to its type.
pub(crate) trait AnySystem: System {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn as_system_mut(&mut self) -> &mut dyn System;
}

impl<S: System> AnySystem for S {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_system_mut(&mut self) -> &mut dyn System {
        self
    }
}

// ---------------------------------------------------------------------------
// SystemHandle
// ---------------------------------------------------------------------------

/// Typed handle to a system registered with a manager.
///
/// Only the manager that issued it resolves it.
pub struct SystemHandle<S> {
    manager: u64,
    index: usize,
    _marker: PhantomData<fn() -> S>,
}

impl<S> SystemHandle<S> {
    pub(crate) fn new(manager: u64, index: usize) -> Self {
        Self {
            manager,
            index,
            _marker: PhantomData,
        }
    }

    /// Id of the issuing manager.
    pub(crate) fn manager(&self) -> u64 {
        self.manager
    }

    /// Registration index within the manager.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<S> Clone for SystemHandle<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for SystemHandle<S> {}

impl<S> PartialEq for SystemHandle<S> {
    fn eq(&self, other: &Self) -> bool {
        self.manager == other.manager && self.index == other.index
    }
}

impl<S> Eq for SystemHandle<S> {}

impl<S> fmt::Debug for SystemHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SystemHandle<{}>({}@{})",
            std::any::type_name::<S>(),
            self.index,
            self.manager
        )
    }
}

// ---------------------------------------------------------------------------
// EntitySet
// ---------------------------------------------------------------------------

/// A set of entities with O(1) insert, remove and membership test.
///
/// Backed by a value-less [`ComponentStore`], so iteration order is dense
/// order and changes on removal.
#[derive(Debug, Clone, Default)]
pub struct EntitySet {
    inner: ComponentStore<()>,
}

impl EntitySet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `entity`. Returns `false` if it was already present.
    pub fn insert(&mut self, entity: Entity) -> bool {
        self.inner.insert(entity, ()).is_ok()
    }

    /// Remove `entity`. Returns `false` if it was absent.
    pub fn remove(&mut self, entity: Entity) -> bool {
        self.inner.remove(entity).is_some()
    }

    /// Whether `entity` is present.
    pub fn contains(&self, entity: Entity) -> bool {
        self.inner.contains(entity)
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// The members as a slice.
    pub fn as_slice(&self) -> &[Entity] {
        self.inner.entities()
    }

    /// Iterate the members.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.inner.entities().iter().copied()
    }
}

// ---------------------------------------------------------------------------
// SystemTracker
// ---------------------------------------------------------------------------

/// Membership bookkeeping for one system.
///
/// Invariant: `entity` is in [`entities`](Self::entities) iff its mask is a
/// superset of [`required`](Self::required), given the tracker has been told
/// about every change to that mask.
#[derive(Debug, Clone)]
pub struct SystemTracker<W: BitWord = u64, const WORDS: usize = 1> {
    required: Bitset<W, WORDS>,
    entities: EntitySet,
}

impl<W: BitWord, const WORDS: usize> SystemTracker<W, WORDS> {
    /// Track entities whose mask contains `required`.
    pub fn new(required: Bitset<W, WORDS>) -> Self {
        Self {
            required,
            entities: EntitySet::new(),
        }
    }

    /// The required component mask.
    pub fn required(&self) -> &Bitset<W, WORDS> {
        &self.required
    }

    /// Entities currently matching.
    pub fn entities(&self) -> &EntitySet {
        &self.entities
    }

    /// Whether `mask` satisfies the requirement.
    #[inline]
    pub fn matches(&self, mask: &Bitset<W, WORDS>) -> bool {
        self.required.is_subset_of(mask)
    }

    /// An entity appeared with `mask`. Adds it if it matches.
    ///
    /// Returns whether membership changed.
    pub fn on_entity_add(
        &mut self,
        entity: Entity,
        mask: &Bitset<W, WORDS>,
        system: &mut dyn System,
    ) -> bool {
        if !self.matches(mask) || !self.entities.insert(entity) {
            return false;
        }
        system.on_entity_addition(entity);
        true
    }

    /// `entity`'s mask changed to `mask`. Adds or removes it on transitions.
    ///
    /// Returns whether membership changed.
    pub fn on_entity_update(
        &mut self,
        entity: Entity,
        mask: &Bitset<W, WORDS>,
        system: &mut dyn System,
    ) -> bool {
        if self.matches(mask) {
            self.on_entity_add(entity, mask, system)
        } else {
            self.on_entity_remove(entity, system)
        }
    }

    /// `entity` went away. Drops it if it was a member.
    ///
    /// Returns whether membership changed.
    pub fn on_entity_remove(&mut self, entity: Entity, system: &mut dyn System) -> bool {
        if !self.entities.remove(entity) {
            return false;
        }
        system.on_entity_removal(entity);
        true
    }
}

// ---------------------------------------------------------------------------
// SystemContext
// ---------------------------------------------------------------------------

/// What a running system can see: its matching entities and value-level
/// access to component data.
///
/// Structural changes (adding or removing components or entities) are not
/// possible from here; they go through the manager between runs.
pub struct SystemContext<'a> {
    entities: &'a EntitySet,
    components: &'a mut ComponentStores,
}

impl<'a> SystemContext<'a> {
    pub(crate) fn new(entities: &'a EntitySet, components: &'a mut ComponentStores) -> Self {
        Self {
            entities,
            components,
        }
    }

    /// Entities currently matching the system.
    pub fn entities(&self) -> &EntitySet {
        self.entities
    }

    /// Shared access to `entity`'s `T`.
    pub fn get<T: Component>(&self, entity: Entity) -> Result<ComponentRef<'_, T>, EcsError> {
        self.components.get::<T>(entity)
    }

    /// Mutable access to `entity`'s `T`.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, EcsError> {
        self.components.get_mut::<T>(entity)
    }

    /// Shared access to several of `entity`'s components.
    pub fn fetch<Q: ComponentSet>(&self, entity: Entity) -> Result<Q::Refs<'_>, EcsError> {
        Q::fetch(self.components, entity)
    }

    /// Mutable access to several of `entity`'s components.
    pub fn fetch_mut<Q: ComponentSet>(&mut self, entity: Entity) -> Result<Q::Muts<'_>, EcsError> {
        Q::fetch_mut(self.components, entity)
    }

    /// Every value of `T`, in dense order.
    pub fn values<T: Component>(&self) -> Result<ComponentRef<'_, [T]>, EcsError> {
        self.components.values::<T>()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
