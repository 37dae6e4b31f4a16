//! The entity manager: lifecycle, masks, storage and system fan-out.
//!
//! [`EntityManager`] is the only way to change which components an entity
//! holds. Every structural operation follows the same order: the stores are
//! updated first, then the entity's mask, then each registered system
//! re-evaluates the touched entity. A system hook therefore always sees storage
//! that already reflects the change that triggered it.
//!
//! Each mutating call checks all of its preconditions before it touches any
//! state, so an `Err` leaves the manager exactly as it was.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::bitset::{BitWord, Bitset};
use crate::bundle::{first_duplicate, resolve_slots, Bundle, ComponentSet};
use crate::component::{Component, ComponentSlot, StorageMode};
use crate::config::EcsConfig;
use crate::entity::{Entity, EntityAllocator};
use crate::storage::ComponentRef;
use crate::stores::ComponentStores;
use crate::system::{AnySystem, EntitySet, System, SystemContext, SystemHandle, SystemTracker};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Source of per-manager ids stamped into system handles.
static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(0);

struct SystemSlot<W: BitWord, const WORDS: usize> {
    tracker: SystemTracker<W, WORDS>,
    system: Box<dyn AnySystem>,
}

fn rejected(op: &'static str, entity: Entity, err: EcsError) -> EcsError {
    tracing::warn!(op, %entity, error = %err, "operation rejected");
    err
}

fn lookup_failed(entity: Entity, err: EcsError) -> EcsError {
    tracing::debug!(%entity, error = %err, "component lookup failed");
    err
}

// ---------------------------------------------------------------------------
// EntityManager
// ---------------------------------------------------------------------------

/// Owns entities, their component masks, every component store and the
/// registered systems.
///
/// `W` and `WORDS` choose the mask layout: a mask is `WORDS` words of type `W`,
/// which bounds `components_capacity`. The default is a single `u64`.
pub struct EntityManager<W: BitWord = u64, const WORDS: usize = 1> {
    id: u64,
    config: EcsConfig,
    allocator: EntityAllocator,
    /// Indexed by entity slot. All-zero for free slots.
    masks: Vec<Bitset<W, WORDS>>,
    stores: ComponentStores,
    /// In registration order.
    systems: Vec<SystemSlot<W, WORDS>>,
}

impl<W: BitWord, const WORDS: usize> fmt::Debug for EntityManager<W, WORDS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityManager")
            .field("entity_count", &self.allocator.alive_count())
            .field("entities_capacity", &self.config.entities_capacity)
            .field("components_registered", &self.stores.registry().len())
            .field("components_capacity", &self.config.components_capacity)
            .field("system_count", &self.systems.len())
            .finish()
    }
}

impl EntityManager {
    /// A manager with the default configuration and a 64-bit mask.
    pub fn new() -> Self {
        let config = EcsConfig::default();
        let masks = vec![Bitset::new(); config.entities_capacity];
        Self::build(config, masks)
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: BitWord, const WORDS: usize> EntityManager<W, WORDS> {
    /// Widest `components_capacity` this mask layout supports.
    pub const MAX_COMPONENTS: usize = Bitset::<W, WORDS>::BITS;

    /// A manager with the given capacities and exclusive storage.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if a capacity is out of range.
    pub fn with_capacity(
        entities_capacity: usize,
        components_capacity: usize,
    ) -> Result<Self, EcsError> {
        Self::from_config(EcsConfig::new(entities_capacity, components_capacity))
    }

    /// A manager built from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if a capacity is out of range or
    /// the per-entity masks cannot be allocated.
    pub fn from_config(config: EcsConfig) -> Result<Self, EcsError> {
        config.validate(Self::MAX_COMPONENTS)?;
        let mut masks: Vec<Bitset<W, WORDS>> = Vec::new();
        masks
            .try_reserve_exact(config.entities_capacity)
            .map_err(|err| EcsError::InvalidConfig {
                details: format!(
                    "cannot allocate masks for {} entities: {err}",
                    config.entities_capacity
                ),
            })?;
        masks.resize(config.entities_capacity, Bitset::new());
        Ok(Self::build(config, masks))
    }

    fn build(config: EcsConfig, masks: Vec<Bitset<W, WORDS>>) -> Self {
        tracing::debug!(
            entities_capacity = config.entities_capacity,
            components_capacity = config.components_capacity,
            storage_mode = ?config.storage_mode,
            "entity manager created"
        );
        Self {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            allocator: EntityAllocator::new(config.entities_capacity),
            masks,
            stores: ComponentStores::new(config.components_capacity, config.storage_mode),
            systems: Vec::new(),
            config,
        }
    }

    // -- configuration ------------------------------------------------------

    /// The configuration this manager was built from.
    pub fn config(&self) -> &EcsConfig {
        &self.config
    }

    /// Maximum number of simultaneously alive entities.
    pub fn entities_capacity(&self) -> usize {
        self.config.entities_capacity
    }

    /// Maximum number of distinct component types.
    pub fn components_capacity(&self) -> usize {
        self.config.components_capacity
    }

    /// Register `T` ahead of first use with an explicit storage mode.
    ///
    /// A type keeps the slot and mode of its first registration; registering
    /// it again returns the existing slot.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentCapacityExceeded`] if every slot is taken.
    pub fn register_component<T: Component>(
        &mut self,
        mode: StorageMode,
    ) -> Result<ComponentSlot, EcsError> {
        self.stores
            .register::<T>(Some(mode))
            .map_err(|err| rejected("register_component", Entity::INVALID, err))
    }

    /// Slot of `T`, if it has been registered.
    pub fn component_slot<T: Component>(&self) -> Option<ComponentSlot> {
        self.stores.registry().lookup::<T>()
    }

    /// Read access to every store.
    pub fn stores(&self) -> &ComponentStores {
        &self.stores
    }

    // -- entity lifecycle ---------------------------------------------------

    fn ensure_alive(&self, entity: Entity) -> Result<(), EcsError> {
        if self.allocator.is_alive(entity) {
            Ok(())
        } else {
            Err(EcsError::UnknownEntity { entity })
        }
    }

    /// Whether `entity` is currently alive.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Number of alive entities.
    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// Alive entities in ascending slot order.
    pub fn alive_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.allocator.alive_entities()
    }

    /// The component mask of an alive entity.
    pub fn entity_mask(&self, entity: Entity) -> Option<&Bitset<W, WORDS>> {
        self.is_alive(entity).then(|| &self.masks[entity.index()])
    }

    /// Create an entity holding every value in `bundle`.
    ///
    /// ```
    /// use myriad_ecs::prelude::*;
    ///
    /// struct Name(&'static str);
    /// struct Hp(u32);
    ///
    /// let mut manager = EntityManager::new();
    /// let e = manager.create_entity((Name("orc"), Hp(10))).unwrap();
    /// assert!(manager.has_components::<(Name, Hp)>(e));
    /// assert_eq!(manager.get_component::<Hp>(e).unwrap().0, 10);
    /// ```
    ///
    /// # Errors
    ///
    /// - [`EcsError::DuplicateComponent`] if `bundle` names a type twice.
    /// - [`EcsError::EntityCapacityExceeded`] if every entity slot is alive.
    /// - [`EcsError::ComponentCapacityExceeded`] if the new types do not fit.
    pub fn create_entity<B: Bundle>(&mut self, bundle: B) -> Result<Entity, EcsError> {
        let descriptors = B::descriptors();
        if let Some(component) = first_duplicate(&descriptors) {
            let err = EcsError::DuplicateComponent {
                entity: Entity::INVALID,
                component,
            };
            return Err(rejected("create_entity", Entity::INVALID, err));
        }
        if self.allocator.is_full() {
            let err = EcsError::EntityCapacityExceeded {
                capacity: self.allocator.capacity(),
            };
            return Err(rejected("create_entity", Entity::INVALID, err));
        }
        let slots = self
            .stores
            .reserve(&descriptors)
            .map_err(|err| rejected("create_entity", Entity::INVALID, err))?;

        let entity = self.allocator.allocate()?;
        bundle.insert_into(&mut self.stores, entity)?;
        let mask = &mut self.masks[entity.index()];
        for slot in &slots {
            mask.set(slot.index());
        }
        let mask = *mask;
        for SystemSlot { tracker, system } in self.systems.iter_mut() {
            tracker.on_entity_add(entity, &mask, system.as_system_mut());
        }
        tracing::trace!(%entity, components = slots.len(), "entity created");
        Ok(entity)
    }

    /// Create an entity holding a single component.
    ///
    /// # Errors
    ///
    /// As [`create_entity`](Self::create_entity).
    pub fn create_entity_with<T: Component>(&mut self, value: T) -> Result<Entity, EcsError> {
        self.create_entity((value,))
    }

    /// Attach every value in `bundle` to an alive entity.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnknownEntity`] if `entity` is not alive.
    /// - [`EcsError::DuplicateComponent`] if `bundle` names a type twice or
    ///   `entity` already holds one of its types.
    /// - [`EcsError::ComponentCapacityExceeded`] if the new types do not fit.
    pub fn add_components<B: Bundle>(&mut self, entity: Entity, bundle: B) -> Result<(), EcsError> {
        let slots = self
            .check_add::<B>(entity)
            .map_err(|err| rejected("add_components", entity, err))?;
        bundle.insert_into(&mut self.stores, entity)?;
        let mask = &mut self.masks[entity.index()];
        for slot in &slots {
            mask.set(slot.index());
        }
        self.notify_update(entity);
        Ok(())
    }

    fn check_add<B: Bundle>(&mut self, entity: Entity) -> Result<Vec<ComponentSlot>, EcsError> {
        self.ensure_alive(entity)?;
        let descriptors = B::descriptors();
        if let Some(component) = first_duplicate(&descriptors) {
            return Err(EcsError::DuplicateComponent { entity, component });
        }
        let mask = &self.masks[entity.index()];
        let registry = self.stores.registry();
        if let Some(held) = descriptors.iter().find(|d| {
            registry
                .lookup_descriptor(d)
                .is_some_and(|slot| mask.bit_state(slot.index()))
        }) {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: held.name,
            });
        }
        self.stores.reserve(&descriptors)
    }

    /// Detach every type in `Q` from an alive entity, dropping the values.
    ///
    /// Systems re-evaluate the entity once, after all types are gone.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnknownEntity`] if `entity` is not alive.
    /// - [`EcsError::MissingComponent`] if `entity` lacks one of the types.
    /// - [`EcsError::DuplicateComponent`] if `Q` names a type twice.
    pub fn detach_components<Q: ComponentSet>(&mut self, entity: Entity) -> Result<(), EcsError> {
        let slots = self
            .held_slots::<Q>(entity)
            .map_err(|err| rejected("detach_components", entity, err))?;
        for &slot in &slots {
            self.stores.remove_slot(slot, entity);
            self.masks[entity.index()].reset(slot.index());
        }
        self.notify_update(entity);
        Ok(())
    }

    /// Slots of `Q`'s types, all held by the alive `entity`.
    fn held_slots<Q: ComponentSet>(&self, entity: Entity) -> Result<Vec<ComponentSlot>, EcsError> {
        self.ensure_alive(entity)?;
        let descriptors = Q::descriptors();
        if let Some(component) = first_duplicate(&descriptors) {
            return Err(EcsError::DuplicateComponent { entity, component });
        }
        let slots = resolve_slots(&self.stores, entity, &descriptors)?;
        let mask = &self.masks[entity.index()];
        if let Some((_, d)) = slots
            .iter()
            .zip(&descriptors)
            .find(|(slot, _)| !mask.bit_state(slot.index()))
        {
            return Err(EcsError::MissingComponent {
                entity,
                component: d.name,
            });
        }
        Ok(slots)
    }

    /// Detach `T` from an alive entity and return its value.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownEntity`] or [`EcsError::MissingComponent`].
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<T, EcsError> {
        let slot = self
            .held_slots::<(T,)>(entity)
            .map_err(|err| rejected("remove_component", entity, err))?[0];
        let value = self.stores.take::<T>(entity).ok_or(EcsError::MissingComponent {
            entity,
            component: std::any::type_name::<T>(),
        })?;
        self.masks[entity.index()].reset(slot.index());
        self.notify_update(entity);
        Ok(value)
    }

    /// Remove an alive entity and every component it holds.
    ///
    /// The slot becomes free and may be reissued by a later
    /// [`create_entity`](Self::create_entity).
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownEntity`] if `entity` is not alive.
    pub fn remove_entity(&mut self, entity: Entity) -> Result<(), EcsError> {
        self.ensure_alive(entity)
            .map_err(|err| rejected("remove_entity", entity, err))?;
        let mask = &mut self.masks[entity.index()];
        for index in mask.ones() {
            self.stores.remove_slot(ComponentSlot(index as u32), entity);
        }
        mask.reset_all();
        for SystemSlot { tracker, system } in self.systems.iter_mut() {
            tracker.on_entity_remove(entity, system.as_system_mut());
        }
        self.allocator.deallocate(entity);
        tracing::trace!(%entity, "entity removed");
        Ok(())
    }

    fn notify_update(&mut self, entity: Entity) {
        let mask = self.masks[entity.index()];
        for SystemSlot { tracker, system } in self.systems.iter_mut() {
            tracker.on_entity_update(entity, &mask, system.as_system_mut());
        }
    }

    // -- queries ------------------------------------------------------------

    /// Whether the alive `entity` holds a `T`. Reads the mask only.
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.is_alive(entity)
            && self
                .component_slot::<T>()
                .is_some_and(|slot| self.masks[entity.index()].bit_state(slot.index()))
    }

    /// Whether the alive `entity` holds every type in `Q`. Reads the mask only.
    pub fn has_components<Q: ComponentSet>(&self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let mask = &self.masks[entity.index()];
        self.stores
            .registry()
            .lookup_all(&Q::descriptors())
            .is_some_and(|slots| slots.iter().all(|slot| mask.bit_state(slot.index())))
    }

    /// Shared access to `entity`'s `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownEntity`] or [`EcsError::MissingComponent`].
    pub fn get_component<T: Component>(
        &self,
        entity: Entity,
    ) -> Result<ComponentRef<'_, T>, EcsError> {
        self.ensure_alive(entity)
            .and_then(|()| self.stores.get::<T>(entity))
            .map_err(|err| lookup_failed(entity, err))
    }

    /// Mutable access to `entity`'s `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownEntity`] or [`EcsError::MissingComponent`].
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, EcsError> {
        if let Err(err) = self.ensure_alive(entity) {
            return Err(lookup_failed(entity, err));
        }
        self.stores
            .get_mut::<T>(entity)
            .map_err(|err| lookup_failed(entity, err))
    }

    /// Shared access to `entity`'s value of every type in `Q`, in tuple order.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownEntity`] or [`EcsError::MissingComponent`].
    pub fn get_entity_components<Q: ComponentSet>(
        &self,
        entity: Entity,
    ) -> Result<Q::Refs<'_>, EcsError> {
        self.ensure_alive(entity)
            .and_then(|()| Q::fetch(&self.stores, entity))
            .map_err(|err| lookup_failed(entity, err))
    }

    /// Mutable access to `entity`'s value of every type in `Q`, in tuple order.
    ///
    /// ```
    /// use myriad_ecs::prelude::*;
    ///
    /// struct Pos(i32);
    /// struct Vel(i32);
    ///
    /// let mut manager = EntityManager::new();
    /// let e = manager.create_entity((Pos(0), Vel(3))).unwrap();
    /// let (pos, vel) = manager.get_entity_components_mut::<(Pos, Vel)>(e).unwrap();
    /// pos.0 += vel.0;
    /// assert_eq!(manager.get_component::<Pos>(e).unwrap().0, 3);
    /// ```
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownEntity`], [`EcsError::MissingComponent`], or
    /// [`EcsError::DuplicateComponent`] if `Q` names a type twice.
    pub fn get_entity_components_mut<Q: ComponentSet>(
        &mut self,
        entity: Entity,
    ) -> Result<Q::Muts<'_>, EcsError> {
        if let Err(err) = self.ensure_alive(entity) {
            return Err(lookup_failed(entity, err));
        }
        Q::fetch_mut(&mut self.stores, entity).map_err(|err| lookup_failed(entity, err))
    }

    /// Every value of `T`, densely packed. Order changes on removal.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponent`] if no `T` was ever stored.
    pub fn get_components<T: Component>(&self) -> Result<ComponentRef<'_, [T]>, EcsError> {
        self.stores
            .values::<T>()
            .map_err(|err| lookup_failed(Entity::INVALID, err))
    }

    /// Every value of `T`, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponent`] if no `T` was ever stored.
    pub fn get_components_mut<T: Component>(&mut self) -> Result<&mut [T], EcsError> {
        self.stores
            .values_mut::<T>()
            .map_err(|err| lookup_failed(Entity::INVALID, err))
    }

    /// Owners of the values returned by [`get_components`](Self::get_components),
    /// position for position.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponent`] if no `T` was ever stored.
    pub fn get_component_entities<T: Component>(
        &self,
    ) -> Result<ComponentRef<'_, [Entity]>, EcsError> {
        self.stores
            .entities_of::<T>()
            .map_err(|err| lookup_failed(Entity::INVALID, err))
    }

    /// Mutate `entity`'s `T` through a shared reference.
    ///
    /// Only available for types stored in [`StorageMode::Locked`]; the closure
    /// runs under that store's write lock.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownEntity`], [`EcsError::StorageNotLocked`],
    /// [`EcsError::UnknownComponent`], [`EcsError::MissingComponent`], or
    /// [`EcsError::ComponentBorrowed`] when a [`ComponentRef`] on the same
    /// store is still alive.
    pub fn update_component<T: Component, R>(
        &self,
        entity: Entity,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, EcsError> {
        self.ensure_alive(entity)
            .and_then(|()| self.stores.update::<T, R>(entity, f))
            .map_err(|err| lookup_failed(entity, err))
    }

    // -- systems ------------------------------------------------------------

    /// Register `system`, tracking entities that hold every type in `Q`.
    ///
    /// Entities that already match are added straight away, each firing
    /// [`System::on_entity_addition`] once.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentCapacityExceeded`] if `Q`'s new types do
    /// not fit.
    pub fn create_system<Q: ComponentSet, S: System>(
        &mut self,
        system: S,
    ) -> Result<SystemHandle<S>, EcsError> {
        let slots = self
            .stores
            .reserve(&Q::descriptors())
            .map_err(|err| rejected("create_system", Entity::INVALID, err))?;
        let mut required = Bitset::<W, WORDS>::new();
        for slot in &slots {
            required.set(slot.index());
        }

        let mut tracker = SystemTracker::new(required);
        let mut system: Box<dyn AnySystem> = Box::new(system);
        for entity in self.allocator.alive_entities() {
            tracker.on_entity_add(entity, &self.masks[entity.index()], system.as_system_mut());
        }

        let index = self.systems.len();
        tracing::debug!(
            system = std::any::type_name::<S>(),
            index,
            required = ?required,
            matched = tracker.entities().len(),
            "system registered"
        );
        self.systems.push(SystemSlot { tracker, system });
        Ok(SystemHandle::new(self.id, index))
    }

    fn system_slot<S: System>(
        &self,
        handle: SystemHandle<S>,
    ) -> Result<&SystemSlot<W, WORDS>, EcsError> {
        let index = handle.index();
        self.systems
            .get(index)
            .filter(|_| handle.manager() == self.id)
            .filter(|slot| slot.system.as_any().is::<S>())
            .ok_or(EcsError::UnknownSystem { index })
    }

    /// Number of registered systems.
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// The system behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `handle` is not from this manager.
    pub fn system<S: System>(&self, handle: SystemHandle<S>) -> Result<&S, EcsError> {
        let index = handle.index();
        self.system_slot(handle)?
            .system
            .as_any()
            .downcast_ref::<S>()
            .ok_or(EcsError::UnknownSystem { index })
    }

    /// The system behind `handle`, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `handle` is not from this manager.
    pub fn system_mut<S: System>(&mut self, handle: SystemHandle<S>) -> Result<&mut S, EcsError> {
        let index = handle.index();
        self.systems
            .get_mut(index)
            .filter(|_| handle.manager() == self.id)
            .and_then(|slot| slot.system.as_any_mut().downcast_mut::<S>())
            .ok_or(EcsError::UnknownSystem { index })
    }

    /// Entities currently matching the system behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `handle` is not from this manager.
    pub fn system_entities<S: System>(&self, handle: SystemHandle<S>) -> Result<&EntitySet, EcsError> {
        Ok(self.system_slot(handle)?.tracker.entities())
    }

    /// Run `f` with the system behind `handle` and a context over its
    /// matching entities.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `handle` is not from this manager.
    pub fn with_system<S: System, R>(
        &mut self,
        handle: SystemHandle<S>,
        f: impl FnOnce(&mut S, &mut SystemContext<'_>) -> R,
    ) -> Result<R, EcsError> {
        let index = handle.index();
        let slot = self
            .systems
            .get_mut(index)
            .filter(|_| handle.manager() == self.id)
            .ok_or(EcsError::UnknownSystem { index })?;
        let system = slot
            .system
            .as_any_mut()
            .downcast_mut::<S>()
            .ok_or(EcsError::UnknownSystem { index })?;
        let mut ctx = SystemContext::new(slot.tracker.entities(), &mut self.stores);
        Ok(f(system, &mut ctx))
    }

    /// Call [`System::update`] on the system behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `handle` is not from this manager.
    pub fn run_system<S: System>(&mut self, handle: SystemHandle<S>) -> Result<(), EcsError> {
        self.with_system(handle, |system, ctx| system.update(ctx))
    }

    /// Call [`System::update`] on every system, in registration order.
    pub fn run_systems(&mut self) {
        for slot in self.systems.iter_mut() {
            let mut ctx = SystemContext::new(slot.tracker.entities(), &mut self.stores);
            slot.system.update(&mut ctx);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct A(u32);
    #[derive(Debug, Clone, PartialEq)]
    struct B(u32);
    #[derive(Debug, Clone, PartialEq)]
    struct C(u32);

    #[derive(Default)]
    struct Hooks {
        added: u32,
        removed: u32,
    }

    impl System for Hooks {
        fn on_entity_addition(&mut self, _entity: Entity) {
            self.added += 1;
        }

        fn on_entity_removal(&mut self, _entity: Entity) {
            self.removed += 1;
        }
    }

    fn manager() -> EntityManager {
        EntityManager::with_capacity(8, 4).unwrap()
    }

    #[test]
    fn create_sets_mask_and_stores() {
        let mut m = manager();
        let e = m.create_entity((A(1), B(2))).unwrap();
        assert!(m.is_alive(e));
        assert_eq!(m.entity_mask(e).unwrap().count_ones(), 2);
        assert_eq!(*m.get_component::<A>(e).unwrap(), A(1));
        assert_eq!(*m.get_component::<B>(e).unwrap(), B(2));
        assert!(!m.has_component::<C>(e));
    }

    #[test]
    fn duplicate_bundle_is_rejected_before_allocation() {
        let mut m = manager();
        let err = m.create_entity((A(1), A(2))).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateComponent { entity, .. } if entity.is_invalid()));
        assert_eq!(m.entity_count(), 0);
    }

    #[test]
    fn add_existing_type_leaves_state_untouched() {
        let mut m = manager();
        let e = m.create_entity((A(1),)).unwrap();
        let err = m.add_components(e, (B(2), A(3))).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateComponent { .. }));
        assert!(!m.has_component::<B>(e));
        assert_eq!(*m.get_component::<A>(e).unwrap(), A(1));
        assert!(matches!(m.get_components::<B>(), Err(EcsError::UnknownComponent { .. })));
    }

    #[test]
    fn detach_requires_every_type() {
        let mut m = manager();
        let e = m.create_entity((A(1), B(2))).unwrap();
        let err = m.detach_components::<(A, C)>(e).unwrap_err();
        assert!(matches!(err, EcsError::MissingComponent { .. }));
        assert!(m.has_components::<(A, B)>(e));

        m.detach_components::<(A, B)>(e).unwrap();
        assert!(m.entity_mask(e).unwrap().is_empty());
        assert!(m.get_components::<A>().unwrap().is_empty());
    }

    #[test]
    fn remove_component_returns_value() {
        let mut m = manager();
        let e = m.create_entity((A(7), B(8))).unwrap();
        assert_eq!(m.remove_component::<A>(e).unwrap(), A(7));
        assert!(!m.has_component::<A>(e));
        assert!(matches!(
            m.remove_component::<A>(e),
            Err(EcsError::MissingComponent { .. })
        ));
    }

    #[test]
    fn dead_entities_are_unknown() {
        let mut m = manager();
        let e = m.create_entity((A(1),)).unwrap();
        m.remove_entity(e).unwrap();
        assert!(matches!(m.remove_entity(e), Err(EcsError::UnknownEntity { .. })));
        assert!(matches!(m.get_component::<A>(e), Err(EcsError::UnknownEntity { .. })));
        assert!(matches!(m.add_components(e, (B(1),)), Err(EcsError::UnknownEntity { .. })));
        assert!(!m.has_component::<A>(e));
        assert!(m.entity_mask(e).is_none());
    }

    #[test]
    fn remove_entity_empties_every_store() {
        let mut m = manager();
        let e1 = m.create_entity((A(1), B(1))).unwrap();
        let e2 = m.create_entity((A(2),)).unwrap();
        m.remove_entity(e1).unwrap();
        assert_eq!(&*m.get_components::<A>().unwrap(), &[A(2)]);
        assert_eq!(&*m.get_component_entities::<A>().unwrap(), &[e2]);
        assert!(m.get_components::<B>().unwrap().is_empty());
    }

    #[test]
    fn system_seeds_from_existing_entities() {
        let mut m = manager();
        let e1 = m.create_entity((A(1), C(1))).unwrap();
        m.create_entity((A(2),)).unwrap();
        let handle = m.create_system::<(A, C), _>(Hooks::default()).unwrap();
        assert_eq!(m.system(handle).unwrap().added, 1);
        assert_eq!(m.system_entities(handle).unwrap().as_slice(), &[e1]);
    }

    #[test]
    fn detach_notifies_once_per_call() {
        let mut m = manager();
        let handle = m.create_system::<(A,), _>(Hooks::default()).unwrap();
        let e = m.create_entity((A(1), B(1), C(1))).unwrap();
        m.detach_components::<(A, B)>(e).unwrap();
        m.remove_entity(e).unwrap();
        let hooks = m.system(handle).unwrap();
        assert_eq!((hooks.added, hooks.removed), (1, 1));
    }

    #[test]
    fn components_capacity_is_enforced() {
        let mut m: EntityManager = EntityManager::with_capacity(4, 2).unwrap();
        m.create_entity((A(1), B(1))).unwrap();
        let err = m.create_entity((C(1),)).unwrap_err();
        assert!(err.is_capacity_exceeded());
        assert_eq!(m.entity_count(), 1);
    }

    #[test]
    fn oversized_entity_capacity_is_rejected() {
        let config = EcsConfig::new(EcsConfig::MAX_ENTITIES_CAPACITY + 1, 8);
        assert!(matches!(
            EntityManager::<u64, 1>::from_config(config),
            Err(EcsError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn config_wider_than_mask_is_rejected() {
        let err = EntityManager::<u8, 1>::with_capacity(4, 9).unwrap_err();
        assert!(matches!(err, EcsError::InvalidConfig { .. }));
        assert!(EntityManager::<u8, 2>::with_capacity(4, 16).is_ok());
    }

    #[test]
    fn multi_word_masks_use_high_slots() {
        let mut m = EntityManager::<u8, 2>::with_capacity(4, 16).unwrap();
        macro_rules! pad {
            ($($n:literal)*) => {
                $(m.register_component::<[u8; $n]>(StorageMode::Exclusive).unwrap();)*
            };
        }
        pad!(0 1 2 3 4 5 6 7 8 9);
        m.register_component::<B>(StorageMode::Exclusive).unwrap();
        let e = m.create_entity((A(1), B(2))).unwrap();
        assert_eq!(m.component_slot::<B>().unwrap().index(), 10);
        assert_eq!(m.component_slot::<A>().unwrap().index(), 11);
        assert!(m.has_components::<(B, A)>(e));
        assert_eq!(m.entity_mask(e).unwrap().get_ones(), vec![10, 11]);
    }

    #[test]
    fn foreign_system_handle_is_unknown() {
        let mut m = manager();
        let handle = m.create_system::<(A,), _>(Hooks::default()).unwrap();
        let other = manager();
        assert!(matches!(other.system(handle), Err(EcsError::UnknownSystem { index: 0 })));
    }

    #[test]
    fn handle_does_not_resolve_on_a_twin_manager() {
        let mut first = manager();
        let mut second = manager();
        let handle = first.create_system::<(A,), _>(Hooks::default()).unwrap();
        let twin = second.create_system::<(A,), _>(Hooks::default()).unwrap();
        assert_eq!(handle.index(), twin.index());
        assert_ne!(handle, twin);

        assert!(first.system(handle).is_ok());
        assert!(matches!(second.system(handle), Err(EcsError::UnknownSystem { index: 0 })));
        assert!(matches!(second.system_mut(handle), Err(EcsError::UnknownSystem { .. })));
        assert!(matches!(second.system_entities(handle), Err(EcsError::UnknownSystem { .. })));
        assert!(matches!(second.run_system(handle), Err(EcsError::UnknownSystem { .. })));
        assert!(second.run_system(twin).is_ok());
    }
}
