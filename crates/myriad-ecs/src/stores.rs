//! The slot-indexed collection of component stores.
//!
//! [`ComponentStores`] owns one store per registered component type, created
//! lazily on first insert and indexed by [`ComponentSlot`]. Stores of different
//! types sit behind one object-safe capability set ([`ErasedStorage`]: remove,
//! contains, len) so the manager can strip an entity of every component it
//! holds knowing only the slots in its mask. Typed access downcasts the boxed
//! store back to its concrete `SlotStore<T>`.

use std::any::Any;
use std::time::Duration;

use crate::component::{Component, ComponentDescriptor, ComponentSlot, StorageMode, TypeRegistry};
use crate::entity::Entity;
use crate::storage::{ComponentRef, ComponentStore, LockedStore};
use crate::EcsError;

// ---------------------------------------------------------------------------
// ErasedStorage
// ---------------------------------------------------------------------------

/// Type-erased operations every store supports.
pub(crate) trait ErasedStorage: Send + Sync {
    fn slot(&self) -> ComponentSlot;
    fn mode(&self) -> StorageMode;
    fn contains(&self, entity: Entity) -> bool;
    /// Drop `entity`'s value. Returns `false` if it had none.
    fn remove_entity(&mut self, entity: Entity) -> bool;
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// ---------------------------------------------------------------------------
// SlotStore
// ---------------------------------------------------------------------------

enum Backing<T> {
    Exclusive(ComponentStore<T>),
    Locked(LockedStore<T>),
}

/// The concrete store for one component type, in the mode chosen when it was
/// created.
pub(crate) struct SlotStore<T> {
    slot: ComponentSlot,
    backing: Backing<T>,
}

impl<T: Component> SlotStore<T> {
    fn new(slot: ComponentSlot, mode: StorageMode) -> Self {
        let backing = match mode {
            StorageMode::Exclusive => Backing::Exclusive(ComponentStore::new()),
            StorageMode::Locked => Backing::Locked(LockedStore::new()),
        };
        Self { slot, backing }
    }

    /// Exclusive access to the underlying sparse set. Never locks.
    fn store_mut(&mut self) -> &mut ComponentStore<T> {
        match &mut self.backing {
            Backing::Exclusive(store) => store,
            Backing::Locked(store) => store.get_mut(),
        }
    }

    fn insert(&mut self, entity: Entity, value: T) -> Result<(), T> {
        self.store_mut().insert(entity, value)
    }

    fn remove(&mut self, entity: Entity) -> Option<T> {
        self.store_mut().remove(entity)
    }

    fn get(&self, entity: Entity) -> Option<ComponentRef<'_, T>> {
        match &self.backing {
            Backing::Exclusive(store) => store.get(entity).map(ComponentRef::Direct),
            Backing::Locked(store) => store.get(entity).map(ComponentRef::Guarded),
        }
    }

    pub(crate) fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.store_mut().get_mut(entity)
    }

    fn values(&self) -> ComponentRef<'_, [T]> {
        match &self.backing {
            Backing::Exclusive(store) => ComponentRef::Direct(store.values()),
            Backing::Locked(store) => ComponentRef::Guarded(store.values()),
        }
    }

    fn entities(&self) -> ComponentRef<'_, [Entity]> {
        match &self.backing {
            Backing::Exclusive(store) => ComponentRef::Direct(store.entities()),
            Backing::Locked(store) => ComponentRef::Guarded(store.entities()),
        }
    }
}

impl<T: Component> ErasedStorage for SlotStore<T> {
    fn slot(&self) -> ComponentSlot {
        self.slot
    }

    fn mode(&self) -> StorageMode {
        match self.backing {
            Backing::Exclusive(_) => StorageMode::Exclusive,
            Backing::Locked(_) => StorageMode::Locked,
        }
    }

    fn contains(&self, entity: Entity) -> bool {
        match &self.backing {
            Backing::Exclusive(store) => store.contains(entity),
            Backing::Locked(store) => store.contains(entity),
        }
    }

    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_some()
    }

    fn len(&self) -> usize {
        match &self.backing {
            Backing::Exclusive(store) => store.len(),
            Backing::Locked(store) => store.len(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Downcast a borrowed erased store and fetch `entity`'s value mutably.
pub(crate) fn downcast_value_mut<'a, T: Component>(
    store: Option<&'a mut (dyn ErasedStorage + 'static)>,
    entity: Entity,
) -> Result<&'a mut T, EcsError> {
    store
        .and_then(|s| s.as_any_mut().downcast_mut::<SlotStore<T>>())
        .and_then(|s| s.get_mut(entity))
        .ok_or(EcsError::MissingComponent {
            entity,
            component: std::any::type_name::<T>(),
        })
}

// ---------------------------------------------------------------------------
// ComponentStores
// ---------------------------------------------------------------------------

/// How long `update` waits for a locked store's write lock.
const WRITE_LOCK_TIMEOUT: Duration = Duration::from_millis(250);

/// Every component store of one manager, indexed by slot.
///
/// Public methods are read or value-level only; adding and removing records
/// goes through the [`EntityManager`](crate::manager::EntityManager) so that
/// entity masks stay in sync with storage.
pub struct ComponentStores {
    registry: TypeRegistry,
    default_mode: StorageMode,
    /// One entry per slot; `None` until the first value of that type arrives.
    stores: Vec<Option<Box<dyn ErasedStorage>>>,
}

impl std::fmt::Debug for ComponentStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentStores")
            .field("registered", &self.registry.len())
            .field("created", &self.stores.iter().filter(|s| s.is_some()).count())
            .field("default_mode", &self.default_mode)
            .finish()
    }
}

impl ComponentStores {
    pub(crate) fn new(capacity: usize, default_mode: StorageMode) -> Self {
        Self {
            registry: TypeRegistry::new(capacity),
            default_mode,
            stores: std::iter::repeat_with(|| None).take(capacity).collect(),
        }
    }

    /// The type registry assigning slots for this manager.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Register `T`, with `mode` or the default storage mode.
    pub(crate) fn register<T: Component>(
        &mut self,
        mode: Option<StorageMode>,
    ) -> Result<ComponentSlot, EcsError> {
        self.registry.register::<T>(mode.unwrap_or(self.default_mode))
    }

    /// Resolve slots for `descriptors`, registering new types all-or-nothing.
    pub(crate) fn reserve(
        &mut self,
        descriptors: &[ComponentDescriptor],
    ) -> Result<Vec<ComponentSlot>, EcsError> {
        self.registry.reserve(descriptors, self.default_mode)
    }

    fn typed<T: Component>(&self) -> Option<&SlotStore<T>> {
        let slot = self.registry.lookup::<T>()?;
        self.stores[slot.index()]
            .as_deref()?
            .as_any()
            .downcast_ref::<SlotStore<T>>()
    }

    fn typed_mut<T: Component>(&mut self) -> Option<&mut SlotStore<T>> {
        let slot = self.registry.lookup::<T>()?;
        self.stores[slot.index()]
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut::<SlotStore<T>>()
    }

    /// Store `value` for `entity`, creating `T`'s store on first use.
    pub(crate) fn insert<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), EcsError> {
        let slot = self.register::<T>(None)?;
        let mode = self
            .registry
            .get_info(slot)
            .map_or(self.default_mode, |info| info.storage);
        let entry = &mut self.stores[slot.index()];
        if entry.is_none() {
            tracing::debug!(
                component = std::any::type_name::<T>(),
                slot = slot.index(),
                ?mode,
                "creating component store"
            );
            *entry = Some(Box::new(SlotStore::<T>::new(slot, mode)));
        }
        let store = entry
            .as_deref_mut()
            .and_then(|s| s.as_any_mut().downcast_mut::<SlotStore<T>>())
            .ok_or(EcsError::UnknownComponent {
                component: std::any::type_name::<T>(),
            })?;
        store
            .insert(entity, value)
            .map_err(|_| EcsError::DuplicateComponent {
                entity,
                component: std::any::type_name::<T>(),
            })
    }

    /// Remove and return `entity`'s `T`.
    pub(crate) fn take<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.typed_mut::<T>()?.remove(entity)
    }

    /// Drop whatever `entity` holds in `slot`'s store.
    pub(crate) fn remove_slot(&mut self, slot: ComponentSlot, entity: Entity) -> bool {
        self.stores
            .get_mut(slot.index())
            .and_then(|s| s.as_deref_mut())
            .is_some_and(|store| {
                debug_assert_eq!(store.slot(), slot);
                store.remove_entity(entity)
            })
    }

    /// Borrow the stores of several distinct slots mutably at once, in the
    /// order given. Missing stores come back as `None`.
    pub(crate) fn disjoint_mut(
        &mut self,
        slots: &[ComponentSlot],
    ) -> Vec<Option<&mut (dyn ErasedStorage + 'static)>> {
        let mut by_slot: Vec<Option<&mut (dyn ErasedStorage + 'static)>> =
            self.stores.iter_mut().map(|s| s.as_deref_mut()).collect();
        slots
            .iter()
            .map(|slot| by_slot.get_mut(slot.index()).and_then(Option::take))
            .collect()
    }

    /// Whether `entity` has a value in `slot`'s store.
    pub fn contains_slot(&self, slot: ComponentSlot, entity: Entity) -> bool {
        self.stores
            .get(slot.index())
            .and_then(|s| s.as_deref())
            .is_some_and(|store| store.contains(entity))
    }

    /// Number of values in `slot`'s store, `0` if it was never created.
    pub fn len_of(&self, slot: ComponentSlot) -> usize {
        self.stores
            .get(slot.index())
            .and_then(|s| s.as_deref())
            .map_or(0, |store| store.len())
    }

    /// Storage mode of `slot`'s store, if it exists.
    pub fn mode_of(&self, slot: ComponentSlot) -> Option<StorageMode> {
        self.stores
            .get(slot.index())
            .and_then(|s| s.as_deref())
            .map(|store| store.mode())
    }

    /// Shared access to `entity`'s `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if `entity` holds no `T`.
    pub fn get<T: Component>(&self, entity: Entity) -> Result<ComponentRef<'_, T>, EcsError> {
        self.typed::<T>()
            .and_then(|store| store.get(entity))
            .ok_or(EcsError::MissingComponent {
                entity,
                component: std::any::type_name::<T>(),
            })
    }

    /// Mutable access to `entity`'s `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if `entity` holds no `T`.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, EcsError> {
        self.typed_mut::<T>()
            .and_then(|store| store.get_mut(entity))
            .ok_or(EcsError::MissingComponent {
                entity,
                component: std::any::type_name::<T>(),
            })
    }

    /// All values of `T` in dense order.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponent`] if no `T` was ever stored.
    pub fn values<T: Component>(&self) -> Result<ComponentRef<'_, [T]>, EcsError> {
        self.typed::<T>()
            .map(|store| store.values())
            .ok_or(EcsError::UnknownComponent {
                component: std::any::type_name::<T>(),
            })
    }

    /// All values of `T` in dense order, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponent`] if no `T` was ever stored.
    pub fn values_mut<T: Component>(&mut self) -> Result<&mut [T], EcsError> {
        self.typed_mut::<T>()
            .map(|store| store.store_mut().values_mut())
            .ok_or(EcsError::UnknownComponent {
                component: std::any::type_name::<T>(),
            })
    }

    /// The entities owning each value of `T`, aligned with [`values`](Self::values).
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponent`] if no `T` was ever stored.
    pub fn entities_of<T: Component>(&self) -> Result<ComponentRef<'_, [Entity]>, EcsError> {
        self.typed::<T>()
            .map(|store| store.entities())
            .ok_or(EcsError::UnknownComponent {
                component: std::any::type_name::<T>(),
            })
    }

    /// Mutate `entity`'s `T` through a shared reference, under the store's
    /// write lock.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StorageNotLocked`] if `T`'s store is exclusive,
    /// [`EcsError::UnknownComponent`] if no `T` was ever stored,
    /// [`EcsError::ComponentBorrowed`] if the write lock stays held (for
    /// instance by a [`ComponentRef`] on this thread), or
    /// [`EcsError::MissingComponent`] if `entity` holds no `T`.
    pub fn update<T: Component, R>(
        &self,
        entity: Entity,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, EcsError> {
        let component = std::any::type_name::<T>();
        let store = self
            .typed::<T>()
            .ok_or(EcsError::UnknownComponent { component })?;
        let Backing::Locked(locked) = &store.backing else {
            return Err(EcsError::StorageNotLocked { component });
        };
        let mut guard = locked
            .try_write_for(WRITE_LOCK_TIMEOUT)
            .ok_or(EcsError::ComponentBorrowed { component })?;
        let value = guard
            .get_mut(entity)
            .ok_or(EcsError::MissingComponent { entity, component })?;
        Ok(f(value))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
