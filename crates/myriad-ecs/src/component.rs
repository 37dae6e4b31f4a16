//! Component types and the per-manager type registry.
//!
//! Every Rust type stored as a component receives a [`ComponentSlot`] the first
//! time a manager sees it. The slot is the bit position in entity masks and the
//! index of the type's store. Slots are assigned by a [`TypeRegistry`] owned by
//! one manager, so two managers number their types independently and neither
//! can hand out more slots than its `components_capacity`.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::EcsError;

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Marker for types that can be stored as components.
///
/// Implemented for every `Send + Sync + 'static` type.
pub trait Component: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Component for T {}

// ---------------------------------------------------------------------------
// ComponentSlot
// ---------------------------------------------------------------------------

/// Small integer identifying a component type within one manager.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentSlot(pub(crate) u32);

impl ComponentSlot {
    /// The slot as an index into masks and store arrays.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentSlot({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// StorageMode
// ---------------------------------------------------------------------------

/// Which storage implementation backs a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Plain sparse set. Access is governed by the manager's borrows.
    #[default]
    Exclusive,
    /// Sparse set behind a read/write lock, so values can be mutated through a
    /// shared manager reference from several threads.
    Locked,
}

// ---------------------------------------------------------------------------
// ComponentDescriptor / ComponentInfo
// ---------------------------------------------------------------------------

/// The identity of a Rust type, captured before it has a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentDescriptor {
    /// Rust `TypeId`.
    pub type_id: TypeId,
    /// `std::any::type_name::<T>()`, for diagnostics.
    pub name: &'static str,
}

impl ComponentDescriptor {
    /// Descriptor for `T`.
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

/// Metadata about a registered component type.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// Slot assigned at registration.
    pub slot: ComponentSlot,
    /// Type name, for diagnostics.
    pub name: &'static str,
    /// Rust `TypeId`.
    pub type_id: TypeId,
    /// Storage implementation used when the store is created.
    pub storage: StorageMode,
}

// ---------------------------------------------------------------------------
// TypeRegistry
// ---------------------------------------------------------------------------

/// Assigns slots to component types, starting at 0 and increasing by one per
/// new type, up to a fixed capacity.
///
/// A type always keeps the slot it was first given.
#[derive(Debug)]
pub struct TypeRegistry {
    capacity: usize,
    /// TypeId -> slot for dedup.
    by_type: HashMap<TypeId, ComponentSlot>,
    /// Indexed by `ComponentSlot.0`.
    infos: Vec<ComponentInfo>,
}

impl TypeRegistry {
    /// Create an empty registry with room for `capacity` types.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            by_type: HashMap::with_capacity(capacity),
            infos: Vec::with_capacity(capacity),
        }
    }

    /// Register `T` with the given storage mode.
    ///
    /// If `T` already has a slot, that slot is returned and `storage` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentCapacityExceeded`] if `T` is new and every
    /// slot is taken.
    pub fn register<T: Component>(&mut self, storage: StorageMode) -> Result<ComponentSlot, EcsError> {
        self.register_descriptor(ComponentDescriptor::of::<T>(), storage)
    }

    fn register_descriptor(
        &mut self,
        descriptor: ComponentDescriptor,
        storage: StorageMode,
    ) -> Result<ComponentSlot, EcsError> {
        if let Some(&existing) = self.by_type.get(&descriptor.type_id) {
            return Ok(existing);
        }
        if self.infos.len() >= self.capacity {
            return Err(EcsError::ComponentCapacityExceeded {
                component: descriptor.name,
                capacity: self.capacity,
            });
        }
        let slot = ComponentSlot(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            slot,
            name: descriptor.name,
            type_id: descriptor.type_id,
            storage,
        });
        self.by_type.insert(descriptor.type_id, slot);
        tracing::trace!(component = descriptor.name, slot = slot.0, "component type registered");
        Ok(slot)
    }

    /// Resolve slots for all `descriptors`, registering new types with
    /// `storage`.
    ///
    /// All-or-nothing: if the new types do not all fit, nothing is registered.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentCapacityExceeded`] naming the first type
    /// that does not fit.
    pub fn reserve(
        &mut self,
        descriptors: &[ComponentDescriptor],
        storage: StorageMode,
    ) -> Result<Vec<ComponentSlot>, EcsError> {
        let mut unseen: Vec<&ComponentDescriptor> = Vec::new();
        for descriptor in descriptors {
            if !self.by_type.contains_key(&descriptor.type_id)
                && !unseen.iter().any(|d| d.type_id == descriptor.type_id)
            {
                unseen.push(descriptor);
            }
        }
        let free = self.capacity - self.infos.len();
        if unseen.len() > free {
            return Err(EcsError::ComponentCapacityExceeded {
                component: unseen[free].name,
                capacity: self.capacity,
            });
        }
        descriptors
            .iter()
            .map(|d| self.register_descriptor(*d, storage))
            .collect()
    }

    /// Look up the slot of `T` without registering it.
    pub fn lookup<T: Component>(&self) -> Option<ComponentSlot> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Look up the slot of a described type without registering it.
    pub fn lookup_descriptor(&self, descriptor: &ComponentDescriptor) -> Option<ComponentSlot> {
        self.by_type.get(&descriptor.type_id).copied()
    }

    /// Look up the slots of all `descriptors`, or `None` if any is unregistered.
    pub fn lookup_all(&self, descriptors: &[ComponentDescriptor]) -> Option<Vec<ComponentSlot>> {
        descriptors
            .iter()
            .map(|d| self.lookup_descriptor(d))
            .collect()
    }

    /// Metadata for a registered slot.
    pub fn get_info(&self, slot: ComponentSlot) -> Option<&ComponentInfo> {
        self.infos.get(slot.index())
    }

    /// Type name for a slot, or `"<unregistered>"`.
    pub fn name_of(&self, slot: ComponentSlot) -> &'static str {
        self.get_info(slot).map_or("<unregistered>", |info| info.name)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether no types have been registered.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Maximum number of types.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
