//! Myriad ECS -- fixed-capacity sparse-set Entity Component System.
//!
//! Every component type gets one sparse-set store: a dense array of values plus
//! entity↔position maps, so insert, remove and lookup are O(1) and iteration
//! walks packed memory. Each entity carries a bitmask of the component types it
//! holds, which makes membership tests a mask comparison. Systems declare a
//! required set of component types and are told incrementally when an entity
//! starts or stops matching it.
//!
//! All capacities are fixed when the [`EntityManager`](manager::EntityManager)
//! is built. Exceeding one is an error, never a reallocation.
//!
//! # Quick Start
//!
//! ```
//! use myriad_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Velocity { dx: f32, dy: f32 }
//!
//! #[derive(Default)]
//! struct Movement;
//!
//! impl System for Movement {
//!     fn update(&mut self, ctx: &mut SystemContext<'_>) {
//!         let entities: Vec<Entity> = ctx.entities().iter().collect();
//!         for entity in entities {
//!             let (pos, vel) = ctx.fetch_mut::<(Position, Velocity)>(entity).unwrap();
//!             pos.x += vel.dx;
//!             pos.y += vel.dy;
//!         }
//!     }
//! }
//!
//! let mut manager = EntityManager::new();
//! let movement = manager.create_system::<(Position, Velocity), _>(Movement).unwrap();
//!
//! let e = manager
//!     .create_entity((Position { x: 0.0, y: 0.0 }, Velocity { dx: 1.0, dy: 2.0 }))
//!     .unwrap();
//! manager.run_system(movement).unwrap();
//!
//! assert_eq!(*manager.get_component::<Position>(e).unwrap(), Position { x: 1.0, y: 2.0 });
//! ```

#![deny(unsafe_code)]

pub mod bitset;
pub mod bundle;
pub mod component;
pub mod config;
pub mod entity;
pub mod manager;
pub mod storage;
pub mod stores;
pub mod system;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// Every entity slot is alive.
    #[error("entity capacity of {capacity} exceeded")]
    EntityCapacityExceeded { capacity: usize },

    /// A new component type did not fit in the remaining slots.
    #[error("component type '{component}' does not fit: capacity of {capacity} types exceeded")]
    ComponentCapacityExceeded {
        component: &'static str,
        capacity: usize,
    },

    /// The entity is not alive (never created, or already removed).
    #[error("entity {entity:?} is not alive")]
    UnknownEntity { entity: entity::Entity },

    /// The entity does not hold a component of this type.
    #[error("entity {entity:?} has no component '{component}'")]
    MissingComponent {
        entity: entity::Entity,
        component: &'static str,
    },

    /// The entity already holds a component of this type, or a tuple names
    /// the type twice.
    #[error("entity {entity:?} already has component '{component}'")]
    DuplicateComponent {
        entity: entity::Entity,
        component: &'static str,
    },

    /// No value of this component type has ever been stored.
    #[error("component type '{component}' has no store")]
    UnknownComponent { component: &'static str },

    /// The system handle does not belong to this manager.
    #[error("no system registered at index {index}")]
    UnknownSystem { index: usize },

    /// Shared-reference mutation needs a lock-protected store.
    #[error("component type '{component}' is not stored in locked mode")]
    StorageNotLocked { component: &'static str },

    /// A locked store's write lock could not be taken because guards on it
    /// are still alive.
    #[error("component type '{component}' is borrowed; write lock unavailable")]
    ComponentBorrowed { component: &'static str },

    /// Configuration rejected at construction.
    #[error("invalid configuration: {details}")]
    InvalidConfig { details: String },
}

impl EcsError {
    /// Whether this is one of the capacity violations.
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(
            self,
            Self::EntityCapacityExceeded { .. } | Self::ComponentCapacityExceeded { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::bitset::{BitWord, Bitset};
    pub use crate::bundle::{Bundle, ComponentSet};
    pub use crate::component::{Component, ComponentSlot, StorageMode, TypeRegistry};
    pub use crate::config::EcsConfig;
    pub use crate::entity::Entity;
    pub use crate::manager::EntityManager;
    pub use crate::storage::{ComponentRef, ComponentStore};
    pub use crate::system::{EntitySet, System, SystemContext, SystemHandle, SystemTracker};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    // -- test component types -----------------------------------------------

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Health(u32);

    #[derive(Default)]
    struct Movement {
        steps: u32,
    }

    impl System for Movement {
        fn update(&mut self, ctx: &mut SystemContext<'_>) {
            let entities: Vec<Entity> = ctx.entities().iter().collect();
            for entity in entities {
                let (pos, vel) = ctx.fetch_mut::<(Position, Velocity)>(entity).unwrap();
                pos.x += vel.dx;
                pos.y += vel.dy;
            }
            self.steps += 1;
        }
    }

    #[derive(Default)]
    struct Regen;

    impl System for Regen {
        fn update(&mut self, ctx: &mut SystemContext<'_>) {
            let entities: Vec<Entity> = ctx.entities().iter().collect();
            for entity in entities {
                ctx.get_mut::<Health>(entity).unwrap().0 += 1;
            }
        }
    }

    // -- lifecycle integration ----------------------------------------------

    #[test]
    fn create_entities_and_query_back() {
        let mut manager = EntityManager::new();
        let e = manager
            .create_entity((Position { x: 1.0, y: 2.0 }, Velocity { dx: 3.0, dy: 4.0 }))
            .unwrap();

        let (pos, vel) = manager
            .get_entity_components::<(Position, Velocity)>(e)
            .unwrap();
        assert_eq!(*pos, Position { x: 1.0, y: 2.0 });
        assert_eq!(*vel, Velocity { dx: 3.0, dy: 4.0 });
    }

    #[test]
    fn add_then_detach_round_trips_mask() {
        let mut manager = EntityManager::new();
        let e = manager.create_entity_with(Health(5)).unwrap();
        let before = *manager.entity_mask(e).unwrap();

        manager
            .add_components(e, (Position { x: 0.0, y: 0.0 },))
            .unwrap();
        assert_ne!(*manager.entity_mask(e).unwrap(), before);

        manager.detach_components::<(Position,)>(e).unwrap();
        assert_eq!(*manager.entity_mask(e).unwrap(), before);
        assert_eq!(*manager.get_component::<Health>(e).unwrap(), Health(5));
    }

    // -- system integration -------------------------------------------------

    #[test]
    fn systems_run_in_registration_order() {
        let mut manager = EntityManager::new();
        let movement = manager
            .create_system::<(Position, Velocity), _>(Movement::default())
            .unwrap();
        manager.create_system::<(Health,), _>(Regen).unwrap();
        assert_eq!(manager.system_count(), 2);

        let mover = manager
            .create_entity((Position { x: 0.0, y: 0.0 }, Velocity { dx: 1.0, dy: -1.0 }))
            .unwrap();
        let still = manager
            .create_entity((Position { x: 5.0, y: 5.0 }, Health(1)))
            .unwrap();

        manager.run_systems();
        manager.run_systems();

        assert_eq!(
            *manager.get_component::<Position>(mover).unwrap(),
            Position { x: 2.0, y: -2.0 }
        );
        assert_eq!(
            *manager.get_component::<Position>(still).unwrap(),
            Position { x: 5.0, y: 5.0 }
        );
        assert_eq!(*manager.get_component::<Health>(still).unwrap(), Health(3));
        assert_eq!(manager.system(movement).unwrap().steps, 2);
    }

    #[test]
    fn with_system_exposes_matching_entities() {
        let mut manager = EntityManager::new();
        let regen = manager.create_system::<(Health,), _>(Regen).unwrap();
        let a = manager.create_entity_with(Health(1)).unwrap();
        let b = manager.create_entity_with(Health(2)).unwrap();
        manager.create_entity_with(Position { x: 0.0, y: 0.0 }).unwrap();

        let total = manager
            .with_system(regen, |_, ctx| {
                ctx.entities()
                    .iter()
                    .map(|e| ctx.get::<Health>(e).unwrap().0)
                    .sum::<u32>()
            })
            .unwrap();
        assert_eq!(total, 3);

        let mut members = manager.system_entities(regen).unwrap().as_slice().to_vec();
        members.sort();
        assert_eq!(members, vec![a, b]);
    }

    // -- scale test ---------------------------------------------------------

    #[test]
    fn scale_10k_entities() {
        let mut manager: EntityManager = EntityManager::with_capacity(10_000, 8).unwrap();
        let movement = manager
            .create_system::<(Position, Velocity), _>(Movement::default())
            .unwrap();

        let mut entities = Vec::with_capacity(10_000);
        for i in 0..10_000u32 {
            let e = manager
                .create_entity((
                    Position {
                        x: i as f32,
                        y: 0.0,
                    },
                    Velocity { dx: 1.0, dy: 0.0 },
                ))
                .unwrap();
            entities.push(e);
        }
        assert!(manager
            .create_entity((Health(0),))
            .unwrap_err()
            .is_capacity_exceeded());

        for &e in entities.iter().step_by(2) {
            manager.remove_entity(e).unwrap();
        }
        assert_eq!(manager.entity_count(), 5_000);
        assert_eq!(manager.system_entities(movement).unwrap().len(), 5_000);

        manager.run_system(movement).unwrap();
        for &e in entities.iter().skip(1).step_by(2) {
            let pos = manager.get_component::<Position>(e).unwrap();
            assert_eq!(pos.x, e.to_raw() as f32 + 1.0);
        }
    }
}
