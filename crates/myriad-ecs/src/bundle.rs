//! Typed component tuples.
//!
//! A tuple of component types such as `(Position, Velocity)` names a set of
//! component types at compile time. [`ComponentSet`] uses it for membership
//! tests, lookups, detaching and system requirements. [`Bundle`] is the same
//! tuple holding values, used to create entities and attach components.
//!
//! Tuples of up to eight types are supported. A one-element tuple needs the
//! trailing comma: `(Position { .. },)`.

use crate::component::{Component, ComponentDescriptor, ComponentSlot};
use crate::entity::Entity;
use crate::storage::ComponentRef;
use crate::stores::{downcast_value_mut, ComponentStores};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A tuple of component types.
pub trait ComponentSet: 'static {
    /// Shared references, one per type.
    type Refs<'a>;
    /// Mutable references, one per type.
    type Muts<'a>;

    /// Descriptors of the member types, in tuple order.
    fn descriptors() -> Vec<ComponentDescriptor>;

    /// Borrow `entity`'s value of every member type.
    #[doc(hidden)]
    fn fetch(stores: &ComponentStores, entity: Entity) -> Result<Self::Refs<'_>, EcsError>;

    /// Borrow `entity`'s value of every member type mutably.
    #[doc(hidden)]
    fn fetch_mut(stores: &mut ComponentStores, entity: Entity)
        -> Result<Self::Muts<'_>, EcsError>;
}

/// A tuple of component values.
pub trait Bundle: ComponentSet {
    /// Move every value into its store under `entity`.
    #[doc(hidden)]
    fn insert_into(self, stores: &mut ComponentStores, entity: Entity) -> Result<(), EcsError>;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Name of the first type listed more than once.
pub(crate) fn first_duplicate(descriptors: &[ComponentDescriptor]) -> Option<&'static str> {
    descriptors.iter().enumerate().find_map(|(i, d)| {
        descriptors[..i]
            .iter()
            .any(|earlier| earlier.type_id == d.type_id)
            .then_some(d.name)
    })
}

/// Slots of already-registered types; a never-registered type cannot be held
/// by `entity`, so it is reported as missing.
pub(crate) fn resolve_slots(
    stores: &ComponentStores,
    entity: Entity,
    descriptors: &[ComponentDescriptor],
) -> Result<Vec<ComponentSlot>, EcsError> {
    descriptors
        .iter()
        .map(|d| {
            stores
                .registry()
                .lookup_descriptor(d)
                .ok_or(EcsError::MissingComponent {
                    entity,
                    component: d.name,
                })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tuple impls
// ---------------------------------------------------------------------------

macro_rules! impl_component_tuple {
    ($(($T:ident, $value:ident)),*) => {
        impl<$($T: Component),*> ComponentSet for ($($T,)*) {
            type Refs<'a> = ($(ComponentRef<'a, $T>,)*);
            type Muts<'a> = ($(&'a mut $T,)*);

            fn descriptors() -> Vec<ComponentDescriptor> {
                vec![$(ComponentDescriptor::of::<$T>()),*]
            }

            #[allow(unused_variables)]
            fn fetch(stores: &ComponentStores, entity: Entity) -> Result<Self::Refs<'_>, EcsError> {
                Ok(($(stores.get::<$T>(entity)?,)*))
            }

            #[allow(unused_variables, unused_mut)]
            fn fetch_mut(
                stores: &mut ComponentStores,
                entity: Entity,
            ) -> Result<Self::Muts<'_>, EcsError> {
                let descriptors = Self::descriptors();
                if let Some(component) = first_duplicate(&descriptors) {
                    return Err(EcsError::DuplicateComponent { entity, component });
                }
                let slots = resolve_slots(stores, entity, &descriptors)?;
                let mut borrowed = stores.disjoint_mut(&slots).into_iter();
                Ok(($(downcast_value_mut::<$T>(borrowed.next().flatten(), entity)?,)*))
            }
        }

        impl<$($T: Component),*> Bundle for ($($T,)*) {
            #[allow(unused_variables)]
            fn insert_into(self, stores: &mut ComponentStores, entity: Entity) -> Result<(), EcsError> {
                let ($($value,)*) = self;
                $(stores.insert::<$T>(entity, $value)?;)*
                Ok(())
            }
        }
    };
}

impl_component_tuple!();
impl_component_tuple!((A, a));
impl_component_tuple!((A, a), (B, b));
impl_component_tuple!((A, a), (B, b), (C, c));
impl_component_tuple!((A, a), (B, b), (C, c), (D, d));
impl_component_tuple!((A, a), (B, b), (C, c), (D, d), (E, e));
impl_component_tuple!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f));
impl_component_tuple!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f), (G, g));
impl_component_tuple!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f), (G, g), (H, h));

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::StorageMode;

    #[derive(Debug, PartialEq)]
    struct Pos(i32);
    #[derive(Debug, PartialEq)]
    struct Vel(i32);

    #[test]
    fn descriptors_follow_tuple_order() {
        let names: Vec<_> = <(Vel, Pos)>::descriptors().iter().map(|d| d.name).collect();
        assert!(names[0].ends_with("Vel"));
        assert!(names[1].ends_with("Pos"));
        assert!(<()>::descriptors().is_empty());
    }

    #[test]
    fn duplicates_are_detected() {
        assert!(first_duplicate(&<(Pos, Vel)>::descriptors()).is_none());
        let dup = first_duplicate(&<(Pos, Vel, Pos)>::descriptors()).unwrap();
        assert!(dup.ends_with("Pos"));
    }

    #[test]
    fn insert_then_fetch() {
        let mut stores = ComponentStores::new(4, StorageMode::Exclusive);
        let e = Entity::from_raw(0);
        (Pos(1), Vel(2)).insert_into(&mut stores, e).unwrap();

        {
            let (p, v) = <(Pos, Vel)>::fetch(&stores, e).unwrap();
            assert_eq!(*p, Pos(1));
            assert_eq!(*v, Vel(2));
        }

        let (v, p) = <(Vel, Pos)>::fetch_mut(&mut stores, e).unwrap();
        v.0 += 10;
        p.0 += 20;
        assert_eq!(*stores.get::<Vel>(e).unwrap(), Vel(12));
        assert_eq!(*stores.get::<Pos>(e).unwrap(), Pos(21));
    }

    #[test]
    fn fetch_reports_missing_type() {
        let mut stores = ComponentStores::new(4, StorageMode::Exclusive);
        let e = Entity::from_raw(0);
        (Pos(1),).insert_into(&mut stores, e).unwrap();
        assert!(matches!(
            <(Pos, Vel)>::fetch(&stores, e),
            Err(EcsError::MissingComponent { .. })
        ));
        assert!(matches!(
            <(Pos, Vel)>::fetch_mut(&mut stores, e),
            Err(EcsError::MissingComponent { .. })
        ));
    }

    #[test]
    fn fetch_mut_rejects_aliasing() {
        let mut stores = ComponentStores::new(4, StorageMode::Exclusive);
        let e = Entity::from_raw(0);
        (Pos(1),).insert_into(&mut stores, e).unwrap();
        assert!(matches!(
            <(Pos, Pos)>::fetch_mut(&mut stores, e),
            Err(EcsError::DuplicateComponent { .. })
        ));
    }
}
