//! Sparse-set component storage.
//!
//! A [`ComponentStore`] keeps every value of one component type in a dense,
//! gap-free `Vec<T>`. Two index maps tie values to entities:
//!
//! - `sparse[entity] -> position` (or an empty marker), and
//! - `entities[position] -> entity`.
//!
//! Removal is a swap-remove: the last value moves into the vacated position and
//! its entity's `sparse` entry is rewritten. Positions are therefore not stable
//! across removals of *other* entities; always go through the entity.
//!
//! [`LockedStore`] wraps the same sparse set in a `parking_lot` read/write lock
//! so single-store operations are atomic with respect to other threads holding
//! a shared reference. The lock never covers more than one call on one store.

use std::ops::Deref;
use std::time::Duration;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::entity::Entity;

/// Sentinel marking an entity with no value in the store.
const EMPTY: u32 = u32::MAX;

// ---------------------------------------------------------------------------
// ComponentStore
// ---------------------------------------------------------------------------

/// Dense storage for all values of one component type, keyed by entity.
#[derive(Debug, Clone)]
pub struct ComponentStore<T> {
    /// Entity index -> dense position, `EMPTY` when absent.
    sparse: Vec<u32>,
    /// Dense position -> owning entity.
    entities: Vec<Entity>,
    /// The values, gap-free.
    dense: Vec<T>,
}

impl<T> ComponentStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            sparse: Vec::new(),
            entities: Vec::new(),
            dense: Vec::new(),
        }
    }

    /// Dense position of `entity`'s value.
    #[inline]
    pub fn position(&self, entity: Entity) -> Option<usize> {
        match self.sparse.get(entity.index()) {
            Some(&pos) if pos != EMPTY => Some(pos as usize),
            _ => None,
        }
    }

    /// Whether `entity` has a value in this store.
    #[inline]
    pub fn contains(&self, entity: Entity) -> bool {
        self.position(entity).is_some()
    }

    /// Append a value for `entity`.
    ///
    /// Returns the value back as `Err` if `entity` already has one; the store
    /// is left unchanged.
    pub fn insert(&mut self, entity: Entity, value: T) -> Result<(), T> {
        debug_assert!(!entity.is_invalid(), "cannot store a value for Entity::INVALID");
        if self.contains(entity) {
            return Err(value);
        }
        let index = entity.index();
        if index >= self.sparse.len() {
            self.sparse.resize(index + 1, EMPTY);
        }
        self.sparse[index] = self.dense.len() as u32;
        self.entities.push(entity);
        self.dense.push(value);
        Ok(())
    }

    /// Remove and return `entity`'s value, moving the last value into its place.
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let pos = self.position(entity)?;
        let value = self.dense.swap_remove(pos);
        self.entities.swap_remove(pos);
        // A value was moved in from the end unless we removed the last one.
        if let Some(&moved) = self.entities.get(pos) {
            self.sparse[moved.index()] = pos as u32;
        }
        self.sparse[entity.index()] = EMPTY;
        Some(value)
    }

    /// Shared reference to `entity`'s value.
    #[inline]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.position(entity).map(|pos| &self.dense[pos])
    }

    /// Mutable reference to `entity`'s value.
    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.position(entity).map(|pos| &mut self.dense[pos])
    }

    /// Number of stored values.
    #[inline]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Whether the store is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// All values in dense order.
    #[inline]
    pub fn values(&self) -> &[T] {
        &self.dense
    }

    /// All values in dense order, mutably.
    #[inline]
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.dense
    }

    /// Owning entity of each value, aligned with [`values`](Self::values).
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Iterate `(entity, &value)` in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.entities.iter().copied().zip(self.dense.iter())
    }

    /// Iterate `(entity, &mut value)` in dense order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.entities.iter().copied().zip(self.dense.iter_mut())
    }
}

impl<T> Default for ComponentStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// LockedStore
// ---------------------------------------------------------------------------

/// A [`ComponentStore`] behind a read/write lock.
///
/// Shared-reference reads take a recursive read lock, so a thread may hold
/// several read guards into the same store at once. Writes through a shared
/// reference take the write lock for the duration of one call. Methods taking
/// `&mut self` bypass the lock entirely.
#[derive(Debug)]
pub struct LockedStore<T> {
    inner: RwLock<ComponentStore<T>>,
}

impl<T> LockedStore<T> {
    /// Create an empty locked store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ComponentStore::new()),
        }
    }

    /// Append a value for `entity` under the write lock.
    pub fn insert(&self, entity: Entity, value: T) -> Result<(), T> {
        self.inner.write().insert(entity, value)
    }

    /// Remove `entity`'s value under the write lock.
    pub fn remove(&self, entity: Entity) -> Option<T> {
        self.inner.write().remove(entity)
    }

    /// Whether `entity` has a value.
    pub fn contains(&self, entity: Entity) -> bool {
        self.inner.read_recursive().contains(entity)
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.inner.read_recursive().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read guard on `entity`'s value.
    pub fn get(&self, entity: Entity) -> Option<MappedRwLockReadGuard<'_, T>> {
        RwLockReadGuard::try_map(self.inner.read_recursive(), |store| store.get(entity)).ok()
    }

    /// Write guard on `entity`'s value.
    pub fn get_locked_mut(&self, entity: Entity) -> Option<MappedRwLockWriteGuard<'_, T>> {
        RwLockWriteGuard::try_map(self.inner.write(), |store| store.get_mut(entity)).ok()
    }

    /// Read guard on all values in dense order.
    pub fn values(&self) -> MappedRwLockReadGuard<'_, [T]> {
        RwLockReadGuard::map(self.inner.read_recursive(), |store| store.values())
    }

    /// Read guard on the owning entities, aligned with [`values`](Self::values).
    pub fn entities(&self) -> MappedRwLockReadGuard<'_, [Entity]> {
        RwLockReadGuard::map(self.inner.read_recursive(), |store| store.entities())
    }

    /// Write lock on the whole store, or `None` if it is not free within
    /// `timeout`. A read guard held by the calling thread keeps it taken.
    pub fn try_write_for(
        &self,
        timeout: Duration,
    ) -> Option<RwLockWriteGuard<'_, ComponentStore<T>>> {
        self.inner.try_write_for(timeout)
    }

    /// Run `f` with exclusive access to the whole store under the write lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut ComponentStore<T>) -> R) -> R {
        f(&mut *self.inner.write())
    }

    /// Direct access without locking; `&mut self` already proves exclusivity.
    pub fn get_mut(&mut self) -> &mut ComponentStore<T> {
        self.inner.get_mut()
    }
}

impl<T> Default for LockedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ComponentRef
// ---------------------------------------------------------------------------

/// Shared access to component data that may come from either storage mode.
///
/// Dereferences to the value. For [`LockedStore`]s it holds a read guard, so
/// drop it before asking for write access to the same store.
pub enum ComponentRef<'a, T: ?Sized> {
    /// Borrowed straight out of an exclusive store.
    Direct(&'a T),
    /// Borrowed through a locked store's read guard.
    Guarded(MappedRwLockReadGuard<'a, T>),
}

impl<T: ?Sized> Deref for ComponentRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            ComponentRef::Direct(value) => value,
            ComponentRef::Guarded(guard) => guard,
        }
    }
}

impl<T: ?Sized + std::fmt::Debug> std::fmt::Debug for ComponentRef<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        (**self).fmt(f)
    }
}

impl<T: ?Sized + PartialEq> PartialEq<T> for ComponentRef<'_, T> {
    fn eq(&self, other: &T) -> bool {
        **self == *other
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn e(raw: u32) -> Entity {
        Entity::from_raw(raw)
    }

    /// Every stored entity resolves to its own value and the maps agree.
    fn assert_compact<T: PartialEq + std::fmt::Debug>(store: &ComponentStore<T>) {
        assert_eq!(store.entities().len(), store.values().len());
        for (pos, &entity) in store.entities().iter().enumerate() {
            assert_eq!(store.position(entity), Some(pos));
            assert_eq!(store.get(entity), Some(&store.values()[pos]));
        }
    }

    #[test]
    fn insert_get_contains() {
        let mut store = ComponentStore::new();
        store.insert(e(3), "three").unwrap();
        store.insert(e(0), "zero").unwrap();
        assert_eq!(store.get(e(3)), Some(&"three"));
        assert_eq!(store.get(e(0)), Some(&"zero"));
        assert!(!store.contains(e(1)));
        assert!(!store.contains(e(100)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn duplicate_insert_is_rejected_unchanged() {
        let mut store = ComponentStore::new();
        store.insert(e(1), 10).unwrap();
        assert_eq!(store.insert(e(1), 20), Err(20));
        assert_eq!(store.get(e(1)), Some(&10));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn swap_remove_updates_moved_entity() {
        let mut store = ComponentStore::new();
        for i in 0..5 {
            store.insert(e(i), i * 10).unwrap();
        }
        assert_eq!(store.remove(e(1)), Some(10));
        // Last value (entity 4) moved into position 1.
        assert_eq!(store.position(e(4)), Some(1));
        assert_eq!(store.get(e(4)), Some(&40));
        assert_eq!(store.values(), &[0, 40, 20, 30]);
        assert_compact(&store);
    }

    #[test]
    fn remove_last_and_only() {
        let mut store = ComponentStore::new();
        store.insert(e(7), 'a').unwrap();
        store.insert(e(2), 'b').unwrap();
        assert_eq!(store.remove(e(2)), Some('b'));
        assert_compact(&store);
        assert_eq!(store.remove(e(7)), Some('a'));
        assert!(store.is_empty());
        assert_eq!(store.remove(e(7)), None);
    }

    #[test]
    fn compaction_survives_interleaved_churn() {
        let mut store = ComponentStore::new();
        for i in 0..32 {
            store.insert(e(i), i).unwrap();
        }
        for i in (0..32).step_by(3) {
            assert_eq!(store.remove(e(i)), Some(i));
            assert_compact(&store);
        }
        for i in (0..32).step_by(3) {
            store.insert(e(i), i + 100).unwrap();
        }
        assert_compact(&store);
        assert_eq!(store.len(), 32);
        assert_eq!(store.get(e(9)), Some(&109));
    }

    #[test]
    fn iter_mut_pairs_entities_with_values() {
        let mut store = ComponentStore::new();
        store.insert(e(5), 1).unwrap();
        store.insert(e(2), 2).unwrap();
        for (entity, value) in store.iter_mut() {
            *value += entity.to_raw() as i32;
        }
        assert_eq!(store.get(e(5)), Some(&6));
        assert_eq!(store.iter().collect::<Vec<_>>(), vec![(e(5), &6), (e(2), &4)]);
    }

    #[test]
    fn locked_store_guards() {
        let store = LockedStore::new();
        store.insert(e(0), 1u32).unwrap();
        store.insert(e(1), 2u32).unwrap();

        {
            // Nested read guards on one thread are fine.
            let a = store.get(e(0)).unwrap();
            let all = store.values();
            assert_eq!(*a, 1);
            assert_eq!(&*all, &[1, 2]);
        }

        *store.get_locked_mut(e(1)).unwrap() = 20;
        assert_eq!(*store.get(e(1)).unwrap(), 20);
        assert!(store.get(e(9)).is_none());

        store.with(|inner| inner.remove(e(0)));
        assert_eq!(&*store.entities(), &[e(1)]);
    }

    #[test]
    fn timed_write_gives_up_while_read_guard_lives() {
        let store = LockedStore::new();
        store.insert(e(0), 1u32).unwrap();
        let timeout = Duration::from_millis(10);
        {
            let _read = store.get(e(0)).unwrap();
            assert!(store.try_write_for(timeout).is_none());
        }
        let mut guard = store.try_write_for(timeout).unwrap();
        *guard.get_mut(e(0)).unwrap() = 3;
        drop(guard);
        assert_eq!(*store.get(e(0)).unwrap(), 3);
    }

    #[test]
    fn locked_store_concurrent_updates() {
        let store = std::sync::Arc::new(LockedStore::new());
        for i in 0..4 {
            store.insert(e(i), 0u64).unwrap();
        }
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        *store.get_locked_mut(e(i)).unwrap() += 1;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(&*store.values(), &[1000, 1000, 1000, 1000]);
    }

    #[test]
    fn component_ref_derefs_both_ways() {
        let plain = 5;
        let direct = ComponentRef::Direct(&plain);
        assert_eq!(*direct, 5);

        let locked = LockedStore::new();
        locked.insert(e(0), 6).unwrap();
        let guarded = ComponentRef::Guarded(locked.get(e(0)).unwrap());
        assert!(guarded == 6);
        assert_eq!(format!("{guarded:?}"), "6");
    }
}
