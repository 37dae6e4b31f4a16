//! Entity handles and fixed-capacity slot allocation.
//!
//! An [`Entity`] is a plain 32-bit slot index. It carries no generation: once an
//! entity is removed its slot returns to the free list and the same value may be
//! handed out again by a later creation. Code that keeps entity values across a
//! removal must not treat them as permanently unique.

use std::collections::VecDeque;
use std::fmt;

use crate::EcsError;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// An opaque entity handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(u32);

impl Entity {
    /// The "no entity" value (`u32::MAX`). Never allocated.
    pub const INVALID: Entity = Entity(u32::MAX);

    /// Construct an `Entity` from a raw slot index.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw `u32` representation.
    #[inline]
    pub const fn to_raw(self) -> u32 {
        self.0
    }

    /// The slot index, for indexing per-entity arrays.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this is [`Entity::INVALID`].
    #[inline]
    pub const fn is_invalid(self) -> bool {
        self.0 == u32::MAX
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            f.write_str("Entity(INVALID)")
        } else {
            write!(f, "Entity({})", self.0)
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            f.write_str("invalid")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Hands out entity slots up to a fixed capacity and recycles removed ones.
///
/// Free slots are kept in a FIFO queue so that a just-removed value is the
/// last one to be reissued. Slots never handed out are used in ascending order
/// once the queue is empty.
#[derive(Debug)]
pub struct EntityAllocator {
    /// Maximum number of simultaneously alive entities.
    capacity: usize,
    /// Whether each slot ever handed out is currently alive.
    alive: Vec<bool>,
    /// Recyclable slots (FIFO).
    free: VecDeque<u32>,
    /// Cached number of alive slots.
    alive_count: usize,
}

impl EntityAllocator {
    /// Create an allocator for at most `capacity` alive entities.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            alive: Vec::with_capacity(capacity),
            free: VecDeque::with_capacity(capacity),
            alive_count: 0,
        }
    }

    /// Allocate a slot, reusing a free one when available.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityCapacityExceeded`] when every slot is alive.
    pub fn allocate(&mut self) -> Result<Entity, EcsError> {
        if let Some(index) = self.free.pop_front() {
            self.alive[index as usize] = true;
            self.alive_count += 1;
            return Ok(Entity(index));
        }
        if self.alive.len() >= self.capacity {
            return Err(EcsError::EntityCapacityExceeded {
                capacity: self.capacity,
            });
        }
        let index = self.alive.len() as u32;
        self.alive.push(true);
        self.alive_count += 1;
        Ok(Entity(index))
    }

    /// Release a slot back to the free list.
    ///
    /// Returns `false` if the entity was not alive.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        match self.alive.get_mut(entity.index()) {
            Some(alive) if *alive => {
                *alive = false;
                self.alive_count -= 1;
                self.free.push_back(entity.0);
                true
            }
            _ => false,
        }
    }

    /// Whether `entity` is currently alive.
    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.alive.get(entity.index()).copied().unwrap_or(false)
    }

    /// Whether the next [`allocate`](Self::allocate) would fail.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.alive_count >= self.capacity
    }

    /// Number of currently alive entities.
    #[inline]
    pub fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Maximum number of simultaneously alive entities.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate alive entities in ascending slot order.
    pub fn alive_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, &alive)| alive)
            .map(|(index, _)| Entity(index as u32))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
