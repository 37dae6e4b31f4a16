//! Construction-time configuration for an [`EntityManager`](crate::manager::EntityManager).
//!
//! All capacities are fixed when the manager is built; nothing here can grow
//! afterwards.
//!
//! ```
//! use myriad_ecs::prelude::*;
//!
//! let config = EcsConfig::from_json_str(r#"{ "entities_capacity": 128, "storage_mode": "locked" }"#)
//!     .unwrap();
//! assert_eq!(config.entities_capacity, 128);
//! assert_eq!(config.components_capacity, EcsConfig::DEFAULT_COMPONENTS_CAPACITY);
//! assert_eq!(config.storage_mode, StorageMode::Locked);
//! ```

use serde::{Deserialize, Serialize};

use crate::component::StorageMode;
use crate::EcsError;

/// Capacities and default storage mode of one manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EcsConfig {
    /// Maximum number of simultaneously alive entities.
    pub entities_capacity: usize,
    /// Maximum number of distinct component types.
    pub components_capacity: usize,
    /// Mode of stores for types not registered explicitly.
    pub storage_mode: StorageMode,
}

impl EcsConfig {
    /// Default `entities_capacity`.
    pub const DEFAULT_ENTITIES_CAPACITY: usize = 4096;
    /// Default `components_capacity`. Fits the default 64-bit mask.
    pub const DEFAULT_COMPONENTS_CAPACITY: usize = 64;
    /// Largest accepted `entities_capacity`. The manager allocates one mask
    /// per entity slot up front.
    pub const MAX_ENTITIES_CAPACITY: usize = 1 << 24;

    /// A config with the given capacities and exclusive storage.
    pub fn new(entities_capacity: usize, components_capacity: usize) -> Self {
        Self {
            entities_capacity,
            components_capacity,
            storage_mode: StorageMode::Exclusive,
        }
    }

    /// Replace the default storage mode.
    pub fn with_storage_mode(mut self, storage_mode: StorageMode) -> Self {
        self.storage_mode = storage_mode;
        self
    }

    /// Parse a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] on malformed JSON or unknown fields.
    pub fn from_json_str(json: &str) -> Result<Self, EcsError> {
        serde_json::from_str(json).map_err(|e| EcsError::InvalidConfig {
            details: e.to_string(),
        })
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, EcsError> {
        serde_json::to_string_pretty(self).map_err(|e| EcsError::InvalidConfig {
            details: e.to_string(),
        })
    }

    /// Check the capacities against a mask holding `max_components` bits.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if either capacity is zero,
    /// `entities_capacity` exceeds [`MAX_ENTITIES_CAPACITY`](Self::MAX_ENTITIES_CAPACITY),
    /// or `components_capacity` exceeds `max_components`.
    pub fn validate(&self, max_components: usize) -> Result<(), EcsError> {
        if self.entities_capacity == 0 || self.entities_capacity > Self::MAX_ENTITIES_CAPACITY {
            return Err(EcsError::InvalidConfig {
                details: format!(
                    "entities_capacity must be in 1..={}, got {}",
                    Self::MAX_ENTITIES_CAPACITY,
                    self.entities_capacity
                ),
            });
        }
        if self.components_capacity == 0 || self.components_capacity > max_components {
            return Err(EcsError::InvalidConfig {
                details: format!(
                    "components_capacity must be in 1..={max_components}, got {}",
                    self.components_capacity
                ),
            });
        }
        Ok(())
    }
}

impl Default for EcsConfig {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_ENTITIES_CAPACITY,
            Self::DEFAULT_COMPONENTS_CAPACITY,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
