// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Driver registry
//!
//! A name-keyed table of drivers. The process-wide instance is reached
//! through [`DriverRegistry::global`]; tests build isolated registries with
//! [`DriverRegistry::new`].

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::error::RegistryError;
use crate::r#trait::Driver;

static GLOBAL_REGISTRY: OnceLock<DriverRegistry> = OnceLock::new();

/// Registry of named database drivers
#[derive(Default)]
pub struct DriverRegistry {
    drivers: RwLock<BTreeMap<String, Arc<dyn Driver>>>,
}

impl DriverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> &'static DriverRegistry {
        GLOBAL_REGISTRY.get_or_init(DriverRegistry::new)
    }

    /// Register a driver under `name`
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Duplicate` if the name is taken and
    /// `RegistryError::EmptyName` if the name is empty.
    pub fn register(
        &self,
        name: impl Into<String>,
        driver: Arc<dyn Driver>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let mut drivers = self.drivers.write();
        if drivers.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }

        tracing::debug!(driver = %name, "Registered database driver");
        drivers.insert(name, driver);
        Ok(())
    }

    /// Sorted list of registered driver names
    pub fn drivers(&self) -> Vec<String> {
        self.drivers.read().keys().cloned().collect()
    }

    /// Look up a driver by name
    pub fn driver(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.read().get(name).cloned()
    }

    /// Whether a driver is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.drivers.read().contains_key(name)
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.drivers())
            .finish()
    }
}
