// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Driver instrumentation
//!
//! Wraps every driver in a [`DriverRegistry`] with [`SqlTimingHooks`] and
//! registers the wrapper under `name + suffix`, where the suffix comes from
//! [`TracerConfig::driver_suffix`](crate::config::TracerConfig).
//!
//! Applications opt in by opening connections through the derived name,
//! e.g. `mysql:logger` instead of `mysql`.

use std::sync::Arc;

use isutrace_driver::{DriverRegistry, RegistryError};
use tracing::{debug, info, warn};

use crate::hooks::SqlTimingHooks;
use crate::proxy::ProxyDriver;
use crate::tracer::Tracer;

/// Register an instrumented proxy for every driver that lacks one
///
/// Names already ending in the suffix are never wrapped, and a derived name
/// that already exists is left alone, so calling this repeatedly only picks
/// up drivers registered since the last call.
///
/// Returns the derived names registered by this call.
pub fn register_instrumentation(registry: &DriverRegistry, tracer: &Arc<Tracer>) -> Vec<String> {
    let suffix = tracer.config().driver_suffix.as_str();
    let hooks = Arc::new(SqlTimingHooks::new(tracer.clone()));
    let mut registered = Vec::new();

    for name in registry.drivers() {
        if name.ends_with(suffix) {
            continue;
        }

        let derived = format!("{name}{suffix}");
        if registry.contains(&derived) {
            continue;
        }

        let Some(inner) = registry.driver(&name) else {
            warn!(driver = %name, "Driver disappeared before it could be instrumented");
            continue;
        };

        let proxy = ProxyDriver::new(inner, hooks.clone());
        match registry.register(derived.clone(), Arc::new(proxy)) {
            Ok(()) => {
                info!(driver = %name, instrumented = %derived, "Registered instrumented SQL driver");
                registered.push(derived);
            }
            Err(RegistryError::Duplicate(_)) => {
                debug!(driver = %derived, "Instrumented driver registered concurrently");
            }
            Err(e) => {
                warn!(driver = %name, error = %e, "Failed to register instrumented driver");
            }
        }
    }

    registered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TracerConfig;
    use isutrace_test_utils::MockDriver;

    fn registry_with(names: &[&str]) -> DriverRegistry {
        let registry = DriverRegistry::new();
        for name in names {
            registry
                .register(*name, Arc::new(MockDriver::new()))
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_wraps_every_driver() {
        let registry = registry_with(&["mysql", "postgres"]);
        let tracer = Tracer::new(TracerConfig::default());

        let registered = register_instrumentation(&registry, &tracer);

        assert_eq!(registered, vec!["mysql:logger", "postgres:logger"]);
        assert_eq!(
            registry.drivers(),
            vec!["mysql", "mysql:logger", "postgres", "postgres:logger"]
        );
    }

    #[test]
    fn test_repeated_registration_is_idempotent() {
        let registry = registry_with(&["mysql"]);
        let tracer = Tracer::new(TracerConfig::default());

        register_instrumentation(&registry, &tracer);
        let second = register_instrumentation(&registry, &tracer);

        assert!(second.is_empty());
        assert!(!registry.contains("mysql:logger:logger"));
        assert_eq!(registry.drivers().len(), 2);
    }

    #[test]
    fn test_picks_up_late_drivers() {
        let registry = registry_with(&["mysql"]);
        let tracer = Tracer::new(TracerConfig::default());
        register_instrumentation(&registry, &tracer);

        registry
            .register("sqlite", Arc::new(MockDriver::new()))
            .unwrap();
        let registered = register_instrumentation(&registry, &tracer);

        assert_eq!(registered, vec!["sqlite:logger"]);
    }

    #[test]
    fn test_custom_suffix() {
        let registry = registry_with(&["mysql", "mysql+trace"]);
        let tracer = Tracer::new(TracerConfig::default().with_driver_suffix("+trace"));

        let registered = register_instrumentation(&registry, &tracer);

        // "mysql+trace" already carries the suffix and its derived name exists
        assert!(registered.is_empty());
        assert!(!registry.contains("mysql+trace+trace"));
    }
}
