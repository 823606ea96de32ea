//! # Application Manifest
//!
//! TOML description of the services an application host launches.
//!
//! ```toml
//! [launcher]
//! readiness_timeout_ms = 30000
//!
//! [[services]]
//! name = "products"
//! endpoint = "http://localhost:5200"
//!
//! [[services]]
//! name = "store"
//! references = ["products"]
//! wait_for = ["products"]
//! ```

use crate::simulated::SimulatedService;
use serde::{Deserialize, Serialize};
use services_launcher::{Launcher, LauncherConfig, LauncherError};
use services_registry::{ServiceDescriptor, ServiceRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Manifest declares no services")]
    NoServices,
}

/// Launcher timing overrides; unset fields keep the launcher defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LauncherSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_interval_ms: Option<u64>,
}

impl LauncherSettings {
    /// Fields set in `overrides` replace the ones set here
    pub fn merged_with(self, overrides: LauncherSettings) -> Self {
        Self {
            readiness_timeout_ms: overrides.readiness_timeout_ms.or(self.readiness_timeout_ms),
            start_timeout_ms: overrides.start_timeout_ms.or(self.start_timeout_ms),
            probe_interval_ms: overrides.probe_interval_ms.or(self.probe_interval_ms),
        }
    }

    pub fn to_config(self) -> LauncherConfig {
        let mut config = LauncherConfig::default();
        if let Some(ms) = self.readiness_timeout_ms {
            config = config.with_readiness_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.start_timeout_ms {
            config = config.with_start_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.probe_interval_ms {
            config = config.with_probe_interval(Duration::from_millis(ms));
        }
        config
    }
}

/// One simulated service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// How long the start action takes
    #[serde(default)]
    pub startup_delay_ms: u64,
    /// Readiness turns true this long after the start action returned
    #[serde(default)]
    pub ready_after_ms: u64,
    #[serde(default)]
    pub fail_on_start: bool,
    #[serde(default)]
    pub never_ready: bool,
    /// Services whose endpoints are handed to this one
    #[serde(default)]
    pub references: Vec<String>,
    /// Services that must be ready before this one starts
    #[serde(default)]
    pub wait_for: Vec<String>,
}

impl ServiceSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            endpoint: None,
            startup_delay_ms: 0,
            ready_after_ms: 0,
            fail_on_start: false,
            never_ready: false,
            references: Vec::new(),
            wait_for: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppManifest {
    #[serde(default)]
    pub launcher: LauncherSettings,
    #[serde(default)]
    pub services: Vec<ServiceSpec>,
}

impl AppManifest {
    /// Parses a manifest from TOML text
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let manifest: AppManifest = toml::from_str(text)?;
        if manifest.services.is_empty() {
            return Err(ManifestError::NoServices);
        }
        Ok(manifest)
    }

    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// The products/store application
    ///
    /// store references products and waits for it to be ready.
    pub fn products_and_store() -> Self {
        let products = ServiceSpec {
            endpoint: Some("http://localhost:5200".to_string()),
            startup_delay_ms: 200,
            ready_after_ms: 300,
            ..ServiceSpec::new("products")
        };
        let store = ServiceSpec {
            endpoint: Some("http://localhost:5100".to_string()),
            startup_delay_ms: 100,
            ready_after_ms: 100,
            references: vec!["products".to_string()],
            wait_for: vec!["products".to_string()],
            ..ServiceSpec::new("store")
        };
        Self {
            launcher: LauncherSettings::default(),
            services: vec![products, store],
        }
    }

    /// Registers every service, then every reference and dependency
    ///
    /// Registration errors such as unknown names or cycles surface here,
    /// before anything is started.
    pub fn build_launcher(&self, overrides: LauncherSettings) -> Result<Launcher, LauncherError> {
        let mut registry = ServiceRegistry::new();

        for spec in &self.services {
            let name = core_types::ServiceName::new(spec.name.as_str())
                .map_err(services_registry::RegistryError::from)?;
            let mut descriptor =
                ServiceDescriptor::new(name, Arc::new(SimulatedService::from_spec(spec)));
            if let Some(endpoint) = &spec.endpoint {
                descriptor = descriptor.with_endpoint(endpoint.as_str());
            }
            registry.register_descriptor(descriptor)?;
        }

        for spec in &self.services {
            for referenced in &spec.references {
                registry.add_reference(&spec.name, referenced)?;
            }
            for dependency in &spec.wait_for {
                registry.add_dependency(&spec.name, dependency)?;
                debug!(service = %spec.name, %dependency, "declared dependency");
            }
        }

        let config = self.launcher.merged_with(overrides).to_config();
        Launcher::new(registry, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use services_registry::RegistryError;

    #[test]
    fn test_parse_full_service() {
        let manifest = AppManifest::parse(
            r#"
            [launcher]
            readiness_timeout_ms = 1500

            [[services]]
            name = "products"
            endpoint = "http://localhost:5200"
            startup_delay_ms = 20
            ready_after_ms = 30
            never_ready = true
            "#,
        )
        .unwrap();

        assert_eq!(manifest.launcher.readiness_timeout_ms, Some(1500));
        assert_eq!(manifest.launcher.start_timeout_ms, None);
        let products = &manifest.services[0];
        assert_eq!(products.endpoint.as_deref(), Some("http://localhost:5200"));
        assert_eq!(products.startup_delay_ms, 20);
        assert!(products.never_ready);
        assert!(!products.fail_on_start);
        assert!(products.wait_for.is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = AppManifest::parse(
            r#"
            [[services]]
            name = "products"
            restart = "always"
            "#,
        );
        assert!(matches!(result, Err(ManifestError::Parse(_))));
    }

    #[test]
    fn test_empty_manifest_rejected() {
        assert!(matches!(
            AppManifest::parse("[launcher]\nprobe_interval_ms = 10\n"),
            Err(ManifestError::NoServices)
        ));
    }

    #[test]
    fn test_overrides_win() {
        let settings = LauncherSettings {
            readiness_timeout_ms: Some(1000),
            start_timeout_ms: Some(2000),
            probe_interval_ms: None,
        };
        let merged = settings.merged_with(LauncherSettings {
            start_timeout_ms: Some(50),
            ..LauncherSettings::default()
        });

        let config = merged.to_config();
        assert_eq!(config.readiness_timeout, Duration::from_millis(1000));
        assert_eq!(config.start_timeout, Duration::from_millis(50));
        assert_eq!(config.probe_interval, LauncherConfig::default().probe_interval);
    }

    #[test]
    fn test_cycle_is_a_registration_error() {
        let mut a = ServiceSpec::new("a");
        a.wait_for.push("b".to_string());
        let mut b = ServiceSpec::new("b");
        b.wait_for.push("a".to_string());
        let manifest = AppManifest {
            launcher: LauncherSettings::default(),
            services: vec![a, b],
        };

        let result = manifest.build_launcher(LauncherSettings::default());
        assert!(matches!(
            result,
            Err(LauncherError::Registry(RegistryError::Cycle { .. }))
        ));
    }

    #[test]
    fn test_duplicate_and_unknown_names_rejected() {
        let duplicate = AppManifest {
            launcher: LauncherSettings::default(),
            services: vec![ServiceSpec::new("products"), ServiceSpec::new("products")],
        };
        assert!(matches!(
            duplicate.build_launcher(LauncherSettings::default()),
            Err(LauncherError::Registry(RegistryError::DuplicateName(_)))
        ));

        let mut store = ServiceSpec::new("store");
        store.references.push("basket".to_string());
        let unknown = AppManifest {
            launcher: LauncherSettings::default(),
            services: vec![store],
        };
        assert!(matches!(
            unknown.build_launcher(LauncherSettings::default()),
            Err(LauncherError::Registry(RegistryError::UnknownService(_)))
        ));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let manifest = AppManifest {
            launcher: LauncherSettings::default(),
            services: vec![ServiceSpec::new("9lives")],
        };
        assert!(matches!(
            manifest.build_launcher(LauncherSettings::default()),
            Err(LauncherError::Registry(RegistryError::InvalidName(_)))
        ));
    }

    #[test]
    fn test_products_and_store_topology() {
        let manifest = AppManifest::products_and_store();
        let launcher = manifest.build_launcher(LauncherSettings::default()).unwrap();
        let registry = launcher.registry();

        let dependencies: Vec<&str> = registry
            .dependencies_of("store")
            .unwrap()
            .into_iter()
            .map(|name| name.as_str())
            .collect();
        assert_eq!(dependencies, vec!["products"]);
        assert_eq!(registry.references_of("store").unwrap().len(), 1);
    }
}
