//! Animation catalog: registration, allow-listing, loading, inspection.
//!
//! Constructors are registered explicitly under a name and gated by an
//! allow-list, so the set of loadable animations is a closed, auditable
//! list rather than whatever happens to be linked in. A loaded entry
//! carries a content hash so clients can tell which revision of an
//! animation is running.

use super::schema::{ParameterMap, ParameterSchema};
use super::{Animation, AnimationMetadata};
use crate::error::{LumigridError, Result};
use crate::layout::DeviceGeometry;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{info, warn};

/// Constructor for an animation instance.
pub type AnimationFactory =
    Box<dyn Fn(&DeviceGeometry, &ParameterMap) -> Result<Box<dyn Animation>> + Send + Sync>;

struct Registration {
    factory: AnimationFactory,
    version: String,
    /// Source file backing this registration, hashed on load when present.
    source_path: Option<PathBuf>,
}

/// Inspection document for one animation, safe to serialize to clients.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AnimationDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AnimationMetadata>,
    pub parameters: ParameterSchema,
    pub content_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Registry of animation constructors.
///
/// `register` puts a constructor in the catalog; `load` verifies it and
/// publishes it with a content hash; `instantiate` builds instances from
/// loaded entries only.
pub struct PluginRegistry {
    catalog: BTreeMap<String, Registration>,
    allow_list: BTreeSet<String>,
    loaded: BTreeMap<String, String>,
}

impl PluginRegistry {
    pub fn new(allow_list: impl IntoIterator<Item = String>) -> Self {
        Self {
            catalog: BTreeMap::new(),
            allow_list: allow_list.into_iter().collect(),
            loaded: BTreeMap::new(),
        }
    }

    /// Register (or replace) a constructor under `name`. Replacing does not
    /// touch the loaded entry; callers re-`load` to pick up the new code.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        source_path: Option<PathBuf>,
        factory: AnimationFactory,
    ) {
        let name = name.into();
        if !self.allow_list.contains(&name) {
            warn!("Animation '{}' registered but not allow-listed", name);
        }
        self.catalog.insert(
            name,
            Registration {
                factory,
                version: version.into(),
                source_path,
            },
        );
    }

    /// Names that are both registered and allow-listed, sorted.
    pub fn scan(&self) -> Vec<String> {
        self.catalog
            .keys()
            .filter(|name| self.allow_list.contains(*name))
            .cloned()
            .collect()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    pub fn content_hash(&self, name: &str) -> Option<&str> {
        self.loaded.get(name).map(String::as_str)
    }

    /// Verify and publish a registered animation, returning its content
    /// hash. Re-loading an already-loaded name replaces the published hash;
    /// instances built from the old registration keep running until stopped.
    ///
    /// On any failure the previously loaded entry is left untouched.
    pub fn load(&mut self, name: &str) -> Result<String> {
        let registration = self.resolve(name)?;

        // Trial construction against a stand-in layout proves the factory
        // actually yields a working instance before it is published.
        let probe = (registration.factory)(&Self::probe_geometry(), &ParameterMap::new())
            .map_err(|e| {
                LumigridError::plugin(name, format!("constructor check failed: {}", e))
            })?;

        let hash = Self::hash_registration(registration, &probe.parameter_schema());
        drop(probe);

        let replaced = self.loaded.insert(name.to_string(), hash.clone());
        match replaced {
            Some(old) if old != hash => {
                info!("Reloaded animation '{}' ({} -> {})", name, &old[..8], &hash[..8])
            }
            _ => info!("Loaded animation '{}' ({})", name, &hash[..8]),
        }
        Ok(hash)
    }

    /// Build a live instance of a loaded animation.
    pub fn instantiate(
        &self,
        name: &str,
        geometry: &DeviceGeometry,
        overrides: &ParameterMap,
    ) -> Result<Box<dyn Animation>> {
        if !self.loaded.contains_key(name) {
            return Err(LumigridError::PluginNotFound(name.to_string()));
        }
        let registration = self.resolve(name)?;
        (registration.factory)(geometry, overrides)
    }

    /// Inspect an animation without side effects: a disposable instance is
    /// built against a stand-in layout and immediately dropped. Construction
    /// failure is reported in the descriptor, not propagated.
    pub fn describe(&self, name: &str) -> Result<AnimationDescriptor> {
        let registration = self.resolve(name)?;

        match (registration.factory)(&Self::probe_geometry(), &ParameterMap::new()) {
            Ok(instance) => {
                let schema = instance.parameter_schema();
                Ok(AnimationDescriptor {
                    name: name.to_string(),
                    metadata: Some(instance.metadata()),
                    content_hash: self
                        .content_hash(name)
                        .map(str::to_string)
                        .unwrap_or_else(|| Self::hash_registration(registration, &schema)),
                    parameters: schema,
                    error: None,
                })
            }
            Err(e) => Ok(AnimationDescriptor {
                name: name.to_string(),
                metadata: None,
                parameters: ParameterSchema::new(),
                content_hash: String::new(),
                error: Some(e.to_string()),
            }),
        }
    }

    fn resolve(&self, name: &str) -> Result<&Registration> {
        if !self.allow_list.contains(name) {
            warn!("Animation '{}' is not allow-listed", name);
            return Err(LumigridError::PluginNotFound(name.to_string()));
        }
        self.catalog
            .get(name)
            .ok_or_else(|| LumigridError::PluginNotFound(name.to_string()))
    }

    fn probe_geometry() -> DeviceGeometry {
        DeviceGeometry::new(1, 8)
    }

    /// sha256 of the backing source file when the registration carries one,
    /// else a fingerprint over name, version and declared schema.
    fn hash_registration(registration: &Registration, schema: &ParameterSchema) -> String {
        let mut hasher = Sha256::new();
        if let Some(path) = &registration.source_path {
            match std::fs::read(path) {
                Ok(bytes) => {
                    hasher.update(&bytes);
                    return hex::encode(hasher.finalize());
                }
                Err(e) => warn!(
                    "Cannot hash {}: {}; falling back to fingerprint",
                    path.display(),
                    e
                ),
            }
        }
        hasher.update(registration.version.as_bytes());
        for (param, spec) in schema {
            hasher.update(param.as_bytes());
            if let Ok(encoded) = serde_json::to_vec(spec) {
                hasher.update(&encoded);
            }
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::schema::ParameterSpec;
    use crate::layout::Frame;
    use std::io::Write;
    use std::time::Duration;

    struct FakeAnimation {
        version: String,
    }

    impl Animation for FakeAnimation {
        fn metadata(&self) -> AnimationMetadata {
            AnimationMetadata {
                name: "fake".into(),
                description: "test animation".into(),
                author: "tests".into(),
                version: self.version.clone(),
            }
        }

        fn parameter_schema(&self) -> ParameterSchema {
            let mut schema = ParameterSchema::new();
            schema.insert("speed".into(), ParameterSpec::float(0.1, 5.0, 1.0, "Speed"));
            schema
        }

        fn params(&self) -> ParameterMap {
            ParameterMap::new()
        }

        fn update_parameters(&mut self, _updates: &ParameterMap) -> Result<()> {
            Ok(())
        }

        fn generate_frame(&mut self, _elapsed: Duration, _frame_count: u64) -> Result<Frame> {
            Ok(Frame::new())
        }
    }

    fn fake_factory(version: &'static str) -> AnimationFactory {
        Box::new(move |_, _| {
            Ok(Box::new(FakeAnimation {
                version: version.into(),
            }) as Box<dyn Animation>)
        })
    }

    fn registry_with_fake() -> PluginRegistry {
        let mut registry = PluginRegistry::new(["fake".to_string()]);
        registry.register("fake", "1.0.0", None, fake_factory("1.0.0"));
        registry
    }

    #[test]
    fn test_scan_filters_by_allow_list() {
        let mut registry = registry_with_fake();
        registry.register("rogue", "0.1.0", None, fake_factory("0.1.0"));
        assert_eq!(registry.scan(), vec!["fake".to_string()]);
    }

    #[test]
    fn test_load_unknown_name_fails() {
        let mut registry = registry_with_fake();
        assert!(matches!(
            registry.load("missing"),
            Err(LumigridError::PluginNotFound(_))
        ));
    }

    #[test]
    fn test_load_not_allow_listed_fails() {
        let mut registry = registry_with_fake();
        registry.register("rogue", "0.1.0", None, fake_factory("0.1.0"));
        assert!(registry.load("rogue").is_err());
        assert!(!registry.is_loaded("rogue"));
    }

    #[test]
    fn test_instantiate_requires_load() {
        let registry = registry_with_fake();
        let geometry = DeviceGeometry::default();
        assert!(registry
            .instantiate("fake", &geometry, &ParameterMap::new())
            .is_err());
    }

    #[test]
    fn test_load_then_instantiate() {
        let mut registry = registry_with_fake();
        let hash = registry.load("fake").unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(registry.content_hash("fake"), Some(hash.as_str()));

        let geometry = DeviceGeometry::default();
        let instance = registry
            .instantiate("fake", &geometry, &ParameterMap::new())
            .unwrap();
        assert_eq!(instance.metadata().name, "fake");
    }

    #[test]
    fn test_reload_replaces_hash() {
        let mut registry = registry_with_fake();
        let first = registry.load("fake").unwrap();

        registry.register("fake", "2.0.0", None, fake_factory("2.0.0"));
        let second = registry.load("fake").unwrap();
        assert_ne!(first, second);
        assert_eq!(registry.content_hash("fake"), Some(second.as_str()));
    }

    #[test]
    fn test_failed_load_keeps_previous_entry() {
        let mut registry = registry_with_fake();
        let hash = registry.load("fake").unwrap();

        registry.register(
            "fake",
            "3.0.0",
            None,
            Box::new(|_, _| {
                Err(LumigridError::plugin("fake", "broken constructor"))
            }),
        );
        assert!(registry.load("fake").is_err());
        assert_eq!(registry.content_hash("fake"), Some(hash.as_str()));
    }

    #[test]
    fn test_source_file_hash_tracks_content() {
        let mut source = tempfile::NamedTempFile::new().unwrap();
        writeln!(source, "revision one").unwrap();
        let path = source.path().to_path_buf();

        let mut registry = PluginRegistry::new(["fake".to_string()]);
        registry.register("fake", "1.0.0", Some(path.clone()), fake_factory("1.0.0"));
        let first = registry.load("fake").unwrap();

        writeln!(source, "revision two").unwrap();
        source.flush().unwrap();
        let second = registry.load("fake").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_describe_reports_schema() {
        let registry = registry_with_fake();
        let descriptor = registry.describe("fake").unwrap();
        assert!(descriptor.error.is_none());
        assert!(descriptor.parameters.contains_key("speed"));
        assert_eq!(descriptor.metadata.unwrap().version, "1.0.0");
    }

    #[test]
    fn test_describe_captures_constructor_error() {
        let mut registry = PluginRegistry::new(["broken".to_string()]);
        registry.register(
            "broken",
            "0.0.1",
            None,
            Box::new(|_, _| Err(LumigridError::plugin("broken", "cannot build"))),
        );
        let descriptor = registry.describe("broken").unwrap();
        assert!(descriptor.error.is_some());
        assert!(descriptor.metadata.is_none());
    }
}
