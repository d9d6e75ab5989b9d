//! Built-in animations shipped with the daemon.

pub mod rainbow;
pub mod solid;
pub mod sparkle;

use super::registry::PluginRegistry;

/// Names cleared to load out of the box.
pub fn default_allow_list() -> Vec<String> {
    ["rainbow", "solid", "sparkle", "strip_test"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// A registry pre-populated with the built-in catalog.
pub fn default_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new(default_allow_list());
    registry.register("rainbow", rainbow::VERSION, None, rainbow::factory());
    registry.register("solid", solid::VERSION, None, solid::factory());
    registry.register("sparkle", sparkle::VERSION, None, sparkle::factory());
    registry.register(
        "strip_test",
        strip_test::VERSION,
        None,
        strip_test::factory(),
    );
    registry
}
