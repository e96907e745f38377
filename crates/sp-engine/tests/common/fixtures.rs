//! Test fixtures and data loading

use sp_config::ShutterPilotConfig;
use std::path::Path;

/// Load a fixture file from `tests/fixtures/` as a string
pub fn load_fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);

    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to load fixture '{}' from {:?}: {}", name, path, e))
}

/// Load and validate a configuration fixture
pub fn load_config_fixture(name: &str) -> ShutterPilotConfig {
    ShutterPilotConfig::from_yaml_str(&load_fixture(name))
        .unwrap_or_else(|e| panic!("Invalid configuration fixture '{}': {}", name, e))
}

/// Validate an inline configuration
pub fn config(yaml: &str) -> ShutterPilotConfig {
    ShutterPilotConfig::from_yaml_str(yaml)
        .unwrap_or_else(|e| panic!("Invalid test configuration: {}", e))
}
