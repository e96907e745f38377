//! YAML loader with custom tag support
//!
//! Supported tags:
//! - `!include path` - Replace the node with the contents of another YAML
//!   file, resolved relative to the including file
//! - `!env_var VAR` - Replace the node with an environment variable's value
//!
//! Unknown tags are kept as-is so that schema validation reports them.

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// YAML loader resolving `!include` and `!env_var`
pub struct YamlLoader {
    /// Base directory for resolving relative paths
    config_dir: PathBuf,
    /// Files currently being loaded, outermost first
    include_stack: Vec<PathBuf>,
}

impl YamlLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            include_stack: Vec::new(),
        }
    }

    /// Load and process a YAML file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve_path(path.as_ref());
        debug!(path = %path.display(), "Loading YAML file");

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.push(path.clone());
        let result = self.load_string(&content, &path);
        self.include_stack.pop();

        result
    }

    /// Load and process YAML from a string
    ///
    /// `source_path` is used for error messages and as the base for relative
    /// includes.
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.process_value(value, source_path)
    }

    fn process_value(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged, source_path),
            Value::Mapping(map) => {
                let mut result = Mapping::with_capacity(map.len());
                for (k, v) in map {
                    result.insert(k, self.process_value(v, source_path)?);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.process_value(v, source_path))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            _ => Ok(value),
        }
    }

    fn process_tagged(&mut self, tagged: TaggedValue, source_path: &Path) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!(tag = %tag, "Processing tag");

        match tag.as_str() {
            "!include" => {
                let include_path = self.value_to_path(&tagged.value, source_path)?;
                debug!(path = %include_path.display(), "Including file");
                self.load_file(&include_path)
            }
            "!env_var" => env_var(tagged.value),
            _ => {
                let value = self.process_value(tagged.value, source_path)?;
                Ok(Value::Tagged(Box::new(TaggedValue {
                    tag: tagged.tag,
                    value,
                })))
            }
        }
    }

    /// Resolve a tag argument relative to the file that contains it
    fn value_to_path(&self, value: &Value, source_path: &Path) -> ConfigResult<PathBuf> {
        let path_str = value
            .as_str()
            .ok_or_else(|| ConfigError::InvalidIncludePath {
                path: format!("{:?}", value),
                reason: "path must be a string".to_string(),
            })?;

        if path_str.trim().is_empty() {
            return Err(ConfigError::InvalidIncludePath {
                path: path_str.to_string(),
                reason: "path is empty".to_string(),
            });
        }

        let path = Path::new(path_str);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }

        let base_dir = source_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(&self.config_dir);
        Ok(base_dir.join(path))
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

fn env_var(value: Value) -> ConfigResult<Value> {
    let var_name = match value {
        Value::String(s) => s,
        _ => {
            return Err(ConfigError::invalid(
                "!env_var",
                "environment variable name must be a string",
            ))
        }
    };

    let env_value = std::env::var(&var_name).map_err(|_| ConfigError::EnvVarNotFound {
        var: var_name.clone(),
    })?;

    debug!(var = %var_name, "Substituted env var");
    // Re-parse so numbers and booleans keep their YAML type
    Ok(serde_yaml::from_str::<Value>(&env_value).unwrap_or(Value::String(env_value)))
}

/// Load a YAML file, resolving tags relative to its own directory
pub fn load_yaml(path: impl AsRef<Path>) -> ConfigResult<Value> {
    let path = path.as_ref();
    let config_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    YamlLoader::new(config_dir).load_file(path)
}

/// Load a YAML string with tag processing
pub fn load_yaml_string(
    config_dir: impl Into<PathBuf>,
    content: &str,
    source_name: &str,
) -> ConfigResult<Value> {
    let config_dir = config_dir.into();
    let source = config_dir.join(source_name);
    YamlLoader::new(config_dir).load_string(content, &source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_simple_yaml() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "shutterpilot.yaml",
            "global_auto: true\nprofiles:\n  - name: Office\n",
        );

        let value = load_yaml(dir.path().join("shutterpilot.yaml")).unwrap();
        assert_eq!(value.get("global_auto"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_include_profiles_file() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "profiles.yaml",
            "- name: Office\n  cover_entity_id: cover.office\n",
        );
        write_file(
            dir.path(),
            "shutterpilot.yaml",
            "default_cooldown: 60\nprofiles: !include profiles.yaml\n",
        );

        let value = load_yaml(dir.path().join("shutterpilot.yaml")).unwrap();
        let profiles = value.get("profiles").unwrap().as_sequence().unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].get("name").unwrap().as_str(), Some("Office"));
    }

    #[test]
    fn test_include_relative_to_including_file() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "areas/living.yaml", "area_mode: brightness\n");
        write_file(
            dir.path(),
            "areas/all.yaml",
            "living: !include living.yaml\n",
        );
        write_file(dir.path(), "shutterpilot.yaml", "areas: !include areas/all.yaml\n");

        let value = load_yaml(dir.path().join("shutterpilot.yaml")).unwrap();
        let mode = value
            .get("areas")
            .and_then(|a| a.get("living"))
            .and_then(|l| l.get("area_mode"))
            .and_then(Value::as_str);
        assert_eq!(mode, Some("brightness"));
    }

    #[test]
    fn test_env_var_keeps_scalar_type() {
        std::env::set_var("SP_TEST_COOLDOWN", "45");
        std::env::set_var("SP_TEST_COVER", "cover.kitchen");

        let value = load_yaml_string(
            ".",
            "default_cooldown: !env_var SP_TEST_COOLDOWN\ncover: !env_var SP_TEST_COVER\n",
            "inline.yaml",
        )
        .unwrap();

        assert_eq!(value.get("default_cooldown").and_then(Value::as_u64), Some(45));
        assert_eq!(value.get("cover").and_then(Value::as_str), Some("cover.kitchen"));

        std::env::remove_var("SP_TEST_COOLDOWN");
        std::env::remove_var("SP_TEST_COVER");
    }

    #[test]
    fn test_missing_env_var() {
        let result = load_yaml_string(".", "x: !env_var SP_TEST_NOT_SET_ANYWHERE\n", "inline.yaml");
        assert!(matches!(result, Err(ConfigError::EnvVarNotFound { .. })));
    }

    #[test]
    fn test_circular_include_detection() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.yaml", "include_b: !include b.yaml\n");
        write_file(dir.path(), "b.yaml", "include_a: !include a.yaml\n");

        let result = load_yaml(dir.path().join("a.yaml"));
        assert!(matches!(result, Err(ConfigError::CircularInclude { .. })));
    }

    #[test]
    fn test_same_file_included_twice_is_not_circular() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "times.yaml", "up_time_weekday: \"06:30\"\n");
        write_file(
            dir.path(),
            "shutterpilot.yaml",
            "areas:\n  living: !include times.yaml\n  sleeping: !include times.yaml\n",
        );

        assert!(load_yaml(dir.path().join("shutterpilot.yaml")).is_ok());
    }

    #[test]
    fn test_missing_include() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "shutterpilot.yaml", "profiles: !include nope.yaml\n");

        let result = load_yaml(dir.path().join("shutterpilot.yaml"));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
