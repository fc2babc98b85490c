use std::path::Path;

use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::{DatabaseError, ErrorKind};
use crate::types::BackendKind;

/// Config key holding the path-prefix filters applied to profiling traces.
pub const PROFILING_PATHS_KEY: &str = "profiling_paths";
/// Config key holding `prefix -> alias` replacements applied to trace paths.
pub const PROFILING_PATH_ALIASES_KEY: &str = "profiling_path_aliases";

/// Reconnects allowed after the first submission (four submissions in total).
pub const DEFAULT_MAX_RECONNECTS: u32 = 3;

/// Options for one logical connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionOptions {
    /// Name reported to the profiler and in logs
    pub instance: String,
    pub backend: BackendKind,
    #[serde(default)]
    pub profiling: bool,
    #[serde(default = "default_max_reconnects")]
    pub max_reconnects: u32,
}

fn default_max_reconnects() -> u32 {
    DEFAULT_MAX_RECONNECTS
}

impl ConnectionOptions {
    #[must_use]
    pub fn new(instance: impl Into<String>, backend: BackendKind) -> Self {
        Self {
            instance: instance.into(),
            backend,
            profiling: false,
            max_reconnects: DEFAULT_MAX_RECONNECTS,
        }
    }

    /// Parse options from a JSON object.
    ///
    /// # Errors
    /// Returns a `Config` error if the JSON does not describe valid options.
    pub fn from_json(json: &str) -> Result<Self, DatabaseError> {
        serde_json::from_str(json).map_err(|e| {
            DatabaseError::new(ErrorKind::Config, format!("invalid connection options: {e}"), 0)
                .with_cause(e)
        })
    }
}

/// Fluent builder for [`ConnectionOptions`].
#[derive(Debug, Clone)]
pub struct ConnectionOptionsBuilder {
    opts: ConnectionOptions,
}

impl ConnectionOptionsBuilder {
    #[must_use]
    pub fn new(instance: impl Into<String>, backend: BackendKind) -> Self {
        Self {
            opts: ConnectionOptions::new(instance, backend),
        }
    }

    #[must_use]
    pub fn profiling(mut self, profiling: bool) -> Self {
        self.opts.profiling = profiling;
        self
    }

    #[must_use]
    pub fn max_reconnects(mut self, max_reconnects: u32) -> Self {
        self.opts.max_reconnects = max_reconnects;
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectionOptions {
        self.opts
    }
}

/// Read-only configuration lookup.
pub trait ConfigSource {
    fn get(&self, key: &str) -> Option<JsonValue>;
}

/// Configuration with no keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyConfig;

impl ConfigSource for EmptyConfig {
    fn get(&self, _key: &str) -> Option<JsonValue> {
        None
    }
}

/// Configuration backed by a JSON object.
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    values: JsonMap<String, JsonValue>,
}

impl JsonConfig {
    /// # Errors
    /// Returns a `Config` error if `value` is not a JSON object.
    pub fn from_value(value: JsonValue) -> Result<Self, DatabaseError> {
        match value {
            JsonValue::Object(values) => Ok(Self { values }),
            other => Err(DatabaseError::new(
                ErrorKind::Config,
                format!("configuration must be a JSON object, got {other}"),
                0,
            )),
        }
    }

    /// # Errors
    /// Returns a `Config` error if `json` is not a JSON object.
    pub fn parse(json: &str) -> Result<Self, DatabaseError> {
        let value: JsonValue = serde_json::from_str(json).map_err(|e| {
            DatabaseError::new(ErrorKind::Config, format!("invalid configuration: {e}"), 0)
                .with_cause(e)
        })?;
        Self::from_value(value)
    }

    /// # Errors
    /// Returns a `Config` error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DatabaseError::new(
                ErrorKind::Config,
                format!("cannot read configuration {}: {e}", path.display()),
                0,
            )
            .with_cause(e)
        })?;
        Self::parse(&text)
    }

    pub fn set(&mut self, key: impl Into<String>, value: JsonValue) {
        self.values.insert(key.into(), value);
    }
}

impl ConfigSource for JsonConfig {
    fn get(&self, key: &str) -> Option<JsonValue> {
        self.values.get(key).cloned()
    }
}

/// Path-prefix filters for profiling traces; missing or `null` means none.
///
/// # Errors
/// Returns a `Config` error if the value is not an array of strings.
pub fn profiling_paths(config: &dyn ConfigSource) -> Result<Vec<String>, DatabaseError> {
    match config.get(PROFILING_PATHS_KEY) {
        None | Some(JsonValue::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value).map_err(|e| {
            DatabaseError::new(
                ErrorKind::Config,
                format!("{PROFILING_PATHS_KEY} must be an array of strings: {e}"),
                0,
            )
            .with_cause(e)
        }),
    }
}

/// `prefix -> alias` pairs used when cleaning trace paths.
///
/// # Errors
/// Returns a `Config` error if the value is not an object of strings.
pub fn profiling_path_aliases(
    config: &dyn ConfigSource,
) -> Result<Vec<(String, String)>, DatabaseError> {
    let Some(value) = config.get(PROFILING_PATH_ALIASES_KEY) else {
        return Ok(Vec::new());
    };
    match value {
        JsonValue::Null => Ok(Vec::new()),
        JsonValue::Object(map) => map
            .into_iter()
            .map(|(prefix, alias)| match alias {
                JsonValue::String(alias) => Ok((prefix, alias)),
                other => Err(DatabaseError::new(
                    ErrorKind::Config,
                    format!("{PROFILING_PATH_ALIASES_KEY}.{prefix} must be a string, got {other}"),
                    0,
                )),
            })
            .collect(),
        other => Err(DatabaseError::new(
            ErrorKind::Config,
            format!("{PROFILING_PATH_ALIASES_KEY} must be an object, got {other}"),
            0,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_builder_and_json_agree() {
        let built = ConnectionOptionsBuilder::new("default", BackendKind::Mysql)
            .profiling(true)
            .finish();
        let json = r#"{"instance":"default","backend":"mysql","profiling":true}"#;
        let parsed = ConnectionOptions::from_json(json).unwrap();
        assert_eq!(built, parsed);
        assert_eq!(parsed.max_reconnects, DEFAULT_MAX_RECONNECTS);
    }

    #[test]
    fn profiling_paths_reads_string_array() {
        let cfg = JsonConfig::from_value(json!({"profiling_paths": ["/app/src"]})).unwrap();
        assert_eq!(profiling_paths(&cfg).unwrap(), vec!["/app/src".to_string()]);
        assert!(profiling_paths(&EmptyConfig).unwrap().is_empty());
    }

    #[test]
    fn profiling_paths_rejects_wrong_shape() {
        let cfg = JsonConfig::from_value(json!({"profiling_paths": "/app/src"})).unwrap();
        let err = profiling_paths(&cfg).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
    }

    #[test]
    fn aliases_are_parsed() {
        let cfg =
            JsonConfig::parse(r#"{"profiling_path_aliases": {"/srv/app/": "APPPATH/"}}"#).unwrap();
        assert_eq!(
            profiling_path_aliases(&cfg).unwrap(),
            vec![("/srv/app/".to_string(), "APPPATH/".to_string())]
        );
    }

    #[test]
    fn config_must_be_an_object() {
        assert!(JsonConfig::parse("[1, 2]").is_err());
    }
}
