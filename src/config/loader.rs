//! Configuration loading: defaults, overlaid by a config file, overlaid
//! by environment variables.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::Config;

/// Load configuration with the following precedence (highest first):
/// 1) `MASTER_SERVER__*` environment variables, `__` as the nesting separator
///    (e.g. `MASTER_SERVER__PEER_TIMEOUT_SECS=45`).
/// 2) `master_server.json` in the current working directory, if present.
/// 3) Compiled-in defaults.
///
/// Malformed file contents or an undeserializable merged document falls
/// back to defaults; the error is printed to stderr rather than
/// propagated; a bad config file should never crash the process.
#[must_use]
pub fn load() -> Config {
    let defaults = Config::default();
    let mut merged =
        serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

    merge_file_source(&mut merged, &PathBuf::from("master_server.json"));
    apply_env_overrides(&mut merged);

    match serde_json::from_value::<Config>(merged) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to deserialize configuration; using defaults: {err}");
            defaults
        }
    }
}

fn merge_file_source(target: &mut Value, path: &Path) {
    if !path.exists() {
        return;
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(value) => merge_values(target, value),
            Err(err) => eprintln!("Failed to parse {}: {err}", path.display()),
        },
        Err(err) => eprintln!("Failed to read {}: {err}", path.display()),
    }
}

fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target_slot, source_value) => {
            *target_slot = source_value;
        }
    }
}

fn apply_env_overrides(root: &mut Value) {
    for (key, raw_value) in std::env::vars() {
        let Some(stripped) = key.strip_prefix("MASTER_SERVER__") else {
            continue;
        };

        let segments: Vec<String> = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();

        if segments.is_empty() {
            continue;
        }

        set_nested_value(root, &segments, parse_scalar(raw_value.trim()));
    }
}

fn parse_scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn set_nested_value(target: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    let map = ensure_object(target);
    if rest.is_empty() {
        map.insert(head.clone(), value);
        return;
    }

    let entry = map
        .entry(head.clone())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    set_nested_value(entry, rest, value);
}

fn ensure_object(value: &mut Value) -> &mut serde_json::Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(serde_json::Map::new());
    }
    #[allow(clippy::expect_used)]
    value
        .as_object_mut()
        .expect("value was just coerced into an object")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn file_source_overrides_defaults_and_env_overrides_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let original_cwd = std::env::current_dir().unwrap();
        std::fs::write(
            dir.path().join("master_server.json"),
            r#"{"port": 7777, "lobby_retention_secs": 120}"#,
        )
        .unwrap();

        std::env::set_current_dir(dir.path()).unwrap();
        std::env::set_var("MASTER_SERVER__LOBBY_RETENTION_SECS", "45");

        let config = load();

        std::env::remove_var("MASTER_SERVER__LOBBY_RETENTION_SECS");
        std::env::set_current_dir(original_cwd).unwrap();

        assert_eq!(config.port, 7777);
        assert_eq!(config.lobby_retention_secs, 45);
        assert_eq!(config.peer_timeout_secs, super::super::defaults::default_peer_timeout_secs());
    }

    #[test]
    #[serial]
    fn env_override_wins_over_default() {
        std::env::set_var("MASTER_SERVER__PORT", "9999");
        let config = load();
        std::env::remove_var("MASTER_SERVER__PORT");
        assert_eq!(config.port, 9999);
    }

    #[test]
    #[serial]
    fn nested_env_override_sets_logging_field() {
        std::env::set_var("MASTER_SERVER__LOGGING__FORMAT", "text");
        let config = load();
        std::env::remove_var("MASTER_SERVER__LOGGING__FORMAT");
        assert_eq!(config.logging.format, super::super::logging::LogFormat::Text);
    }
}
