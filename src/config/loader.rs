//! Configuration loading and environment parsing.

use super::Config;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Load configuration with the following precedence (highest first):
/// 1) `HOST` / `PORT` environment variables
/// 2) `QUIZ__…` prefixed environment overrides ("__" as nested separator,
///    e.g. `QUIZ__SERVER__CODE_LENGTH=8` or `QUIZ__LOGGING__LEVEL=debug`)
/// 3) config.json in the current working directory
/// 4) Defaults compiled into the binary
///
/// Any errors while reading/parsing are printed to stderr and the lower
/// layers are used; `load()` always returns a `Config`.
#[must_use]
pub fn load() -> Config {
    let defaults = Config::default();
    let mut merged =
        serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

    merge_file_source(&mut merged, Path::new("config.json"));
    apply_env_overrides(&mut merged);

    let mut config = match serde_json::from_value::<Config>(merged) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to deserialize config; using defaults: {e}");
            defaults
        }
    };

    // The launch surface is HOST/PORT; these always win.
    if let Ok(host) = std::env::var("HOST") {
        if !host.trim().is_empty() {
            config.host = host.trim().to_string();
        }
    }
    if let Ok(port) = std::env::var("PORT") {
        match port.trim().parse::<u16>() {
            Ok(port) => config.port = port,
            Err(e) => eprintln!("Ignoring invalid PORT value '{port}': {e}"),
        }
    }

    config
}

fn merge_file_source(target: &mut Value, path: &Path) {
    if !path.exists() {
        return;
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(value) => merge_values(target, value),
            Err(err) => eprintln!("Failed to parse config from {}: {}", path.display(), err),
        },
        Err(err) => {
            eprintln!("Failed to read config from {}: {}", path.display(), err);
        }
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
        let Some(stripped) = key.strip_prefix("QUIZ__") else {
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

        let value = parse_scalar(raw_value.trim());
        set_nested_value(root, &segments, value);
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

    // SAFETY: The branch above guarantees `value` is a `Value::Object`, so
    // `as_object_mut()` will always return `Some`.
    #[allow(clippy::expect_used)]
    value
        .as_object_mut()
        .expect("value should be coerced into an object")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overwrites_scalars_and_recurses_objects() {
        let mut target = serde_json::json!({"port": 8765, "server": {"code_length": 6}});
        merge_values(
            &mut target,
            serde_json::json!({"port": 9000, "server": {"code_attempts": 8}}),
        );
        assert_eq!(target["port"], 9000);
        assert_eq!(target["server"]["code_length"], 6);
        assert_eq!(target["server"]["code_attempts"], 8);
    }

    #[test]
    fn nested_value_creates_intermediate_objects() {
        let mut root = serde_json::json!({});
        set_nested_value(
            &mut root,
            &["logging".into(), "level".into()],
            serde_json::json!("debug"),
        );
        assert_eq!(root["logging"]["level"], "debug");
    }

    #[test]
    fn scalars_parse_as_json_then_string() {
        assert_eq!(parse_scalar("8"), serde_json::json!(8));
        assert_eq!(parse_scalar("true"), serde_json::json!(true));
        assert_eq!(parse_scalar("debug"), serde_json::json!("debug"));
    }
}
