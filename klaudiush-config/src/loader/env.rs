//! `KLAUDIUSH_*` environment variable layer.
//!
//! `KLAUDIUSH_A_B_C` maps to the config path `a.b.c`. Underscores inside a
//! leaf name (`use_markdownlint`) also flatten to `_`, so the suffix is
//! reassembled against the schema registry, longest segment first.

use toml::Value;
use tracing::warn;

use crate::schema;

pub const ENV_PREFIX: &str = "KLAUDIUSH_";

/// Env vars that configure the process rather than the config tree.
const RESERVED: &[&str] = &["KLAUDIUSH_LOG", "KLAUDIUSH_CONFIG"];

/// Build a TOML layer from the process environment.
pub fn env_layer() -> Value {
    layer_from_vars(std::env::vars())
}

/// Build a TOML layer from explicit key/value pairs (testable core).
pub fn layer_from_vars(vars: impl Iterator<Item = (String, String)>) -> Value {
    let mut root = Value::Table(toml::Table::new());

    for (key, raw) in vars {
        let Some(suffix) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        if RESERVED.contains(&key.as_str()) {
            continue;
        }

        let lowered = suffix.to_ascii_lowercase();
        let tokens: Vec<&str> = lowered.split('_').collect();
        let Some(path) = schema::resolve_path(&tokens) else {
            warn!(%key, "ignoring environment variable with unknown config path");
            continue;
        };

        insert_at_path(&mut root, &path, parse_value(&raw));
    }

    root
}

/// Interpret an env value: bool, integer, float, comma-separated array,
/// then plain string, in that order.
fn parse_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(flag) = trimmed.parse::<bool>() {
        return Value::Boolean(flag);
    }
    if let Ok(number) = trimmed.parse::<i64>() {
        return Value::Integer(number);
    }
    if let Ok(number) = trimmed.parse::<f64>() {
        return Value::Float(number);
    }
    if trimmed.contains(',') {
        let items = trimmed
            .split(',')
            .map(|item| Value::String(item.trim().to_string()))
            .collect();
        return Value::Array(items);
    }
    Value::String(trimmed.to_string())
}

fn insert_at_path(root: &mut Value, path: &[String], value: Value) {
    let mut cursor = root;
    for segment in &path[..path.len() - 1] {
        let table = cursor
            .as_table_mut()
            .expect("env layer cursor is always a table");
        cursor = table
            .entry(segment.clone())
            .or_insert_with(|| Value::Table(toml::Table::new()));
        if !cursor.is_table() {
            *cursor = Value::Table(toml::Table::new());
        }
    }
    if let Some(table) = cursor.as_table_mut() {
        table.insert(path[path.len() - 1].clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(pairs: &[(&str, &str)]) -> Value {
        layer_from_vars(
            pairs
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        )
    }

    #[test]
    fn simple_path_maps_to_nested_table() {
        let layer = layer(&[("KLAUDIUSH_GLOBAL_DEFAULT_TIMEOUT_SECS", "3")]);
        let value = layer
            .get("global")
            .and_then(|global| global.get("default_timeout_secs"))
            .unwrap();
        assert_eq!(value.as_integer(), Some(3));
    }

    #[test]
    fn multi_word_leaf_is_one_segment() {
        let layer = layer(&[("KLAUDIUSH_VALIDATORS_FILE_MARKDOWN_USE_MARKDOWNLINT", "true")]);
        let value = layer
            .get("validators")
            .and_then(|validators| validators.get("file"))
            .and_then(|file| file.get("markdown"))
            .and_then(|markdown| markdown.get("use_markdownlint"))
            .unwrap();
        assert_eq!(value.as_bool(), Some(true));
    }

    #[test]
    fn comma_values_become_arrays() {
        let layer = layer(&[("KLAUDIUSH_VALIDATORS_GIT_COMMIT_REQUIRED_FLAGS", "-s,-S")]);
        let flags = layer
            .get("validators")
            .and_then(|validators| validators.get("git"))
            .and_then(|git| git.get("commit"))
            .and_then(|commit| commit.get("required_flags"))
            .and_then(Value::as_array)
            .unwrap();
        assert_eq!(flags.len(), 2);
        assert_eq!(flags[0].as_str(), Some("-s"));
    }

    #[test]
    fn unknown_and_reserved_keys_are_skipped() {
        let layer = layer(&[
            ("KLAUDIUSH_LOG", "debug"),
            ("KLAUDIUSH_NOT_A_REAL_PATH", "1"),
            ("UNRELATED", "x"),
        ]);
        assert!(layer.as_table().unwrap().is_empty());
    }
}
