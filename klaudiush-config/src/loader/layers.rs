//! Configuration layer stack.

use std::path::PathBuf;

use toml::Value as TomlValue;

use crate::loader::merge::{merge_rule_arrays, overlay_table};

/// Source of a configuration layer, lowest to highest precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// Embedded defaults (serde `default =` attributes; an empty table here).
    Defaults,
    /// Global configuration (`~/.klaudiush/config.toml`).
    Global { file: PathBuf },
    /// Project configuration (`./.klaudiush/config.toml` or `./klaudiush.toml`).
    Project { file: PathBuf },
    /// `KLAUDIUSH_*` environment variables.
    Environment,
    /// CLI flag overrides.
    Flags,
}

/// A single parsed layer.
#[derive(Debug, Clone)]
pub struct ConfigLayerEntry {
    pub source: ConfigLayerSource,
    pub config: TomlValue,
}

impl ConfigLayerEntry {
    pub fn new(source: ConfigLayerSource, config: TomlValue) -> Self {
        Self { source, config }
    }
}

/// A stack of layers, ordered from lowest to highest precedence.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayerStack {
    layers: Vec<ConfigLayerEntry>,
}

impl ConfigLayerStack {
    pub fn push(&mut self, layer: ConfigLayerEntry) {
        self.layers.push(layer);
    }

    pub fn layers(&self) -> &[ConfigLayerEntry] {
        &self.layers
    }

    /// Merge all layers into one effective TOML document.
    ///
    /// `rules.rules` arrays are pulled out of each layer first and re-merged
    /// by rule name, so the wholesale-array overlay rule never applies to
    /// them.
    pub fn effective_config(&self) -> TomlValue {
        let mut rule_layers: Vec<Vec<TomlValue>> = Vec::new();
        let mut merged = toml::Table::new();

        for layer in &self.layers {
            let mut config = layer.config.clone();
            if let Some(rules) = extract_rules(&mut config) {
                rule_layers.push(rules);
            }
            if let Some(table) = config.as_table() {
                overlay_table(&mut merged, table);
            }
        }

        let rules = merge_rule_arrays(rule_layers);
        if !rules.is_empty() {
            insert_rules(&mut merged, rules);
        }

        TomlValue::Table(merged)
    }
}

fn extract_rules(config: &mut TomlValue) -> Option<Vec<TomlValue>> {
    let rules_table = config.get_mut("rules")?.as_table_mut()?;
    match rules_table.remove("rules") {
        Some(TomlValue::Array(rules)) => Some(rules),
        Some(other) => {
            // Put a malformed value back so deserialization reports it.
            rules_table.insert("rules".to_string(), other);
            None
        }
        None => None,
    }
}

fn insert_rules(merged: &mut toml::Table, rules: Vec<TomlValue>) {
    let rules_table = merged
        .entry("rules".to_string())
        .or_insert_with(|| TomlValue::Table(toml::Table::new()));
    if let Some(rules_table) = rules_table.as_table_mut() {
        rules_table.insert("rules".to_string(), TomlValue::Array(rules));
    }
}
