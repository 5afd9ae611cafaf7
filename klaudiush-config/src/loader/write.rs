//! Comment-preserving configuration write-back.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::KlaudiushConfig;

/// Persist a configuration to a path, round-tripping through `toml_edit` so
/// an existing file keeps its comments and layout.
///
/// Callers that have backups enabled are expected to snapshot the target
/// first; this function only writes.
pub fn save_config_to_path(path: impl AsRef<Path>, config: &KlaudiushConfig) -> Result<()> {
    let path = path.as_ref();

    let serialized = toml::to_string_pretty(config).context("failed to serialize configuration")?;

    if path.exists() {
        let original = fs::read_to_string(path)
            .with_context(|| format!("failed to read existing config: {}", path.display()))?;

        let mut doc = original
            .parse::<toml_edit::DocumentMut>()
            .with_context(|| format!("failed to parse existing config: {}", path.display()))?;

        let new_doc: toml_edit::DocumentMut = serialized
            .parse()
            .context("failed to parse serialized configuration")?;

        merge_documents(&mut doc, &new_doc);

        fs::write(path, doc.to_string())
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
    } else {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, serialized)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
    }

    Ok(())
}

fn merge_documents(original: &mut toml_edit::DocumentMut, new: &toml_edit::DocumentMut) {
    for (key, new_value) in new.iter() {
        if let Some(original_value) = original.get_mut(key) {
            merge_items(original_value, new_value);
        } else {
            original[key] = new_value.clone();
        }
    }
}

fn merge_items(original: &mut toml_edit::Item, new: &toml_edit::Item) {
    match (original, new) {
        (toml_edit::Item::Table(original_table), toml_edit::Item::Table(new_table)) => {
            for (key, new_value) in new_table.iter() {
                if let Some(original_value) = original_table.get_mut(key) {
                    merge_items(original_value, new_value);
                } else {
                    original_table[key] = new_value.clone();
                }
            }
        }
        (original, new) => {
            *original = new.clone();
        }
    }
}
