//! Layered configuration loading.
//!
//! Precedence, lowest to highest: embedded defaults, global file
//! (`~/.klaudiush/config.toml`), project file (`./.klaudiush/config.toml` or
//! `./klaudiush.toml`), `KLAUDIUSH_*` environment variables, CLI flags.

pub mod env;
pub mod layers;
pub mod merge;
pub mod write;


use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use toml::Value as TomlValue;

use crate::KlaudiushConfig;
use layers::{ConfigLayerEntry, ConfigLayerSource, ConfigLayerStack};

pub const GLOBAL_DIR: &str = ".klaudiush";
pub const CONFIG_FILE: &str = "config.toml";
pub const PROJECT_FILE: &str = "klaudiush.toml";

/// Loads, merges and validates the configuration stack.
#[derive(Clone, Debug)]
pub struct ConfigManager {
    config: KlaudiushConfig,
    stack_sources: Vec<ConfigLayerSource>,
    global_path: Option<PathBuf>,
    project_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load for the current working directory and process environment.
    pub fn load(flag_layer: Option<TomlValue>) -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to resolve current directory")?;
        Self::load_for_workspace(&cwd, flag_layer)
    }

    /// Load for an explicit workspace, with the real home directory and
    /// process environment.
    pub fn load_for_workspace(workspace: &Path, flag_layer: Option<TomlValue>) -> Result<Self> {
        let global_dir = dirs::home_dir().map(|home| home.join(GLOBAL_DIR));
        Self::load_with_paths(global_dir.as_deref(), workspace, env::env_layer(), flag_layer)
    }

    /// Fully parameterized load (testable core).
    pub fn load_with_paths(
        global_dir: Option<&Path>,
        workspace: &Path,
        env_layer: TomlValue,
        flag_layer: Option<TomlValue>,
    ) -> Result<Self> {
        let mut stack = ConfigLayerStack::default();
        let mut sources = vec![ConfigLayerSource::Defaults];
        stack.push(ConfigLayerEntry::new(
            ConfigLayerSource::Defaults,
            TomlValue::Table(toml::Table::new()),
        ));

        let global_path = global_dir.map(|dir| dir.join(CONFIG_FILE));
        if let Some(path) = global_path.as_ref().filter(|path| path.exists()) {
            let source = ConfigLayerSource::Global { file: path.clone() };
            stack.push(ConfigLayerEntry::new(source.clone(), read_layer(path)?));
            sources.push(source);
        }

        let project_path = discover_project_config(workspace);
        if let Some(path) = project_path.as_ref() {
            let source = ConfigLayerSource::Project { file: path.clone() };
            stack.push(ConfigLayerEntry::new(source.clone(), read_layer(path)?));
            sources.push(source);
        }

        stack.push(ConfigLayerEntry::new(
            ConfigLayerSource::Environment,
            env_layer,
        ));
        sources.push(ConfigLayerSource::Environment);

        if let Some(flags) = flag_layer {
            stack.push(ConfigLayerEntry::new(ConfigLayerSource::Flags, flags));
            sources.push(ConfigLayerSource::Flags);
        }

        let effective = stack.effective_config();
        let config: KlaudiushConfig = effective
            .try_into()
            .context("effective configuration does not match the schema")?;
        config.validate().context("configuration failed validation")?;

        Ok(Self {
            config,
            stack_sources: sources,
            global_path,
            project_path,
        })
    }

    pub fn config(&self) -> &KlaudiushConfig {
        &self.config
    }

    pub fn into_config(self) -> KlaudiushConfig {
        self.config
    }

    /// Layer sources that contributed to the effective configuration.
    pub fn sources(&self) -> &[ConfigLayerSource] {
        &self.stack_sources
    }

    pub fn global_path(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    pub fn project_path(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }
}

fn discover_project_config(workspace: &Path) -> Option<PathBuf> {
    let preferred = workspace.join(GLOBAL_DIR).join(CONFIG_FILE);
    if preferred.exists() {
        return Some(preferred);
    }
    let fallback = workspace.join(PROJECT_FILE);
    fallback.exists().then_some(fallback)
}

fn read_layer(path: &Path) -> Result<TomlValue> {
    refuse_insecure_permissions(path)?;
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    content
        .parse::<TomlValue>()
        .with_context(|| format!("failed to parse config file: {}", path.display()))
}

/// A world-writable config file could let any local user inject policy.
#[cfg(unix)]
fn refuse_insecure_permissions(path: &Path) -> Result<()> {
    use anyhow::bail;
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to inspect config file: {}", path.display()))?;
    let mode = metadata.permissions().mode();
    if mode & 0o002 != 0 {
        bail!(
            "refusing to read world-writable config file {} (mode {:o})",
            path.display(),
            mode & 0o777
        );
    }
    Ok(())
}

#[cfg(not(unix))]
fn refuse_insecure_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
