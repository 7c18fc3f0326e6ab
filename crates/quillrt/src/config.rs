//! Configuration file parsing for quill.toml.

use std::path::{Path, PathBuf};

use quill_vm_core::VaultConfig;
use quill_vm_gc::GcConfig;
use serde::Deserialize;

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Vault settings
    #[serde(default)]
    pub vault: VaultSection,

    /// Heap settings
    #[serde(default)]
    pub heap: HeapSection,
}

/// Vault configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultSection {
    /// Vault name used in diagnostics
    #[serde(default = "default_name")]
    pub name: String,

    /// Directories searched for dependencies
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,

    /// Reject classes that never received a runtime token
    #[serde(default = "default_true")]
    pub validate_tokens: bool,
}

impl Default for VaultSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            search_paths: Vec::new(),
            validate_tokens: true,
        }
    }
}

/// Heap configuration; unset keys keep the heap defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeapSection {
    /// Hard limit on alive payload bytes
    pub max_bytes: Option<usize>,

    /// Alive bytes after which a collection runs
    pub gc_threshold: Option<usize>,

    /// Report objects left alive on shutdown
    #[serde(default)]
    pub check_memory_leak: bool,
}

fn default_name() -> String {
    "quill".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Vault configuration, with `extra_paths` searched before the configured ones.
    ///
    /// Relative search paths in the file are taken relative to `base`.
    pub fn vault_config(&self, base: &Path, extra_paths: &[PathBuf]) -> VaultConfig {
        let defaults = GcConfig::default();
        let search_paths = extra_paths
            .iter()
            .cloned()
            .chain(self.vault.search_paths.iter().map(|p| base.join(p)))
            .collect();

        VaultConfig {
            name: self.vault.name.clone(),
            heap: GcConfig {
                max_bytes: self.heap.max_bytes.unwrap_or(defaults.max_bytes),
                gc_threshold: self.heap.gc_threshold.unwrap_or(defaults.gc_threshold),
                check_memory_leak: self.heap.check_memory_leak,
            },
            search_paths,
            validate_tokens: self.vault.validate_tokens,
        }
    }
}

/// A parsed config plus the directory its relative paths refer to.
#[derive(Debug)]
pub struct LoadedConfig {
    /// Parsed configuration
    pub config: Config,
    /// Directory of the config file, or the working directory
    pub base: PathBuf,
}

impl LoadedConfig {
    /// Vault configuration for this file
    pub fn vault_config(&self, extra_paths: &[PathBuf]) -> VaultConfig {
        self.config.vault_config(&self.base, extra_paths)
    }
}

/// Load configuration from a file or search for a default config file.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<LoadedConfig> {
    if let Some(path) = path
        && !path.exists()
    {
        anyhow::bail!("Config file {} does not exist", path.display());
    }

    let config_path = path.map(PathBuf::from).or_else(find_config_file);
    let cwd = std::env::current_dir()?;

    match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
            tracing::debug!(path = %path.display(), "config loaded");
            let base = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or(cwd, Path::to_path_buf);
            Ok(LoadedConfig { config, base })
        }
        None => Ok(LoadedConfig {
            config: Config::default(),
            base: cwd,
        }),
    }
}

/// Search for quill.toml in the current directory and parent directories.
fn find_config_file() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    cwd.ancestors()
        .map(|dir| dir.join("quill.toml"))
        .find(|path| path.exists())
}
