//! CLI command implementations.

pub mod check;
pub mod inspect;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use quill_vm_core::{ModuleId, ModuleSearcher, Vault};

use crate::config::LoadedConfig;

/// Create a vault and load `module` into it.
///
/// Dependencies are searched next to the module first, then in
/// `search_paths`, then in the configured directories.
pub fn open_module(
    config: &LoadedConfig,
    module: &Path,
    search_paths: &[PathBuf],
) -> Result<(Vault, ModuleId)> {
    let mut extra = Vec::with_capacity(search_paths.len() + 1);
    if let Some(dir) = module.parent().filter(|p| !p.as_os_str().is_empty()) {
        extra.push(dir.to_path_buf());
    }
    extra.extend_from_slice(search_paths);

    let vault_config = config.vault_config(&extra);
    let mut resolver = ModuleSearcher::new(vault_config.search_paths.clone());
    let mut vault = Vault::new(vault_config, Arc::new(quill_ffi::native_registry()))?;

    let id = vault
        .load_module_file(module, &mut resolver)
        .with_context(|| format!("Failed to load {}", module.display()))?;
    Ok((vault, id))
}
