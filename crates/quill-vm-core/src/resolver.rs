//! Dependency resolution

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::class::ModuleId;
use crate::error::{ErrorCode, VmError, VmResult};
use crate::vault::Vault;
use crate::version::Version;

/// File extension of module images
pub const MODULE_EXTENSION: &str = "qmod";

/// Supplies modules that a loading module depends on
pub trait ModuleResolver {
    /// Return the id of module `name` at `version`, loading it if needed
    fn resolve(&mut self, vault: &mut Vault, name: &str, version: &Version) -> VmResult<ModuleId>;
}

/// Resolver backed by in-memory images and search directories
///
/// Already loaded modules are reused. A module requested while it is still
/// being loaded is a dependency cycle.
#[derive(Debug, Default, Clone)]
pub struct ModuleSearcher {
    search_paths: Vec<PathBuf>,
    images: FxHashMap<String, Vec<u8>>,
}

impl ModuleSearcher {
    /// Create a searcher over `search_paths`
    pub fn new(search_paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            search_paths: search_paths.into_iter().collect(),
            images: FxHashMap::default(),
        }
    }

    /// Add a search directory
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    /// Register an in-memory image, preferred over the search paths
    pub fn with_image(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.images.insert(name.into(), bytes);
        self
    }

    /// Search directories in order
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// First `{name}.qmod` found in the search paths
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .map(|dir| module_path(dir, name))
            .find(|path| path.is_file())
    }

    fn read_image(&self, name: &str) -> VmResult<Vec<u8>> {
        if let Some(bytes) = self.images.get(name) {
            return Ok(bytes.clone());
        }
        let path = self.locate(name).ok_or_else(|| {
            VmError::fatal(
                ErrorCode::AssemblyCouldNotLoad,
                format!(
                    "Module '{name}' not found in {} search path(s)",
                    self.search_paths.len()
                ),
            )
        })?;
        tracing::debug!(module = name, path = %path.display(), "module located");
        Ok(std::fs::read(path)?)
    }
}

/// Path of module `name` inside `dir`
pub fn module_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{MODULE_EXTENSION}"))
}

impl ModuleResolver for ModuleSearcher {
    fn resolve(&mut self, vault: &mut Vault, name: &str, version: &Version) -> VmResult<ModuleId> {
        if let Some(id) = vault.find_module(name, version) {
            return Ok(id);
        }
        if vault.is_loading(name) {
            return Err(VmError::DependencyCycle(name.to_string()));
        }

        let bytes = self.read_image(name)?;
        let id = vault.load_module(&bytes, self)?;
        let loaded = vault
            .module(id)
            .ok_or_else(|| VmError::state_corrupt(format!("Module {id} vanished after load")))?;
        if loaded.version != *version {
            return Err(VmError::fatal(
                ErrorCode::TypeLoad,
                format!(
                    "Module '{name}' has version {}, {version} was requested",
                    loaded.version
                ),
            ));
        }
        Ok(id)
    }
}
