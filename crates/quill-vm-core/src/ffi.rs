//! Native linking
//!
//! Extern methods carry a `native` aspect with two string arguments: the
//! library identifier and the symbol name. The library `__internal__`
//! selects a builtin from the [`NativeRegistry`]; anything else is loaded
//! through the registry's [`LibraryLoader`].
//!
//! The registry is process-wide. Vaults share it through an `Arc`, and its
//! library and symbol caches only ever grow.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use quill_vm_gc::ImmortalArena;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::aspect::NATIVE_ASPECT;
use crate::class::RuntimeClass;
use crate::error::{ErrorCode, VmError, VmResult};
use crate::frame::FrameId;
use crate::method::{MethodRef, NativeBinding, RuntimeMethod};
use crate::module::Module;
use crate::value::{ObjectRef, Value};
use crate::vault::Vault;

/// Library identifier that selects a builtin
pub const INTERNAL_TARGET: &str = "__internal__";

/// Maximum number of arguments passed to a builtin
pub const MAX_NATIVE_ARGS: usize = 8;

/// Argument block passed to builtins
pub type NativeArgs = [Option<ObjectRef>; MAX_NATIVE_ARGS];

/// Builtin entry point
pub type NativeFn = fn(&mut NativeContext<'_>, &NativeArgs) -> Option<ObjectRef>;

/// Calling context of a builtin
pub struct NativeContext<'a> {
    /// Vault the call runs in
    pub vault: &'a mut Vault,
    /// Frame of the extern method
    pub frame: FrameId,
}

/// Errors raised while binding native code
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FfiError {
    /// Library could not be opened
    #[error("Native library '{path}' could not be loaded: {reason}")]
    LibraryLoad {
        /// Library path
        path: String,
        /// Loader diagnostic
        reason: String,
    },

    /// Library has no such symbol
    #[error("Symbol '{symbol}' not found in native library '{path}': {reason}")]
    SymbolNotFound {
        /// Library path
        path: String,
        /// Symbol name
        symbol: String,
        /// Loader diagnostic
        reason: String,
    },

    /// No builtin registered under this key
    #[error("Internal native '{0}' is not registered")]
    BuiltinNotFound(String),
}

impl FfiError {
    /// Fatal reason code reported when the bound method is called
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::LibraryLoad { .. } => ErrorCode::NativeLibraryCouldNotLoad,
            Self::SymbolNotFound { .. } | Self::BuiltinNotFound(_) => {
                ErrorCode::NativeLibrarySymbolCouldNotFound
            }
        }
    }
}

/// Address of a resolved native symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeSymbol(pub usize);

impl NativeSymbol {
    /// Raw address
    pub fn address(self) -> usize {
        self.0
    }
}

/// Opened native library
pub trait NativeLibraryHandle: Send + Sync {
    /// Look up an exported symbol
    fn symbol(&self, name: &str) -> Result<NativeSymbol, String>;
}

/// Platform library loader
pub trait LibraryLoader: Send + Sync {
    /// Open the library at `path`
    fn load(&self, path: &str) -> Result<Box<dyn NativeLibraryHandle>, String>;
}

/// Loader that refuses every library; used when no platform loader is installed
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLibraryLoader;

impl LibraryLoader for NoLibraryLoader {
    fn load(&self, path: &str) -> Result<Box<dyn NativeLibraryHandle>, String> {
        Err(format!("no platform loader installed for '{path}'"))
    }
}

/// A loaded library and its symbol cache
pub struct NativeLibrary {
    path: String,
    handle: Box<dyn NativeLibraryHandle>,
    symbols: Mutex<FxHashMap<String, NativeSymbol>>,
}

impl NativeLibrary {
    /// Path the library was opened with
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resolve `name`, consulting the per-library cache first
    pub fn symbol(&self, name: &str) -> Result<NativeSymbol, FfiError> {
        let mut symbols = self.symbols.lock();
        if let Some(symbol) = symbols.get(name) {
            return Ok(*symbol);
        }
        let symbol = self
            .handle
            .symbol(name)
            .map_err(|reason| FfiError::SymbolNotFound {
                path: self.path.clone(),
                symbol: name.to_string(),
                reason,
            })?;
        symbols.insert(name.to_string(), symbol);
        Ok(symbol)
    }

    /// Number of cached symbols
    pub fn cached_symbols(&self) -> usize {
        self.symbols.lock().len()
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("path", &self.path)
            .field("symbols", &self.cached_symbols())
            .finish()
    }
}

/// Process-wide native state: library cache and builtin table
pub struct NativeRegistry {
    loader: Box<dyn LibraryLoader>,
    libraries: Mutex<FxHashMap<String, Arc<NativeLibrary>>>,
    builtins: RwLock<FxHashMap<String, NativeFn>>,
}

impl NativeRegistry {
    /// Create a registry that loads libraries through `loader`
    pub fn new(loader: impl LibraryLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            libraries: Mutex::new(FxHashMap::default()),
            builtins: RwLock::new(FxHashMap::default()),
        }
    }

    /// Key of a builtin: `name(Arg,Arg)`
    pub fn builtin_key(name: &str, args: &[&str]) -> String {
        format!("{name}({})", args.join(","))
    }

    /// Register a builtin under `name(args)`; a later registration replaces an earlier one
    pub fn register_builtin(&self, name: &str, args: &[&str], function: NativeFn) {
        let key = Self::builtin_key(name, args);
        tracing::trace!(key = %key, "builtin registered");
        self.builtins.write().insert(key, function);
    }

    /// Look up a builtin by key
    pub fn builtin(&self, key: &str) -> Option<NativeFn> {
        self.builtins.read().get(key).copied()
    }

    /// Registered builtin keys, sorted
    pub fn builtin_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.builtins.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Open a library, reusing an earlier load of the same path
    pub fn load_library(&self, path: &str) -> Result<Arc<NativeLibrary>, FfiError> {
        let mut libraries = self.libraries.lock();
        if let Some(library) = libraries.get(path) {
            return Ok(library.clone());
        }
        let handle = self.loader.load(path).map_err(|reason| FfiError::LibraryLoad {
            path: path.to_string(),
            reason,
        })?;
        tracing::debug!(path, "native library loaded");
        let library = Arc::new(NativeLibrary {
            path: path.to_string(),
            handle,
            symbols: Mutex::new(FxHashMap::default()),
        });
        libraries.insert(path.to_string(), library.clone());
        Ok(library)
    }

    /// Load `path` and resolve `symbol` in it
    pub fn resolve_symbol(&self, path: &str, symbol: &str) -> Result<NativeSymbol, FfiError> {
        self.load_library(path)?.symbol(symbol)
    }

    /// Number of libraries in the cache
    pub fn loaded_libraries(&self) -> usize {
        self.libraries.lock().len()
    }
}

impl Default for NativeRegistry {
    fn default() -> Self {
        Self::new(NoLibraryLoader)
    }
}

impl fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRegistry")
            .field("libraries", &self.loaded_libraries())
            .field("builtins", &self.builtins.read().len())
            .finish()
    }
}

/// Binding of an extern method to a symbol of an external library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeImportEntity {
    /// Library identifier
    pub library: String,
    /// Symbol name
    pub symbol: String,
    /// Method the symbol implements
    pub importer: MethodRef,
    /// Resolved address
    pub resolved: Option<NativeSymbol>,
}

/// `(library, symbol)` from the method's native aspect
fn native_target(method: &RuntimeMethod) -> VmResult<(String, String)> {
    let name = &method.name;
    let aspect = method
        .aspects
        .iter()
        .find(|a| &*a.name == NATIVE_ASPECT)
        .ok_or_else(|| {
            VmError::fatal(
                ErrorCode::TypeLoad,
                format!("(0x1) Extern function without native aspect. [{name}]"),
            )
        })?;

    if aspect.arguments.len() != 2 {
        return Err(VmError::fatal(
            ErrorCode::TypeLoad,
            format!("(0x1) Native aspect incorrect arguments. [{name}]"),
        ));
    }

    let mut values = aspect.values().map(|v| match v {
        Value::Str(s) => Ok(s.to_string()),
        _ => Err(VmError::fatal(
            ErrorCode::TypeLoad,
            format!("(0x2) Native aspect incorrect arguments. [{name}]"),
        )),
    });
    let library = values.next().transpose()?.unwrap_or_default();
    let symbol = values.next().transpose()?.unwrap_or_default();
    Ok((library, symbol))
}

/// Builtin key for `symbol` taking the argument list of `method`
fn builtin_key_for(symbol: &str, method: &RuntimeMethod) -> String {
    let args = method
        .signature
        .find('(')
        .map_or("()", |at| &method.signature[at..]);
    format!("{symbol}{args}")
}

fn bind(registry: &NativeRegistry, method: &RuntimeMethod, at: MethodRef) -> VmResult<NativeBinding> {
    let (library, symbol) = native_target(method)?;

    if library == INTERNAL_TARGET {
        let key = builtin_key_for(&symbol, method);
        return Ok(match registry.builtin(&key) {
            Some(function) => NativeBinding::Builtin { key, function },
            None => unavailable(method, FfiError::BuiltinNotFound(key)),
        });
    }

    let mut entity = NativeImportEntity {
        library,
        symbol,
        importer: at,
        resolved: None,
    };
    match registry.resolve_symbol(&entity.library, &entity.symbol) {
        Ok(address) => {
            entity.resolved = Some(address);
            Ok(NativeBinding::Import(entity))
        }
        Err(err) => Ok(unavailable(method, err)),
    }
}

fn unavailable(method: &RuntimeMethod, err: FfiError) -> NativeBinding {
    tracing::error!(method = %method.signature, error = %err, "native binding failed");
    NativeBinding::Unavailable {
        code: err.code(),
        reason: err.to_string(),
    }
}

/// Bind every extern method of the classes `module` defined
///
/// A method whose library or symbol cannot be found is marked unavailable
/// and linking continues. A malformed native aspect is fatal.
pub(crate) fn link_module(
    registry: &NativeRegistry,
    classes: &mut ImmortalArena<RuntimeClass>,
    module: &Module,
) -> VmResult<()> {
    for class in module.class_table().iter().copied().filter(|c| module.owns(*c)) {
        let Some(descriptor) = classes.get_mut(class) else {
            continue;
        };
        for (index, method) in descriptor.methods.iter_mut().enumerate() {
            if !method.is_extern() {
                continue;
            }
            let at = MethodRef {
                class,
                index: index as u32,
            };
            let binding = bind(registry, method, at)?;
            method.native = Some(binding);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_key() {
        assert_eq!(
            NativeRegistry::builtin_key("@_concat", &["String", "String"]),
            "@_concat(String,String)"
        );
        assert_eq!(NativeRegistry::builtin_key("@_gc_collect", &[]), "@_gc_collect()");
    }

    #[test]
    fn test_no_loader_refuses() {
        let registry = NativeRegistry::default();
        let err = registry.load_library("libm.so").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NativeLibraryCouldNotLoad);
        assert_eq!(registry.loaded_libraries(), 0);
    }
}
