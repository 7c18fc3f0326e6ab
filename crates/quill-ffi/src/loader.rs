//! Platform library loading through `libloading`

use std::ffi::c_void;

use libloading::{Library, Symbol};
use quill_vm_core::{LibraryLoader, NativeLibraryHandle, NativeSymbol};

/// Opens shared libraries with the platform dynamic loader
#[derive(Debug, Default, Clone, Copy)]
pub struct LibloadingLoader;

impl LibraryLoader for LibloadingLoader {
    fn load(&self, path: &str) -> Result<Box<dyn NativeLibraryHandle>, String> {
        // SAFETY: opening a library runs its initializers. Libraries are
        // named by loaded modules, which the embedder chose to trust.
        let library = unsafe { Library::new(path) }.map_err(|err| err.to_string())?;
        tracing::debug!(path, "shared library opened");
        Ok(Box::new(SharedLibrary { library }))
    }
}

/// An open shared library; closed when dropped
struct SharedLibrary {
    library: Library,
}

impl NativeLibraryHandle for SharedLibrary {
    fn symbol(&self, name: &str) -> Result<NativeSymbol, String> {
        // SAFETY: only the address is read here. Calling through it is
        // `extern_fn`'s contract.
        let symbol: Symbol<'_, *const c_void> =
            unsafe { self.library.get(name.as_bytes()) }.map_err(|err| err.to_string())?;
        let address = *symbol as usize;
        if address == 0 {
            return Err(format!("symbol '{name}' resolved to null"));
        }
        Ok(NativeSymbol(address))
    }
}
