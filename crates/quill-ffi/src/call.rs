//! Calling convention of external native symbols

use std::ffi::c_void;

use quill_vm_core::NativeSymbol;

/// Signature every external symbol bound by a `native` aspect must have
///
/// The first argument is the caller's context, the second points at the
/// argument array.
pub type ExternFn = unsafe extern "C" fn(*mut c_void, *const *mut c_void) -> *mut c_void;

/// View a resolved symbol as an [`ExternFn`]
///
/// Returns `None` for a null address.
///
/// # Safety
///
/// The symbol must point at a function with the [`ExternFn`] signature that
/// stays loaded for as long as the returned pointer is used.
pub unsafe fn extern_fn(symbol: NativeSymbol) -> Option<ExternFn> {
    let address = symbol.address();
    if address == 0 {
        return None;
    }
    // SAFETY: non-null, and the caller guarantees the signature.
    Some(unsafe { std::mem::transmute::<usize, ExternFn>(address) })
}
