//! Platform loader and extern calling convention

use std::ffi::c_void;
use std::ptr;

use quill_ffi::{ExternFn, LibloadingLoader, extern_fn};
use quill_vm_core::{ErrorCode, LibraryLoader, NativeRegistry, NativeSymbol};

unsafe extern "C" fn echo_first(_ctx: *mut c_void, args: *const *mut c_void) -> *mut c_void {
    unsafe { *args }
}

#[test]
fn test_missing_library_fails_to_open() {
    let err = LibloadingLoader
        .load("/nonexistent/libquill_missing.so")
        .err()
        .unwrap();
    assert!(!err.is_empty());
}

#[test]
fn test_registry_reports_missing_library() {
    let registry = NativeRegistry::new(LibloadingLoader);
    let err = registry
        .load_library("/nonexistent/libquill_missing.so")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NativeLibraryCouldNotLoad);
    assert_eq!(registry.loaded_libraries(), 0);
}

#[test]
fn test_extern_fn_calls_through_address() {
    let f: ExternFn = echo_first;
    let symbol = NativeSymbol(f as usize);

    let resolved = unsafe { extern_fn(symbol) }.unwrap();
    let mut payload = 7u32;
    let argv = [&mut payload as *mut u32 as *mut c_void];
    let out = unsafe { resolved(ptr::null_mut(), argv.as_ptr()) };
    assert_eq!(out, argv[0]);
}

#[test]
fn test_null_symbol_has_no_function() {
    assert!(unsafe { extern_fn(NativeSymbol(0)) }.is_none());
}
