//! Native method linking tests

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::*;
use quill_vm_bytecode::ConstantValue;
use quill_vm_core::{
    ClassFlags, ErrorCode, LibraryLoader, MAX_NATIVE_ARGS, MethodRef, NativeArgs, NativeBinding,
    NativeContext, NativeLibraryHandle, NativeRegistry, NativeSymbol, ObjectRef, Value, Vault,
    VaultConfig,
};

/// Loader serving one fake library with a fixed symbol table
struct CountingLoader {
    loads: Arc<AtomicUsize>,
}

struct FakeLibrary;

impl NativeLibraryHandle for FakeLibrary {
    fn symbol(&self, name: &str) -> Result<NativeSymbol, String> {
        match name {
            "sin" => Ok(NativeSymbol(0x1000)),
            "cos" => Ok(NativeSymbol(0x2000)),
            other => Err(format!("undefined symbol: {other}")),
        }
    }
}

impl LibraryLoader for CountingLoader {
    fn load(&self, path: &str) -> Result<Box<dyn NativeLibraryHandle>, String> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if path == "libm.so" {
            Ok(Box::new(FakeLibrary))
        } else {
            Err(format!("{path}: cannot open shared object file"))
        }
    }
}

fn double(ctx: &mut NativeContext<'_>, args: &NativeArgs) -> Option<ObjectRef> {
    let value = ctx.vault.to_i32(args[0]?).ok()?;
    ctx.vault.box_value(Value::I32(value * 2)).ok()
}

/// `ffi` with `Native.<name>(Int32) -> Int32` declared extern for each name
fn extern_module(names: &[&str]) -> ImageBuilder {
    let mut b = ImageBuilder::new("ffi", "1.0.0");
    let int = b.std_type("Int32");
    let native = b.class("Native", ClassFlags::PUBLIC | ClassFlags::STATIC, &[]);
    for name in names {
        b.method(native, name, extern_static(), int, &[("value", int)], None);
    }
    b
}

fn binding(vault: &Vault, method: &str) -> (MethodRef, NativeBinding) {
    let class = vault.find_type("Native").unwrap();
    let (index, descriptor) = vault.get_class(class).unwrap().find_method(method).unwrap();
    let at = MethodRef {
        class,
        index: index as u32,
    };
    (at, descriptor.native.clone().unwrap())
}

fn args(first: ObjectRef) -> NativeArgs {
    let mut args: NativeArgs = [None; MAX_NATIVE_ARGS];
    args[0] = Some(first);
    args
}

#[test]
fn test_builtin_bound_and_invoked() {
    let registry = Arc::new(NativeRegistry::default());
    registry.register_builtin("@_double", &["Int32"], double);

    let mut b = extern_module(&["twice"]);
    b.native("Native", "twice", "__internal__", "@_double");

    let mut vault = vault_with(VaultConfig::default(), registry);
    load(&mut vault, &b).unwrap();

    let (method, bound) = binding(&vault, "twice");
    assert!(matches!(&bound, NativeBinding::Builtin { key, .. } if key == "@_double(Int32)"));
    assert!(vault.method(method).unwrap().header.is_none());

    let frame = vault.system_frame("#ffi").unwrap();
    let input = vault.box_value(Value::I32(21)).unwrap();
    let output = vault
        .invoke_native(method, frame, &args(input))
        .unwrap()
        .unwrap();
    assert_eq!(vault.to_i32(output).unwrap(), 42);
}

#[test]
fn test_unregistered_builtin_is_unavailable() {
    let mut b = extern_module(&["twice"]);
    b.native("Native", "twice", "__internal__", "@_double");

    let mut vault = vault();
    load(&mut vault, &b).unwrap();

    let (method, bound) = binding(&vault, "twice");
    assert!(matches!(
        bound,
        NativeBinding::Unavailable {
            code: ErrorCode::NativeLibrarySymbolCouldNotFound,
            ..
        }
    ));

    let frame = vault.system_frame("#ffi").unwrap();
    let input = vault.box_value(Value::I32(1)).unwrap();
    let err = vault.invoke_native(method, frame, &args(input)).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NativeLibrarySymbolCouldNotFound));
    assert!(err.to_string().contains("@_double(Int32)"), "{err}");
}

#[test]
fn test_extern_without_native_aspect() {
    let mut vault = vault();
    let err = load(&mut vault, &extern_module(&["twice"])).unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::TypeLoad));
    assert!(
        err.to_string()
            .contains("(0x1) Extern function without native aspect. [twice]"),
        "{err}"
    );
    assert!(vault.find_type("Native").is_none());
}

#[test]
fn test_native_aspect_wrong_argument_count() {
    let mut b = extern_module(&["twice"]);
    b.aspect(
        "native",
        &method_target("Native", "twice"),
        vec![ConstantValue::String("__internal__".into())],
    );

    let mut vault = vault();
    let err = load(&mut vault, &b).unwrap_err();
    assert!(
        err.to_string()
            .contains("(0x1) Native aspect incorrect arguments. [twice]"),
        "{err}"
    );
}

#[test]
fn test_native_aspect_non_string_argument() {
    let mut b = extern_module(&["twice"]);
    b.aspect(
        "native",
        &method_target("Native", "twice"),
        vec![
            ConstantValue::String("__internal__".into()),
            ConstantValue::I32(7),
        ],
    );

    let mut vault = vault();
    let err = load(&mut vault, &b).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::TypeLoad));
    assert!(
        err.to_string()
            .contains("(0x2) Native aspect incorrect arguments. [twice]"),
        "{err}"
    );
}

#[test]
fn test_library_loaded_once_for_many_methods() {
    let loads = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(NativeRegistry::new(CountingLoader {
        loads: loads.clone(),
    }));

    let mut b = extern_module(&["sin", "cos"]);
    b.native("Native", "sin", "libm.so", "sin");
    b.native("Native", "cos", "libm.so", "cos");

    let mut vault = vault_with(VaultConfig::default(), registry.clone());
    load(&mut vault, &b).unwrap();

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(registry.loaded_libraries(), 1);

    let (sin, bound) = binding(&vault, "sin");
    match bound {
        NativeBinding::Import(entity) => {
            assert_eq!(entity.library, "libm.so");
            assert_eq!(entity.symbol, "sin");
            assert_eq!(entity.importer, sin);
            assert_eq!(entity.resolved, Some(NativeSymbol(0x1000)));
        }
        other => panic!("unexpected binding: {other:?}"),
    }
    let (_, bound) = binding(&vault, "cos");
    assert!(matches!(bound, NativeBinding::Import(e) if e.resolved == Some(NativeSymbol(0x2000))));

    let library = registry.load_library("libm.so").unwrap();
    assert_eq!(library.cached_symbols(), 2);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_missing_symbol_is_unavailable() {
    let registry = Arc::new(NativeRegistry::new(CountingLoader {
        loads: Arc::new(AtomicUsize::new(0)),
    }));
    let mut b = extern_module(&["tan"]);
    b.native("Native", "tan", "libm.so", "tan");

    let mut vault = vault_with(VaultConfig::default(), registry);
    load(&mut vault, &b).unwrap();

    let (method, bound) = binding(&vault, "tan");
    match bound {
        NativeBinding::Unavailable { code, reason } => {
            assert_eq!(code, ErrorCode::NativeLibrarySymbolCouldNotFound);
            assert!(reason.contains("'tan'"), "{reason}");
            assert!(reason.contains("libm.so"), "{reason}");
        }
        other => panic!("unexpected binding: {other:?}"),
    }

    let frame = vault.system_frame("#ffi").unwrap();
    let input = vault.box_value(Value::I32(1)).unwrap();
    let err = vault.invoke_native(method, frame, &args(input)).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NativeLibrarySymbolCouldNotFound));
}

#[test]
fn test_missing_library_is_unavailable() {
    let mut b = extern_module(&["sin"]);
    b.native("Native", "sin", "libmissing.so", "sin");

    let mut vault = vault();
    load(&mut vault, &b).unwrap();

    let (_, bound) = binding(&vault, "sin");
    assert!(matches!(
        bound,
        NativeBinding::Unavailable {
            code: ErrorCode::NativeLibraryCouldNotLoad,
            ..
        }
    ));
}

#[test]
fn test_import_needs_call_bridge() {
    let registry = Arc::new(NativeRegistry::new(CountingLoader {
        loads: Arc::new(AtomicUsize::new(0)),
    }));
    let mut b = extern_module(&["sin"]);
    b.native("Native", "sin", "libm.so", "sin");

    let mut vault = vault_with(VaultConfig::default(), registry);
    load(&mut vault, &b).unwrap();

    let (method, _) = binding(&vault, "sin");
    let frame = vault.system_frame("#ffi").unwrap();
    let input = vault.box_value(Value::I32(1)).unwrap();
    let err = vault.invoke_native(method, frame, &args(input)).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::StateCorrupt));
}

#[test]
fn test_builtin_keys_listed_sorted() {
    let registry = NativeRegistry::default();
    registry.register_builtin("@_b", &[], double);
    registry.register_builtin("@_a", &["String", "Int32"], double);

    assert_eq!(registry.builtin_keys(), vec!["@_a(String,Int32)", "@_b()"]);
    assert!(registry.builtin("@_a(String,Int32)").is_some());
    assert!(registry.builtin("@_a(String)").is_none());
}
