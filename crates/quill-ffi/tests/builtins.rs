//! Builtin table behavior

use std::sync::Arc;

use quill_ffi::builtins::{self, BUILTINS};
use quill_ffi::native_registry;
use quill_vm_core::{
    MAX_NATIVE_ARGS, NativeArgs, NativeContext, NativeRegistry, ObjectRef, Value, Vault,
    VaultConfig,
};

fn vault() -> Vault {
    Vault::new(VaultConfig::default(), Arc::new(NativeRegistry::default())).unwrap()
}

fn args(values: &[ObjectRef]) -> NativeArgs {
    let mut out = [None; MAX_NATIVE_ARGS];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = Some(*value);
    }
    out
}

fn call(vault: &mut Vault, key: &str, args: &NativeArgs) -> Option<ObjectRef> {
    let registry = native_registry();
    let function = registry.builtin(key).unwrap();
    let frame = vault.system_frame("#ffi").unwrap();
    let mut ctx = NativeContext { vault, frame };
    function(&mut ctx, args)
}

#[test]
fn test_install_registers_every_key() {
    let registry = NativeRegistry::default();
    builtins::install(&registry);

    let keys = registry.builtin_keys();
    assert_eq!(keys.len(), BUILTINS.len());
    for key in [
        "@_println(String)",
        "@_print(String)",
        "@_concat(String,String)",
        "@_to_string(Int32)",
        "@_exit(Int32)",
        "@_gc_collect()",
        "@_gc_alive()",
    ] {
        assert!(keys.iter().any(|k| k == key), "missing {key}");
    }
}

#[test]
fn test_concat() {
    let mut vault = vault();
    let a = vault.box_value(Value::from("foo")).unwrap();
    let b = vault.box_value(Value::from("bar")).unwrap();

    let joined = call(&mut vault, "@_concat(String,String)", &args(&[a, b])).unwrap();
    assert_eq!(&*vault.to_str(joined).unwrap(), "foobar");
}

#[test]
fn test_to_string() {
    let mut vault = vault();
    let n = vault.box_value(Value::I32(-42)).unwrap();

    let s = call(&mut vault, "@_to_string(Int32)", &args(&[n])).unwrap();
    assert_eq!(&*vault.to_str(s).unwrap(), "-42");
}

#[test]
fn test_null_argument_throws_on_frame() {
    let mut vault = vault();
    let a = vault.box_value(Value::from("foo")).unwrap();

    let result = call(&mut vault, "@_concat(String,String)", &args(&[a]));
    assert!(result.is_none());

    let frame = vault.system_frame("#ffi").unwrap();
    let record = vault.frame(frame).unwrap().exception.clone().unwrap();
    assert_eq!(
        vault.class_of(record.value).unwrap(),
        vault.types().null_pointer_exception
    );
    assert_eq!(
        vault.get_field(record.value, "message").unwrap(),
        &Value::from("Builtin argument 1 is null")
    );
}

#[test]
fn test_wrong_argument_type_throws_mismatch() {
    let mut vault = vault();
    let s = vault.box_value(Value::from("seven")).unwrap();

    assert!(call(&mut vault, "@_to_string(Int32)", &args(&[s])).is_none());

    let frame = vault.system_frame("#ffi").unwrap();
    let record = vault.frame(frame).unwrap().exception.clone().unwrap();
    assert_eq!(
        vault.class_of(record.value).unwrap(),
        vault.types().type_mismatch_exception
    );
}

#[test]
fn test_println_accepts_null() {
    let mut vault = vault();
    assert!(call(&mut vault, "@_println(String)", &args(&[])).is_none());

    let frame = vault.system_frame("#ffi").unwrap();
    assert!(vault.frame(frame).unwrap().exception.is_none());
}

#[test]
fn test_gc_builtins() {
    let mut vault = vault();
    for i in 0..3 {
        vault.box_value(Value::I32(i)).unwrap();
    }

    let reclaimed = call(&mut vault, "@_gc_collect()", &args(&[])).unwrap();
    assert_eq!(vault.to_i32(reclaimed).unwrap(), 3);

    let alive = call(&mut vault, "@_gc_alive()", &args(&[])).unwrap();
    // sentinel and the reclaimed count; the result is boxed after counting
    assert_eq!(vault.to_i64(alive).unwrap(), 2);

    let again = call(&mut vault, "@_gc_alive()", &args(&[])).unwrap();
    assert_eq!(vault.to_i64(again).unwrap(), 3);
}
