//! Builtin natives bound through the `__internal__` library
//!
//! | key                          | returns                       |
//! |------------------------------|-------------------------------|
//! | `@_println(String)`          | nothing, writes a line        |
//! | `@_print(String)`            | nothing                       |
//! | `@_concat(String,String)`    | `String`                      |
//! | `@_to_string(Int32)`         | `String`                      |
//! | `@_exit(Int32)`              | never returns                 |
//! | `@_gc_collect()`             | `Int32` objects reclaimed     |
//! | `@_gc_alive()`               | `Int64` alive before the call |

use std::io::Write;
use std::sync::Arc;

use quill_vm_core::{
    FaultKind, NativeArgs, NativeContext, NativeFn, NativeRegistry, ObjectRef, Value, VmError,
    VmResult,
};

/// Every builtin as `(name, argument types, entry point)`
pub const BUILTINS: &[(&str, &[&str], NativeFn)] = &[
    ("@_println", &["String"], println),
    ("@_print", &["String"], print),
    ("@_concat", &["String", "String"], concat),
    ("@_to_string", &["Int32"], to_string),
    ("@_exit", &["Int32"], exit),
    ("@_gc_collect", &[], gc_collect),
    ("@_gc_alive", &[], gc_alive),
];

/// Register every builtin in `registry`
pub fn install(registry: &NativeRegistry) {
    for (name, args, function) in BUILTINS {
        registry.register_builtin(name, args, *function);
    }
    tracing::debug!(count = BUILTINS.len(), "builtins installed");
}

/// Run `body`, throwing a fault on the calling frame instead of returning it
fn guarded(
    ctx: &mut NativeContext<'_>,
    body: impl FnOnce(&mut NativeContext<'_>) -> VmResult<Option<ObjectRef>>,
) -> Option<ObjectRef> {
    match body(ctx) {
        Ok(value) => value,
        Err(err @ VmError::Fault { .. }) => {
            if let Err(err) = ctx.vault.throw_fault(ctx.frame, err) {
                tracing::error!(error = %err, "builtin fault could not be thrown");
            }
            None
        }
        Err(err) => {
            tracing::error!(error = %err, "builtin failed");
            None
        }
    }
}

fn arg(args: &NativeArgs, index: usize) -> VmResult<ObjectRef> {
    args.get(index).copied().flatten().ok_or_else(|| {
        VmError::fault(
            FaultKind::NullPointer,
            format!("Builtin argument {index} is null"),
        )
    })
}

fn text(ctx: &NativeContext<'_>, args: &NativeArgs, index: usize) -> VmResult<Arc<str>> {
    ctx.vault.to_str(arg(args, index)?)
}

/// Printable form of an argument; null prints as `null`
fn display(ctx: &NativeContext<'_>, args: &NativeArgs, index: usize) -> VmResult<Arc<str>> {
    match args.get(index).copied().flatten() {
        Some(object) => ctx.vault.to_str(object),
        None => Ok(Arc::from("null")),
    }
}

fn println(ctx: &mut NativeContext<'_>, args: &NativeArgs) -> Option<ObjectRef> {
    guarded(ctx, |ctx| {
        let line = display(ctx, args, 0)?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}")?;
        Ok(None)
    })
}

fn print(ctx: &mut NativeContext<'_>, args: &NativeArgs) -> Option<ObjectRef> {
    guarded(ctx, |ctx| {
        let s = display(ctx, args, 0)?;
        let mut out = std::io::stdout().lock();
        write!(out, "{s}")?;
        out.flush()?;
        Ok(None)
    })
}

fn concat(ctx: &mut NativeContext<'_>, args: &NativeArgs) -> Option<ObjectRef> {
    guarded(ctx, |ctx| {
        let joined = format!("{}{}", text(ctx, args, 0)?, text(ctx, args, 1)?);
        ctx.vault.box_value(Value::from(joined.as_str())).map(Some)
    })
}

fn to_string(ctx: &mut NativeContext<'_>, args: &NativeArgs) -> Option<ObjectRef> {
    guarded(ctx, |ctx| {
        let value = ctx.vault.to_i32(arg(args, 0)?)?;
        ctx.vault
            .box_value(Value::from(value.to_string().as_str()))
            .map(Some)
    })
}

fn exit(ctx: &mut NativeContext<'_>, args: &NativeArgs) -> Option<ObjectRef> {
    guarded(ctx, |ctx| {
        let code = ctx.vault.to_i32(arg(args, 0)?)?;
        tracing::info!(code, "exit requested");
        std::process::exit(code)
    })
}

fn gc_collect(ctx: &mut NativeContext<'_>, _args: &NativeArgs) -> Option<ObjectRef> {
    guarded(ctx, |ctx| {
        let reclaimed = ctx.vault.collect();
        let count = i32::try_from(reclaimed).unwrap_or(i32::MAX);
        ctx.vault.box_value(Value::I32(count)).map(Some)
    })
}

fn gc_alive(ctx: &mut NativeContext<'_>, _args: &NativeArgs) -> Option<ObjectRef> {
    guarded(ctx, |ctx| {
        let alive = ctx.vault.heap_stats().alive_objects;
        let count = i64::try_from(alive).unwrap_or(i64::MAX);
        ctx.vault.box_value(Value::I64(count)).map(Some)
    })
}
