//! Module loader tests

mod common;

use common::*;
use quill_vm_bytecode::{ConstantValue, IlBody, ProtectedZone};
use quill_vm_core::resolver::module_path;
use quill_vm_core::{
    ClassFlags, ErrorCode, FieldFlags, FieldName, ModuleId, ModuleResolver, ModuleSearcher,
    TypeRef, Value, Vault, Version, VmError, VmResult,
};

/// `shapes` with a `Shape { area: Double }` base class
fn shapes_module(version: &str) -> ImageBuilder {
    let mut b = ImageBuilder::new("shapes", version);
    let double = b.std_type("Double");
    let shape = b.class("Shape", ClassFlags::PUBLIC, &[]);
    b.field(shape, "area", double, FieldFlags::PUBLIC);
    b
}

/// `app` depending on `shapes`, with `Square : shapes.Shape`
fn app_module(dependency_version: &str) -> ImageBuilder {
    let mut b = ImageBuilder::new("app", "0.1.0");
    b.dependency("shapes", dependency_version);
    let shape = b.type_name("shapes", "shapes", "Shape");
    let int = b.std_type("Int32");
    let square = b.class("Square", ClassFlags::PUBLIC, &[shape]);
    b.field(square, "side", int, FieldFlags::PUBLIC);
    b
}

struct CountingResolver {
    inner: ModuleSearcher,
    calls: usize,
}

impl ModuleResolver for CountingResolver {
    fn resolve(&mut self, vault: &mut Vault, name: &str, version: &Version) -> VmResult<ModuleId> {
        self.calls += 1;
        self.inner.resolve(vault, name, version)
    }
}

#[test]
fn test_load_defines_completed_classes() {
    let mut vault = vault();
    let id = load(&mut vault, &geo_module()).unwrap();

    let module = vault.module(id).unwrap();
    assert_eq!(&*module.name, "geo");
    assert_eq!(module.version, Version::new(1, 0, 0));

    let point = vault.find_type("Point").unwrap();
    let class = vault.get_class(point).unwrap();
    assert!(class.is_completed());
    assert!(!class.flags.contains(ClassFlags::UNRESOLVED));
    assert_eq!(class.parent, Some(vault.types().object));
    assert_eq!(class.owner, id);
    assert!(class.token.is_initialized());

    let (_, method) = class.find_method("move").unwrap();
    assert_eq!(&*method.signature, "move(Int32)");
    assert_eq!(method.arguments[0].ty, TypeRef::Class(vault.types().i32));
    assert_eq!(method.header.as_ref().unwrap().code, vec![0x01, 0x02, 0x03]);

    assert_eq!(vault.field_offset(point, "x").unwrap(), 0);
    assert_eq!(vault.field_offset(point, "y").unwrap(), 1);
}

#[test]
fn test_find_type_by_every_name_form() {
    let mut vault = vault();
    load(&mut vault, &geo_module()).unwrap();

    let point = vault.find_type("Point").unwrap();
    assert_eq!(vault.find_type("geo/Point"), Some(point));
    assert_eq!(vault.find_type("geo%geo/Point"), Some(point));
    assert_eq!(vault.find_type("Int32"), Some(vault.types().i32));
    assert_eq!(vault.find_type("Polygon"), None);
}

#[test]
fn test_parent_declared_after_child() {
    let mut b = ImageBuilder::new("geo", "1.0.0");
    let int = b.std_type("Int32");
    let string = b.std_type("String");
    let shape = b.own_type("Shape");
    let circle = b.class("Circle", ClassFlags::PUBLIC, &[shape]);
    b.field(circle, "radius", int, FieldFlags::PUBLIC);
    let base = b.class("Shape", ClassFlags::PUBLIC, &[]);
    b.field(base, "name", string, FieldFlags::PUBLIC);

    let mut vault = vault();
    load(&mut vault, &b).unwrap();

    let circle = vault.find_type("Circle").unwrap();
    let shape = vault.find_type("Shape").unwrap();
    assert_eq!(vault.get_class(circle).unwrap().parent, Some(shape));
    assert!(vault.is_assignable(circle, shape));
    assert!(!vault.is_assignable(shape, circle));
    assert_eq!(vault.field_offset(circle, "name").unwrap(), 0);
    assert_eq!(vault.field_offset(circle, "radius").unwrap(), 1);
}

#[test]
fn test_dependency_from_memory_image() {
    let mut vault = vault();
    let mut resolver =
        ModuleSearcher::default().with_image("shapes", shapes_module("1.0.0").build());

    let id = vault
        .load_module(&app_module("1.0.0").build(), &mut resolver)
        .unwrap();
    assert_eq!(vault.modules().count(), 2);

    let app = vault.module(id).unwrap();
    assert_eq!(&*app.dependencies()[0].name, "shapes");
    assert_eq!(app.dependencies()[0].version, Version::new(1, 0, 0));

    let square = vault.find_type("Square").unwrap();
    let shape = vault.find_type("Shape").unwrap();
    assert_eq!(vault.get_class(square).unwrap().parent, Some(shape));
    assert_eq!(vault.field_offset(square, "area").unwrap(), 0);
    assert_eq!(vault.field_offset(square, "side").unwrap(), 1);
}

#[test]
fn test_dependency_from_search_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        module_path(dir.path(), "shapes"),
        shapes_module("1.0.0").build(),
    )
    .unwrap();

    let mut vault = vault();
    let mut resolver = ModuleSearcher::new([dir.path().to_path_buf()]);
    assert!(resolver.locate("shapes").is_some());
    assert!(resolver.locate("circles").is_none());

    vault
        .load_module(&app_module("1.0.0").build(), &mut resolver)
        .unwrap();
    assert!(vault.find_module("shapes", &Version::new(1, 0, 0)).is_some());
}

#[test]
fn test_load_module_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = module_path(dir.path(), "geo");
    std::fs::write(&path, geo_module().build()).unwrap();

    let mut vault = vault();
    let id = vault
        .load_module_file(&path, &mut ModuleSearcher::default())
        .unwrap();
    assert_eq!(&*vault.module(id).unwrap().name, "geo");
}

#[test]
fn test_duplicate_dependency_resolved_once() {
    let mut app = app_module("1.0.0");
    app.dependency("shapes", "1.0.0");

    let mut vault = vault();
    let mut resolver = CountingResolver {
        inner: ModuleSearcher::default().with_image("shapes", shapes_module("1.0.0").build()),
        calls: 0,
    };
    let id = vault.load_module(&app.build(), &mut resolver).unwrap();

    assert_eq!(resolver.calls, 1);
    assert_eq!(vault.module(id).unwrap().dependencies().len(), 1);
}

#[test]
fn test_loaded_dependency_is_reused() {
    let mut vault = vault();
    let mut resolver =
        ModuleSearcher::default().with_image("shapes", shapes_module("1.0.0").build());
    let first = vault
        .load_module(&shapes_module("1.0.0").build(), &mut resolver)
        .unwrap();
    let app = vault
        .load_module(&app_module("1.0.0").build(), &mut resolver)
        .unwrap();

    assert_eq!(vault.modules().count(), 2);
    assert_eq!(vault.module(app).unwrap().dependencies()[0].module, first);
}

#[test]
fn test_missing_dependency() {
    let mut vault = vault();
    let err = vault
        .load_module(&app_module("1.0.0").build(), &mut ModuleSearcher::default())
        .unwrap_err();

    assert!(err.is_type_load());
    match err {
        VmError::DependencyNotFound { name, module, .. } => {
            assert_eq!(name, "shapes");
            assert_eq!(module, "app");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(vault.modules().count(), 0);
    assert!(vault.find_type("Square").is_none());
}

#[test]
fn test_dependency_version_mismatch() {
    let mut vault = vault();
    let mut resolver =
        ModuleSearcher::default().with_image("shapes", shapes_module("1.0.0").build());
    let err = vault
        .load_module(&app_module("2.0.0").build(), &mut resolver)
        .unwrap_err();

    match err {
        VmError::DependencyNotFound {
            version, reason, ..
        } => {
            assert_eq!(version, "2.0.0");
            assert!(reason.contains("has version 1.0.0"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_dependency_cycle() {
    let mut a = ImageBuilder::new("a", "1.0.0");
    a.dependency("b", "1.0.0");
    let mut b = ImageBuilder::new("b", "1.0.0");
    b.dependency("a", "1.0.0");

    let mut vault = vault();
    let mut resolver = ModuleSearcher::default()
        .with_image("a", a.build())
        .with_image("b", b.build());
    let err = vault.load_module(&a.build(), &mut resolver).unwrap_err();

    assert!(matches!(&err, VmError::DependencyCycle(name) if name == "a"), "{err}");
    assert!(err.is_type_load());
    assert_eq!(vault.modules().count(), 0);
    assert!(!vault.is_loading("a"));
    assert!(!vault.is_loading("b"));
}

#[test]
fn test_unsupported_format_version() {
    let mut bytes = geo_module().build();
    bytes[8..12].copy_from_slice(&99i32.to_le_bytes());

    let mut vault = vault();
    let err = vault
        .load_module(&bytes, &mut ModuleSearcher::default())
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::AssemblyCouldNotLoad));
}

#[test]
fn test_truncated_image() {
    let bytes = geo_module().build();
    let mut vault = vault();
    let err = vault
        .load_module(&bytes[..bytes.len() / 2], &mut ModuleSearcher::default())
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::AssemblyCouldNotLoad));
}

#[test]
fn test_unknown_type_fails_and_cleans_up() {
    let mut b = geo_module();
    let ghost = b.type_name("ghost", "ghost", "Phantom");
    b.field(0, "phantom", ghost, FieldFlags::PUBLIC);

    let mut vault = vault();
    let err = load(&mut vault, &b).unwrap_err();
    assert!(err.is_type_load());
    assert!(
        matches!(&err, VmError::TypeNotFound { name, module } if name.ends_with("/Phantom") && module == "geo"),
        "{err}"
    );
    assert!(!vault.is_loading("geo"));
    assert!(vault.find_type("Point").is_none());

    load(&mut vault, &geo_module()).unwrap();
    let point = vault.find_type("Point").unwrap();
    assert!(vault.get_class(point).unwrap().is_completed());
}

#[test]
fn test_declared_type_without_body() {
    let mut b = geo_module();
    let orphan = b.own_type("Orphan");
    b.field(0, "orphan", orphan, FieldFlags::PUBLIC);

    let mut vault = vault();
    let err = load(&mut vault, &b).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::TypeLoad));
    assert!(err.to_string().contains("Orphan' is declared but has no body"), "{err}");
}

#[test]
fn test_bootstrapper_class() {
    let mut vault = vault();
    let id = load(&mut vault, &geo_module()).unwrap();

    let boot = vault.module(id).unwrap().bootstrapper().unwrap();
    let class = vault.get_class(boot).unwrap();
    assert_eq!(class.full_name.as_str(), "geo%<sys>/boot");
    assert!(class.flags.contains(ClassFlags::SPECIAL | ClassFlags::STATIC));
    assert_eq!(class.parent, Some(vault.types().object));
    assert!(vault.module(id).unwrap().owns(boot));
}

#[test]
fn test_entry_point() {
    let mut b = geo_module();
    let void = b.std_type("Void");
    let program = b.class("Program", ClassFlags::PUBLIC | ClassFlags::STATIC, &[]);
    b.method(program, "master", public_static(), void, &[], Some(plain_il()));

    let mut vault = vault();
    let id = load(&mut vault, &b).unwrap();
    let entry = vault.get_entry_point(id).unwrap();
    assert_eq!(entry.class, vault.find_type("Program").unwrap());
    assert_eq!(&*vault.method(entry).unwrap().name, "master");
}

#[test]
fn test_entry_point_missing() {
    let mut b = geo_module();
    let void = b.std_type("Void");
    let int = b.std_type("Int32");
    let program = b.class("Program", ClassFlags::PUBLIC, &[]);
    b.method(program, "master", public_static(), void, &[("code", int)], Some(plain_il()));

    let mut vault = vault();
    let id = load(&mut vault, &b).unwrap();
    let err = vault.get_entry_point(id).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::MissingMethod));
}

#[test]
fn test_protected_zone_catch_types() {
    let mut b = geo_module();
    let void = b.std_type("Void");
    let exception = b.std_type("OutOfRangeException");
    let program = b.class("Program", ClassFlags::PUBLIC, &[]);
    let il = IlBody {
        code: vec![0; 12],
        zones: vec![ProtectedZone {
            start_address: 0,
            try_end_label: 1,
            end_address: 6,
            filter_addresses: vec![],
            catch_addresses: vec![7, 9],
            catch_types: vec![exception, -1],
            kinds: vec![0, 0],
        }],
        ..IlBody::default()
    };
    b.method(program, "master", public_static(), void, &[], Some(il));

    let mut vault = vault();
    let id = load(&mut vault, &b).unwrap();
    let entry = vault.get_entry_point(id).unwrap();
    let header = vault.method(entry).unwrap().header.clone().unwrap();

    let zone = &header.zones[0];
    assert_eq!(
        zone.catch_types,
        vec![Some(vault.types().out_of_range_exception), None]
    );
    assert!(zone.covers(0));
    assert!(zone.covers(5));
    assert!(!zone.covers(6));
}

#[test]
fn test_constants_are_stored() {
    let mut b = ImageBuilder::new("config", "1.2.3-beta");
    b.constant("Limits.max", ConstantValue::I32(5));
    b.constant("Limits.label", ConstantValue::String("five".into()));

    let mut vault = vault();
    let id = load(&mut vault, &b).unwrap();
    let module = vault.module(id).unwrap();

    assert_eq!(module.version.to_string(), "1.2.3-beta");
    let storage = module.const_storage();
    assert_eq!(storage.len(), 2);
    assert_eq!(
        storage.get(&FieldName::new("Limits", "max")),
        Some(&Value::I32(5))
    );
    assert_eq!(
        storage.get(&FieldName::new("Limits", "label")),
        Some(&Value::from("five"))
    );
    assert!(module.aspects().is_empty());
}

#[test]
fn test_invalid_version_text() {
    let b = ImageBuilder::new("geo", "one.two");
    let mut vault = vault();
    let err = load(&mut vault, &b).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::TypeLoad));
}

#[test]
fn test_load_after_dispose_is_rejected() {
    let mut vault = vault();
    vault.dispose().unwrap();
    let err = load(&mut vault, &geo_module()).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::StateCorrupt));
}
