//! Aspect deconstruction and distribution tests

mod common;

use common::*;
use quill_vm_bytecode::ConstantValue;
use quill_vm_core::aspect::{AspectTarget, aspect_key};
use quill_vm_core::{ClassFlags, Value};

#[test]
fn test_class_aspect_attached() {
    let mut b = geo_module();
    b.aspect(
        "serializable",
        &class_target("Point"),
        vec![ConstantValue::String("json".into())],
    );

    let mut vault = vault();
    let id = load(&mut vault, &b).unwrap();

    let point = vault.find_type("Point").unwrap();
    let aspects = &vault.get_class(point).unwrap().aspects;
    assert_eq!(aspects.len(), 1);
    assert_eq!(&*aspects[0].name, "serializable");
    assert_eq!(aspects[0].target, class_target("Point"));
    assert_eq!(
        aspects[0].values().cloned().collect::<Vec<_>>(),
        vec![Value::from("json")]
    );
    assert!(vault.module(id).unwrap().aspects().is_empty());
}

#[test]
fn test_method_aspect_arguments_ordered_by_index() {
    let mut b = geo_module();
    let target = method_target("Point", "move");
    b.constant(&aspect_key("route", &target, 1), ConstantValue::I32(2));
    b.constant(&aspect_key("route", &target, 0), ConstantValue::I32(1));
    b.constant(&aspect_key("route", &target, 2), ConstantValue::I32(3));

    let mut vault = vault();
    load(&mut vault, &b).unwrap();

    let point = vault.find_type("Point").unwrap();
    let (_, method) = vault.get_class(point).unwrap().find_method("move").unwrap();
    assert_eq!(method.aspects.len(), 1);
    let indices: Vec<u32> = method.aspects[0].arguments.iter().map(|a| a.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(
        method.aspects[0].values().cloned().collect::<Vec<_>>(),
        vec![Value::I32(1), Value::I32(2), Value::I32(3)]
    );
}

#[test]
fn test_method_aspect_by_signature() {
    let mut b = geo_module();
    b.aspect(
        "inline",
        &method_target("Point", "move(Int32)"),
        vec![ConstantValue::Bool(true)],
    );

    let mut vault = vault();
    load(&mut vault, &b).unwrap();

    let point = vault.find_type("Point").unwrap();
    let (_, method) = vault.get_class(point).unwrap().find_method("move").unwrap();
    assert_eq!(&*method.aspects[0].name, "inline");
}

#[test]
fn test_field_aspect_attached() {
    let mut b = geo_module();
    b.aspect(
        "range",
        &field_target("Point", "x"),
        vec![ConstantValue::I32(0), ConstantValue::I32(100)],
    );

    let mut vault = vault();
    load(&mut vault, &b).unwrap();

    let point = vault.find_type("Point").unwrap();
    let field = vault.get_class(point).unwrap().find_field("x").unwrap();
    assert_eq!(field.aspects.len(), 1);
    assert_eq!(field.aspects[0].arguments.len(), 2);
    assert!(
        vault
            .get_class(point)
            .unwrap()
            .find_field("y")
            .unwrap()
            .aspects
            .is_empty()
    );
}

#[test]
fn test_missing_targets_stay_on_module() {
    let mut b = geo_module();
    b.aspect("tag", &class_target("Polygon"), vec![ConstantValue::I32(1)]);
    b.aspect("tag", &method_target("Point", "rotate"), vec![ConstantValue::I32(2)]);
    b.aspect("tag", &field_target("Point", "z"), vec![ConstantValue::I32(3)]);

    let mut vault = vault();
    let id = load(&mut vault, &b).unwrap();

    let pending = vault.module(id).unwrap().aspects();
    assert_eq!(pending.len(), 3);
    assert_eq!(pending[0].target, class_target("Polygon"));
    assert!(matches!(&pending[1].target, AspectTarget::Method { method, .. } if &**method == "rotate"));
    assert!(matches!(&pending[2].target, AspectTarget::Field { field, .. } if &**field == "z"));
}

#[test]
fn test_aspect_on_bootstrapper() {
    let mut b = geo_module();
    b.aspect("module_init", &class_target("<sys>/boot"), vec![ConstantValue::Null]);

    let mut vault = vault();
    let id = load(&mut vault, &b).unwrap();

    let boot = vault.module(id).unwrap().bootstrapper().unwrap();
    let class = vault.get_class(boot).unwrap();
    assert!(class.flags.contains(ClassFlags::SPECIAL));
    assert_eq!(class.aspects.len(), 1);
}

#[test]
fn test_malformed_keys_are_skipped() {
    let mut b = geo_module();
    b.constant("aspect/\\broken._0", ConstantValue::I32(1));
    b.constant("aspect/\\/\\class/\\Point._0", ConstantValue::I32(1));
    b.constant("aspect/\\tag/\\class/\\Point._x", ConstantValue::I32(1));
    b.constant("Point.plain", ConstantValue::I32(1));

    let mut vault = vault();
    let id = load(&mut vault, &b).unwrap();

    let module = vault.module(id).unwrap();
    assert!(module.aspects().is_empty());
    assert_eq!(module.const_storage().len(), 4);
    let point = vault.find_type("Point").unwrap();
    assert!(vault.get_class(point).unwrap().aspects.is_empty());
}

#[test]
fn test_distinct_aspects_on_one_class() {
    let mut b = geo_module();
    b.aspect("first", &class_target("Point"), vec![ConstantValue::I32(1)]);
    b.aspect("second", &class_target("geo/Point"), vec![ConstantValue::I32(2)]);

    let mut vault = vault();
    load(&mut vault, &b).unwrap();

    let point = vault.find_type("Point").unwrap();
    let names: Vec<String> = vault
        .get_class(point)
        .unwrap()
        .aspects
        .iter()
        .map(|a| a.name.to_string())
        .collect();
    assert_eq!(names, vec!["first", "second"]);
}
