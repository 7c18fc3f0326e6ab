//! Shared helpers for building module images in tests

#![allow(dead_code)]

use std::sync::Arc;

use quill_vm_bytecode::{
    ArgumentDecl, ClassBody, ComplexType, ConstantValue, DependencyEntry, FieldDecl,
    FieldNameEntry, IlBody, MethodBody, ModuleImage, TypeNameEntry,
};
use quill_vm_core::aspect::{AspectTarget, aspect_key};
use quill_vm_core::{
    ClassFlags, FieldFlags, MethodFlags, ModuleId, ModuleSearcher, NativeRegistry, Vault,
    VaultConfig, VmResult,
};

/// Assembly and namespace of predefined types
pub const STD: &str = "std";

/// Incrementally assembles a [`ModuleImage`]
pub struct ImageBuilder {
    name: String,
    image: ModuleImage,
}

impl ImageBuilder {
    pub fn new(name: &str, version: &str) -> Self {
        let mut b = Self {
            name: name.to_string(),
            image: ModuleImage::default(),
        };
        b.image.name_index = b.string(name);
        b.image.version_index = b.string(version);
        b
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn string(&mut self, text: &str) -> i32 {
        if let Some((index, _)) = self.image.strings.iter().find(|(_, s)| s == text) {
            return *index;
        }
        let index = self.image.strings.len() as i32;
        self.image.strings.push((index, text.to_string()));
        index
    }

    pub fn type_name(&mut self, assembly: &str, namespace: &str, name: &str) -> i32 {
        if let Some(entry) = self
            .image
            .type_names
            .iter()
            .find(|t| t.assembly == assembly && t.namespace == namespace && t.name == name)
        {
            return entry.index;
        }
        let index = self.image.type_names.len() as i32;
        self.image.type_names.push(TypeNameEntry {
            index,
            assembly: assembly.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        index
    }

    /// Type defined by this module, namespaced under the module name
    pub fn own_type(&mut self, name: &str) -> i32 {
        let module = self.name.clone();
        self.type_name(&module, &module, name)
    }

    pub fn std_type(&mut self, name: &str) -> i32 {
        self.type_name(STD, STD, name)
    }

    pub fn field_name(&mut self, class: &str, name: &str) -> i32 {
        let index = self.image.field_names.len() as i32;
        self.image.field_names.push(FieldNameEntry {
            index,
            name: name.to_string(),
            class_name: class.to_string(),
        });
        index
    }

    pub fn dependency(&mut self, name: &str, version: &str) {
        self.image.dependencies.push(DependencyEntry {
            name: name.to_string(),
            version: version.to_string(),
        });
    }

    /// Add a class body, returning its position for [`ImageBuilder::field`] and friends
    pub fn class(&mut self, name: &str, flags: ClassFlags, parents: &[i32]) -> usize {
        let ty = self.own_type(name);
        self.image.classes.push(ClassBody {
            name: ty,
            flags: flags.bits() as i16,
            parents: parents.to_vec(),
            methods: Vec::new(),
            fields: Vec::new(),
        });
        self.image.classes.len() - 1
    }

    pub fn field(&mut self, class: usize, name: &str, ty: i32, flags: FieldFlags) {
        let owner = self.class_short_name(class);
        let index = self.field_name(&owner, name);
        self.image.classes[class].fields.push(FieldDecl {
            name: index,
            ty: ComplexType::Type(ty),
            flags: flags.bits() as i16,
        });
    }

    /// Add a method; `il` is `None` for extern and abstract methods
    pub fn method(
        &mut self,
        class: usize,
        name: &str,
        flags: MethodFlags,
        return_type: i32,
        args: &[(&str, i32)],
        il: Option<IlBody>,
    ) {
        let name = self.string(name);
        let arguments = args
            .iter()
            .map(|(arg, ty)| ArgumentDecl {
                name: self.string(arg),
                ty: ComplexType::Type(*ty),
            })
            .collect();
        let body = MethodBody {
            name,
            flags: flags.bits() as i16,
            stack_size: 4,
            locals: 0,
            return_type: ComplexType::Type(return_type),
            arguments,
            body: il.map(|il| il.encode().unwrap()).unwrap_or_default(),
        };
        self.image.classes[class].methods.push(body.encode().unwrap());
    }

    pub fn constant(&mut self, key: &str, value: ConstantValue) {
        self.image.constants.push(key, value);
    }

    /// Store an aspect the way the compiler does, one constant per argument
    pub fn aspect(&mut self, name: &str, target: &AspectTarget, args: Vec<ConstantValue>) {
        for (index, value) in args.into_iter().enumerate() {
            self.constant(&aspect_key(name, target, index as u32), value);
        }
    }

    /// Bind an extern method to `symbol` in `library`
    pub fn native(&mut self, class: &str, method: &str, library: &str, symbol: &str) {
        self.aspect(
            "native",
            &method_target(class, method),
            vec![
                ConstantValue::String(library.to_string()),
                ConstantValue::String(symbol.to_string()),
            ],
        );
    }

    pub fn image_mut(&mut self) -> &mut ModuleImage {
        &mut self.image
    }

    pub fn build(&self) -> Vec<u8> {
        self.image.encode().unwrap()
    }

    fn class_short_name(&self, class: usize) -> String {
        let ty = self.image.classes[class].name;
        self.image
            .type_names
            .iter()
            .find(|t| t.index == ty)
            .map(|t| t.name.clone())
            .unwrap_or_default()
    }
}

pub fn class_target(class: &str) -> AspectTarget {
    AspectTarget::Class {
        class: class.into(),
    }
}

pub fn method_target(class: &str, method: &str) -> AspectTarget {
    AspectTarget::Method {
        class: class.into(),
        method: method.into(),
    }
}

pub fn field_target(class: &str, field: &str) -> AspectTarget {
    AspectTarget::Field {
        class: class.into(),
        field: field.into(),
    }
}

/// A short IL body with no protected zones
pub fn plain_il() -> IlBody {
    IlBody {
        code: vec![0x01, 0x02, 0x03],
        ..IlBody::default()
    }
}

pub fn public_static() -> MethodFlags {
    MethodFlags::PUBLIC | MethodFlags::STATIC
}

pub fn extern_static() -> MethodFlags {
    MethodFlags::PUBLIC | MethodFlags::STATIC | MethodFlags::EXTERN
}

pub fn vault() -> Vault {
    vault_with(VaultConfig::default(), Arc::new(NativeRegistry::default()))
}

pub fn vault_with(config: VaultConfig, registry: Arc<NativeRegistry>) -> Vault {
    Vault::new(config, registry).unwrap()
}

/// Load an image that has no dependencies
pub fn load(vault: &mut Vault, image: &ImageBuilder) -> VmResult<ModuleId> {
    vault.load_module(&image.build(), &mut ModuleSearcher::default())
}

/// `geo` 1.0.0: `Point { x: Int32, y: Int32 }` with a `move(Int32)` method
pub fn geo_module() -> ImageBuilder {
    let mut b = ImageBuilder::new("geo", "1.0.0");
    let int = b.std_type("Int32");
    let void = b.std_type("Void");
    let point = b.class("Point", ClassFlags::PUBLIC, &[]);
    b.field(point, "x", int, FieldFlags::PUBLIC);
    b.field(point, "y", int, FieldFlags::PUBLIC);
    b.method(
        point,
        "move",
        MethodFlags::PUBLIC,
        void,
        &[("dx", int)],
        Some(plain_il()),
    );
    b
}
