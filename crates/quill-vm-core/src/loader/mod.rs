//! Module loader
//!
//! Loading runs in a fixed order:
//!
//! 1. decode the image header and symbol tables
//! 2. link predefined types and define stubs for the module's own types
//! 3. resolve dependencies through the [`ModuleResolver`]
//! 4. capture class bodies as [`DeclaredClass`]es
//! 5. resolve parents (pass A), then member types (pass B)
//! 6. construct class bodies and decode IL
//! 7. read constants, deconstruct and distribute aspects
//! 8. validate tokens, link native methods, initialize vtables
//!
//! A failed load disposes whatever the module had defined so far.

pub mod declared;
pub mod resolve;

use std::path::Path;
use std::sync::Arc;

use quill_vm_bytecode::{AliasTarget, ComplexType, IlBody, ModuleImage};
use rustc_hash::FxHashMap;

use crate::aspect;
use crate::class::{
    ClassRef, GenericConstraint, GenericParam, ModuleId, RuntimeClass, RuntimeToken, TypeRef,
};
use crate::error::{ErrorCode, VmError, VmResult};
use crate::ffi;
use crate::flags::{self, ClassFlags, MethodFlags};
use crate::method::{MethodHeader, ProtectedZone, RuntimeMethod};
use crate::module::{Dependency, Module, RuntimeAlias};
use crate::names::{FieldName, QualifiedTypeName};
use crate::resolver::ModuleResolver;
use crate::value::Value;
use crate::vault::Vault;
use crate::version::Version;
use crate::vtable::init_vtable;

pub use declared::DeclaredClass;
pub use resolve::{
    ResolvedClass, ResolvedMethod, SymbolTable, UnresolvedError, resolve_members, resolve_parent,
};

/// Namespace of compiler-generated classes
pub const SYS_NAMESPACE: &str = "<sys>";

/// Short name of a module's bootstrap class
pub const BOOTSTRAPPER_NAME: &str = "boot";

impl Vault {
    /// Load a module from a file
    pub fn load_module_file(
        &mut self,
        path: &Path,
        resolver: &mut dyn ModuleResolver,
    ) -> VmResult<ModuleId> {
        let bytes = std::fs::read(path)?;
        self.load_module(&bytes, resolver)
    }

    /// Load a module image, resolving its dependencies through `resolver`
    pub fn load_module(
        &mut self,
        bytes: &[u8],
        resolver: &mut dyn ModuleResolver,
    ) -> VmResult<ModuleId> {
        self.ensure_alive()?;
        let image = ModuleImage::decode(bytes).map_err(|err| {
            tracing::error!(error = %err, "module image rejected");
            VmError::fatal(ErrorCode::AssemblyCouldNotLoad, err.to_string())
        })?;

        let id = self.tokens.grant_module_id()?;
        let mut module = Module::new(id, Arc::from(""));
        for (index, text) in &image.strings {
            module.strings.insert(*index, self.interner.intern(text));
        }
        let name = module
            .strings
            .get(&image.name_index)
            .cloned()
            .ok_or_else(|| VmError::StringNotFound {
                index: image.name_index,
                module: "<unnamed>".to_string(),
            })?;
        if self.loading.contains(&name) {
            return Err(VmError::DependencyCycle(name.to_string()));
        }
        module.name = name.clone();

        tracing::debug!(module = %name, id, "loading module");
        self.loading.insert(name.clone());
        let result = self.load_image(&mut module, image, resolver);
        self.loading.remove(&name);

        match result {
            Ok(()) => {
                tracing::info!(
                    module = %module.name,
                    version = %module.version,
                    classes = module.owned.len(),
                    "module loaded"
                );
                self.modules.insert(id, module);
                Ok(id)
            }
            Err(err) => {
                tracing::error!(module = %name, error = %err, "module load failed");
                module.dispose(&mut self.classes, &mut self.heap);
                Err(err)
            }
        }
    }

    fn load_image(
        &mut self,
        module: &mut Module,
        image: ModuleImage,
        resolver: &mut dyn ModuleResolver,
    ) -> VmResult<()> {
        let ModuleImage {
            version_index,
            type_names,
            field_names,
            dependencies,
            classes,
            aliases,
            generics,
            constants,
            ..
        } = image;

        for entry in &type_names {
            let name = QualifiedTypeName::new(&entry.assembly, &entry.namespace, &entry.name);
            if let Some(class) = self.types.find(&name) {
                if !module.class_table.contains(&class) {
                    module.class_table.push(class);
                }
            } else if entry.assembly == *module.name && self.own_class(module, &name).is_none() {
                self.define_class(module, name.clone(), ClassFlags::UNRESOLVED)?;
                tracing::trace!(class = %name, "stub defined");
            }
            module.types.insert(entry.index, name);
        }

        for entry in field_names {
            module
                .fields
                .insert(entry.index, FieldName::new(entry.class_name, entry.name));
        }

        for entry in dependencies {
            let version: Version = entry.version.parse()?;
            if module
                .deps
                .iter()
                .any(|d| *d.name == *entry.name && d.version == version)
            {
                tracing::trace!(dependency = %entry.name, "duplicate dependency skipped");
                continue;
            }
            let dep = resolver
                .resolve(self, &entry.name, &version)
                .map_err(|err| match err {
                    cycle @ VmError::DependencyCycle(_) => cycle,
                    other => VmError::DependencyNotFound {
                        name: entry.name.clone(),
                        version: version.to_string(),
                        module: module.name.to_string(),
                        reason: other.to_string(),
                    },
                })?;
            tracing::debug!(module = %module.name, dependency = %entry.name, "dependency resolved");
            module.deps.push(Dependency {
                name: entry.name.as_str().into(),
                version,
                module: dep,
            });
        }

        let mut declared = Vec::with_capacity(classes.len());
        for body in classes {
            let name = module
                .types
                .get(&body.name)
                .cloned()
                .ok_or_else(|| VmError::TypeNameNotFound {
                    index: body.name,
                    module: module.name.to_string(),
                })?;
            let class = self.own_class(module, &name).ok_or_else(|| VmError::TypeNotFound {
                name: name.to_string(),
                module: module.name.to_string(),
            })?;
            let flags = flags::from_wire::<ClassFlags>(body.flags)
                | ClassFlags::NOT_COMPLETED
                | ClassFlags::UNRESOLVED;
            if let Some(descriptor) = self.classes.get_mut(class) {
                descriptor.flags = flags;
            }
            declared.push(DeclaredClass::new(class, name, flags, body));
        }

        let visible = self.visible_classes(module);
        let no_generics = FxHashMap::default();
        module.generics = {
            let table = self.symbol_table(module, &visible, &no_generics);
            let mut params = FxHashMap::default();
            for entry in generics {
                let mut constraints = Vec::with_capacity(entry.constraints.len());
                for c in entry.constraints {
                    let ty = c.type_index.map(|i| table.class(i)).transpose()?;
                    constraints.push(GenericConstraint { kind: c.kind, ty });
                }
                params.insert(
                    entry.key,
                    Arc::new(GenericParam {
                        name: entry.name.into(),
                        constraints,
                    }),
                );
            }
            params
        };

        let table = self.symbol_table(module, &visible, &module.generics);

        // Pass A
        let mut parents = Vec::with_capacity(declared.len());
        for class in &declared {
            parents.push(resolve_parent(class, &table)?);
        }

        // Pass B
        let mut resolved = Vec::with_capacity(declared.len());
        for (class, parent) in declared.iter().zip(parents) {
            let (methods, fields) = resolve_members(class, &table)?;
            resolved.push(ResolvedClass {
                class: class.class,
                parent,
                methods,
                fields,
            });
        }

        let mut resolved_aliases = Vec::with_capacity(aliases.len());
        for alias in aliases {
            let name = table.type_name(alias.name)?.clone();
            resolved_aliases.push(match alias.target {
                AliasTarget::Type(index) => RuntimeAlias::Type {
                    name,
                    class: table.class(index)?,
                },
                AliasTarget::Method {
                    return_type,
                    arguments,
                } => RuntimeAlias::Method {
                    name,
                    return_type: table.complex(&return_type)?.0,
                    arguments: table.arguments(&arguments)?.0,
                },
            });
        }
        for (class, resolved) in declared.iter().zip(resolved) {
            let methods = resolved
                .methods
                .into_iter()
                .map(|m| build_method(m, &table))
                .collect::<VmResult<Vec<_>>>()?;
            let descriptor = self.classes.get_mut(resolved.class).ok_or_else(|| {
                VmError::state_corrupt(format!("Class '{}' freed during load", class.name))
            })?;
            descriptor.parent = resolved.parent;
            descriptor.methods = methods;
            descriptor.fields = resolved.fields;
            descriptor
                .flags
                .remove(ClassFlags::NOT_COMPLETED | ClassFlags::UNRESOLVED);
        }
        module.aliases = resolved_aliases;

        for class in module.class_table.iter().filter(|c| module.owned.contains(c)) {
            if let Some(descriptor) = self.classes.get(*class) {
                if !descriptor.is_completed() {
                    return Err(VmError::fatal(
                        ErrorCode::TypeLoad,
                        format!("Class '{}' is declared but has no body", descriptor.full_name),
                    ));
                }
            }
        }

        for entry in constants.entries {
            module
                .const_storage
                .insert(FieldName::parse(&entry.name), Value::from(entry.value));
        }

        self.post_load(module, version_index)
    }

    fn post_load(&mut self, module: &mut Module, version_index: i32) -> VmResult<()> {
        let version = module
            .strings
            .get(&version_index)
            .ok_or_else(|| VmError::StringNotFound {
                index: version_index,
                module: module.name.to_string(),
            })?;
        module.version = version.parse()?;

        module.aspects = aspect::deconstruct(&module.const_storage);
        let boot = QualifiedTypeName::new(&module.name, SYS_NAMESPACE, BOOTSTRAPPER_NAME);
        let bootstrapper = self.define_class(module, boot, ClassFlags::SPECIAL | ClassFlags::STATIC)?;
        if let Some(descriptor) = self.classes.get_mut(bootstrapper) {
            descriptor.parent = Some(self.types.object);
            descriptor.flags.remove(ClassFlags::NOT_COMPLETED);
        }
        module.bootstrapper = Some(bootstrapper);

        aspect::distribute(module, &mut self.classes)?;

        if self.config.validate_tokens {
            for class in module.class_table.iter().filter(|c| module.owned.contains(c)) {
                let descriptor = self.class_or_corrupt(*class)?;
                if !descriptor.token.is_initialized() {
                    return Err(VmError::state_corrupt(format!(
                        "Class '{}' has no runtime token",
                        descriptor.full_name
                    )));
                }
            }
        }

        ffi::link_module(&self.registry, &mut self.classes, module)?;

        for class in module.class_table.iter().filter(|c| module.owned.contains(c)) {
            init_vtable(&mut self.classes, *class)?;
        }
        Ok(())
    }

    /// Define an incomplete class owned by `module`
    fn define_class(
        &mut self,
        module: &mut Module,
        name: QualifiedTypeName,
        flags: ClassFlags,
    ) -> VmResult<ClassRef> {
        let token = RuntimeToken::new(module.id, self.tokens.grant_class_id()?);
        let mut class = RuntimeClass::new(name, module.id, token);
        class.flags |= flags;
        let handle = self.classes.allocate(u32::from(module.id), class);
        module.class_table.push(handle);
        module.owned.insert(handle);
        Ok(handle)
    }

    fn own_class(&self, module: &Module, name: &QualifiedTypeName) -> Option<ClassRef> {
        module
            .class_table
            .iter()
            .copied()
            .filter(|c| module.owned.contains(c))
            .find(|c| self.classes.get(*c).is_some_and(|d| d.full_name == *name))
    }

    /// Classes a module may reference: predefined, its own and its dependencies'
    fn visible_classes(&self, module: &Module) -> FxHashMap<QualifiedTypeName, ClassRef> {
        let mut visible: FxHashMap<QualifiedTypeName, ClassRef> = self
            .types
            .all()
            .map(|(name, class)| (name.clone(), class))
            .collect();
        let deps = module.deps.iter().filter_map(|d| self.modules.get(&d.module));
        for owner in deps.chain(std::iter::once(&*module)) {
            for class in owner.class_table.iter().filter(|c| owner.owns(**c)) {
                if let Some(descriptor) = self.classes.get(*class) {
                    visible.insert(descriptor.full_name.clone(), *class);
                }
            }
        }
        visible
    }

    fn symbol_table<'a>(
        &self,
        module: &'a Module,
        visible: &'a FxHashMap<QualifiedTypeName, ClassRef>,
        generics: &'a FxHashMap<i32, Arc<GenericParam>>,
    ) -> SymbolTable<'a> {
        SymbolTable {
            module: &module.name,
            strings: &module.strings,
            types: &module.types,
            fields: &module.fields,
            generics,
            classes: visible,
            object: self.types.object,
        }
    }
}

/// Finish a resolved method, decoding its IL unless it has no body
fn build_method(method: ResolvedMethod, table: &SymbolTable<'_>) -> VmResult<RuntimeMethod> {
    let bodiless = method
        .flags
        .intersects(MethodFlags::EXTERN | MethodFlags::ABSTRACT);
    let header = if bodiless {
        None
    } else {
        let il = IlBody::decode(&method.body).map_err(|err| {
            VmError::fatal(
                ErrorCode::TypeLoad,
                format!("Malformed IL in '{}': {err}", method.signature),
            )
        })?;
        let mut zones = Vec::with_capacity(il.zones.len());
        for zone in il.zones {
            let catch_types = zone
                .catch_types
                .iter()
                .map(|index| catch_type(*index, table))
                .collect::<VmResult<Vec<_>>>()?;
            zones.push(ProtectedZone {
                start_address: zone.start_address,
                try_end_label: zone.try_end_label,
                end_address: zone.end_address,
                filter_addresses: zone.filter_addresses,
                catch_addresses: zone.catch_addresses,
                catch_types,
                kinds: zone.kinds,
            });
        }
        Some(MethodHeader {
            code: il.code,
            max_stack: method.max_stack,
            locals: method.locals,
            labels: il.labels,
            label_map: il.label_map,
            zones,
        })
    };

    Ok(RuntimeMethod {
        name: method.name,
        signature: method.signature,
        flags: method.flags,
        return_type: method.return_type,
        arguments: method.arguments,
        header,
        aspects: Vec::new(),
        native: None,
    })
}

/// Catch type of a protected zone; a negative index catches everything
fn catch_type(index: i32, table: &SymbolTable<'_>) -> VmResult<Option<ClassRef>> {
    if index < 0 {
        return Ok(None);
    }
    match table.complex(&ComplexType::Type(index))?.0 {
        TypeRef::Class(class) => Ok(Some(class)),
        TypeRef::Generic(_) => Ok(None),
    }
}
