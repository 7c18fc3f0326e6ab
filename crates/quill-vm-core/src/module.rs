//! Loaded modules

use std::sync::Arc;

use indexmap::IndexMap;
use quill_vm_gc::ImmortalArena;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::aspect::RuntimeAspect;
use crate::class::{ClassRef, GenericParam, ModuleId, RuntimeClass, TypeRef};
use crate::method::MethodArgument;
use crate::names::{FieldName, QualifiedTypeName};
use crate::object::ObjectHeap;
use crate::value::Value;
use crate::version::Version;

/// Typed constants keyed by field name, in stream order
#[derive(Debug, Clone, Default)]
pub struct ConstStorage {
    entries: IndexMap<FieldName, Value>,
}

impl ConstStorage {
    /// Create empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a constant
    pub fn insert(&mut self, name: FieldName, value: Value) {
        self.entries.insert(name, value);
    }

    /// Look up a constant
    pub fn get(&self, name: &FieldName) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Iterate in stream order
    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &Value)> {
        self.entries.iter()
    }

    /// Number of constants
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no constants
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Alias declared by a module
#[derive(Debug, Clone)]
pub enum RuntimeAlias {
    /// Alternative name for a type
    Type {
        /// Alias name
        name: QualifiedTypeName,
        /// Aliased class
        class: ClassRef,
    },
    /// Named method signature
    Method {
        /// Alias name
        name: QualifiedTypeName,
        /// Return type
        return_type: TypeRef,
        /// Arguments
        arguments: Vec<MethodArgument>,
    },
}

impl RuntimeAlias {
    /// Alias name
    pub fn name(&self) -> &QualifiedTypeName {
        match self {
            Self::Type { name, .. } | Self::Method { name, .. } => name,
        }
    }
}

/// Declared dependency of a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Module name
    pub name: Arc<str>,
    /// Requested version
    pub version: Version,
    /// Module the resolver supplied
    pub module: ModuleId,
}

/// A unit of loaded code
///
/// The module owns its symbol tables and every class it defined. Classes
/// it merely links (predefined or from dependencies) are referenced
/// through the class table but never freed by it.
#[derive(Debug)]
pub struct Module {
    /// Module id
    pub id: ModuleId,
    /// Module name
    pub name: Arc<str>,
    /// Version
    pub version: Version,
    pub(crate) strings: FxHashMap<i32, Arc<str>>,
    pub(crate) types: FxHashMap<i32, QualifiedTypeName>,
    pub(crate) fields: FxHashMap<i32, FieldName>,
    pub(crate) generics: FxHashMap<i32, Arc<GenericParam>>,
    pub(crate) aliases: Vec<RuntimeAlias>,
    pub(crate) class_table: Vec<ClassRef>,
    pub(crate) owned: FxHashSet<ClassRef>,
    pub(crate) deps: Vec<Dependency>,
    pub(crate) aspects: Vec<RuntimeAspect>,
    pub(crate) const_storage: ConstStorage,
    pub(crate) bootstrapper: Option<ClassRef>,
    disposed: bool,
}

impl Module {
    pub(crate) fn new(id: ModuleId, name: Arc<str>) -> Self {
        Self {
            id,
            name,
            version: Version::default(),
            strings: FxHashMap::default(),
            types: FxHashMap::default(),
            fields: FxHashMap::default(),
            generics: FxHashMap::default(),
            aliases: Vec::new(),
            class_table: Vec::new(),
            owned: FxHashSet::default(),
            deps: Vec::new(),
            aspects: Vec::new(),
            const_storage: ConstStorage::new(),
            bootstrapper: None,
            disposed: false,
        }
    }

    /// Classes visible through this module, defined or linked
    pub fn class_table(&self) -> &[ClassRef] {
        &self.class_table
    }

    /// Whether this module defined `class`
    pub fn owns(&self, class: ClassRef) -> bool {
        self.owned.contains(&class)
    }

    /// Interned string by table index
    pub fn string(&self, index: i32) -> Option<&Arc<str>> {
        self.strings.get(&index)
    }

    /// Type name by table index
    pub fn type_name(&self, index: i32) -> Option<&QualifiedTypeName> {
        self.types.get(&index)
    }

    /// Field name by table index
    pub fn field_name(&self, index: i32) -> Option<&FieldName> {
        self.fields.get(&index)
    }

    /// Generic parameter by key
    pub fn generic(&self, key: i32) -> Option<&Arc<GenericParam>> {
        self.generics.get(&key)
    }

    /// Declared aliases
    pub fn aliases(&self) -> &[RuntimeAlias] {
        &self.aliases
    }

    /// Resolved dependencies
    pub fn dependencies(&self) -> &[Dependency] {
        &self.deps
    }

    /// Aspects that could not be attached to a target
    pub fn aspects(&self) -> &[RuntimeAspect] {
        &self.aspects
    }

    /// Constant storage
    pub fn const_storage(&self) -> &ConstStorage {
        &self.const_storage
    }

    /// Compiler-generated bootstrap class
    pub fn bootstrapper(&self) -> Option<ClassRef> {
        self.bootstrapper
    }

    /// Whether [`Module::dispose`] already ran
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Release owned classes, their collected instances and all tables
    ///
    /// A second call is a no-op. Safe on a module whose load failed halfway.
    pub fn dispose(&mut self, classes: &mut ImmortalArena<RuntimeClass>, heap: &mut ObjectHeap) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        let owned = std::mem::take(&mut self.owned);
        let objects = heap.free_where(|obj| owned.contains(&obj.class()));
        let freed = classes.free_owned_by(u32::from(self.id));

        tracing::debug!(
            module = %self.name,
            classes = freed.len(),
            objects,
            "module disposed"
        );

        self.strings.clear();
        self.types.clear();
        self.fields.clear();
        self.generics.clear();
        self.aliases.clear();
        self.class_table.clear();
        self.deps.clear();
        self.aspects.clear();
        self.const_storage = ConstStorage::new();
        self.bootstrapper = None;
    }
}
