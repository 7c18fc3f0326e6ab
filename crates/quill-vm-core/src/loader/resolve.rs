//! Second-pass type resolution
//!
//! Resolution is pure: it reads a [`DeclaredClass`] and a [`SymbolTable`]
//! snapshot without touching the vault. The loader collects the results of
//! both passes into a [`ResolvedClass`] and applies it afterwards.

use std::sync::Arc;

use quill_vm_bytecode::{BytecodeError, ComplexType, MethodBody};
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::declared::DeclaredClass;
use crate::class::{ClassRef, GenericParam, TypeRef};
use crate::error::{ErrorCode, VmError};
use crate::field::RuntimeField;
use crate::flags::{self, FieldFlags, MethodFlags};
use crate::method::MethodArgument;
use crate::names::{FieldName, QualifiedTypeName};

/// Name lookups available while resolving one module
#[derive(Debug, Clone, Copy)]
pub struct SymbolTable<'a> {
    /// Name of the module being loaded
    pub module: &'a str,
    /// String table
    pub strings: &'a FxHashMap<i32, Arc<str>>,
    /// Type-name table
    pub types: &'a FxHashMap<i32, QualifiedTypeName>,
    /// Field-name table
    pub fields: &'a FxHashMap<i32, FieldName>,
    /// Generic parameters
    pub generics: &'a FxHashMap<i32, Arc<GenericParam>>,
    /// Classes visible to the module: its own, predefined and dependency classes
    pub classes: &'a FxHashMap<QualifiedTypeName, ClassRef>,
    /// Root class used when no parent is declared
    pub object: ClassRef,
}

/// A name the module references but nothing defines
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnresolvedError {
    /// Qualified type name not visible
    #[error("Type '{name}' not found (searched from module '{module}')")]
    Type {
        /// Qualified name
        name: String,
        /// Searching module
        module: String,
    },

    /// Type-name table index missing
    #[error("Type name index {index} not found in module '{module}'")]
    TypeIndex {
        /// Index
        index: i32,
        /// Searching module
        module: String,
    },

    /// Field-name table index missing
    #[error("Field name index {index} not found in module '{module}'")]
    FieldIndex {
        /// Index
        index: i32,
        /// Searching module
        module: String,
    },

    /// String table index missing
    #[error("String index {index} not found in module '{module}'")]
    StringIndex {
        /// Index
        index: i32,
        /// Searching module
        module: String,
    },

    /// Generics table key missing
    #[error("Generic parameter {index} not found in module '{module}'")]
    GenericIndex {
        /// Key
        index: i32,
        /// Searching module
        module: String,
    },

    /// A method block of the class is malformed
    #[error("Malformed method block in '{class}': {source}")]
    Malformed {
        /// Owning class
        class: String,
        /// Decode error
        source: BytecodeError,
    },
}

impl From<UnresolvedError> for VmError {
    fn from(err: UnresolvedError) -> Self {
        match err {
            UnresolvedError::Type { name, module } => Self::TypeNotFound { name, module },
            UnresolvedError::TypeIndex { index, module } => Self::TypeNameNotFound { index, module },
            UnresolvedError::FieldIndex { index, module } => {
                Self::FieldNameNotFound { index, module }
            }
            UnresolvedError::StringIndex { index, module } => Self::StringNotFound { index, module },
            UnresolvedError::GenericIndex { index, module } => {
                Self::GenericNotFound { index, module }
            }
            malformed @ UnresolvedError::Malformed { .. } => {
                Self::fatal(ErrorCode::TypeLoad, malformed.to_string())
            }
        }
    }
}

/// Method with resolved types and undecoded IL
#[derive(Debug, Clone)]
pub struct ResolvedMethod {
    /// Plain name
    pub name: Arc<str>,
    /// `name(Arg,...)`
    pub signature: Arc<str>,
    /// Flags
    pub flags: MethodFlags,
    /// Return type
    pub return_type: TypeRef,
    /// Arguments
    pub arguments: Vec<MethodArgument>,
    /// Maximum stack depth
    pub max_stack: u8,
    /// Local count
    pub locals: u8,
    /// Encoded IL
    pub body: Vec<u8>,
}

/// Class with every referenced type resolved
#[derive(Debug, Clone)]
pub struct ResolvedClass {
    /// Class being completed
    pub class: ClassRef,
    /// Parent
    pub parent: Option<ClassRef>,
    /// Methods in declaration order
    pub methods: Vec<ResolvedMethod>,
    /// Fields in declaration order
    pub fields: Vec<RuntimeField>,
}

impl SymbolTable<'_> {
    /// Qualified name behind a type-name index
    pub fn type_name(&self, index: i32) -> Result<&QualifiedTypeName, UnresolvedError> {
        self.types.get(&index).ok_or_else(|| UnresolvedError::TypeIndex {
            index,
            module: self.module.to_string(),
        })
    }

    /// Class behind a type-name index
    pub fn class(&self, index: i32) -> Result<ClassRef, UnresolvedError> {
        let name = self.type_name(index)?;
        self.classes
            .get(name)
            .copied()
            .ok_or_else(|| UnresolvedError::Type {
                name: name.to_string(),
                module: self.module.to_string(),
            })
    }

    /// String behind a string-table index
    pub fn string(&self, index: i32) -> Result<Arc<str>, UnresolvedError> {
        self.strings
            .get(&index)
            .cloned()
            .ok_or_else(|| UnresolvedError::StringIndex {
                index,
                module: self.module.to_string(),
            })
    }

    /// Field name behind a field-name index
    pub fn field(&self, index: i32) -> Result<FieldName, UnresolvedError> {
        self.fields
            .get(&index)
            .cloned()
            .ok_or_else(|| UnresolvedError::FieldIndex {
                index,
                module: self.module.to_string(),
            })
    }

    /// Resolve a complex type, returning it with its short display name
    pub fn complex(&self, ty: &ComplexType) -> Result<(TypeRef, Arc<str>), UnresolvedError> {
        match *ty {
            ComplexType::Type(index) => {
                let class = self.class(index)?;
                let name = self.type_name(index)?.name().into();
                Ok((TypeRef::Class(class), name))
            }
            ComplexType::Generic(key) => {
                let param = self
                    .generics
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| UnresolvedError::GenericIndex {
                        index: key,
                        module: self.module.to_string(),
                    })?;
                let name = param.name.clone();
                Ok((TypeRef::Generic(param), name))
            }
        }
    }

    /// Resolve an argument list, returning the arguments and their type names
    pub fn arguments(
        &self,
        args: &[quill_vm_bytecode::ArgumentDecl],
    ) -> Result<(Vec<MethodArgument>, Vec<Arc<str>>), UnresolvedError> {
        let mut arguments = Vec::with_capacity(args.len());
        let mut names = Vec::with_capacity(args.len());
        for arg in args {
            let (ty, type_name) = self.complex(&arg.ty)?;
            arguments.push(MethodArgument {
                name: self.string(arg.name)?,
                ty,
            });
            names.push(type_name);
        }
        Ok((arguments, names))
    }
}

/// Pass A: the parent of `declared`
///
/// A parent naming the class itself is skipped. A class that declares no
/// parent inherits from the root object class.
pub fn resolve_parent(
    declared: &DeclaredClass,
    table: &SymbolTable<'_>,
) -> Result<Option<ClassRef>, UnresolvedError> {
    if declared.parents.is_empty() {
        return Ok((declared.class != table.object).then_some(table.object));
    }
    let mut parent = None;
    for index in &declared.parents {
        let class = table.class(*index)?;
        if class == declared.class {
            continue;
        }
        parent.get_or_insert(class);
    }
    Ok(parent)
}

/// Pass B: method and field types of `declared`
pub fn resolve_members(
    declared: &DeclaredClass,
    table: &SymbolTable<'_>,
) -> Result<(Vec<ResolvedMethod>, Vec<RuntimeField>), UnresolvedError> {
    let mut methods = Vec::with_capacity(declared.methods.len());
    for block in &declared.methods {
        let body = MethodBody::decode(block).map_err(|source| UnresolvedError::Malformed {
            class: declared.name.to_string(),
            source,
        })?;
        let name = table.string(body.name)?;
        let (return_type, _) = table.complex(&body.return_type)?;
        let (arguments, arg_names) = table.arguments(&body.arguments)?;
        let signature: Arc<str> = format!("{name}({})", arg_names.join(",")).into();
        methods.push(ResolvedMethod {
            name,
            signature,
            flags: flags::from_wire(body.flags),
            return_type,
            arguments,
            max_stack: body.stack_size,
            locals: body.locals,
            body: body.body,
        });
    }

    let mut fields = Vec::with_capacity(declared.fields.len());
    for decl in &declared.fields {
        let name = table.field(decl.name)?;
        let (ty, _) = table.complex(&decl.ty)?;
        fields.push(RuntimeField::new(
            name,
            ty,
            flags::from_wire::<FieldFlags>(decl.flags),
        ));
    }
    Ok((methods, fields))
}
