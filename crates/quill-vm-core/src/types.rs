//! Predefined types
//!
//! Every vault starts with the `std` types below. Module loading links type
//! names that match one of them instead of defining a stub.

use quill_vm_bytecode::TypeCode;
use quill_vm_gc::ImmortalArena;
use rustc_hash::FxHashMap;

use crate::class::{ClassRef, ModuleId, RuntimeClass, RuntimeToken, TypeRef};
use crate::error::{FaultKind, VmResult};
use crate::field::RuntimeField;
use crate::flags::{ClassFlags, FieldFlags};
use crate::names::{FieldName, QualifiedTypeName};
use crate::object::VALUE_FIELD;
use crate::token::TokenGranter;
use crate::vtable::init_vtable;

/// Assembly and namespace of predefined types
pub const STD_ASSEMBLY: &str = "std";

/// Array slot holding the block size
pub const ARRAY_BLOCK_FIELD: &str = "!!block";
/// Array slot holding the element count
pub const ARRAY_SIZE_FIELD: &str = "!!size";
/// Array slot holding the rank
pub const ARRAY_RANK_FIELD: &str = "!!rank";
/// Array slot holding the element class token
pub const ARRAY_CLASS_FIELD: &str = "!!class";

/// Handles to the predefined classes of a vault
#[derive(Debug, Clone)]
pub struct CoreTypes {
    /// Root class
    pub object: ClassRef,
    /// `Void`
    pub void: ClassRef,
    /// `Boolean`
    pub boolean: ClassRef,
    /// `Char`
    pub char: ClassRef,
    /// `Int8`
    pub i8: ClassRef,
    /// `UInt8`
    pub u8: ClassRef,
    /// `Int16`
    pub i16: ClassRef,
    /// `UInt16`
    pub u16: ClassRef,
    /// `Int32`
    pub i32: ClassRef,
    /// `UInt32`
    pub u32: ClassRef,
    /// `Int64`
    pub i64: ClassRef,
    /// `UInt64`
    pub u64: ClassRef,
    /// `Float`
    pub f32: ClassRef,
    /// `Double`
    pub f64: ClassRef,
    /// `String`
    pub string: ClassRef,
    /// `Raw`
    pub raw: ClassRef,
    /// `Array`
    pub array: ClassRef,
    /// `Function`
    pub function: ClassRef,
    /// `Aspect`
    pub aspect: ClassRef,
    /// `Exception`, carries a `message` field
    pub exception: ClassRef,
    /// `NullPointerException`
    pub null_pointer_exception: ClassRef,
    /// `OutOfRangeException`
    pub out_of_range_exception: ClassRef,
    /// `TypeMismatchException`
    pub type_mismatch_exception: ClassRef,
    by_name: FxHashMap<QualifiedTypeName, ClassRef>,
}

struct Builder<'a> {
    classes: &'a mut ImmortalArena<RuntimeClass>,
    tokens: &'a TokenGranter,
    owner: ModuleId,
    by_name: FxHashMap<QualifiedTypeName, ClassRef>,
    order: Vec<ClassRef>,
}

impl Builder<'_> {
    fn define(
        &mut self,
        name: &str,
        code: TypeCode,
        parent: Option<ClassRef>,
        flags: ClassFlags,
    ) -> VmResult<ClassRef> {
        let full_name = QualifiedTypeName::new(STD_ASSEMBLY, STD_ASSEMBLY, name);
        let token = RuntimeToken::new(self.owner, self.tokens.grant_class_id()?);
        let mut class = RuntimeClass::new(full_name.clone(), self.owner, token);
        class.parent = parent;
        class.type_code = code;
        class.flags = ClassFlags::PUBLIC | flags;
        let handle = self.classes.allocate(u32::from(self.owner), class);
        self.by_name.insert(full_name, handle);
        self.order.push(handle);
        Ok(handle)
    }

    fn field(&mut self, class: ClassRef, name: &str, ty: ClassRef) {
        if let Some(descriptor) = self.classes.get_mut(class) {
            let field_name = FieldName::new(descriptor.name(), name);
            descriptor.fields.push(RuntimeField::new(
                field_name,
                TypeRef::Class(ty),
                FieldFlags::PUBLIC | FieldFlags::SPECIAL,
            ));
        }
    }

    fn primitive(&mut self, name: &str, code: TypeCode, object: ClassRef) -> VmResult<ClassRef> {
        let class = self.define(name, code, Some(object), ClassFlags::empty())?;
        self.field(class, VALUE_FIELD, class);
        Ok(class)
    }
}

impl CoreTypes {
    /// Define every predefined class under `owner` and initialize their vtables
    pub fn install(
        classes: &mut ImmortalArena<RuntimeClass>,
        tokens: &TokenGranter,
        owner: ModuleId,
    ) -> VmResult<Self> {
        let mut b = Builder {
            classes,
            tokens,
            owner,
            by_name: FxHashMap::default(),
            order: Vec::new(),
        };

        let object = b.define("Object", TypeCode::Object, None, ClassFlags::empty())?;
        let void = b.define("Void", TypeCode::Void, Some(object), ClassFlags::empty())?;
        let boolean = b.primitive("Boolean", TypeCode::Boolean, object)?;
        let char = b.primitive("Char", TypeCode::Char, object)?;
        let i8 = b.primitive("Int8", TypeCode::I1, object)?;
        let u8 = b.primitive("UInt8", TypeCode::U1, object)?;
        let i16 = b.primitive("Int16", TypeCode::I2, object)?;
        let u16 = b.primitive("UInt16", TypeCode::U2, object)?;
        let i32 = b.primitive("Int32", TypeCode::I4, object)?;
        let u32 = b.primitive("UInt32", TypeCode::U4, object)?;
        let i64 = b.primitive("Int64", TypeCode::I8, object)?;
        let u64 = b.primitive("UInt64", TypeCode::U8, object)?;
        let f32 = b.primitive("Float", TypeCode::R4, object)?;
        let f64 = b.primitive("Double", TypeCode::R8, object)?;
        let string = b.primitive("String", TypeCode::String, object)?;
        let raw = b.primitive("Raw", TypeCode::Raw, object)?;

        let array = b.define("Array", TypeCode::Array, Some(object), ClassFlags::empty())?;
        b.field(array, VALUE_FIELD, array);
        b.field(array, ARRAY_BLOCK_FIELD, u64);
        b.field(array, ARRAY_SIZE_FIELD, u64);
        b.field(array, ARRAY_RANK_FIELD, u64);
        b.field(array, ARRAY_CLASS_FIELD, raw);

        let function = b.define("Function", TypeCode::Function, Some(object), ClassFlags::empty())?;
        let aspect = b.define("Aspect", TypeCode::Class, Some(object), ClassFlags::ASPECT)?;

        let exception = b.define("Exception", TypeCode::Class, Some(object), ClassFlags::empty())?;
        b.field(exception, "message", string);
        let null_pointer_exception = b.define(
            "NullPointerException",
            TypeCode::Class,
            Some(exception),
            ClassFlags::empty(),
        )?;
        let out_of_range_exception = b.define(
            "OutOfRangeException",
            TypeCode::Class,
            Some(exception),
            ClassFlags::empty(),
        )?;
        let type_mismatch_exception = b.define(
            "TypeMismatchException",
            TypeCode::Class,
            Some(exception),
            ClassFlags::empty(),
        )?;

        let Builder {
            classes,
            by_name,
            order,
            ..
        } = b;
        for class in order {
            if let Some(descriptor) = classes.get_mut(class) {
                descriptor.flags.remove(ClassFlags::NOT_COMPLETED);
            }
            init_vtable(classes, class)?;
        }

        Ok(Self {
            object,
            void,
            boolean,
            char,
            i8,
            u8,
            i16,
            u16,
            i32,
            u32,
            i64,
            u64,
            f32,
            f64,
            string,
            raw,
            array,
            function,
            aspect,
            exception,
            null_pointer_exception,
            out_of_range_exception,
            type_mismatch_exception,
            by_name,
        })
    }

    /// Predefined class with this qualified name
    pub fn find(&self, name: &QualifiedTypeName) -> Option<ClassRef> {
        self.by_name.get(name).copied()
    }

    /// Every predefined class with its name
    pub fn all(&self) -> impl Iterator<Item = (&QualifiedTypeName, ClassRef)> {
        self.by_name.iter().map(|(name, class)| (name, *class))
    }

    /// Whether `class` is one of the predefined classes
    pub fn contains(&self, class: ClassRef) -> bool {
        self.by_name.values().any(|c| *c == class)
    }

    /// Class boxing values of `code`
    pub fn for_type_code(&self, code: TypeCode) -> Option<ClassRef> {
        Some(match code {
            TypeCode::Object => self.object,
            TypeCode::Void => self.void,
            TypeCode::Boolean => self.boolean,
            TypeCode::Char => self.char,
            TypeCode::I1 => self.i8,
            TypeCode::U1 => self.u8,
            TypeCode::I2 => self.i16,
            TypeCode::U2 => self.u16,
            TypeCode::I4 => self.i32,
            TypeCode::U4 => self.u32,
            TypeCode::I8 => self.i64,
            TypeCode::U8 => self.u64,
            TypeCode::R2 | TypeCode::R4 => self.f32,
            TypeCode::R8 | TypeCode::R16 => self.f64,
            TypeCode::String => self.string,
            TypeCode::Raw => self.raw,
            TypeCode::Array => self.array,
            TypeCode::Function => self.function,
            TypeCode::None | TypeCode::Class | TypeCode::Token => return None,
        })
    }

    /// Exception class raised for a fault kind
    pub fn for_fault(&self, kind: FaultKind) -> ClassRef {
        match kind {
            FaultKind::NullPointer => self.null_pointer_exception,
            FaultKind::OutOfRange => self.out_of_range_exception,
            FaultKind::TypeMismatch => self.type_mismatch_exception,
            FaultKind::Exception => self.exception,
        }
    }
}
