//! Whole-module image
//!
//! Section order on the wire:
//!
//! 1. header: name index, version index, format version
//! 2. strings
//! 3. type names
//! 4. field names
//! 5. dependencies
//! 6. class bodies (length-prefixed blocks)
//! 7. aliases
//! 8. generics
//! 9. constant storage (length-prefixed block)

use serde::{Deserialize, Serialize};

use crate::FORMAT_VERSION;
use crate::class::{ClassBody, ComplexType};
use crate::constant::ConstStorageImage;
use crate::error::{BytecodeError, Result};
use crate::method::ArgumentDecl;
use crate::reader::ByteReader;
use crate::writer::ByteWriter;

/// Type-name table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeNameEntry {
    /// Table key
    pub index: i32,
    /// Assembly (module) name
    pub assembly: String,
    /// Namespace
    pub namespace: String,
    /// Short name
    pub name: String,
}

/// Field-name table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldNameEntry {
    /// Table key
    pub index: i32,
    /// Field name
    pub name: String,
    /// Owning class name
    pub class_name: String,
}

/// Dependency reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    /// Module name
    pub name: String,
    /// Version text
    pub version: String,
}

/// What an alias names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AliasTarget {
    /// Alias for a type
    Type(i32),
    /// Alias for a method signature
    Method {
        /// Return type
        return_type: ComplexType,
        /// Arguments
        arguments: Vec<ArgumentDecl>,
    },
}

/// Alias table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    /// Table key
    pub key: i32,
    /// Type index naming the alias
    pub name: i32,
    /// Aliased type or signature
    pub target: AliasTarget,
}

/// Constraint kind for a generic parameter
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenericConstraintKind {
    /// Blittable value type
    Bittable = 0,
    /// Any reference type
    Class = 1,
    /// Exact type
    Type = 2,
    /// Function signature
    Signature = 3,
}

impl GenericConstraintKind {
    fn from_i32(kind: i32) -> Result<Self> {
        Ok(match kind {
            0 => Self::Bittable,
            1 => Self::Class,
            2 => Self::Type,
            3 => Self::Signature,
            other => return Err(BytecodeError::InvalidConstraint(other)),
        })
    }

    fn has_type(self) -> bool {
        matches!(self, Self::Type | Self::Signature)
    }
}

/// A constraint on a generic parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericConstraint {
    /// Constraint kind
    pub kind: GenericConstraintKind,
    /// Type index for `Type` and `Signature` constraints
    pub type_index: Option<i32>,
}

/// Generics table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericEntry {
    /// Table key
    pub key: i32,
    /// Parameter name
    pub name: String,
    /// Constraints
    pub constraints: Vec<GenericConstraint>,
}

/// A module image decoded section by section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleImage {
    /// String index of the module name
    pub name_index: i32,
    /// String index of the version text
    pub version_index: i32,
    /// String table
    pub strings: Vec<(i32, String)>,
    /// Type-name table
    pub type_names: Vec<TypeNameEntry>,
    /// Field-name table
    pub field_names: Vec<FieldNameEntry>,
    /// Dependencies
    pub dependencies: Vec<DependencyEntry>,
    /// Class bodies
    pub classes: Vec<ClassBody>,
    /// Aliases
    pub aliases: Vec<AliasEntry>,
    /// Generic parameters
    pub generics: Vec<GenericEntry>,
    /// Constant storage
    pub constants: ConstStorageImage,
}

impl ModuleImage {
    /// Decode a complete image
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);

        let name_index = reader.read_i32()?;
        let version_index = reader.read_i32()?;
        let format = reader.read_i32()?;
        if format != FORMAT_VERSION {
            return Err(BytecodeError::UnsupportedVersion {
                found: format,
                expected: FORMAT_VERSION,
            });
        }

        let mut image = Self {
            name_index,
            version_index,
            ..Self::default()
        };

        for _ in 0..reader.read_count(8)? {
            let key = reader.read_i32()?;
            let text = reader.read_string()?;
            image.strings.push((key, text));
        }

        for _ in 0..reader.read_count(16)? {
            image.type_names.push(TypeNameEntry {
                index: reader.read_i32()?,
                assembly: reader.read_string()?,
                namespace: reader.read_string()?,
                name: reader.read_string()?,
            });
        }

        for _ in 0..reader.read_count(12)? {
            image.field_names.push(FieldNameEntry {
                index: reader.read_i32()?,
                name: reader.read_string()?,
                class_name: reader.read_string()?,
            });
        }

        for _ in 0..reader.read_count(8)? {
            image.dependencies.push(DependencyEntry {
                name: reader.read_string()?,
                version: reader.read_string()?,
            });
        }

        for _ in 0..reader.read_count(4)? {
            image.classes.push(ClassBody::decode(reader.read_block()?)?);
        }

        // key, name, kind flag and at least a type index
        for _ in 0..reader.read_count(13)? {
            let key = reader.read_i32()?;
            let name = reader.read_i32()?;
            let target = if reader.read_bool()? {
                AliasTarget::Type(reader.read_i32()?)
            } else {
                let return_type = ComplexType::read(&mut reader)?;
                let arguments = ArgumentDecl::read_list(&mut reader)?;
                AliasTarget::Method {
                    return_type,
                    arguments,
                }
            };
            image.aliases.push(AliasEntry { key, name, target });
        }

        for _ in 0..reader.read_count(12)? {
            let key = reader.read_i32()?;
            let name = reader.read_string()?;
            let count = reader.read_count(4)?;
            let mut constraints = Vec::with_capacity(count);
            for _ in 0..count {
                let kind = GenericConstraintKind::from_i32(reader.read_i32()?)?;
                let type_index = if kind.has_type() {
                    Some(reader.read_i32()?)
                } else {
                    None
                };
                constraints.push(GenericConstraint { kind, type_index });
            }
            image.generics.push(GenericEntry {
                key,
                name,
                constraints,
            });
        }

        image.constants = ConstStorageImage::decode(reader.read_block()?)?;

        tracing::debug!(
            strings = image.strings.len(),
            types = image.type_names.len(),
            classes = image.classes.len(),
            constants = image.constants.entries.len(),
            "decoded module image"
        );

        Ok(image)
    }

    /// Encode the image in wire order
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = ByteWriter::new();
        w.write_i32(self.name_index);
        w.write_i32(self.version_index);
        w.write_i32(FORMAT_VERSION);

        w.write_len(self.strings.len())?;
        for (key, text) in &self.strings {
            w.write_i32(*key);
            w.write_string(text)?;
        }

        w.write_len(self.type_names.len())?;
        for t in &self.type_names {
            w.write_i32(t.index);
            w.write_string(&t.assembly)?;
            w.write_string(&t.namespace)?;
            w.write_string(&t.name)?;
        }

        w.write_len(self.field_names.len())?;
        for f in &self.field_names {
            w.write_i32(f.index);
            w.write_string(&f.name)?;
            w.write_string(&f.class_name)?;
        }

        w.write_len(self.dependencies.len())?;
        for d in &self.dependencies {
            w.write_string(&d.name)?;
            w.write_string(&d.version)?;
        }

        w.write_len(self.classes.len())?;
        for class in &self.classes {
            w.write_block(&class.encode()?)?;
        }

        w.write_len(self.aliases.len())?;
        for alias in &self.aliases {
            w.write_i32(alias.key);
            w.write_i32(alias.name);
            match &alias.target {
                AliasTarget::Type(index) => {
                    w.write_bool(true);
                    w.write_i32(*index);
                }
                AliasTarget::Method {
                    return_type,
                    arguments,
                } => {
                    w.write_bool(false);
                    return_type.write(&mut w);
                    ArgumentDecl::write_list(arguments, &mut w)?;
                }
            }
        }

        w.write_len(self.generics.len())?;
        for g in &self.generics {
            w.write_i32(g.key);
            w.write_string(&g.name)?;
            w.write_len(g.constraints.len())?;
            for c in &g.constraints {
                w.write_i32(c.kind as i32);
                if let Some(index) = c.type_index {
                    w.write_i32(index);
                }
            }
        }

        w.write_block(&self.constants.encode()?)?;
        Ok(w.into_bytes())
    }
}
