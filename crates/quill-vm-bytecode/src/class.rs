//! Class body blocks

use serde::{Deserialize, Serialize};

use crate::error::{BytecodeError, Result};
use crate::reader::ByteReader;
use crate::writer::ByteWriter;

/// Reference to a type that may be a generic parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplexType {
    /// Index into the type-name table
    Type(i32),
    /// Key into the generics table
    Generic(i32),
}

impl ComplexType {
    /// Encoded size in bytes
    pub const SIZE: usize = 5;

    /// Read `bool is_generic` followed by the index
    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        let is_generic = reader.read_bool()?;
        let index = reader.read_i32()?;
        Ok(if is_generic {
            Self::Generic(index)
        } else {
            Self::Type(index)
        })
    }

    /// Write in the same layout as [`ComplexType::read`]
    pub fn write(&self, writer: &mut ByteWriter) {
        match *self {
            Self::Type(index) => {
                writer.write_bool(false);
                writer.write_i32(index);
            }
            Self::Generic(index) => {
                writer.write_bool(true);
                writer.write_i32(index);
            }
        }
    }
}

/// Field descriptor inside a class body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Index into the field-name table
    pub name: i32,
    /// Declared field type
    pub ty: ComplexType,
    /// Raw field flags
    pub flags: i16,
}

/// Structurally decoded class body
///
/// Method blocks are kept as raw bytes; they are decoded with
/// [`MethodBody::decode`](crate::MethodBody::decode) once every type they
/// mention can be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassBody {
    /// Index into the type-name table
    pub name: i32,
    /// Raw class flags
    pub flags: i16,
    /// Parent type indices, nearest first
    pub parents: Vec<i32>,
    /// Raw method blocks
    pub methods: Vec<Vec<u8>>,
    /// Field descriptors
    pub fields: Vec<FieldDecl>,
}

impl ClassBody {
    /// Decode a class body block (without its length prefix)
    pub fn decode(block: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(block);
        let name = reader.read_i32()?;
        let flags = reader.read_i16()?;

        let parent_count = reader.read_short_count(4)?;
        let parents = (0..parent_count)
            .map(|_| reader.read_i32())
            .collect::<Result<Vec<_>>>()?;

        let method_count = reader.read_count(4)?;
        let mut methods = Vec::with_capacity(method_count);
        for _ in 0..method_count {
            methods.push(reader.read_block()?.to_vec());
        }

        // name, type, flags
        let field_count = reader.read_count(4 + ComplexType::SIZE + 2)?;
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            let name = reader.read_i32()?;
            let ty = ComplexType::read(&mut reader)?;
            let flags = reader.read_i16()?;
            fields.push(FieldDecl { name, ty, flags });
        }

        if !reader.is_empty() {
            return Err(BytecodeError::BlockMismatch {
                offset: 0,
                declared: block.len(),
                used: reader.position(),
            });
        }

        Ok(Self {
            name,
            flags,
            parents,
            methods,
            fields,
        })
    }

    /// Encode the class body (without its length prefix)
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = ByteWriter::new();
        writer.write_i32(self.name);
        writer.write_i16(self.flags);
        writer.write_short_len(self.parents.len())?;
        for parent in &self.parents {
            writer.write_i32(*parent);
        }
        writer.write_len(self.methods.len())?;
        for method in &self.methods {
            writer.write_block(method)?;
        }
        writer.write_len(self.fields.len())?;
        for field in &self.fields {
            writer.write_i32(field.name);
            field.ty.write(&mut writer);
            writer.write_i16(field.flags);
        }
        Ok(writer.into_bytes())
    }
}
