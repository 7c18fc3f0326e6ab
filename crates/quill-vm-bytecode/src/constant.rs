//! Constant storage for module images
//!
//! The trailing constant block stores `(type code, field name, value text)`
//! triples. Value text is parsed according to the type code when decoding.

use serde::{Deserialize, Serialize};

use crate::error::{BytecodeError, Result};
use crate::reader::ByteReader;
use crate::writer::ByteWriter;

/// Primitive type codes with stable wire values
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCode {
    /// No type
    None = 0,
    /// Void return
    Void = 1,
    /// Root object
    Object = 2,
    /// Boolean
    Boolean = 3,
    /// Unicode scalar
    Char = 4,
    /// Signed 8-bit
    I1 = 5,
    /// Unsigned 8-bit
    U1 = 6,
    /// Signed 16-bit
    I2 = 7,
    /// Unsigned 16-bit
    U2 = 8,
    /// Signed 32-bit
    I4 = 9,
    /// Unsigned 32-bit
    U4 = 10,
    /// Signed 64-bit
    I8 = 11,
    /// Unsigned 64-bit
    U8 = 12,
    /// Half precision float (stored as f32)
    R2 = 13,
    /// Single precision float
    R4 = 14,
    /// Double precision float
    R8 = 15,
    /// Quad precision float (stored as f64)
    R16 = 16,
    /// String
    String = 17,
    /// User class
    Class = 18,
    /// Array
    Array = 19,
    /// Runtime token
    Token = 20,
    /// Raw native address
    Raw = 21,
    /// Function pointer
    Function = 22,
}

impl TypeCode {
    /// Decode a wire value
    pub fn from_i32(code: i32) -> Result<Self> {
        Ok(match code {
            0 => Self::None,
            1 => Self::Void,
            2 => Self::Object,
            3 => Self::Boolean,
            4 => Self::Char,
            5 => Self::I1,
            6 => Self::U1,
            7 => Self::I2,
            8 => Self::U2,
            9 => Self::I4,
            10 => Self::U4,
            11 => Self::I8,
            12 => Self::U8,
            13 => Self::R2,
            14 => Self::R4,
            15 => Self::R8,
            16 => Self::R16,
            17 => Self::String,
            18 => Self::Class,
            19 => Self::Array,
            20 => Self::Token,
            21 => Self::Raw,
            22 => Self::Function,
            other => return Err(BytecodeError::InvalidTypeCode(other)),
        })
    }

    /// Whether values of this type are stored inline in a `!!value` slot
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            Self::Boolean
                | Self::Char
                | Self::I1
                | Self::U1
                | Self::I2
                | Self::U2
                | Self::I4
                | Self::U4
                | Self::I8
                | Self::U8
                | Self::R2
                | Self::R4
                | Self::R8
                | Self::R16
                | Self::String
                | Self::Raw
        )
    }
}

/// A decoded constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// Character
    Char(char),
    /// Signed 8-bit
    I8(i8),
    /// Unsigned 8-bit
    U8(u8),
    /// Signed 16-bit
    I16(i16),
    /// Unsigned 16-bit
    U16(u16),
    /// Signed 32-bit
    I32(i32),
    /// Unsigned 32-bit
    U32(u32),
    /// Signed 64-bit
    I64(i64),
    /// Unsigned 64-bit
    U64(u64),
    /// Single precision
    F32(f32),
    /// Double precision
    F64(f64),
    /// Text
    String(String),
}

impl ConstantValue {
    /// Type code this value is written with
    pub fn type_code(&self) -> TypeCode {
        match self {
            Self::Null => TypeCode::None,
            Self::Bool(_) => TypeCode::Boolean,
            Self::Char(_) => TypeCode::Char,
            Self::I8(_) => TypeCode::I1,
            Self::U8(_) => TypeCode::U1,
            Self::I16(_) => TypeCode::I2,
            Self::U16(_) => TypeCode::U2,
            Self::I32(_) => TypeCode::I4,
            Self::U32(_) => TypeCode::U4,
            Self::I64(_) => TypeCode::I8,
            Self::U64(_) => TypeCode::U8,
            Self::F32(_) => TypeCode::R4,
            Self::F64(_) => TypeCode::R8,
            Self::String(_) => TypeCode::String,
        }
    }

    /// Text form stored on the wire
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(v) => v.to_string(),
            Self::Char(v) => v.to_string(),
            Self::I8(v) => v.to_string(),
            Self::U8(v) => v.to_string(),
            Self::I16(v) => v.to_string(),
            Self::U16(v) => v.to_string(),
            Self::I32(v) => v.to_string(),
            Self::U32(v) => v.to_string(),
            Self::I64(v) => v.to_string(),
            Self::U64(v) => v.to_string(),
            Self::F32(v) => v.to_string(),
            Self::F64(v) => v.to_string(),
            Self::String(v) => v.clone(),
        }
    }

    /// Parse wire text according to `code`
    pub fn parse(code: TypeCode, name: &str, text: &str) -> Result<Self> {
        let invalid = || BytecodeError::InvalidConstant {
            name: name.to_string(),
            type_code: code as i32,
            text: text.to_string(),
        };
        let value = match code {
            TypeCode::None | TypeCode::Void => Self::Null,
            TypeCode::Boolean => Self::Bool(text.parse().map_err(|_| invalid())?),
            TypeCode::Char => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Self::Char(c),
                    _ => return Err(invalid()),
                }
            }
            TypeCode::I1 => Self::I8(text.parse().map_err(|_| invalid())?),
            TypeCode::U1 => Self::U8(text.parse().map_err(|_| invalid())?),
            TypeCode::I2 => Self::I16(text.parse().map_err(|_| invalid())?),
            TypeCode::U2 => Self::U16(text.parse().map_err(|_| invalid())?),
            TypeCode::I4 => Self::I32(text.parse().map_err(|_| invalid())?),
            TypeCode::U4 => Self::U32(text.parse().map_err(|_| invalid())?),
            TypeCode::I8 => Self::I64(text.parse().map_err(|_| invalid())?),
            TypeCode::U8 => Self::U64(text.parse().map_err(|_| invalid())?),
            TypeCode::R2 | TypeCode::R4 => Self::F32(text.parse().map_err(|_| invalid())?),
            TypeCode::R8 | TypeCode::R16 => Self::F64(text.parse().map_err(|_| invalid())?),
            TypeCode::String => Self::String(text.to_string()),
            _ => return Err(invalid()),
        };
        Ok(value)
    }
}

/// One constant storage entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstEntry {
    /// Field name key, `Class.name`
    pub name: String,
    /// Typed value
    pub value: ConstantValue,
}

/// Ordered constant storage block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstStorageImage {
    /// Entries in stream order
    pub entries: Vec<ConstEntry>,
}

impl ConstStorageImage {
    /// Append an entry
    pub fn push(&mut self, name: impl Into<String>, value: ConstantValue) {
        self.entries.push(ConstEntry {
            name: name.into(),
            value,
        });
    }

    /// Decode the block contents (without its length prefix)
    pub fn decode(block: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(block);
        // type code plus two string prefixes
        let count = reader.read_count(12)?;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let code = TypeCode::from_i32(reader.read_i32()?)?;
            let name = reader.read_string()?;
            let text = reader.read_string()?;
            let value = ConstantValue::parse(code, &name, &text)?;
            entries.push(ConstEntry { name, value });
        }
        Ok(Self { entries })
    }

    /// Encode the block contents (without its length prefix)
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = ByteWriter::new();
        writer.write_len(self.entries.len())?;
        for entry in &self.entries {
            writer.write_i32(entry.value.type_code() as i32);
            writer.write_string(&entry.name)?;
            writer.write_string(&entry.value.to_text())?;
        }
        Ok(writer.into_bytes())
    }
}
