//! Method blocks and IL bodies

use serde::{Deserialize, Serialize};

use crate::PROTECTED_ZONE_MAGIC;
use crate::class::ComplexType;
use crate::error::Result;
use crate::reader::ByteReader;
use crate::writer::ByteWriter;

/// Declared method argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentDecl {
    /// Index into the string table
    pub name: i32,
    /// Argument type
    pub ty: ComplexType,
}

impl ArgumentDecl {
    pub(crate) fn read_list(reader: &mut ByteReader<'_>) -> Result<Vec<Self>> {
        let count = reader.read_count(4 + ComplexType::SIZE)?;
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            let name = reader.read_i32()?;
            let ty = ComplexType::read(reader)?;
            args.push(Self { name, ty });
        }
        Ok(args)
    }

    pub(crate) fn write_list(args: &[Self], writer: &mut ByteWriter) -> Result<()> {
        writer.write_len(args.len())?;
        for arg in args {
            writer.write_i32(arg.name);
            arg.ty.write(writer);
        }
        Ok(())
    }
}

/// A method block as stored inside a class body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodBody {
    /// Index into the string table
    pub name: i32,
    /// Raw method flags
    pub flags: i16,
    /// Maximum evaluation stack depth
    pub stack_size: u8,
    /// Number of locals
    pub locals: u8,
    /// Return type
    pub return_type: ComplexType,
    /// Arguments in declaration order
    pub arguments: Vec<ArgumentDecl>,
    /// Encoded IL, decoded with [`IlBody::decode`]
    pub body: Vec<u8>,
}

impl MethodBody {
    /// Decode a raw method block
    pub fn decode(block: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(block);
        let name = reader.read_i32()?;
        let flags = reader.read_i16()?;
        let body_size = reader.read_len()?;
        let stack_size = reader.read_u8()?;
        let locals = reader.read_u8()?;
        let return_type = ComplexType::read(&mut reader)?;
        let arguments = ArgumentDecl::read_list(&mut reader)?;
        let body = reader.read_bytes(body_size)?.to_vec();
        Ok(Self {
            name,
            flags,
            stack_size,
            locals,
            return_type,
            arguments,
            body,
        })
    }

    /// Encode as a raw method block
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = ByteWriter::new();
        writer.write_i32(self.name);
        writer.write_i16(self.flags);
        writer.write_len(self.body.len())?;
        writer.write_u8(self.stack_size);
        writer.write_u8(self.locals);
        self.return_type.write(&mut writer);
        ArgumentDecl::write_list(&self.arguments, &mut writer)?;
        writer.write_bytes(&self.body);
        Ok(writer.into_bytes())
    }
}

/// Label map entry: label key to instruction position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEntry {
    /// Label key
    pub key: i32,
    /// Word offset of the target instruction
    pub position: i32,
    /// Opcode at the target
    pub opcode: u16,
}

/// Try/catch/filter region of a method body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedZone {
    /// First covered instruction address
    pub start_address: i32,
    /// Label ending the try block
    pub try_end_label: i32,
    /// Address after the last handler
    pub end_address: i32,
    /// Filter entry addresses
    pub filter_addresses: Vec<i32>,
    /// Catch entry addresses
    pub catch_addresses: Vec<i32>,
    /// Caught type indices, parallel to `catch_addresses`
    pub catch_types: Vec<i32>,
    /// Handler kinds, parallel to `catch_addresses`
    pub kinds: Vec<u8>,
}

/// Decoded IL: code words, labels and the optional protected-zone trailer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IlBody {
    /// Instruction stream
    pub code: Vec<u32>,
    /// Label table
    pub labels: Vec<i32>,
    /// Label map
    pub label_map: Vec<LabelEntry>,
    /// Exception regions
    pub zones: Vec<ProtectedZone>,
}

impl IlBody {
    /// Decode an IL body
    pub fn decode(body: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(body);

        let word_count = reader.read_count(4)?;
        let code = (0..word_count)
            .map(|_| reader.read_u32())
            .collect::<Result<Vec<_>>>()?;

        let labels = reader.read_int_array()?;

        // key, position, opcode
        let map_count = reader.read_count(10)?;
        let mut label_map = Vec::with_capacity(map_count);
        for _ in 0..map_count {
            label_map.push(LabelEntry {
                key: reader.read_i32()?,
                position: reader.read_i32()?,
                opcode: reader.read_u16()?,
            });
        }

        // A trailer that does not open with the magic is not a zone table.
        let mut zones = Vec::new();
        if reader.remaining() >= 2 && reader.peek_i16()? == PROTECTED_ZONE_MAGIC {
            reader.read_i16()?;
            // three addresses and four array prefixes
            let zone_count = reader.read_count(28)?;
            for _ in 0..zone_count {
                zones.push(ProtectedZone {
                    start_address: reader.read_i32()?,
                    try_end_label: reader.read_i32()?,
                    end_address: reader.read_i32()?,
                    filter_addresses: reader.read_int_array()?,
                    catch_addresses: reader.read_int_array()?,
                    catch_types: reader.read_int_array()?,
                    kinds: reader.read_byte_array()?,
                });
            }
        }

        tracing::trace!(
            words = code.len(),
            labels = labels.len(),
            zones = zones.len(),
            "decoded il body"
        );

        Ok(Self {
            code,
            labels,
            label_map,
            zones,
        })
    }

    /// Encode; the trailer is written only when zones are present
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = ByteWriter::new();
        writer.write_len(self.code.len())?;
        for word in &self.code {
            writer.write_u32(*word);
        }
        writer.write_int_array(&self.labels)?;
        writer.write_len(self.label_map.len())?;
        for entry in &self.label_map {
            writer.write_i32(entry.key);
            writer.write_i32(entry.position);
            writer.write_u16(entry.opcode);
        }
        if !self.zones.is_empty() {
            writer.write_i16(PROTECTED_ZONE_MAGIC);
            writer.write_len(self.zones.len())?;
            for zone in &self.zones {
                writer.write_i32(zone.start_address);
                writer.write_i32(zone.try_end_label);
                writer.write_i32(zone.end_address);
                writer.write_int_array(&zone.filter_addresses)?;
                writer.write_int_array(&zone.catch_addresses)?;
                writer.write_int_array(&zone.catch_types)?;
                writer.write_byte_array(&zone.kinds)?;
            }
        }
        Ok(writer.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BytecodeError;

    #[test]
    fn test_foreign_trailer_means_no_zones() {
        let mut body = IlBody {
            code: vec![1, 2],
            ..IlBody::default()
        }
        .encode()
        .unwrap();
        body.extend_from_slice(&0x0101i16.to_le_bytes());
        let decoded = IlBody::decode(&body).unwrap();
        assert!(decoded.zones.is_empty());
        assert_eq!(decoded.code, vec![1, 2]);
    }

    #[test]
    fn test_huge_zone_count_rejected() {
        let mut body = IlBody::default().encode().unwrap();
        body.extend_from_slice(&PROTECTED_ZONE_MAGIC.to_le_bytes());
        body.extend_from_slice(&i32::MAX.to_le_bytes());
        assert!(matches!(
            IlBody::decode(&body),
            Err(BytecodeError::CountOverflow { .. })
        ));
    }

    #[test]
    fn test_trailer_is_optional() {
        let body = IlBody {
            code: vec![7],
            labels: vec![0],
            ..IlBody::default()
        };
        let decoded = IlBody::decode(&body.encode().unwrap()).unwrap();
        assert!(decoded.zones.is_empty());
        assert_eq!(decoded.code, vec![7]);
    }
}
