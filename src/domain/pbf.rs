//! Protobuf wire-format reader
//!
//! A schema-less field iterator over a byte slice. Every decoded field records
//! how many bytes it occupied (key + payload), which is what size accounting
//! is built on.

use crate::domain::DomainError;

/// Longest legal varint encoding of a 64-bit value.
const MAX_VARINT_LEN: usize = 10;

/// Protobuf wire types. Groups (3, 4) are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint,
    Bits64,
    LengthDelimited,
    Bits32,
}

impl WireType {
    pub fn from_key(key: u64) -> Result<Self, DomainError> {
        match key & 7 {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Bits64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Bits32),
            other => Err(DomainError::UnsupportedWireType(other as u8)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WireType::Varint => "varint",
            WireType::Bits64 => "64-bit",
            WireType::LengthDelimited => "length-delimited",
            WireType::Bits32 => "32-bit",
        }
    }
}

/// Interpret the low `bits` of `x` as a two's complement signed integer.
pub fn twos_complement(x: u64, bits: u32) -> i64 {
    if bits >= 64 {
        return x as i64;
    }
    let x = x & ((1u64 << bits) - 1);
    if x >= 1u64 << (bits - 1) {
        x as i64 - (1i64 << bits)
    } else {
        x as i64
    }
}

/// Decode a zigzag-encoded signed integer.
pub fn zigzag(x: u64) -> i64 {
    ((x >> 1) as i64) ^ -((x & 1) as i64)
}

/// Cursor over a PBF buffer.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn varint(&mut self) -> Result<u64, DomainError> {
        let start = self.pos;
        let mut value = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let b = self.byte()?;
            value |= u64::from(b & 0x7f) << (7 * i);
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(DomainError::VarintOverflow(start))
    }

    pub fn bytes(&mut self, num_bytes: usize) -> Result<&'a [u8], DomainError> {
        let end = self.buf.len();
        if num_bytes > end - self.pos {
            return Err(DomainError::UnexpectedEof {
                pos: self.pos,
                wanted: num_bytes,
                end,
            });
        }
        let slice = &self.buf[self.pos..self.pos + num_bytes];
        self.pos += num_bytes;
        Ok(slice)
    }

    pub fn byte(&mut self) -> Result<u8, DomainError> {
        let b = *self.buf.get(self.pos).ok_or(DomainError::UnexpectedEof {
            pos: self.pos,
            wanted: 1,
            end: self.buf.len(),
        })?;
        self.pos += 1;
        Ok(b)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DomainError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn value(&mut self, wire_type: WireType) -> Result<FieldValue<'a>, DomainError> {
        Ok(match wire_type {
            WireType::Varint => FieldValue::Varint(self.varint()?),
            WireType::Bits64 => FieldValue::Bits64(self.array()?),
            WireType::LengthDelimited => {
                let len = usize::try_from(self.varint()?).map_err(|_| {
                    DomainError::InvalidValue("length prefix does not fit in memory".into())
                })?;
                FieldValue::LengthDelimited(self.bytes(len)?)
            }
            WireType::Bits32 => FieldValue::Bits32(self.array()?),
        })
    }
}

/// Raw payload of a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Varint(u64),
    Bits64([u8; 8]),
    LengthDelimited(&'a [u8]),
    Bits32([u8; 4]),
}

impl FieldValue<'_> {
    pub fn wire_type(&self) -> WireType {
        match self {
            FieldValue::Varint(_) => WireType::Varint,
            FieldValue::Bits64(_) => WireType::Bits64,
            FieldValue::LengthDelimited(_) => WireType::LengthDelimited,
            FieldValue::Bits32(_) => WireType::Bits32,
        }
    }
}

/// A decoded field with the number of bytes it occupied in its message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field<'a> {
    pub tag: u32,
    pub value: FieldValue<'a>,
    pub size: usize,
}

impl<'a> Field<'a> {
    fn mismatch(&self, expected: WireType) -> DomainError {
        DomainError::WireTypeMismatch {
            tag: self.tag,
            expected: expected.name(),
            actual: self.value.wire_type().name(),
        }
    }

    fn varint(&self) -> Result<u64, DomainError> {
        match self.value {
            FieldValue::Varint(v) => Ok(v),
            _ => Err(self.mismatch(WireType::Varint)),
        }
    }

    fn bits64(&self) -> Result<[u8; 8], DomainError> {
        match self.value {
            FieldValue::Bits64(b) => Ok(b),
            _ => Err(self.mismatch(WireType::Bits64)),
        }
    }

    fn bits32(&self) -> Result<[u8; 4], DomainError> {
        match self.value {
            FieldValue::Bits32(b) => Ok(b),
            _ => Err(self.mismatch(WireType::Bits32)),
        }
    }

    pub fn as_uint32(&self) -> Result<u32, DomainError> {
        Ok(self.varint()? as u32)
    }

    pub fn as_uint64(&self) -> Result<u64, DomainError> {
        self.varint()
    }

    pub fn as_int32(&self) -> Result<i32, DomainError> {
        Ok(twos_complement(self.varint()?, 32) as i32)
    }

    pub fn as_int64(&self) -> Result<i64, DomainError> {
        Ok(twos_complement(self.varint()?, 64))
    }

    pub fn as_sint32(&self) -> Result<i32, DomainError> {
        Ok(zigzag(self.varint()?) as i32)
    }

    pub fn as_sint64(&self) -> Result<i64, DomainError> {
        Ok(zigzag(self.varint()?))
    }

    pub fn as_bool(&self) -> Result<bool, DomainError> {
        Ok(self.varint()? != 0)
    }

    pub fn as_fixed64(&self) -> Result<u64, DomainError> {
        Ok(u64::from_le_bytes(self.bits64()?))
    }

    pub fn as_sfixed64(&self) -> Result<i64, DomainError> {
        Ok(i64::from_le_bytes(self.bits64()?))
    }

    pub fn as_double(&self) -> Result<f64, DomainError> {
        Ok(f64::from_le_bytes(self.bits64()?))
    }

    pub fn as_fixed32(&self) -> Result<u32, DomainError> {
        Ok(u32::from_le_bytes(self.bits32()?))
    }

    pub fn as_sfixed32(&self) -> Result<i32, DomainError> {
        Ok(i32::from_le_bytes(self.bits32()?))
    }

    pub fn as_float(&self) -> Result<f32, DomainError> {
        Ok(f32::from_le_bytes(self.bits32()?))
    }

    pub fn as_bytes(&self) -> Result<&'a [u8], DomainError> {
        match self.value {
            FieldValue::LengthDelimited(b) => Ok(b),
            _ => Err(self.mismatch(WireType::LengthDelimited)),
        }
    }

    pub fn as_str(&self) -> Result<&'a str, DomainError> {
        std::str::from_utf8(self.as_bytes()?).map_err(|_| DomainError::InvalidUtf8(self.tag))
    }

    /// Iterate the packed repeated values carried by a length-delimited field.
    pub fn packed(&self, wire_type: WireType) -> Result<Packed<'a>, DomainError> {
        if wire_type == WireType::LengthDelimited {
            return Err(DomainError::PackedLengthDelimited);
        }
        Ok(Packed {
            decoder: Decoder::new(self.as_bytes()?),
            tag: self.tag,
            wire_type,
        })
    }
}

/// Iterator over packed repeated values; each item is a synthetic field.
#[derive(Debug, Clone)]
pub struct Packed<'a> {
    decoder: Decoder<'a>,
    tag: u32,
    wire_type: WireType,
}

impl<'a> Iterator for Packed<'a> {
    type Item = Result<Field<'a>, DomainError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.decoder.is_empty() {
            return None;
        }
        let start = self.decoder.pos();
        Some(self.decoder.value(self.wire_type).map(|value| Field {
            tag: self.tag,
            value,
            size: self.decoder.pos() - start,
        }))
    }
}

/// Iterator over the fields of a message.
///
/// After the first error the iterator is exhausted.
#[derive(Debug, Clone)]
pub struct Message<'a> {
    decoder: Decoder<'a>,
    failed: bool,
}

impl<'a> Message<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            decoder: Decoder::new(buf),
            failed: false,
        }
    }

    fn read_field(&mut self) -> Result<Field<'a>, DomainError> {
        let start = self.decoder.pos();
        let key = self.decoder.varint()?;
        let wire_type = WireType::from_key(key)?;
        let tag = u32::try_from(key >> 3)
            .map_err(|_| DomainError::InvalidValue(format!("field tag {} too large", key >> 3)))?;
        let value = self.decoder.value(wire_type)?;
        Ok(Field {
            tag,
            value,
            size: self.decoder.pos() - start,
        })
    }
}

impl<'a> Iterator for Message<'a> {
    type Item = Result<Field<'a>, DomainError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.decoder.is_empty() {
            return None;
        }
        let field = self.read_field();
        self.failed = field.is_err();
        Some(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn given_varint_field_when_decoding_then_reads_uint32() {
        let mut msg = Message::new(b"\x08\x96\x01");
        let field = msg.next().unwrap().unwrap();
        assert_eq!(field.tag, 1);
        assert_eq!(field.value.wire_type(), WireType::Varint);
        assert_eq!(field.as_uint32().unwrap(), 150);
        assert_eq!(field.size, 3);
        assert!(msg.next().is_none());
    }

    #[test]
    fn given_string_field_when_decoding_then_reads_str() {
        let mut msg = Message::new(b"\x12\x07\x74\x65\x73\x74\x69\x6e\x67");
        let field = msg.next().unwrap().unwrap();
        assert_eq!(field.tag, 2);
        assert_eq!(field.as_str().unwrap(), "testing");
        assert_eq!(field.size, 9);
    }

    #[test]
    fn given_packed_field_when_iterating_then_yields_values() {
        let mut msg = Message::new(b"\x22\x06\x03\x8e\x02\x9e\xa7\x05");
        let field = msg.next().unwrap().unwrap();
        assert_eq!(field.tag, 4);
        let values: Vec<u32> = field
            .packed(WireType::Varint)
            .unwrap()
            .map(|f| f.and_then(|f| f.as_uint32()).unwrap())
            .collect();
        assert_eq!(values, vec![3, 270, 86942]);
    }

    #[test]
    fn given_packed_request_for_length_delimited_then_errors() {
        let mut msg = Message::new(b"\x22\x01\x03");
        let field = msg.next().unwrap().unwrap();
        assert_eq!(
            field.packed(WireType::LengthDelimited).unwrap_err(),
            DomainError::PackedLengthDelimited
        );
    }

    #[test]
    fn given_zigzag_varint_when_decoding_then_reads_sint32() {
        let field = Message::new(b"\x08\x03").next().unwrap().unwrap();
        assert_eq!(field.as_sint32().unwrap(), -2);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(-1, 1)]
    #[case(1, 2)]
    #[case(-2, 3)]
    #[case(2147483647, 4294967294)]
    #[case(-2147483648, 4294967295)]
    fn test_zigzag(#[case] decoded: i64, #[case] encoded: u64) {
        assert_eq!(zigzag(encoded), decoded);
    }

    #[rstest]
    #[case(0, 0, 32)]
    #[case(1, 1, 32)]
    #[case(2, 2, 32)]
    #[case(-1, 4294967295, 32)]
    #[case(-2, 4294967294, 32)]
    #[case(-1, u64::MAX, 64)]
    fn test_twos_complement(#[case] decoded: i64, #[case] encoded: u64, #[case] bits: u32) {
        assert_eq!(twos_complement(encoded, bits), decoded);
    }

    #[test]
    fn given_bits64_field_when_decoding_then_reads_double() {
        let field = Message::new(b"\x09\x18\x2d\x44\x54\xfb\x21\x09\x40")
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(field.value.wire_type(), WireType::Bits64);
        assert!((field.as_double().unwrap() - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn given_bits32_field_when_decoding_then_reads_float() {
        let field = Message::new(b"\x0d\xdb\x0f\x49\x40").next().unwrap().unwrap();
        assert_eq!(field.value.wire_type(), WireType::Bits32);
        assert!((field.as_float().unwrap() - std::f32::consts::PI).abs() < 1e-5);
    }

    #[test]
    fn given_truncated_string_when_decoding_then_reports_eof() {
        let mut msg = Message::new(b"\x12\x07\x74\x65");
        let err = msg.next().unwrap().unwrap_err();
        assert_eq!(
            err,
            DomainError::UnexpectedEof {
                pos: 2,
                wanted: 7,
                end: 4
            }
        );
        assert!(msg.next().is_none(), "iteration stops after an error");
    }

    #[test]
    fn given_group_wire_type_when_decoding_then_errors() {
        let err = Message::new(b"\x0b").next().unwrap().unwrap_err();
        assert_eq!(err, DomainError::UnsupportedWireType(3));
    }

    #[test]
    fn given_overlong_varint_when_decoding_then_errors() {
        let data = [0xffu8; 11];
        let err = Decoder::new(&data).varint().unwrap_err();
        assert_eq!(err, DomainError::VarintOverflow(0));
    }

    #[test]
    fn given_wrong_accessor_when_reading_then_reports_mismatch() {
        let field = Message::new(b"\x08\x01").next().unwrap().unwrap();
        assert!(matches!(
            field.as_str(),
            Err(DomainError::WireTypeMismatch { tag: 1, .. })
        ));
    }
}
