//! Unpacking of custom GATT characteristic payloads.
//!
//! Formats use the familiar `struct` module notation: an optional byte-order
//! marker followed by format codes with optional repeat counts, e.g. `">3f"`.
//! A marker may appear anywhere and starts a new segment, so one payload can
//! mix big-endian and little-endian fields: `">2h<I"`.
//!
//! Sizes are always the standard ones and no alignment padding is inserted,
//! whatever the marker. `n` and `N` take the host pointer width.
//!
//! A format without a leading marker, and the `@` marker, behave like `=`:
//! host byte order with standard sizes. This differs from Python's native
//! mode, where `"bi"` is padded to 8 bytes and `l` is 8 bytes wide on LP64
//! hosts; such formats should spell out `<`, `>` or `=` to be portable.

use core::fmt;

use bytes::Buf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

/// Largest payload a format may describe. GATT attribute values are capped
/// at 512 bytes.
const MAX_PAYLOAD: usize = 512;

/// Byte order of one format segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    fn from_marker(marker: char) -> Option<Self> {
        match marker {
            '@' | '=' => Some(Self::native()),
            '<' => Some(ByteOrder::Little),
            '>' | '!' => Some(ByteOrder::Big),
            _ => None,
        }
    }
}

/// A single scalar field kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Pad,
    Char,
    I8,
    U8,
    Bool,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    ISize,
    USize,
    F16,
    F32,
    F64,
}

impl Field {
    fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'x' => Field::Pad,
            'c' => Field::Char,
            'b' => Field::I8,
            'B' => Field::U8,
            '?' => Field::Bool,
            'h' => Field::I16,
            'H' => Field::U16,
            'i' | 'l' => Field::I32,
            'I' | 'L' => Field::U32,
            'q' => Field::I64,
            'Q' => Field::U64,
            'n' => Field::ISize,
            'N' => Field::USize,
            'e' => Field::F16,
            'f' => Field::F32,
            'd' => Field::F64,
            _ => return None,
        })
    }

    fn size(self) -> usize {
        match self {
            Field::Pad | Field::Char | Field::I8 | Field::U8 | Field::Bool => 1,
            Field::I16 | Field::U16 | Field::F16 => 2,
            Field::I32 | Field::U32 | Field::F32 => 4,
            Field::I64 | Field::U64 | Field::F64 => 8,
            Field::ISize | Field::USize => size_of::<usize>(),
        }
    }
}

/// One unpacked scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum CustomValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl CustomValue {
    /// Numeric value as `f64`; booleans map to `0.0` / `1.0`.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match *self {
            CustomValue::Int(v) => v as f64,
            CustomValue::UInt(v) => v as f64,
            CustomValue::Float(v) => v,
            CustomValue::Bool(v) => f64::from(u8::from(v)),
        }
    }
}

impl fmt::Display for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomValue::Int(v) => write!(f, "{v}"),
            CustomValue::UInt(v) => write!(f, "{v}"),
            CustomValue::Float(v) => write!(f, "{v}"),
            CustomValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    order: ByteOrder,
    /// Field kinds with their repeat counts.
    fields: Vec<(Field, usize)>,
}

impl Segment {
    fn width(&self) -> usize {
        self.fields.iter().map(|(f, n)| f.size() * n).sum()
    }
}

/// A parsed custom characteristic format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomDataFormat {
    source: String,
    segments: Vec<Segment>,
}

impl CustomDataFormat {
    /// Parse a format string.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidFormat`] for unknown codes, a dangling
    /// repeat count, or a format wider than a GATT attribute value.
    pub fn parse(format: &str) -> ParseResult<Self> {
        let invalid = |reason: String| ParseError::InvalidFormat {
            format: format.to_string(),
            reason,
        };

        let mut segments: Vec<Segment> = Vec::new();
        let mut current = Segment {
            order: ByteOrder::native(),
            fields: Vec::new(),
        };
        let mut count: Option<usize> = None;
        let mut width = 0usize;

        for ch in format.chars() {
            if ch.is_whitespace() {
                if count.is_some() {
                    return Err(invalid("whitespace after repeat count".into()));
                }
                continue;
            }

            if let Some(order) = ByteOrder::from_marker(ch) {
                if count.is_some() {
                    return Err(invalid(format!("repeat count before marker '{ch}'")));
                }
                if !current.fields.is_empty() {
                    segments.push(current);
                }
                current = Segment {
                    order,
                    fields: Vec::new(),
                };
                continue;
            }

            if let Some(digit) = ch.to_digit(10) {
                let next = count
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|c| c.checked_add(digit as usize))
                    .ok_or_else(|| invalid("repeat count overflow".into()))?;
                count = Some(next);
                continue;
            }

            let field =
                Field::from_code(ch).ok_or_else(|| invalid(format!("unknown format code '{ch}'")))?;
            let repeat = count.take().unwrap_or(1);
            width = repeat
                .checked_mul(field.size())
                .and_then(|w| w.checked_add(width))
                .filter(|w| *w <= MAX_PAYLOAD)
                .ok_or_else(|| invalid("format exceeds maximum payload size".into()))?;
            if repeat > 0 {
                current.fields.push((field, repeat));
            }
        }

        if count.is_some() {
            return Err(invalid("repeat count without format code".into()));
        }
        if !current.fields.is_empty() {
            segments.push(current);
        }

        Ok(Self {
            source: format.to_string(),
            segments,
        })
    }

    /// The format string this was parsed from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Total payload size in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.segments.iter().map(Segment::width).sum()
    }

    /// Unpack a payload into a flat list of scalars, segment by segment.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::LengthMismatch`] unless the payload is exactly
    /// [`byte_len`](Self::byte_len) bytes long.
    pub fn unpack(&self, data: &[u8]) -> ParseResult<Vec<CustomValue>> {
        let expected = self.byte_len();
        if data.len() != expected {
            return Err(ParseError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }

        let mut buf = data;
        let mut values = Vec::new();
        for segment in &self.segments {
            for &(field, repeat) in &segment.fields {
                for _ in 0..repeat {
                    if let Some(value) = read_field(&mut buf, field, segment.order) {
                        values.push(value);
                    }
                }
            }
        }
        Ok(values)
    }
}

impl fmt::Display for CustomDataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl core::str::FromStr for CustomDataFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Read one field. The caller has already checked the total length.
fn read_field(buf: &mut &[u8], field: Field, order: ByteOrder) -> Option<CustomValue> {
    let le = order == ByteOrder::Little;
    let value = match field {
        Field::Pad => {
            buf.advance(1);
            return None;
        }
        Field::Char | Field::U8 => CustomValue::UInt(u64::from(buf.get_u8())),
        Field::I8 => CustomValue::Int(i64::from(buf.get_i8())),
        Field::Bool => CustomValue::Bool(buf.get_u8() != 0),
        Field::I16 => CustomValue::Int(i64::from(if le { buf.get_i16_le() } else { buf.get_i16() })),
        Field::U16 => CustomValue::UInt(u64::from(if le { buf.get_u16_le() } else { buf.get_u16() })),
        Field::I32 => CustomValue::Int(i64::from(if le { buf.get_i32_le() } else { buf.get_i32() })),
        Field::U32 => CustomValue::UInt(u64::from(if le { buf.get_u32_le() } else { buf.get_u32() })),
        Field::I64 => CustomValue::Int(if le { buf.get_i64_le() } else { buf.get_i64() }),
        Field::U64 => CustomValue::UInt(if le { buf.get_u64_le() } else { buf.get_u64() }),
        Field::ISize => {
            let n = size_of::<usize>();
            CustomValue::Int(if le { buf.get_int_le(n) } else { buf.get_int(n) })
        }
        Field::USize => {
            let n = size_of::<usize>();
            CustomValue::UInt(if le { buf.get_uint_le(n) } else { buf.get_uint(n) })
        }
        Field::F16 => {
            let bits = if le { buf.get_u16_le() } else { buf.get_u16() };
            CustomValue::Float(f64::from(f16_to_f32(bits)))
        }
        Field::F32 => CustomValue::Float(f64::from(if le { buf.get_f32_le() } else { buf.get_f32() })),
        Field::F64 => CustomValue::Float(if le { buf.get_f64_le() } else { buf.get_f64() }),
    };
    Some(value)
}

/// IEEE 754 half precision to single precision.
fn f16_to_f32(bits: u16) -> f32 {
    let sign = u32::from(bits >> 15) << 31;
    let exp = u32::from((bits >> 10) & 0x1f);
    let mant = u32::from(bits & 0x3ff);

    let out = match (exp, mant) {
        (0, 0) => sign,
        (0, _) => {
            // Subnormal: renormalize.
            let mut e: i32 = -14;
            let mut m = mant;
            while m & 0x400 == 0 {
                m <<= 1;
                e -= 1;
            }
            let m = m & 0x3ff;
            sign | (((e + 127) as u32) << 23) | (m << 13)
        }
        (0x1f, 0) => sign | 0x7f80_0000,
        (0x1f, _) => sign | 0x7fc0_0000 | (mant << 13),
        _ => sign | ((exp + 112) << 23) | (mant << 13),
    };
    f32::from_bits(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_three_floats() {
        let format = CustomDataFormat::parse(">3f").unwrap();
        assert_eq!(format.byte_len(), 12);
        assert_eq!(format.as_str(), ">3f");
    }

    #[test]
    fn test_unpack_big_endian_floats() {
        let format = CustomDataFormat::parse(">3f").unwrap();
        let mut data = Vec::new();
        for v in [1.0f32, -2.5, 100.0] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        let values = format.unpack(&data).unwrap();
        assert_eq!(
            values,
            vec![
                CustomValue::Float(1.0),
                CustomValue::Float(-2.5),
                CustomValue::Float(100.0)
            ]
        );
    }

    #[test]
    fn test_unpack_mixed_endianness() {
        let format = CustomDataFormat::parse(">h<H").unwrap();
        let data = [0x01, 0x02, 0x01, 0x02];
        let values = format.unpack(&data).unwrap();
        assert_eq!(values, vec![CustomValue::Int(0x0102), CustomValue::UInt(0x0201)]);
    }

    #[test]
    fn test_unpack_without_marker_uses_native_order() {
        let format = CustomDataFormat::parse("I").unwrap();
        let values = format.unpack(&7u32.to_ne_bytes()).unwrap();
        assert_eq!(values, vec![CustomValue::UInt(7)]);
    }

    #[test]
    fn test_native_mode_has_no_alignment() {
        let bare = CustomDataFormat::parse("bil").unwrap();
        let native = CustomDataFormat::parse("@bil").unwrap();
        let standard = CustomDataFormat::parse("=bil").unwrap();
        assert_eq!(bare.byte_len(), 9);
        assert_eq!(native.byte_len(), 9);
        assert_eq!(standard.byte_len(), 9);

        let mut data = vec![0xFFu8];
        data.extend_from_slice(&5i32.to_ne_bytes());
        data.extend_from_slice(&(-6i32).to_ne_bytes());
        let expected = vec![
            CustomValue::Int(-1),
            CustomValue::Int(5),
            CustomValue::Int(-6),
        ];
        assert_eq!(bare.unpack(&data).unwrap(), expected);
        assert_eq!(native.unpack(&data).unwrap(), expected);
    }

    #[test]
    fn test_pad_bytes_are_skipped() {
        let format = CustomDataFormat::parse("<B2xb").unwrap();
        assert_eq!(format.byte_len(), 4);
        let values = format.unpack(&[5, 0xAA, 0xBB, 0xFF]).unwrap();
        assert_eq!(values, vec![CustomValue::UInt(5), CustomValue::Int(-1)]);
    }

    #[test]
    fn test_bool_and_long_codes() {
        let format = CustomDataFormat::parse("!?q").unwrap();
        let mut data = vec![2u8];
        data.extend_from_slice(&(-3i64).to_be_bytes());
        let values = format.unpack(&data).unwrap();
        assert_eq!(values, vec![CustomValue::Bool(true), CustomValue::Int(-3)]);
    }

    #[test]
    fn test_half_float() {
        let format = CustomDataFormat::parse("<3e").unwrap();
        // 1.0, -2.0, 65504 (max half)
        let data = [0x00, 0x3c, 0x00, 0xc0, 0xff, 0x7b];
        let values = format.unpack(&data).unwrap();
        assert_eq!(
            values,
            vec![
                CustomValue::Float(1.0),
                CustomValue::Float(-2.0),
                CustomValue::Float(65504.0)
            ]
        );
    }

    #[test]
    fn test_half_float_subnormal_and_specials() {
        assert_eq!(f16_to_f32(0x0001), 2.0f32.powi(-24));
        assert!(f16_to_f32(0x7c00).is_infinite());
        assert!(f16_to_f32(0x7e00).is_nan());
        assert_eq!(f16_to_f32(0x8000), -0.0);
    }

    #[test]
    fn test_whitespace_between_codes() {
        let format = CustomDataFormat::parse("> h h").unwrap();
        assert_eq!(format.byte_len(), 4);
    }

    #[test]
    fn test_unknown_code_rejected() {
        let err = CustomDataFormat::parse(">3z").unwrap_err();
        assert!(matches!(err, ParseError::InvalidFormat { .. }));
        assert!(err.to_string().contains("'z'"));
    }

    #[test]
    fn test_dangling_count_rejected() {
        assert!(CustomDataFormat::parse("<f3").is_err());
        assert!(CustomDataFormat::parse("3<f").is_err());
    }

    #[test]
    fn test_length_mismatch() {
        let format = CustomDataFormat::parse(">3f").unwrap();
        let err = format.unpack(&[0; 11]).unwrap_err();
        assert!(matches!(
            err,
            ParseError::LengthMismatch {
                expected: 12,
                actual: 11
            }
        ));
        assert!(format.unpack(&[0; 13]).is_err());
    }

    #[test]
    fn test_empty_format() {
        let format = CustomDataFormat::parse("<").unwrap();
        assert_eq!(format.byte_len(), 0);
        assert_eq!(format.unpack(&[]).unwrap(), vec![]);
    }

    #[test]
    fn test_oversized_format_rejected() {
        assert!(CustomDataFormat::parse("<128f").is_ok());
        assert!(CustomDataFormat::parse("<129f").is_err());
        assert!(CustomDataFormat::parse("99999999999999999999d").is_err());
    }

    #[test]
    fn test_zero_repeat_count() {
        let format = CustomDataFormat::parse("<0hB").unwrap();
        assert_eq!(format.byte_len(), 1);
        assert_eq!(format.unpack(&[9]).unwrap(), vec![CustomValue::UInt(9)]);
    }

    #[test]
    fn test_from_str() {
        let format: CustomDataFormat = "<2H".parse().unwrap();
        assert_eq!(format.to_string(), "<2H");
    }

    proptest! {
        #[test]
        fn unpack_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let format = CustomDataFormat::parse("<hH>iIqQ!e?bBx").unwrap();
            let result = format.unpack(&data);
            prop_assert_eq!(result.is_ok(), data.len() == format.byte_len());
        }

        #[test]
        fn parse_never_panics(s in "[@=<>!0-9xcbB?hHiIlLqQnNefdz ]{0,16}") {
            let _ = CustomDataFormat::parse(&s);
        }

        #[test]
        fn value_count_matches_non_pad_fields(n in 1usize..20, pad in 0usize..5) {
            let format = CustomDataFormat::parse(&format!("<{n}h{pad}x")).unwrap();
            let values = format.unpack(&vec![0u8; format.byte_len()]).unwrap();
            prop_assert_eq!(values.len(), n);
        }
    }
}
