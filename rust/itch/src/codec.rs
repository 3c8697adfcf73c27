//! Decoding and encoding of individual ITCH fields.
//!
//! All integers are big-endian. Typed message structs read their fields through
//! the [`Field`] trait, while [`decode_field()`] and [`encode_field()`] work from
//! a runtime [`FieldSpec`] alone.
use std::{fmt, str::FromStr};

use crate::{
    catalog::{FieldKind, FieldSpec, MessageSpec},
    enums::{Code, Coded},
    Error, Result, PRICE4_SCALE, PRICE8_SCALE,
};

/// A value with a fixed wire representation.
pub trait Field: Copy {
    /// The wire representation, which also fixes the width.
    const KIND: FieldKind;

    /// Decodes the value from `src`, which is exactly `KIND.width()` bytes long.
    fn decode(src: &[u8]) -> Self;

    /// Encodes the value into `dst`, which is exactly `KIND.width()` bytes long.
    fn encode(&self, dst: &mut [u8]);

    /// Returns the raw byte if this is an enumerated value that didn't map.
    fn invalid_byte(&self) -> Option<u8> {
        None
    }
}

/// Reads a big-endian unsigned integer from all of `src`. `src` must be at most 8
/// bytes long; a 6-byte timestamp decodes with the top 16 bits zero.
pub fn read_uint(src: &[u8]) -> u64 {
    src.iter().fold(0, |acc, &byte| (acc << 8) | u64::from(byte))
}

/// Writes the low `dst.len()` bytes of `value` to `dst` in big-endian order.
pub fn write_uint(value: u64, dst: &mut [u8]) {
    let len = dst.len();
    for (i, byte) in dst.iter_mut().enumerate() {
        *byte = (value >> (8 * (len - 1 - i))) as u8;
    }
}

impl Field for u16 {
    const KIND: FieldKind = FieldKind::UInt(2);

    fn decode(src: &[u8]) -> Self {
        u16::from_be_bytes([src[0], src[1]])
    }

    fn encode(&self, dst: &mut [u8]) {
        dst.copy_from_slice(&self.to_be_bytes());
    }
}

impl Field for u32 {
    const KIND: FieldKind = FieldKind::UInt(4);

    fn decode(src: &[u8]) -> Self {
        read_uint(&src[..4]) as u32
    }

    fn encode(&self, dst: &mut [u8]) {
        dst.copy_from_slice(&self.to_be_bytes());
    }
}

impl Field for u64 {
    const KIND: FieldKind = FieldKind::UInt(8);

    fn decode(src: &[u8]) -> Self {
        read_uint(&src[..8])
    }

    fn encode(&self, dst: &mut [u8]) {
        dst.copy_from_slice(&self.to_be_bytes());
    }
}

/// A price with 4 implied decimal places, e.g. a raw value of `1_500_000` is
/// `150.0000`.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(transparent))]
#[repr(transparent)]
pub struct Price4(pub u32);

impl Price4 {
    /// The number of implied decimal places.
    pub const DECIMALS: u8 = 4;

    /// Creates a price from whole units and ten-thousandths.
    pub const fn from_parts(units: u32, fraction: u32) -> Self {
        Self(units * PRICE4_SCALE + fraction)
    }

    /// Returns the raw scaled integer.
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Converts to a float for presentation. Use the raw value for arithmetic.
    pub fn to_f64(&self) -> f64 {
        f64::from(self.0) / f64::from(PRICE4_SCALE)
    }
}

impl Field for Price4 {
    const KIND: FieldKind = FieldKind::Price {
        decimals: Price4::DECIMALS,
        width: 4,
    };

    fn decode(src: &[u8]) -> Self {
        Self(u32::decode(src))
    }

    fn encode(&self, dst: &mut [u8]) {
        self.0.encode(dst)
    }
}

/// A price with 8 implied decimal places, used by MWCB decline levels.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(transparent))]
#[repr(transparent)]
pub struct Price8(pub u64);

impl Price8 {
    /// The number of implied decimal places.
    pub const DECIMALS: u8 = 8;

    /// Returns the raw scaled integer.
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Converts to a float for presentation. Use the raw value for arithmetic.
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / PRICE8_SCALE as f64
    }
}

impl Field for Price8 {
    const KIND: FieldKind = FieldKind::Price {
        decimals: Price8::DECIMALS,
        width: 8,
    };

    fn decode(src: &[u8]) -> Self {
        Self(u64::decode(src))
    }

    fn encode(&self, dst: &mut [u8]) {
        self.0.encode(dst)
    }
}

/// Fixed-width, right-padded ASCII text. The padding is kept as received and only
/// stripped when viewed with [`as_str()`](Self::as_str).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Alpha<const N: usize>(pub [u8; N]);

/// An 8-character instrument symbol.
pub type Stock = Alpha<8>;
/// A 4-character market participant identifier.
pub type Mpid = Alpha<4>;

impl<const N: usize> Alpha<N> {
    /// Returns the text without trailing padding. Bytes that aren't valid UTF-8
    /// end the text.
    pub fn as_str(&self) -> &str {
        let text = match std::str::from_utf8(&self.0) {
            Ok(text) => text,
            Err(err) => std::str::from_utf8(&self.0[..err.valid_up_to()]).unwrap_or_default(),
        };
        text.trim_end_matches(' ')
    }

    /// Returns the padded bytes as received.
    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    /// Returns `true` if the field is all padding.
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|&byte| byte == b' ')
    }
}

impl<const N: usize> Default for Alpha<N> {
    fn default() -> Self {
        Self([b' '; N])
    }
}

impl<const N: usize> FromStr for Alpha<N> {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() > N {
            return Err(Error::bad_argument(
                "s",
                format!("'{s}' is longer than {N} characters"),
            ));
        }
        if !s.is_ascii() {
            return Err(Error::bad_argument("s", format!("'{s}' isn't ASCII")));
        }
        let mut res = Self::default();
        res.0[..s.len()].copy_from_slice(s.as_bytes());
        Ok(res)
    }
}

impl<const N: usize> PartialEq<&str> for Alpha<N> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == other.trim_end_matches(' ')
    }
}

impl<const N: usize> fmt::Debug for Alpha<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<const N: usize> fmt::Display for Alpha<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<const N: usize> serde::Serialize for Alpha<N> {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<const N: usize> Field for Alpha<N> {
    const KIND: FieldKind = FieldKind::FixedString(N as u8);

    fn decode(src: &[u8]) -> Self {
        let mut res = [0; N];
        res.copy_from_slice(&src[..N]);
        Self(res)
    }

    fn encode(&self, dst: &mut [u8]) {
        dst.copy_from_slice(&self.0);
    }
}

impl<T: Code> Field for Coded<T> {
    const KIND: FieldKind = FieldKind::Enum(T::TABLE);

    fn decode(src: &[u8]) -> Self {
        Coded::from_byte(src[0])
    }

    fn encode(&self, dst: &mut [u8]) {
        dst[0] = self.raw();
    }

    fn invalid_byte(&self) -> Option<u8> {
        match self {
            Coded::Known(_) => None,
            Coded::Invalid(byte) => Some(*byte),
        }
    }
}

/// Sequential typed reads over the bytes of one message.
pub(crate) struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    pub fn read<T: Field>(&mut self) -> T {
        let width = T::KIND.width();
        let value = T::decode(&self.buf[self.pos..self.pos + width]);
        self.pos += width;
        value
    }
}

/// Sequential typed writes into the bytes of one message.
pub(crate) struct FieldWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FieldWriter<'a> {
    pub fn new(buf: &'a mut [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    pub fn write<T: Field>(&mut self, value: &T) {
        let width = T::KIND.width();
        value.encode(&mut self.buf[self.pos..self.pos + width]);
        self.pos += width;
    }
}

/// A field value decoded from a runtime [`FieldSpec`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    /// An unsigned integer.
    UInt(u64),
    /// Text with the trailing padding removed.
    Text(String),
    /// A fixed-point price.
    Price {
        /// The raw scaled integer.
        raw: u64,
        /// The number of implied decimal places.
        decimals: u8,
    },
    /// A mapped single-character code.
    Code {
        /// The byte on the wire.
        byte: u8,
        /// The name of the variant it maps to.
        label: &'static str,
    },
}

/// Decodes exactly `field.kind.width()` bytes from the start of `src`.
///
/// # Errors
/// This function returns an [`Error::BadArgument`] if `src` is too short and an
/// [`Error::InvalidEnumValue`] if an enumerated byte has no mapping.
pub fn decode_field(field: &FieldSpec, src: &[u8]) -> Result<FieldValue> {
    let width = field.kind.width();
    let Some(src) = src.get(..width) else {
        return Err(Error::bad_argument(
            "src",
            format!("{} needs {width} bytes, found {}", field.name, src.len()),
        ));
    };
    Ok(match field.kind {
        FieldKind::UInt(_) => FieldValue::UInt(read_uint(src)),
        FieldKind::FixedString(_) => {
            FieldValue::Text(String::from_utf8_lossy(src).trim_end_matches(' ').to_owned())
        }
        FieldKind::Price { decimals, .. } => FieldValue::Price {
            raw: read_uint(src),
            decimals,
        },
        FieldKind::Enum(table) => {
            let byte = src[0];
            let label = table
                .iter()
                .find_map(|(b, label)| (*b == byte).then_some(*label))
                .ok_or(Error::InvalidEnumValue {
                    field: field.name,
                    byte,
                })?;
            FieldValue::Code { byte, label }
        }
    })
}

/// Encodes `value` into the first `field.kind.width()` bytes of `dst`.
///
/// # Errors
/// This function returns an [`Error::BadArgument`] if `dst` is too short, if
/// `value` doesn't match the kind of `field`, or if it doesn't fit in the width.
pub fn encode_field(field: &FieldSpec, value: &FieldValue, dst: &mut [u8]) -> Result<()> {
    let width = field.kind.width();
    let Some(dst) = dst.get_mut(..width) else {
        return Err(Error::bad_argument(
            "dst",
            format!("{} needs {width} bytes", field.name),
        ));
    };
    match (field.kind, value) {
        (FieldKind::UInt(_), FieldValue::UInt(raw))
        | (FieldKind::Price { .. }, FieldValue::Price { raw, .. }) => {
            if width < 8 && *raw >> (8 * width) != 0 {
                return Err(Error::bad_argument(
                    "value",
                    format!("{raw} doesn't fit in the {width} bytes of {}", field.name),
                ));
            }
            write_uint(*raw, dst);
        }
        (FieldKind::FixedString(_), FieldValue::Text(text)) => {
            if text.len() > width || !text.is_ascii() {
                return Err(Error::bad_argument(
                    "value",
                    format!("'{text}' doesn't fit in the {width} ASCII bytes of {}", field.name),
                ));
            }
            dst.fill(b' ');
            dst[..text.len()].copy_from_slice(text.as_bytes());
        }
        (FieldKind::Enum(_), FieldValue::Code { byte, .. }) => dst[0] = *byte,
        (kind, value) => {
            return Err(Error::bad_argument(
                "value",
                format!("{value:?} doesn't match {kind:?} of {}", field.name),
            ))
        }
    }
    Ok(())
}

/// Decodes every field of a message described by `spec` from `buf`. Each field is
/// decoded independently so an unmapped code doesn't hide the other fields.
///
/// # Errors
/// This function returns an [`Error::TruncatedMessage`] if `buf` is shorter than
/// the message.
pub fn decode_fields(spec: &MessageSpec, buf: &[u8]) -> Result<Vec<Result<FieldValue>>> {
    if buf.len() < spec.length {
        return Err(Error::TruncatedMessage {
            tag: Some(spec.tag),
            offset: 0,
            expected: spec.length,
            available: buf.len(),
        });
    }
    Ok(spec
        .field_offsets()
        .map(|(offset, field)| decode_field(field, &buf[offset..]))
        .collect())
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;
    use crate::{catalog, enums::Side};

    #[rstest]
    #[case::u16(&[0x01, 0x02], 0x0102)]
    #[case::u32(&[0x00, 0x16, 0xE3, 0x60], 1_500_000)]
    #[case::u48(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x64], 100)]
    #[case::u48_max(&[0xFF; 6], 0xFFFF_FFFF_FFFF)]
    #[case::u64(&[0, 0, 0, 0, 0, 0, 0x02, 0x2B], 555)]
    fn test_read_uint(#[case] src: &[u8], #[case] exp: u64) {
        assert_eq!(read_uint(src), exp);
        let mut dst = vec![0; src.len()];
        write_uint(exp, &mut dst);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_u48_top_bits_zero() {
        let value = read_uint(&[0xFF; 6]);
        assert_eq!(value >> 48, 0);
    }

    #[test]
    fn test_alpha_strips_padding_on_read_only() {
        let stock = Stock::decode(b"AAPL    ");
        assert_eq!(stock.as_str(), "AAPL");
        assert_eq!(stock.as_bytes(), b"AAPL    ");
        assert_eq!(stock, "AAPL");
        assert_eq!("AAPL".parse::<Stock>().unwrap(), stock);
        assert!("TOOLONGSYM".parse::<Stock>().is_err());
        assert!(Stock::default().is_blank());
    }

    #[test]
    fn test_alpha_invalid_utf8_truncates() {
        let stock = Stock::decode(&[b'A', b'B', 0xFF, b'C', b' ', b' ', b' ', b' ']);
        assert_eq!(stock.as_str(), "AB");
    }

    #[test]
    fn test_price4_parts() {
        let price = Price4::decode(&[0x00, 0x16, 0xE3, 0x60]);
        assert_eq!(price, Price4::from_parts(150, 0));
        assert_eq!(price.raw(), 1_500_000);
        assert!((price.to_f64() - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_coded_field_marks_invalid() {
        let side = Coded::<Side>::decode(b"S");
        assert_eq!(side.invalid_byte(), None);
        assert_eq!(side.get(), Some(Side::Sell));
        let side = Coded::<Side>::decode(b"?");
        assert_eq!(side.invalid_byte(), Some(b'?'));
        let mut dst = [0];
        side.encode(&mut dst);
        assert_eq!(dst, *b"?");
    }

    #[test]
    fn test_decode_field_enum() {
        let side = FieldSpec::new("side", FieldKind::Enum(<Side as Code>::TABLE));
        assert_eq!(
            decode_field(&side, b"B").unwrap(),
            FieldValue::Code {
                byte: b'B',
                label: "Buy"
            }
        );
        assert!(matches!(
            decode_field(&side, b"Z"),
            Err(Error::InvalidEnumValue {
                field: "side",
                byte: b'Z'
            })
        ));
        assert!(matches!(
            decode_field(&side, b""),
            Err(Error::BadArgument { .. })
        ));
    }

    #[test]
    fn test_encode_field_rejects_mismatches() {
        let shares = FieldSpec::new("shares", FieldKind::UInt(4));
        let mut dst = [0; 4];
        let too_big = FieldValue::UInt(u64::from(u32::MAX) + 1);
        assert!(encode_field(&shares, &too_big, &mut dst).is_err());
        assert!(encode_field(&shares, &FieldValue::Text("1".to_owned()), &mut dst).is_err());
        encode_field(&shares, &FieldValue::UInt(100), &mut dst).unwrap();
        assert_eq!(dst, [0, 0, 0, 100]);
        let stock = FieldSpec::new("stock", FieldKind::FixedString(8));
        let mut dst = [0; 8];
        encode_field(&stock, &FieldValue::Text("MSFT".to_owned()), &mut dst).unwrap();
        assert_eq!(&dst, b"MSFT    ");
    }

    #[test]
    fn test_decode_fields_by_offset() {
        let spec = catalog::lookup(b'D').unwrap();
        let mut buf = vec![0u8; spec.length];
        buf[0] = b'D';
        buf[18] = 7;
        let fields = decode_fields(spec, &buf).unwrap();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[0].as_ref().unwrap(), &FieldValue::Text("D".to_owned()));
        assert_eq!(fields[4].as_ref().unwrap(), &FieldValue::UInt(7));
        assert!(matches!(
            decode_fields(spec, &buf[..10]),
            Err(Error::TruncatedMessage {
                tag: Some(b'D'),
                expected: 19,
                available: 10,
                ..
            })
        ));
    }
}
