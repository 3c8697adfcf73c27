//! The static schema of every ITCH 5.0 message type.
//!
//! Each [`MessageSpec`] is generated alongside the message struct it describes in
//! [`message`](crate::message), so the byte layout used by the decoder and the
//! layout described here can't drift apart.

use crate::message::CATALOG;

/// How the bytes of a single field are interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// A big-endian unsigned integer of the given width in bytes.
    UInt(u8),
    /// Right-padded ASCII text of the given width in bytes.
    FixedString(u8),
    /// A big-endian unsigned integer with `decimals` implied fractional digits.
    Price {
        /// The number of implied decimal places.
        decimals: u8,
        /// The width in bytes.
        width: u8,
    },
    /// A single byte mapped through a lookup table of byte to variant name.
    Enum(&'static [(u8, &'static str)]),
}

impl FieldKind {
    /// Returns the number of bytes the field occupies.
    pub const fn width(&self) -> usize {
        match self {
            FieldKind::UInt(width) | FieldKind::FixedString(width) => *width as usize,
            FieldKind::Price { width, .. } => *width as usize,
            FieldKind::Enum(_) => 1,
        }
    }
}

/// A named field within a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    /// The field name.
    pub name: &'static str,
    /// How the field is encoded.
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Creates a new field description.
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// The fields common to every message, in wire order.
pub const HEADER_FIELDS: [FieldSpec; 4] = [
    FieldSpec::new("message_type", FieldKind::FixedString(1)),
    FieldSpec::new("stock_locate", FieldKind::UInt(2)),
    FieldSpec::new("tracking_number", FieldKind::UInt(2)),
    FieldSpec::new("timestamp", FieldKind::UInt(6)),
];

/// The layout of one message type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageSpec {
    /// The type tag found at offset 0.
    pub tag: u8,
    /// A human-readable name.
    pub name: &'static str,
    /// The fields in wire order, starting with [`HEADER_FIELDS`].
    pub fields: &'static [FieldSpec],
    /// The total length in bytes, including the tag.
    pub length: usize,
}

impl MessageSpec {
    /// Creates a new message description, deriving the total length from the
    /// field widths.
    pub const fn new(tag: u8, name: &'static str, fields: &'static [FieldSpec]) -> Self {
        let mut length = 0;
        let mut i = 0;
        while i < fields.len() {
            length += fields[i].kind.width();
            i += 1;
        }
        Self {
            tag,
            name,
            fields,
            length,
        }
    }

    /// Returns the tag as a `char`.
    pub fn tag_char(&self) -> char {
        char::from(self.tag)
    }

    /// Returns an iterator of the byte offset of each field along with its
    /// description.
    pub fn field_offsets(&self) -> impl Iterator<Item = (usize, &'static FieldSpec)> {
        let fields: &'static [FieldSpec] = self.fields;
        fields.iter().scan(0, |offset, field| {
            let start = *offset;
            *offset += field.kind.width();
            Some((start, field))
        })
    }

    /// Returns the byte offset of the field called `name`.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.field_offsets()
            .find_map(|(offset, field)| (field.name == name).then_some(offset))
    }
}

const NO_SPEC: u8 = u8::MAX;
const INDEX: [u8; 256] = build_index(CATALOG);

const fn build_index(specs: &[MessageSpec]) -> [u8; 256] {
    let mut index = [NO_SPEC; 256];
    let mut i = 0;
    while i < specs.len() {
        index[specs[i].tag as usize] = i as u8;
        i += 1;
    }
    index
}

/// Returns the descriptions of all message types.
pub fn catalog() -> &'static [MessageSpec] {
    CATALOG
}

/// Looks up the description of the message type with `tag`.
pub fn lookup(tag: u8) -> Option<&'static MessageSpec> {
    match INDEX[tag as usize] {
        NO_SPEC => None,
        i => CATALOG.get(i as usize),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rstest::*;

    use super::*;
    use crate::{HEADER_LEN, MAX_MESSAGE_LEN};

    #[rstest]
    #[case::system_event(b'S', 12)]
    #[case::stock_directory(b'R', 39)]
    #[case::trading_action(b'H', 25)]
    #[case::reg_sho(b'Y', 20)]
    #[case::participant_position(b'L', 26)]
    #[case::mwcb_decline(b'V', 35)]
    #[case::mwcb_status(b'W', 12)]
    #[case::ipo_quoting(b'K', 28)]
    #[case::luld_collar(b'J', 35)]
    #[case::operational_halt(b'h', 21)]
    #[case::add_order(b'A', 36)]
    #[case::add_order_mpid(b'F', 40)]
    #[case::executed(b'E', 31)]
    #[case::executed_with_price(b'C', 36)]
    #[case::cancel(b'X', 23)]
    #[case::delete(b'D', 19)]
    #[case::replace(b'U', 35)]
    #[case::trade(b'P', 44)]
    #[case::cross_trade(b'Q', 40)]
    #[case::broken_trade(b'B', 19)]
    #[case::noii(b'I', 50)]
    #[case::retail_interest(b'N', 20)]
    #[case::dlcr(b'O', 48)]
    fn test_message_lengths(#[case] tag: u8, #[case] exp_len: usize) {
        let spec = lookup(tag).unwrap();
        assert_eq!(spec.tag, tag);
        assert_eq!(spec.length, exp_len);
        assert_eq!(spec.fields[..4], HEADER_FIELDS);
    }

    #[test]
    fn test_catalog_tags_unique() {
        let tags: HashSet<u8> = catalog().iter().map(|spec| spec.tag).collect();
        assert_eq!(tags.len(), catalog().len());
        assert_eq!(catalog().len(), 23);
        assert_eq!(
            catalog().iter().map(|spec| spec.length).max(),
            Some(MAX_MESSAGE_LEN)
        );
        assert!(catalog().iter().all(|spec| spec.length >= HEADER_LEN));
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup(b'Z').is_none());
        assert!(lookup(0).is_none());
        assert!(lookup(u8::MAX).is_none());
    }

    #[test]
    fn test_add_order_offsets() {
        let spec = lookup(b'F').unwrap();
        assert_eq!(spec.offset_of("stock_locate"), Some(1));
        assert_eq!(spec.offset_of("tracking_number"), Some(3));
        assert_eq!(spec.offset_of("timestamp"), Some(5));
        assert_eq!(spec.offset_of("order_ref"), Some(11));
        assert_eq!(spec.offset_of("side"), Some(19));
        assert_eq!(spec.offset_of("shares"), Some(20));
        assert_eq!(spec.offset_of("stock"), Some(24));
        assert_eq!(spec.offset_of("price"), Some(32));
        assert_eq!(spec.offset_of("attribution"), Some(36));
        assert_eq!(spec.offset_of("missing"), None);
        let (_, price) = spec.field_offsets().nth(8).unwrap();
        assert_eq!(
            price.kind,
            FieldKind::Price {
                decimals: 4,
                width: 4
            }
        );
    }

    #[test]
    fn test_decline_levels_use_eight_decimals() {
        let spec = lookup(b'V').unwrap();
        assert!(spec.fields[4..].iter().all(|field| field.kind
            == FieldKind::Price {
                decimals: 8,
                width: 8
            }));
    }
}
