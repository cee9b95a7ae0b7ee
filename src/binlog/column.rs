//! Column type catalog and per-field encoded sizes.
//!
//! Row events pack non-null fields back to back with no per-field framing;
//! walking a row requires knowing, for every column type, how many bytes the
//! value occupies at the current position. The widths here mirror the
//! server's own row encoding: fixed-width numerics, metadata-driven temporal
//! and decimal widths, and length-prefixed strings and blobs.

use byteorder::{ByteOrder, LittleEndian};

/// Column type codes from MySQL `field_types.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColumnType {
    Decimal = 0,
    Tiny = 1,
    Short = 2,
    Long = 3,
    Float = 4,
    Double = 5,
    Null = 6,
    Timestamp = 7,
    LongLong = 8,
    Int24 = 9,
    Date = 10,
    Time = 11,
    DateTime = 12,
    Year = 13,
    NewDate = 14,
    Varchar = 15,
    Bit = 16,
    Timestamp2 = 17,
    DateTime2 = 18,
    Time2 = 19,
    Json = 245,
    NewDecimal = 246,
    Enum = 247,
    Set = 248,
    TinyBlob = 249,
    MediumBlob = 250,
    LongBlob = 251,
    Blob = 252,
    VarString = 253,
    String = 254,
    Geometry = 255,
}

impl ColumnType {
    pub fn from_u8(val: u8) -> Option<Self> {
        Some(match val {
            0 => ColumnType::Decimal,
            1 => ColumnType::Tiny,
            2 => ColumnType::Short,
            3 => ColumnType::Long,
            4 => ColumnType::Float,
            5 => ColumnType::Double,
            6 => ColumnType::Null,
            7 => ColumnType::Timestamp,
            8 => ColumnType::LongLong,
            9 => ColumnType::Int24,
            10 => ColumnType::Date,
            11 => ColumnType::Time,
            12 => ColumnType::DateTime,
            13 => ColumnType::Year,
            14 => ColumnType::NewDate,
            15 => ColumnType::Varchar,
            16 => ColumnType::Bit,
            17 => ColumnType::Timestamp2,
            18 => ColumnType::DateTime2,
            19 => ColumnType::Time2,
            245 => ColumnType::Json,
            246 => ColumnType::NewDecimal,
            247 => ColumnType::Enum,
            248 => ColumnType::Set,
            249 => ColumnType::TinyBlob,
            250 => ColumnType::MediumBlob,
            251 => ColumnType::LongBlob,
            252 => ColumnType::Blob,
            253 => ColumnType::VarString,
            254 => ColumnType::String,
            255 => ColumnType::Geometry,
            _ => return None,
        })
    }
}

/// Encoded size of one field at the head of `payload`.
///
/// `metadata` is the expanded 16-bit table-map metadata for the column (see
/// [`crate::binlog::table_map::TableMapEvent::expanded_metadata`]). Returns
/// `None` for unknown column types and for payloads too short to hold the
/// field's own length prefix; callers classify both as corruption.
pub fn encoded_size(type_code: u8, payload: &[u8], metadata: u16) -> Option<usize> {
    let col = ColumnType::from_u8(type_code)?;
    let m = metadata as usize;
    Some(match col {
        ColumnType::Tiny | ColumnType::Year => 1,
        ColumnType::Short => 2,
        ColumnType::Int24 => 3,
        ColumnType::Long => 4,
        ColumnType::LongLong => 8,
        ColumnType::Null => 0,

        ColumnType::Date | ColumnType::NewDate | ColumnType::Time => 3,
        ColumnType::Timestamp => 4,
        ColumnType::DateTime => 8,
        // Fractional-second temporals: fixed core plus ceil(dec / 2) bytes.
        ColumnType::Time2 => 3 + (m + 1) / 2,
        ColumnType::Timestamp2 => 4 + (m + 1) / 2,
        ColumnType::DateTime2 => 5 + (m + 1) / 2,

        // Old decimal, float and double store their byte width as metadata.
        ColumnType::Decimal | ColumnType::Float | ColumnType::Double => m,

        ColumnType::NewDecimal => decimal_binary_size(m >> 8, m & 0xff),

        // Metadata low byte is the bit count modulo 8, high byte the whole
        // bytes; a partial byte adds one.
        ColumnType::Bit => (m >> 8) + usize::from(m & 0xff > 0),

        ColumnType::Varchar => {
            if m > 255 {
                2 + LittleEndian::read_u16(payload.get(..2)?) as usize
            } else {
                1 + *payload.first()? as usize
            }
        }

        // ENUM and SET are logged as STRING with the real type in the
        // metadata high byte; true CHAR columns carry a 1-byte length.
        ColumnType::String | ColumnType::Enum | ColumnType::Set => {
            let real_type = (m >> 8) as u8;
            if real_type == ColumnType::Enum as u8 || real_type == ColumnType::Set as u8 {
                m & 0xff
            } else {
                1 + *payload.first()? as usize
            }
        }

        // Blob family: metadata is the width of the length prefix.
        ColumnType::TinyBlob
        | ColumnType::MediumBlob
        | ColumnType::LongBlob
        | ColumnType::Blob
        | ColumnType::Geometry
        | ColumnType::Json => {
            let value_len = match m {
                1 => *payload.first()? as usize,
                2 => LittleEndian::read_u16(payload.get(..2)?) as usize,
                3 => LittleEndian::read_u24(payload.get(..3)?) as usize,
                4 => LittleEndian::read_u32(payload.get(..4)?) as usize,
                _ => return None,
            };
            m + value_len
        }

        ColumnType::VarString => return None,
    })
}

const DIG_PER_DEC1: usize = 9;
const DIG2BYTES: [usize; DIG_PER_DEC1 + 1] = [0, 1, 1, 2, 2, 3, 3, 4, 4, 4];

/// Byte width of a packed DECIMAL(precision, scale) value: full groups of
/// nine digits take four bytes, the leftover digits take 0..4.
fn decimal_binary_size(precision: usize, scale: usize) -> usize {
    let intg = precision.saturating_sub(scale);
    let intg0 = intg / DIG_PER_DEC1;
    let frac0 = scale / DIG_PER_DEC1;
    let intg0x = intg - intg0 * DIG_PER_DEC1;
    let frac0x = scale - frac0 * DIG_PER_DEC1;
    intg0 * 4 + DIG2BYTES[intg0x] + frac0 * 4 + DIG2BYTES[frac0x]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_widths() {
        let empty: &[u8] = &[];
        assert_eq!(encoded_size(ColumnType::Tiny as u8, empty, 0), Some(1));
        assert_eq!(encoded_size(ColumnType::Year as u8, empty, 0), Some(1));
        assert_eq!(encoded_size(ColumnType::Short as u8, empty, 0), Some(2));
        assert_eq!(encoded_size(ColumnType::Int24 as u8, empty, 0), Some(3));
        assert_eq!(encoded_size(ColumnType::Long as u8, empty, 0), Some(4));
        assert_eq!(encoded_size(ColumnType::LongLong as u8, empty, 0), Some(8));
        assert_eq!(encoded_size(ColumnType::Null as u8, empty, 0), Some(0));
        assert_eq!(encoded_size(ColumnType::Date as u8, empty, 0), Some(3));
        assert_eq!(encoded_size(ColumnType::Time as u8, empty, 0), Some(3));
        assert_eq!(encoded_size(ColumnType::NewDate as u8, empty, 0), Some(3));
        assert_eq!(encoded_size(ColumnType::Timestamp as u8, empty, 0), Some(4));
        assert_eq!(encoded_size(ColumnType::DateTime as u8, empty, 0), Some(8));
    }

    #[test]
    fn test_fractional_temporals() {
        let empty: &[u8] = &[];
        // TIME2/TIMESTAMP2/DATETIME2 with 0, 3 and 6 fractional digits.
        assert_eq!(encoded_size(ColumnType::Time2 as u8, empty, 0), Some(3));
        assert_eq!(encoded_size(ColumnType::Time2 as u8, empty, 3), Some(5));
        assert_eq!(encoded_size(ColumnType::Time2 as u8, empty, 6), Some(6));
        assert_eq!(encoded_size(ColumnType::Timestamp2 as u8, empty, 4), Some(6));
        assert_eq!(encoded_size(ColumnType::DateTime2 as u8, empty, 0), Some(5));
        assert_eq!(encoded_size(ColumnType::DateTime2 as u8, empty, 6), Some(8));
    }

    #[test]
    fn test_float_double_metadata() {
        let empty: &[u8] = &[];
        assert_eq!(encoded_size(ColumnType::Float as u8, empty, 4), Some(4));
        assert_eq!(encoded_size(ColumnType::Double as u8, empty, 8), Some(8));
    }

    #[test]
    fn test_new_decimal() {
        let empty: &[u8] = &[];
        // DECIMAL(10,0): 9 digits = 4 bytes + 1 digit = 1 byte.
        assert_eq!(
            encoded_size(ColumnType::NewDecimal as u8, empty, 10 << 8),
            Some(5)
        );
        // DECIMAL(10,2): intg 8 -> 4, frac 2 -> 1.
        assert_eq!(
            encoded_size(ColumnType::NewDecimal as u8, empty, (10 << 8) | 2),
            Some(5)
        );
        // DECIMAL(18,9): two full nine-digit groups.
        assert_eq!(
            encoded_size(ColumnType::NewDecimal as u8, empty, (18 << 8) | 9),
            Some(8)
        );
        // DECIMAL(65,30): the widest the server allows.
        assert_eq!(
            encoded_size(ColumnType::NewDecimal as u8, empty, (65 << 8) | 30),
            Some(30)
        );
    }

    #[test]
    fn test_bit() {
        let empty: &[u8] = &[];
        // BIT(1): 0 whole bytes + 1 partial.
        assert_eq!(encoded_size(ColumnType::Bit as u8, empty, 0x0001), Some(1));
        // BIT(8): metadata low byte 0, high byte 1.
        assert_eq!(encoded_size(ColumnType::Bit as u8, empty, 0x0100), Some(1));
        // BIT(12): one whole byte + 4 leftover bits.
        assert_eq!(encoded_size(ColumnType::Bit as u8, empty, 0x0104), Some(2));
    }

    #[test]
    fn test_varchar() {
        // VARCHAR(10): 1-byte prefix.
        assert_eq!(
            encoded_size(ColumnType::Varchar as u8, &[3, b'a', b'b', b'c'], 10),
            Some(4)
        );
        // VARCHAR(300): 2-byte little-endian prefix.
        let mut buf = vec![0x2c, 0x01]; // 300
        buf.resize(302, b'x');
        assert_eq!(encoded_size(ColumnType::Varchar as u8, &buf, 300), Some(302));
        // Missing prefix byte.
        assert_eq!(encoded_size(ColumnType::Varchar as u8, &[], 10), None);
    }

    #[test]
    fn test_string_enum_set() {
        // CHAR: 1-byte length prefix read from the payload.
        let meta = ((ColumnType::String as u16) << 8) | 20;
        assert_eq!(
            encoded_size(ColumnType::String as u8, &[2, b'h', b'i'], meta),
            Some(3)
        );
        // ENUM logged as STRING: pack length lives in the metadata low byte.
        let meta = ((ColumnType::Enum as u16) << 8) | 2;
        assert_eq!(encoded_size(ColumnType::String as u8, &[1, 0], meta), Some(2));
        let meta = ((ColumnType::Set as u16) << 8) | 8;
        assert_eq!(encoded_size(ColumnType::String as u8, &[0; 8], meta), Some(8));
    }

    #[test]
    fn test_blob_family() {
        assert_eq!(encoded_size(ColumnType::TinyBlob as u8, &[5], 1), Some(6));
        assert_eq!(
            encoded_size(ColumnType::Blob as u8, &[0x00, 0x01], 2),
            Some(2 + 256)
        );
        assert_eq!(
            encoded_size(ColumnType::MediumBlob as u8, &[1, 0, 0], 3),
            Some(4)
        );
        assert_eq!(
            encoded_size(ColumnType::LongBlob as u8, &[2, 0, 0, 0], 4),
            Some(6)
        );
        assert_eq!(encoded_size(ColumnType::Json as u8, &[0, 0, 0, 0], 4), Some(4));
        // Bad prefix width.
        assert_eq!(encoded_size(ColumnType::Blob as u8, &[0; 8], 5), None);
    }

    #[test]
    fn test_unknown_types() {
        assert_eq!(encoded_size(20, &[], 0), None);
        assert_eq!(encoded_size(244, &[], 0), None);
        assert_eq!(encoded_size(ColumnType::VarString as u8, &[1, 0], 0), None);
    }
}
