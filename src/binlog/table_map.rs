//! Table map event.
//!
//! A TABLE_MAP_EVENT precedes every batch of row events and carries what the
//! rows need to be decoded: the table's numeric id, its column type codes,
//! and a packed per-column metadata blob. Each column type consumes zero,
//! one or two bytes of that blob; [`TableMapEvent::expanded_metadata`]
//! widens it into one 16-bit value per column, which is what the field-size
//! oracle in [`crate::binlog::column`] consumes.

use byteorder::{ByteOrder, LittleEndian};

use crate::binlog::column::ColumnType;
use crate::binlog::constants::LOG_EVENT_HEADER_LEN;
use crate::util::bitmap::bitmap_len;
use crate::util::lenenc::read_lenenc;

/// Decoded table map event.
#[derive(Debug, Clone)]
pub struct TableMapEvent {
    /// Numeric table id assigned by the server.
    pub table_id: u64,
    /// Event flags from the post-header.
    pub flags: u16,
    /// Schema (database) name.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// Number of columns in the mapped table.
    pub column_count: usize,
    /// Raw column type codes, one per column.
    pub column_types: Vec<u8>,
    /// Packed per-column metadata blob.
    pub metadata: Vec<u8>,
    /// Nullability bitmap, one bit per column.
    pub null_bits: Vec<u8>,
}

impl TableMapEvent {
    /// Parse a table map event from a full event buffer.
    ///
    /// `event_len` is the event length with any checksum trailer already
    /// subtracted; `post_header_len` comes from the format description (8,
    /// or 6 for ancient servers whose table ids were four bytes).
    pub fn parse(event: &[u8], event_len: usize, post_header_len: u8) -> Option<Self> {
        let ph_start = LOG_EVENT_HEADER_LEN;
        let ph_end = ph_start + post_header_len as usize;
        if event_len > event.len() || ph_end > event_len {
            return None;
        }

        let (table_id, flags) = if post_header_len == 6 {
            (
                u64::from(LittleEndian::read_u32(&event[ph_start..])),
                LittleEndian::read_u16(&event[ph_start + 4..]),
            )
        } else {
            (
                LittleEndian::read_u48(&event[ph_start..]),
                LittleEndian::read_u16(&event[ph_start + 6..]),
            )
        };

        let body = &event[ph_end..event_len];
        let mut p = 0usize;

        let schema_len = *body.get(p)? as usize;
        p += 1;
        let schema = body.get(p..p + schema_len)?;
        p += schema_len + 1; // trailing NUL

        let table_len = *body.get(p)? as usize;
        p += 1;
        let table = body.get(p..p + table_len)?;
        p += table_len + 1;

        let (column_count, n) = read_lenenc(body.get(p..)?)?;
        let column_count = column_count as usize;
        p += n;
        let column_types = body.get(p..p + column_count)?.to_vec();
        p += column_count;

        let (meta_len, n) = read_lenenc(body.get(p..)?)?;
        p += n;
        let metadata = body.get(p..p + meta_len as usize)?.to_vec();
        p += meta_len as usize;

        let null_bits = body.get(p..p + bitmap_len(column_count))?.to_vec();

        Some(TableMapEvent {
            table_id,
            flags,
            schema: String::from_utf8_lossy(schema).into_owned(),
            table: String::from_utf8_lossy(table).into_owned(),
            column_count,
            column_types,
            metadata,
            null_bits,
        })
    }

    /// Widen the packed metadata blob into one 16-bit value per column.
    ///
    /// Byte consumption and byte order are type-specific:
    ///
    /// | Column type | Bytes | Expansion |
    /// |-------------|-------|-----------|
    /// | blobs, DOUBLE, FLOAT, GEOMETRY, JSON | 1 | value as-is |
    /// | SET, ENUM, STRING | 2 | `(b0 << 8) + b1` |
    /// | BIT | 2 | `b0 + (b1 << 8)` |
    /// | VARCHAR | 2 | little-endian u16 |
    /// | NEWDECIMAL | 2 | `(b0 << 8) + b1` (precision, decimals) |
    /// | TIME2, DATETIME2, TIMESTAMP2 | 1 | value as-is |
    /// | anything else | 0 | zero |
    ///
    /// An empty blob or a zero column count yields an all-zero array.
    pub fn expanded_metadata(&self) -> Vec<u16> {
        let mut out = vec![0u16; self.column_count];
        if self.column_count == 0 || self.metadata.is_empty() {
            return out;
        }

        let mut index = 0usize;
        let metadata = &self.metadata;
        let mut next = move || -> u16 {
            let v = metadata.get(index).map(|&b| u16::from(b)).unwrap_or(0);
            index += 1;
            v
        };

        for (i, &raw) in self.column_types.iter().enumerate().take(self.column_count) {
            out[i] = match ColumnType::from_u8(raw) {
                Some(
                    ColumnType::TinyBlob
                    | ColumnType::Blob
                    | ColumnType::MediumBlob
                    | ColumnType::LongBlob
                    | ColumnType::Double
                    | ColumnType::Float
                    | ColumnType::Geometry
                    | ColumnType::Json,
                ) => next(),
                Some(ColumnType::Set | ColumnType::Enum | ColumnType::String) => {
                    let hi = next();
                    let lo = next();
                    (hi << 8) + lo
                }
                Some(ColumnType::Bit) => {
                    let lo = next();
                    let hi = next();
                    lo + (hi << 8)
                }
                Some(ColumnType::Varchar) => {
                    let lo = next();
                    let hi = next();
                    lo | (hi << 8)
                }
                Some(ColumnType::NewDecimal) => {
                    let hi = next();
                    let lo = next();
                    (hi << 8) + lo
                }
                Some(ColumnType::Time2 | ColumnType::DateTime2 | ColumnType::Timestamp2) => next(),
                _ => 0,
            };
        }
        out
    }
}
