//! Row event dissection and inversion.
//!
//! A rows event body is the post-header, an optional v2 variable header, a
//! column-count varint, one presence bitmap (two for UPDATE_ROWS: before and
//! after image), then the packed rows. Within each row a null bitmap (one
//! bit per present column) precedes the non-null field values, packed back
//! to back with widths given by the field-size oracle.
//!
//! Inversion rewrites the event in place: WRITE and DELETE swap type codes
//! with no payload change; UPDATE swaps the two presence-bitmap halves and
//! rotates the before image behind the after image.

use std::ops::Range;

use byteorder::{ByteOrder, LittleEndian};

use crate::binlog::column::encoded_size;
use crate::binlog::constants::*;
use crate::binlog::event::{EventHeader, EventType};
use crate::binlog::table_map::TableMapEvent;
use crate::util::bitmap::{bitmap_len, is_bit_set};
use crate::util::lenenc::read_lenenc;
use crate::util::rotate::swap_adjacent;
use crate::BluError;

/// Byte ranges of a rows event's interesting regions, relative to the start
/// of the event buffer.
#[derive(Debug, Clone)]
pub struct RowsLayout {
    /// Column count announced by the event itself.
    pub column_count: usize,
    /// Presence bitmap(s): one `ceil(n/8)` half for WRITE/DELETE, two
    /// adjacent halves (before then after image) for UPDATE.
    pub bitmap: Range<usize>,
    /// Packed row data: per row, a null bitmap followed by the field values.
    pub data: Range<usize>,
}

fn corrupt(pos: u64, reason: impl Into<String>) -> BluError {
    BluError::CorruptEvent {
        pos,
        reason: reason.into(),
    }
}

/// Split a rows event into presence bitmap(s) and row data.
///
/// `event_len` is the event length with any checksum trailer subtracted and
/// `post_header_len` the format-description entry for this event type. Any
/// presence-bitmap byte other than 0xff means the log was written without
/// full row images and the whole operation is rejected.
pub fn dissect(
    event: &[u8],
    header: &EventHeader,
    post_header_len: u8,
    event_len: usize,
    pos: u64,
) -> Result<RowsLayout, BluError> {
    let mut p = LOG_EVENT_HEADER_LEN + post_header_len as usize;
    if event_len > event.len() || p > event_len {
        return Err(corrupt(pos, "rows post-header out of bounds"));
    }
    if post_header_len == ROWS_HEADER_LEN_V2 {
        // The last two post-header bytes are the variable-header length,
        // which counts itself; stepping back two bytes below cancels it.
        let var_len = LittleEndian::read_u16(&event[p - 2..p]);
        p += var_len as usize;
    }
    p -= 2;
    if p >= event_len {
        return Err(corrupt(pos, "rows body out of bounds"));
    }

    let (count, n) = read_lenenc(&event[p..event_len])
        .ok_or_else(|| corrupt(pos, "unreadable column count"))?;
    let column_count = count as usize;

    let mut bm_len = bitmap_len(column_count);
    if header.type_code == EventType::UpdateRows as u8 {
        bm_len *= 2;
    }
    let bitmap_start = p + n;
    let bitmap_end = bitmap_start + bm_len;
    if bitmap_end > event_len {
        return Err(corrupt(pos, "presence bitmap out of bounds"));
    }
    if event[bitmap_start..bitmap_end].iter().any(|&b| b != 0xff) {
        return Err(BluError::NotFullRowImage(pos));
    }

    Ok(RowsLayout {
        column_count,
        bitmap: bitmap_start..bitmap_end,
        data: bitmap_end..event_len,
    })
}

/// Rewrite a rows event in place so replaying it undoes the original change.
///
/// WRITE_ROWS and DELETE_ROWS swap type codes; UPDATE_ROWS has its before
/// and after images exchanged against the companion table map. The caller
/// is responsible for re-running the integrity rewriter afterwards.
pub fn invert(
    event: &mut [u8],
    header: &EventHeader,
    post_header_len: u8,
    event_len: usize,
    table_map: &TableMapEvent,
    pos: u64,
) -> Result<(), BluError> {
    let event_type = match header.event_type() {
        Some(t @ (EventType::WriteRows | EventType::UpdateRows | EventType::DeleteRows)) => t,
        _ => {
            return Err(BluError::UnexpectedEventType {
                pos,
                type_code: header.type_code,
            })
        }
    };

    let layout = dissect(event, header, post_header_len, event_len, pos)?;
    match event_type {
        EventType::WriteRows => event[EVENT_TYPE_OFFSET] = EventType::DeleteRows as u8,
        EventType::DeleteRows => event[EVENT_TYPE_OFFSET] = EventType::WriteRows as u8,
        EventType::UpdateRows => swap_update_row(event, &layout, table_map, pos)?,
        _ => unreachable!(),
    }
    Ok(())
}

/// Swap the before and after images of an UPDATE_ROWS event in place.
///
/// The before-image length is found by walking the packed fields with the
/// field-size oracle; everything after it is the after image. Both the
/// presence-bitmap halves and the two image regions are rotated.
pub fn swap_update_row(
    event: &mut [u8],
    layout: &RowsLayout,
    table_map: &TableMapEvent,
    pos: u64,
) -> Result<(), BluError> {
    let n = layout.column_count;
    if table_map.column_count != n {
        return Err(corrupt(
            pos,
            format!(
                "column count mismatch: event has {}, table map has {}",
                n, table_map.column_count
            ),
        ));
    }

    let metadata = table_map.expanded_metadata();
    let half = bitmap_len(n);

    let len_old = {
        let present = &event[layout.bitmap.start..layout.bitmap.start + half];
        let data = &event[layout.data.clone()];

        // One null bit per present column; the image is full, so that is
        // every column, but the walk mirrors the on-disk rule.
        let null_bit_count = (0..n).filter(|&i| is_bit_set(present, i)).count();
        let null_len = bitmap_len(null_bit_count);
        if null_len > data.len() {
            return Err(corrupt(pos, "null bitmap out of bounds"));
        }
        let null_bits = &data[..null_len];

        let mut off = null_len;
        let mut null_idx = 0usize;
        for i in 0..n {
            if !is_bit_set(present, i) {
                continue;
            }
            let idx = null_idx;
            null_idx += 1;
            if is_bit_set(null_bits, idx) {
                continue;
            }
            let col = *table_map
                .column_types
                .get(i)
                .ok_or_else(|| corrupt(pos, "table map is missing column types"))?;
            let size = encoded_size(col, &data[off..], metadata[i])
                .ok_or_else(|| corrupt(pos, format!("unreadable field for column {}", i)))?;
            off += size;
            if off > data.len() {
                return Err(corrupt(pos, "field walk ran past the row data"));
            }
        }
        off
    };

    let len_new = (layout.data.end - layout.data.start) - len_old;
    swap_adjacent(&mut event[layout.bitmap.clone()], half, half);
    swap_adjacent(&mut event[layout.data.clone()], len_old, len_new);
    Ok(())
}
