//! Event checksum validation and rewriting.
//!
//! When the format description event announces CRC32, every event in the
//! file (the format description event included) ends with a 4-byte
//! little-endian CRC32 (ISO 3309, polynomial 0xEDB88320, seed 0) computed
//! over all preceding bytes of the event.

use byteorder::{ByteOrder, LittleEndian};

use crate::binlog::constants::BINLOG_CHECKSUM_LEN;

/// Result of validating one event's checksum.
#[derive(Debug, Clone)]
pub struct ChecksumResult {
    pub valid: bool,
    pub stored: u32,
    pub calculated: u32,
}

/// Compute the CRC32 an event of `data_written` bytes should carry.
pub fn compute(event: &[u8]) -> u32 {
    crc32fast::hash(&event[..event.len() - BINLOG_CHECKSUM_LEN])
}

/// Read the checksum stored in an event's trailer.
pub fn stored(event: &[u8]) -> u32 {
    LittleEndian::read_u32(&event[event.len() - BINLOG_CHECKSUM_LEN..])
}

/// Validate the trailer of a full event buffer.
///
/// `event` must be exactly `data_written` bytes of a checksum-carrying
/// event.
pub fn validate(event: &[u8]) -> ChecksumResult {
    let calculated = compute(event);
    let stored = stored(event);
    ChecksumResult {
        valid: stored == calculated,
        stored,
        calculated,
    }
}

/// Recompute the checksum over the event bytes and store it in the trailer.
pub fn rewrite(event: &mut [u8]) {
    let crc = compute(event);
    let tail = event.len() - BINLOG_CHECKSUM_LEN;
    LittleEndian::write_u32(&mut event[tail..], crc);
}
