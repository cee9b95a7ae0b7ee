/// Binary log file and event layout constants.
///
/// Offsets and lengths are derived from the MySQL source headers:
/// - binlog_event.h (common header, format description layout)
/// - rows_event.h (rows event post-headers)
/// - binlog.h (file magic, checksum options)
// File magic. The on-disk magic is the five bytes FE 62 69 6E 00, but the
// file header is only four bytes long: the trailing 00 is the first byte of
// the format description event's timestamp.
pub const BINLOG_MAGIC: [u8; 4] = [0xfe, 0x62, 0x69, 0x6e];
pub const LOG_FILE_HEADER_SIZE: u64 = 4;

// Common event header (19 bytes, binlog version 4)
pub const LOG_EVENT_HEADER_LEN: usize = 19;
pub const EVENT_TIMESTAMP_OFFSET: usize = 0; // 4 bytes - unix timestamp
pub const EVENT_TYPE_OFFSET: usize = 4; // 1 byte - event type code
pub const SERVER_ID_OFFSET: usize = 5; // 4 bytes - originating server id
pub const EVENT_LEN_OFFSET: usize = 9; // 4 bytes - total event length on disk
pub const LOG_POS_OFFSET: usize = 13; // 4 bytes - end-of-event file offset
pub const FLAGS_OFFSET: usize = 17; // 2 bytes - event flags

// Format description event body (after the common header)
pub const ST_BINLOG_VER_OFFSET: usize = 0; // 2 bytes - binlog format version
pub const ST_SERVER_VER_OFFSET: usize = 2; // 50 bytes - server version string
pub const ST_SERVER_VER_LEN: usize = 50;
pub const ST_CREATED_OFFSET: usize = 52; // 4 bytes - creation timestamp
pub const ST_COMMON_HEADER_LEN_OFFSET: usize = 56; // 1 byte - header length
/// Fixed part of the format description body before the post-header table.
pub const ST_POST_HEADER_TABLE_OFFSET: usize = 57;

// Event checksums (MySQL 5.6.1+)
pub const BINLOG_CHECKSUM_LEN: usize = 4;
pub const BINLOG_CHECKSUM_ALG_DESC_LEN: usize = 1;
/// First server version whose format description event carries a
/// checksum-algorithm descriptor byte.
pub const CHECKSUM_VERSION_SPLIT: [u32; 3] = [5, 6, 1];

// Rows event post-header lengths. V2 events (WRITE/UPDATE/DELETE_ROWS)
// append a 2-byte variable-header length to the V1 post-header.
pub const ROWS_HEADER_LEN_V1: u8 = 8;
pub const ROWS_HEADER_LEN_V2: u8 = 10;

/// Hard cap on a table-map event. Table maps for real tables are a few
/// hundred bytes; anything larger is treated as corruption before the
/// decoded copy is retained for a row batch.
pub const MAX_TABLE_MAP_SIZE: u32 = 16 * 1024;

/// Upper bound on a query event that can be the `BEGIN` transaction marker.
/// A plain BEGIN event is 79 bytes; the bound filters out statement events
/// without parsing their bodies.
pub const MAX_BEGIN_EVENT_LEN: u32 = 100;

/// Default event buffer size, in mebibytes.
pub const DEFAULT_MAX_EVENT_SIZE_MB: usize = 16;
