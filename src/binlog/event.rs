//! Binlog event types and the common event header.
//!
//! Every event in a version-4 binlog starts with the same 19-byte header:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Unix timestamp |
//! | 4 | 1 | Event type code |
//! | 5 | 4 | Originating server id |
//! | 9 | 4 | Total event length on disk (header + body + checksum) |
//! | 13 | 4 | End-of-event file offset (`log_pos`) |
//! | 17 | 2 | Flags |
//!
//! All integers are little-endian. The header is self-locating:
//! `log_pos - data_written` must equal the event's own start offset, which is
//! what the reader checks to detect a corrupt or misframed stream.

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::binlog::constants::*;

/// Binlog event type codes from MySQL `binlog_event.h` (5.7 numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum EventType {
    StartV3 = 1,
    Query = 2,
    Stop = 3,
    Rotate = 4,
    Intvar = 5,
    Load = 6,
    Slave = 7,
    CreateFile = 8,
    AppendBlock = 9,
    ExecLoad = 10,
    DeleteFile = 11,
    NewLoad = 12,
    Rand = 13,
    UserVar = 14,
    FormatDescription = 15,
    Xid = 16,
    BeginLoadQuery = 17,
    ExecuteLoadQuery = 18,
    TableMap = 19,
    PreGaWriteRows = 20,
    PreGaUpdateRows = 21,
    PreGaDeleteRows = 22,
    WriteRowsV1 = 23,
    UpdateRowsV1 = 24,
    DeleteRowsV1 = 25,
    Incident = 26,
    Heartbeat = 27,
    Ignorable = 28,
    RowsQuery = 29,
    WriteRows = 30,
    UpdateRows = 31,
    DeleteRows = 32,
    Gtid = 33,
    AnonymousGtid = 34,
    PreviousGtids = 35,
    TransactionContext = 36,
    ViewChange = 37,
    XaPrepare = 38,
}

/// One past the last known type code. Type code 0 (UNKNOWN_EVENT) and
/// anything at or above this sentinel never appears in a well-formed log.
pub const ENUM_END_EVENT: u8 = 39;

impl EventType {
    /// Convert a raw type code to an EventType.
    ///
    /// Returns `None` for 0 and for codes past the known range; callers
    /// treat those as corruption.
    pub fn from_u8(val: u8) -> Option<Self> {
        Some(match val {
            1 => EventType::StartV3,
            2 => EventType::Query,
            3 => EventType::Stop,
            4 => EventType::Rotate,
            5 => EventType::Intvar,
            6 => EventType::Load,
            7 => EventType::Slave,
            8 => EventType::CreateFile,
            9 => EventType::AppendBlock,
            10 => EventType::ExecLoad,
            11 => EventType::DeleteFile,
            12 => EventType::NewLoad,
            13 => EventType::Rand,
            14 => EventType::UserVar,
            15 => EventType::FormatDescription,
            16 => EventType::Xid,
            17 => EventType::BeginLoadQuery,
            18 => EventType::ExecuteLoadQuery,
            19 => EventType::TableMap,
            20 => EventType::PreGaWriteRows,
            21 => EventType::PreGaUpdateRows,
            22 => EventType::PreGaDeleteRows,
            23 => EventType::WriteRowsV1,
            24 => EventType::UpdateRowsV1,
            25 => EventType::DeleteRowsV1,
            26 => EventType::Incident,
            27 => EventType::Heartbeat,
            28 => EventType::Ignorable,
            29 => EventType::RowsQuery,
            30 => EventType::WriteRows,
            31 => EventType::UpdateRows,
            32 => EventType::DeleteRows,
            33 => EventType::Gtid,
            34 => EventType::AnonymousGtid,
            35 => EventType::PreviousGtids,
            36 => EventType::TransactionContext,
            37 => EventType::ViewChange,
            38 => EventType::XaPrepare,
            _ => return None,
        })
    }

    /// Display name for this event type, matching the MySQL source.
    pub fn name(&self) -> &'static str {
        match self {
            EventType::StartV3 => "START_EVENT_V3",
            EventType::Query => "QUERY_EVENT",
            EventType::Stop => "STOP_EVENT",
            EventType::Rotate => "ROTATE_EVENT",
            EventType::Intvar => "INTVAR_EVENT",
            EventType::Load => "LOAD_EVENT",
            EventType::Slave => "SLAVE_EVENT",
            EventType::CreateFile => "CREATE_FILE_EVENT",
            EventType::AppendBlock => "APPEND_BLOCK_EVENT",
            EventType::ExecLoad => "EXEC_LOAD_EVENT",
            EventType::DeleteFile => "DELETE_FILE_EVENT",
            EventType::NewLoad => "NEW_LOAD_EVENT",
            EventType::Rand => "RAND_EVENT",
            EventType::UserVar => "USER_VAR_EVENT",
            EventType::FormatDescription => "FORMAT_DESCRIPTION_EVENT",
            EventType::Xid => "XID_EVENT",
            EventType::BeginLoadQuery => "BEGIN_LOAD_QUERY_EVENT",
            EventType::ExecuteLoadQuery => "EXECUTE_LOAD_QUERY_EVENT",
            EventType::TableMap => "TABLE_MAP_EVENT",
            EventType::PreGaWriteRows => "PRE_GA_WRITE_ROWS_EVENT",
            EventType::PreGaUpdateRows => "PRE_GA_UPDATE_ROWS_EVENT",
            EventType::PreGaDeleteRows => "PRE_GA_DELETE_ROWS_EVENT",
            EventType::WriteRowsV1 => "WRITE_ROWS_EVENT_V1",
            EventType::UpdateRowsV1 => "UPDATE_ROWS_EVENT_V1",
            EventType::DeleteRowsV1 => "DELETE_ROWS_EVENT_V1",
            EventType::Incident => "INCIDENT_EVENT",
            EventType::Heartbeat => "HEARTBEAT_LOG_EVENT",
            EventType::Ignorable => "IGNORABLE_LOG_EVENT",
            EventType::RowsQuery => "ROWS_QUERY_LOG_EVENT",
            EventType::WriteRows => "WRITE_ROWS_EVENT",
            EventType::UpdateRows => "UPDATE_ROWS_EVENT",
            EventType::DeleteRows => "DELETE_ROWS_EVENT",
            EventType::Gtid => "GTID_LOG_EVENT",
            EventType::AnonymousGtid => "ANONYMOUS_GTID_LOG_EVENT",
            EventType::PreviousGtids => "PREVIOUS_GTIDS_LOG_EVENT",
            EventType::TransactionContext => "TRANSACTION_CONTEXT_EVENT",
            EventType::ViewChange => "VIEW_CHANGE_EVENT",
            EventType::XaPrepare => "XA_PREPARE_LOG_EVENT",
        }
    }

    /// Display name for a raw type code; out-of-range codes map to
    /// "UNKNOWN_EVENT" so diagnostics can print anything the file contains.
    pub fn name_of(code: u8) -> &'static str {
        match Self::from_u8(code) {
            Some(t) => t.name(),
            None => "UNKNOWN_EVENT",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Decoded common event header.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EventHeader {
    /// Unix timestamp of the event.
    pub timestamp: u32,
    /// Raw event type code (may be out of range in a corrupt stream).
    pub type_code: u8,
    /// Id of the server that originally wrote the event.
    pub server_id: u32,
    /// Total length of the event on disk, including this header and the
    /// trailing checksum when checksums are enabled.
    pub data_written: u32,
    /// File offset of the first byte past this event.
    pub log_pos: u32,
    /// Event flags.
    pub flags: u16,
}

impl EventHeader {
    /// Parse the fixed 19-byte header.
    ///
    /// # Examples
    ///
    /// ```
    /// use blu::binlog::event::{EventHeader, EventType};
    /// use blu::binlog::constants::*;
    /// use byteorder::{ByteOrder, LittleEndian};
    ///
    /// let mut buf = [0u8; LOG_EVENT_HEADER_LEN];
    /// LittleEndian::write_u32(&mut buf[EVENT_TIMESTAMP_OFFSET..], 1700000000);
    /// buf[EVENT_TYPE_OFFSET] = EventType::Xid as u8;
    /// LittleEndian::write_u32(&mut buf[SERVER_ID_OFFSET..], 1);
    /// LittleEndian::write_u32(&mut buf[EVENT_LEN_OFFSET..], 31);
    /// LittleEndian::write_u32(&mut buf[LOG_POS_OFFSET..], 154);
    ///
    /// let hdr = EventHeader::parse(&buf).unwrap();
    /// assert_eq!(hdr.event_type(), Some(EventType::Xid));
    /// assert_eq!(hdr.data_written, 31);
    /// assert_eq!(hdr.start_pos(), Some(123));
    /// ```
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < LOG_EVENT_HEADER_LEN {
            return None;
        }
        Some(EventHeader {
            timestamp: LittleEndian::read_u32(&buf[EVENT_TIMESTAMP_OFFSET..]),
            type_code: buf[EVENT_TYPE_OFFSET],
            server_id: LittleEndian::read_u32(&buf[SERVER_ID_OFFSET..]),
            data_written: LittleEndian::read_u32(&buf[EVENT_LEN_OFFSET..]),
            log_pos: LittleEndian::read_u32(&buf[LOG_POS_OFFSET..]),
            flags: LittleEndian::read_u16(&buf[FLAGS_OFFSET..]),
        })
    }

    /// The event type, if the code is in the known range.
    pub fn event_type(&self) -> Option<EventType> {
        EventType::from_u8(self.type_code)
    }

    /// True if the raw type code is a valid event type.
    pub fn type_in_range(&self) -> bool {
        self.type_code != 0 && self.type_code < ENUM_END_EVENT
    }

    /// Start offset implied by the header's own position chain, or `None`
    /// if `log_pos` is smaller than the event length.
    pub fn start_pos(&self) -> Option<u64> {
        u64::from(self.log_pos).checked_sub(u64::from(self.data_written))
    }
}
