//! Query event body split.
//!
//! Only enough of the QUERY_EVENT layout is decoded to recover the schema
//! and the query bytes; the tool cares about exactly one query, the literal
//! `BEGIN` that opens every row-based transaction.

use byteorder::{ByteOrder, LittleEndian};

use crate::binlog::constants::LOG_EVENT_HEADER_LEN;

/// Borrowed view of a query event's interesting parts.
#[derive(Debug)]
pub struct QueryEvent<'a> {
    /// Id of the connection that issued the statement.
    pub thread_id: u32,
    /// Statement execution time in seconds.
    pub exec_time: u32,
    /// Error code recorded for the statement.
    pub error_code: u16,
    /// Default schema the statement ran in.
    pub schema: &'a [u8],
    /// The statement text, uninterpreted.
    pub query: &'a [u8],
}

impl<'a> QueryEvent<'a> {
    /// Split a query event.
    ///
    /// `event` is the full event buffer, `event_len` the event length with
    /// any checksum trailer already subtracted, and `post_header_len` the
    /// format-description length for QUERY_EVENT (13 for binlog version 4).
    ///
    /// The post-header is thread id (4), execution time (4), schema length
    /// (1), error code (2) and status-vars length (2); the body is the
    /// status vars, the schema name, one NUL, then the query text running to
    /// the end of the event.
    pub fn parse(event: &'a [u8], event_len: usize, post_header_len: u8) -> Option<Self> {
        let ph_start = LOG_EVENT_HEADER_LEN;
        let ph_end = ph_start + post_header_len as usize;
        if post_header_len < 13 || event_len > event.len() || ph_end > event_len {
            return None;
        }
        let ph = &event[ph_start..ph_end];

        let thread_id = LittleEndian::read_u32(&ph[0..]);
        let exec_time = LittleEndian::read_u32(&ph[4..]);
        let schema_len = ph[8] as usize;
        let error_code = LittleEndian::read_u16(&ph[9..]);
        let status_len = LittleEndian::read_u16(&ph[11..]) as usize;

        let schema_start = ph_end + status_len;
        let schema = event.get(schema_start..schema_start + schema_len)?;
        // One NUL byte separates the schema name from the query text.
        let query_start = schema_start + schema_len + 1;
        if *event.get(query_start - 1)? != 0 {
            return None;
        }
        let query = event.get(query_start..event_len)?;

        Some(QueryEvent {
            thread_id,
            exec_time,
            error_code,
            schema,
            query,
        })
    }

    /// True if this is the transaction-begin marker.
    pub fn is_begin(&self) -> bool {
        self.query == b"BEGIN"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_query_event(schema: &[u8], query: &[u8], status: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; LOG_EVENT_HEADER_LEN];
        buf.extend_from_slice(&77u32.to_le_bytes()); // thread id
        buf.extend_from_slice(&2u32.to_le_bytes()); // exec time
        buf.push(schema.len() as u8);
        buf.extend_from_slice(&0u16.to_le_bytes()); // error code
        buf.extend_from_slice(&(status.len() as u16).to_le_bytes());
        buf.extend_from_slice(status);
        buf.extend_from_slice(schema);
        buf.push(0);
        buf.extend_from_slice(query);
        buf
    }

    #[test]
    fn test_parse_begin() {
        let buf = make_query_event(b"test", b"BEGIN", &[]);
        let ev = QueryEvent::parse(&buf, buf.len(), 13).unwrap();
        assert_eq!(ev.thread_id, 77);
        assert_eq!(ev.exec_time, 2);
        assert_eq!(ev.error_code, 0);
        assert_eq!(ev.schema, b"test");
        assert_eq!(ev.query, b"BEGIN");
        assert!(ev.is_begin());
    }

    #[test]
    fn test_parse_with_status_vars() {
        let buf = make_query_event(b"db", b"BEGIN", &[0x00, 0x01, 0x02, 0x03]);
        let ev = QueryEvent::parse(&buf, buf.len(), 13).unwrap();
        assert_eq!(ev.schema, b"db");
        assert!(ev.is_begin());
    }

    #[test]
    fn test_not_begin() {
        let buf = make_query_event(b"test", b"DROP TABLE t1", &[]);
        let ev = QueryEvent::parse(&buf, buf.len(), 13).unwrap();
        assert!(!ev.is_begin());

        // Prefix is not enough; the query must be the exact literal.
        let buf = make_query_event(b"test", b"BEGIN WORK", &[]);
        let ev = QueryEvent::parse(&buf, buf.len(), 13).unwrap();
        assert!(!ev.is_begin());
    }

    #[test]
    fn test_checksum_excluded_from_query() {
        let mut buf = make_query_event(b"test", b"BEGIN", &[]);
        let body_len = buf.len();
        buf.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let ev = QueryEvent::parse(&buf, body_len, 13).unwrap();
        assert_eq!(ev.query, b"BEGIN");
    }

    #[test]
    fn test_truncated() {
        let buf = make_query_event(b"test", b"BEGIN", &[]);
        assert!(QueryEvent::parse(&buf[..LOG_EVENT_HEADER_LEN + 8], 27, 13).is_none());
    }
}
