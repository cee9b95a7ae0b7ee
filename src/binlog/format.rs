//! Format description event.
//!
//! The event at file offset 4 describes how every other event in the file is
//! laid out: the binlog format version, the server version that wrote the
//! file, a per-event-type post-header length table, and (for servers newer
//! than 5.6.1) a checksum-algorithm descriptor that governs whether each
//! event carries a trailing CRC32.
//!
//! Body layout after the 19-byte common header:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 2 | Binlog format version (4 for MySQL 5.0+) |
//! | 2 | 50 | Server version string, NUL-padded |
//! | 52 | 4 | Creation timestamp |
//! | 56 | 1 | Common header length |
//! | 57 | n | Post-header length per event type, indexed by `type code - 1` |
//!
//! On checksum-aware servers the body ends with one algorithm byte followed
//! by the event's own CRC32, and those five bytes are not part of the
//! post-header table.

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::binlog::constants::*;

/// Checksum algorithm announced by the format description event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChecksumAlgorithm {
    /// Events carry no checksum trailer.
    Off,
    /// Every event ends with a 4-byte CRC32 (ISO 3309).
    Crc32,
    /// Reserved or unknown algorithm byte.
    Other(u8),
}

impl ChecksumAlgorithm {
    pub fn from_u8(val: u8) -> Self {
        match val {
            0 => ChecksumAlgorithm::Off,
            1 => ChecksumAlgorithm::Crc32,
            v => ChecksumAlgorithm::Other(v),
        }
    }
}

/// Decoded format description event.
#[derive(Debug, Clone, Serialize)]
pub struct FormatDescription {
    /// Binlog format version; 4 for every supported log.
    pub binlog_version: u16,
    /// Server version string, e.g. "5.7.44-log".
    pub server_version: String,
    /// Creation timestamp from the event body.
    pub create_timestamp: u32,
    /// Length of the common event header (19).
    pub common_header_len: u8,
    /// Post-header length for each event type, indexed by `type code - 1`.
    #[serde(skip)]
    pub post_header_len: Vec<u8>,
    /// Checksum algorithm for this file, including the format description
    /// event itself.
    pub checksum_alg: ChecksumAlgorithm,
}

impl FormatDescription {
    /// Parse a format description event from a full event buffer (common
    /// header included). `data_written` is the on-disk event length.
    ///
    /// Returns `None` when the buffer is too small to hold the fixed body.
    pub fn parse(event: &[u8], data_written: usize) -> Option<Self> {
        let fixed_end = LOG_EVENT_HEADER_LEN + ST_POST_HEADER_TABLE_OFFSET;
        if data_written < fixed_end || event.len() < data_written {
            return None;
        }
        let body = &event[LOG_EVENT_HEADER_LEN..data_written];

        let binlog_version = LittleEndian::read_u16(&body[ST_BINLOG_VER_OFFSET..]);
        let raw_version = &body[ST_SERVER_VER_OFFSET..ST_SERVER_VER_OFFSET + ST_SERVER_VER_LEN];
        let server_version: String = raw_version
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect();
        let create_timestamp = LittleEndian::read_u32(&body[ST_CREATED_OFFSET..]);
        let common_header_len = body[ST_COMMON_HEADER_LEN_OFFSET];

        // Servers from 5.6.1 on append an algorithm byte and the event's own
        // CRC32 after the post-header table; older servers end the body with
        // the table itself.
        let checksum_aware = version_product(&server_version) >= checksum_version_product();
        let (checksum_alg, table_end) = if checksum_aware {
            let tail = BINLOG_CHECKSUM_LEN + BINLOG_CHECKSUM_ALG_DESC_LEN;
            if data_written < fixed_end + tail {
                return None;
            }
            let alg = ChecksumAlgorithm::from_u8(event[data_written - tail]);
            (alg, data_written - tail)
        } else {
            (ChecksumAlgorithm::Off, data_written)
        };

        let post_header_len = event[fixed_end..table_end].to_vec();

        Some(FormatDescription {
            binlog_version,
            server_version,
            create_timestamp,
            common_header_len,
            post_header_len,
            checksum_alg,
        })
    }

    /// True if every event in this file carries a CRC32 trailer.
    pub fn has_checksum(&self) -> bool {
        self.checksum_alg == ChecksumAlgorithm::Crc32
    }

    /// Post-header length for the given event type code.
    pub fn post_header_len(&self, type_code: u8) -> Option<u8> {
        if type_code == 0 {
            return None;
        }
        self.post_header_len.get(type_code as usize - 1).copied()
    }
}

/// Split a server version string into its numeric components, stopping each
/// component at the first non-digit ("5.7.44-log" -> [5, 7, 44]).
fn split_server_version(version: &str) -> [u32; 3] {
    let mut out = [0u32; 3];
    for (i, part) in version.splitn(3, '.').enumerate() {
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        out[i] = digits.parse().unwrap_or(0);
        if digits.len() != part.len() {
            break;
        }
    }
    out
}

fn version_product(version: &str) -> u32 {
    let [major, minor, patch] = split_server_version(version);
    (major * 256 + minor) * 256 + patch
}

fn checksum_version_product() -> u32 {
    let [major, minor, patch] = CHECKSUM_VERSION_SPLIT;
    (major * 256 + minor) * 256 + patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binlog::event::{EventType, ENUM_END_EVENT};

    const N_TYPES: usize = ENUM_END_EVENT as usize - 1;

    fn make_fde(server_version: &str, alg: Option<u8>) -> Vec<u8> {
        let n_tail = if alg.is_some() { 5 } else { 0 };
        let data_written = LOG_EVENT_HEADER_LEN + ST_POST_HEADER_TABLE_OFFSET + N_TYPES + n_tail;
        let mut buf = vec![0u8; data_written];
        buf[EVENT_TYPE_OFFSET] = EventType::FormatDescription as u8;
        LittleEndian::write_u32(&mut buf[EVENT_LEN_OFFSET..], data_written as u32);

        let body = LOG_EVENT_HEADER_LEN;
        LittleEndian::write_u16(&mut buf[body..], 4);
        buf[body + ST_SERVER_VER_OFFSET..body + ST_SERVER_VER_OFFSET + server_version.len()]
            .copy_from_slice(server_version.as_bytes());
        LittleEndian::write_u32(&mut buf[body + ST_CREATED_OFFSET..], 1_700_000_000);
        buf[body + ST_COMMON_HEADER_LEN_OFFSET] = LOG_EVENT_HEADER_LEN as u8;

        let table = body + ST_POST_HEADER_TABLE_OFFSET;
        buf[table + EventType::Query as usize - 1] = 13;
        buf[table + EventType::TableMap as usize - 1] = 8;
        buf[table + EventType::WriteRows as usize - 1] = ROWS_HEADER_LEN_V2;

        if let Some(a) = alg {
            buf[data_written - 5] = a;
        }
        buf
    }

    #[test]
    fn test_parse_crc32() {
        let buf = make_fde("5.7.44-log", Some(1));
        let fde = FormatDescription::parse(&buf, buf.len()).unwrap();
        assert_eq!(fde.binlog_version, 4);
        assert_eq!(fde.server_version, "5.7.44-log");
        assert_eq!(fde.common_header_len, 19);
        assert_eq!(fde.checksum_alg, ChecksumAlgorithm::Crc32);
        assert!(fde.has_checksum());
        assert_eq!(fde.post_header_len.len(), N_TYPES);
        assert_eq!(fde.post_header_len(EventType::Query as u8), Some(13));
        assert_eq!(fde.post_header_len(EventType::TableMap as u8), Some(8));
        assert_eq!(
            fde.post_header_len(EventType::WriteRows as u8),
            Some(ROWS_HEADER_LEN_V2)
        );
    }

    #[test]
    fn test_parse_checksum_off() {
        let buf = make_fde("5.7.44-log", Some(0));
        let fde = FormatDescription::parse(&buf, buf.len()).unwrap();
        assert_eq!(fde.checksum_alg, ChecksumAlgorithm::Off);
        assert!(!fde.has_checksum());
        assert_eq!(fde.post_header_len.len(), N_TYPES);
    }

    #[test]
    fn test_parse_pre_checksum_server() {
        let buf = make_fde("5.5.62", None);
        let fde = FormatDescription::parse(&buf, buf.len()).unwrap();
        assert_eq!(fde.checksum_alg, ChecksumAlgorithm::Off);
        assert_eq!(fde.post_header_len.len(), N_TYPES);
    }

    #[test]
    fn test_parse_unknown_algorithm() {
        let buf = make_fde("8.0.36", Some(7));
        let fde = FormatDescription::parse(&buf, buf.len()).unwrap();
        assert_eq!(fde.checksum_alg, ChecksumAlgorithm::Other(7));
        assert!(!fde.has_checksum());
    }

    #[test]
    fn test_parse_too_short() {
        let buf = vec![0u8; LOG_EVENT_HEADER_LEN + 10];
        assert!(FormatDescription::parse(&buf, buf.len()).is_none());
    }

    #[test]
    fn test_post_header_len_bounds() {
        let buf = make_fde("5.7.44-log", Some(1));
        let fde = FormatDescription::parse(&buf, buf.len()).unwrap();
        assert_eq!(fde.post_header_len(0), None);
        assert_eq!(fde.post_header_len(ENUM_END_EVENT), None);
    }

    #[test]
    fn test_version_split() {
        assert_eq!(split_server_version("5.7.44-log"), [5, 7, 44]);
        assert_eq!(split_server_version("8.0.36"), [8, 0, 36]);
        assert_eq!(split_server_version("5.5.5-10.6.12-MariaDB"), [5, 5, 5]);
        assert_eq!(split_server_version("garbage"), [0, 0, 0]);
        assert!(version_product("5.6.1") >= checksum_version_product());
        assert!(version_product("5.5.62") < checksum_version_product());
        assert!(version_product("8.0.36") >= checksum_version_product());
    }
}
