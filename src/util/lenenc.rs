//! MySQL length-encoded ("packed") integers.
//!
//! The classic 1/3/4/9-byte encoding used throughout the client protocol and
//! the binlog row format: a first byte below 251 is the value itself; 0xfc,
//! 0xfd and 0xfe announce 2-, 3- and 8-byte little-endian values. 0xfb is
//! the protocol's NULL marker and 0xff is an error packet header; neither is
//! a valid integer.

use byteorder::{ByteOrder, LittleEndian};

/// Decode a length-encoded integer from the start of `buf`.
///
/// Returns the value and the number of bytes consumed, or `None` if the
/// buffer is too short or starts with a marker that is not an integer.
///
/// # Examples
///
/// ```
/// use blu::util::lenenc::read_lenenc;
///
/// assert_eq!(read_lenenc(&[5]), Some((5, 1)));
/// assert_eq!(read_lenenc(&[0xfc, 0x34, 0x12]), Some((0x1234, 3)));
/// assert_eq!(read_lenenc(&[0xfb]), None);
/// ```
pub fn read_lenenc(buf: &[u8]) -> Option<(u64, usize)> {
    match *buf.first()? {
        v @ 0..=250 => Some((u64::from(v), 1)),
        0xfc => {
            let b = buf.get(1..3)?;
            Some((u64::from(LittleEndian::read_u16(b)), 3))
        }
        0xfd => {
            let b = buf.get(1..4)?;
            Some((u64::from(LittleEndian::read_u24(b)), 4))
        }
        0xfe => {
            let b = buf.get(1..9)?;
            Some((LittleEndian::read_u64(b), 9))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_byte() {
        assert_eq!(read_lenenc(&[0]), Some((0, 1)));
        assert_eq!(read_lenenc(&[250]), Some((250, 1)));
        assert_eq!(read_lenenc(&[7, 0xff, 0xff]), Some((7, 1)));
    }

    #[test]
    fn test_two_byte() {
        assert_eq!(read_lenenc(&[0xfc, 0xfb, 0x00]), Some((251, 3)));
        assert_eq!(read_lenenc(&[0xfc, 0xff, 0xff]), Some((65535, 3)));
    }

    #[test]
    fn test_three_byte() {
        assert_eq!(read_lenenc(&[0xfd, 0x00, 0x00, 0x01]), Some((0x010000, 4)));
        assert_eq!(read_lenenc(&[0xfd, 0xff, 0xff, 0xff]), Some((0xffffff, 4)));
    }

    #[test]
    fn test_eight_byte() {
        let mut buf = [0u8; 9];
        buf[0] = 0xfe;
        buf[1..9].copy_from_slice(&0x0123_4567_89ab_cdefu64.to_le_bytes());
        assert_eq!(read_lenenc(&buf), Some((0x0123_4567_89ab_cdef, 9)));
    }

    #[test]
    fn test_truncated() {
        assert_eq!(read_lenenc(&[]), None);
        assert_eq!(read_lenenc(&[0xfc, 0x01]), None);
        assert_eq!(read_lenenc(&[0xfd, 0x01, 0x02]), None);
        assert_eq!(read_lenenc(&[0xfe, 0, 0, 0, 0, 0, 0, 0]), None);
    }

    #[test]
    fn test_invalid_markers() {
        assert_eq!(read_lenenc(&[0xfb, 1, 2]), None);
        assert_eq!(read_lenenc(&[0xff, 1, 2]), None);
    }
}
