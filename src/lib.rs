//! Binary log rollback toolkit.
//!
//! `blu` reads a MySQL binary log and writes a new one whose transactions,
//! when replayed, undo the row changes recorded in the original:
//! WRITE_ROWS events become DELETE_ROWS, DELETE_ROWS become WRITE_ROWS, and
//! UPDATE_ROWS events have their before and after images swapped. The tool
//! works purely on the on-disk byte format - no server connection, no SQL.
//!
//! Start with [`binlog::undo::UndoProcessor`] to scan and invert a log, or
//! [`binlog::reader::BinlogReader`] to walk events yourself.

pub mod binlog;
pub mod cli;
pub mod util;

use thiserror::Error;

use crate::binlog::event::EventType;

/// Error taxonomy for log processing.
///
/// Every kind is terminal: a non-`Ok` status aborts the operation and any
/// partially written output is the caller's to discard.
#[derive(Error, Debug)]
pub enum BluError {
    /// Short read or write against either stream.
    #[error("I/O error: {0}")]
    Io(String),

    /// The log ended where an event was still required.
    #[error("unexpected end of log at offset {0}")]
    Eof(u64),

    /// Framing damage: type code out of range, broken position chain, or an
    /// event body that contradicts its companion table map.
    #[error("corrupt event at offset {pos}: {reason}")]
    CorruptEvent { pos: u64, reason: String },

    /// An event of a type not permitted where it was found.
    #[error("unexpected {} event at offset {pos}", EventType::name_of(*.type_code))]
    UnexpectedEventType { pos: u64, type_code: u8 },

    /// An event larger than the configured buffer (or a table map larger
    /// than its fixed cap).
    #[error("event at offset {pos} is {size} bytes, larger than the limit of {max}")]
    EventTooBig { pos: u64, size: u32, max: usize },

    /// A row event logged without the full before-and-after column images.
    #[error("row event at offset {0} does not carry full row images")]
    NotFullRowImage(u64),

    /// The scanned range contained no complete BEGIN..XID transaction.
    #[error("no transactions found in the scanned range")]
    NoTransactions,
}

impl BluError {
    pub(crate) fn io(err: std::io::Error) -> Self {
        BluError::Io(err.to_string())
    }
}
