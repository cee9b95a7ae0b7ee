//! Two-pass rollback processing.
//!
//! [`UndoProcessor::scan`] walks the log from a caller-supplied offset and
//! indexes every complete BEGIN..XID transaction: the BEGIN query event, the
//! table map heading each row batch, and the commit marker. The events in
//! between are only framed, never decoded.
//!
//! [`UndoProcessor::emit`] then writes a new log: the magic, the original
//! format description, and the indexed transactions in reverse order. Within
//! a transaction the table-map batches are emitted in reverse; within a
//! batch, row events are read forward, inverted against the batch's table
//! map and written out. Replaying several inverted events of one batch in
//! their original order is equivalent under replay; the rollback ordering is
//! achieved at the transaction and batch levels.
//!
//! Emitted events keep their original `log_pos`, so offsets remain usable as
//! stable event identifiers; consumers must not expect a monotonic chain
//! across the output file.

use std::io::{Read, Seek, Write};

use byteorder::{ByteOrder, LittleEndian};

use crate::binlog::checksum;
use crate::binlog::constants::*;
use crate::binlog::event::{EventHeader, EventType};
use crate::binlog::format::FormatDescription;
use crate::binlog::query::QueryEvent;
use crate::binlog::reader::BinlogReader;
use crate::binlog::rows;
use crate::binlog::table_map::TableMapEvent;
use crate::BluError;

/// Position and on-disk size of one event.
#[derive(Debug, Clone, Copy)]
pub struct EventPos {
    pub pos: u64,
    pub size: u32,
}

/// One complete transaction found by the scan.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// The BEGIN query event.
    pub begin: EventPos,
    /// Table map events, one per row batch, in file order.
    pub rows: Vec<EventPos>,
    /// The XID commit marker.
    pub xid: EventPos,
}

/// Processor configuration.
#[derive(Debug, Clone)]
pub struct UndoConfig {
    /// Event buffer size, in mebibytes.
    pub max_event_size_mb: usize,
    /// Replacement origin server id written into every emitted event;
    /// `None` leaves the original ids untouched.
    pub server_id: Option<u32>,
}

impl Default for UndoConfig {
    fn default() -> Self {
        UndoConfig {
            max_event_size_mb: DEFAULT_MAX_EVENT_SIZE_MB,
            server_id: None,
        }
    }
}

enum ScanOutcome {
    Transaction(EventPos),
    EndOfLog,
}

enum RowScan {
    TableMap(EventPos),
    Row,
    Xid(EventPos),
}

/// Scans a binlog for transactions and emits their inversion.
///
/// Both streams stay owned by the caller (pass `&mut File` or any other
/// `Read + Seek` / `Write`); the processor seeks the input freely and writes
/// the output strictly append-style. One instance holds all mutable state -
/// callers must serialize access.
pub struct UndoProcessor<R, W> {
    reader: BinlogReader<R>,
    output: W,
    server_id: Option<u32>,
    transactions: Vec<Transaction>,
}

impl<R: Read + Seek, W: Write> UndoProcessor<R, W> {
    /// Open the input (magic plus format description) and set up buffers.
    pub fn new(input: R, output: W, config: UndoConfig) -> Result<Self, BluError> {
        let reader = BinlogReader::open(input, config.max_event_size_mb * 1024 * 1024)?;
        Ok(UndoProcessor {
            reader,
            output,
            server_id: config.server_id,
            transactions: Vec::new(),
        })
    }

    /// The input file's format description.
    pub fn fde(&self) -> &FormatDescription {
        self.reader.fde()
    }

    /// Offset of the first event after the format description - the
    /// default place to start a scan.
    pub fn body_start(&self) -> u64 {
        self.reader.body_start()
    }

    /// Transactions recorded by the last [`Self::scan`].
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Scan pass: index every complete transaction from `start_pos` to the
    /// terminating ROTATE/STOP event or the end of the file.
    ///
    /// `trace` is invoked once per event header read, with the event's start
    /// offset; pass a no-op closure for quiet operation. A scan that finds
    /// nothing to undo fails with [`BluError::NoTransactions`].
    pub fn scan(
        &mut self,
        start_pos: u64,
        mut trace: impl FnMut(u64, &EventHeader),
    ) -> Result<usize, BluError> {
        self.scan_inner(start_pos, &mut trace)
    }

    fn scan_inner(
        &mut self,
        start_pos: u64,
        trace: &mut dyn FnMut(u64, &EventHeader),
    ) -> Result<usize, BluError> {
        self.transactions.clear();
        self.reader.seek_to(start_pos)?;
        loop {
            match self.scan_begin(trace)? {
                ScanOutcome::EndOfLog => break,
                ScanOutcome::Transaction(begin) => {
                    let mut batches = Vec::new();
                    let xid = loop {
                        match self.scan_row_or_xid(trace)? {
                            RowScan::TableMap(e) => batches.push(e),
                            RowScan::Row => {}
                            RowScan::Xid(e) => break e,
                        }
                    };
                    self.transactions.push(Transaction {
                        begin,
                        rows: batches,
                        xid,
                    });
                }
            }
        }
        if self.transactions.is_empty() {
            return Err(BluError::NoTransactions);
        }
        Ok(self.transactions.len())
    }

    /// Read one header, trace it, then apply the strict header checks.
    fn next_header(
        &mut self,
        trace: &mut dyn FnMut(u64, &EventHeader),
    ) -> Result<Option<()>, BluError> {
        match self.reader.read_header()? {
            None => Ok(None),
            Some(()) => {
                trace(self.reader.pos(), self.reader.header());
                self.reader.verify_header()?;
                Ok(Some(()))
            }
        }
    }

    fn next_header_at(
        &mut self,
        pos: u64,
        trace: &mut dyn FnMut(u64, &EventHeader),
    ) -> Result<Option<()>, BluError> {
        self.reader.seek_to(pos)?;
        self.next_header(trace)
    }

    /// Wait for the start of a transaction: a QUERY event whose statement is
    /// the literal `BEGIN`. A GTID or anonymous-GTID event ahead of it is
    /// skipped; ROTATE and STOP end the scan.
    fn scan_begin(
        &mut self,
        trace: &mut dyn FnMut(u64, &EventHeader),
    ) -> Result<ScanOutcome, BluError> {
        if self.next_header(trace)?.is_none() {
            return Ok(ScanOutcome::EndOfLog);
        }
        let mut header = *self.reader.header();
        if matches!(
            header.event_type(),
            Some(EventType::Gtid | EventType::AnonymousGtid)
        ) {
            if self
                .next_header_at(u64::from(header.log_pos), trace)?
                .is_none()
            {
                return Ok(ScanOutcome::EndOfLog);
            }
            header = *self.reader.header();
        }

        match header.event_type() {
            Some(EventType::Rotate | EventType::Stop) => return Ok(ScanOutcome::EndOfLog),
            Some(EventType::Query) if header.data_written <= MAX_BEGIN_EVENT_LEN => {}
            _ => {
                return Err(BluError::UnexpectedEventType {
                    pos: self.reader.pos(),
                    type_code: header.type_code,
                })
            }
        }

        let pos = self.reader.pos();
        self.reader.read_body()?;
        let phl = self.post_header_len(EventType::Query as u8, pos)?;
        let query = QueryEvent::parse(self.reader.event(), self.reader.event_len(), phl)
            .ok_or_else(|| BluError::CorruptEvent {
                pos,
                reason: "unparseable query event".into(),
            })?;
        if !query.is_begin() {
            return Err(BluError::UnexpectedEventType {
                pos,
                type_code: header.type_code,
            });
        }
        Ok(ScanOutcome::Transaction(EventPos {
            pos,
            size: header.data_written,
        }))
    }

    /// Consume one in-transaction event: record table maps, skip row events
    /// and row-query annotations, close the transaction on XID.
    fn scan_row_or_xid(
        &mut self,
        trace: &mut dyn FnMut(u64, &EventHeader),
    ) -> Result<RowScan, BluError> {
        if self.next_header(trace)?.is_none() {
            return Err(BluError::Eof(self.reader.pos()));
        }
        let header = *self.reader.header();
        let pos = self.reader.pos();

        let outcome = match header.event_type() {
            Some(EventType::TableMap) => {
                if header.data_written > MAX_TABLE_MAP_SIZE {
                    return Err(BluError::EventTooBig {
                        pos,
                        size: header.data_written,
                        max: MAX_TABLE_MAP_SIZE as usize,
                    });
                }
                RowScan::TableMap(EventPos {
                    pos,
                    size: header.data_written,
                })
            }
            Some(
                EventType::WriteRows
                | EventType::UpdateRows
                | EventType::DeleteRows
                | EventType::RowsQuery,
            ) => RowScan::Row,
            Some(EventType::Xid) => RowScan::Xid(EventPos {
                pos,
                size: header.data_written,
            }),
            _ => {
                return Err(BluError::UnexpectedEventType {
                    pos,
                    type_code: header.type_code,
                })
            }
        };
        self.reader.skip_body()?;
        Ok(outcome)
    }

    /// Emission pass: write the rollback log from the recorded index.
    ///
    /// Must follow a successful [`Self::scan`] on the same input.
    pub fn emit(&mut self) -> Result<(), BluError> {
        self.output.write_all(&BINLOG_MAGIC).map_err(BluError::io)?;
        self.copy_event(LOG_FILE_HEADER_SIZE)?;

        let transactions = self.transactions.clone();
        for trans in transactions.iter().rev() {
            self.copy_event(trans.begin.pos)?;
            for batch in trans.rows.iter().rev() {
                // Decode a private copy of the table map, then emit the raw
                // event before the buffer is reused for its row events.
                self.reader.read_event_at(batch.pos)?;
                let phl = self.post_header_len(EventType::TableMap as u8, batch.pos)?;
                let table_map =
                    TableMapEvent::parse(self.reader.event(), self.reader.event_len(), phl)
                        .ok_or_else(|| BluError::CorruptEvent {
                            pos: batch.pos,
                            reason: "unparseable table map event".into(),
                        })?;
                self.write_current()?;

                let mut row_pos = u64::from(self.reader.header().log_pos);
                loop {
                    if self.reader.read_header_at(row_pos)?.is_none() {
                        return Err(BluError::Eof(row_pos));
                    }
                    self.reader.verify_header()?;
                    let header = *self.reader.header();
                    match header.event_type() {
                        // Annotations are dropped from the rollback.
                        Some(EventType::RowsQuery) => {
                            row_pos = u64::from(header.log_pos);
                        }
                        // The next table map opens the following batch,
                        // which the outer loop has already emitted.
                        Some(EventType::TableMap) => break,
                        _ => {
                            self.reader.read_body()?;
                            self.invert_current(&table_map, row_pos)?;
                            self.write_current()?;
                            row_pos = u64::from(header.log_pos);
                        }
                    }
                    if row_pos >= trans.xid.pos {
                        break;
                    }
                }
            }
            self.copy_event(trans.xid.pos)?;
        }
        self.output.flush().map_err(BluError::io)
    }

    fn post_header_len(&self, type_code: u8, pos: u64) -> Result<u8, BluError> {
        self.reader
            .fde()
            .post_header_len(type_code)
            .ok_or_else(|| BluError::CorruptEvent {
                pos,
                reason: format!("no post-header length for event type {}", type_code),
            })
    }

    /// Copy one event from the input to the output, subject to the
    /// integrity rewriter.
    fn copy_event(&mut self, pos: u64) -> Result<(), BluError> {
        self.reader.read_event_at(pos)?;
        self.write_current()
    }

    /// Invert the row event currently in the buffer against `table_map`.
    fn invert_current(&mut self, table_map: &TableMapEvent, pos: u64) -> Result<(), BluError> {
        let header = *self.reader.header();
        let phl = self.post_header_len(header.type_code, pos)?;
        let event_len = self.reader.event_len();
        rows::invert(
            self.reader.event_mut(),
            &header,
            phl,
            event_len,
            table_map,
            pos,
        )
    }

    /// Integrity rewriter plus the actual write: overwrite the server id if
    /// configured, recompute the CRC32 trailer if the file carries
    /// checksums, then append the event bytes to the output.
    fn write_current(&mut self) -> Result<(), BluError> {
        if let Some(id) = self.server_id {
            let event = self.reader.event_mut();
            LittleEndian::write_u32(&mut event[SERVER_ID_OFFSET..], id);
        }
        if self.reader.has_checksum() {
            checksum::rewrite(self.reader.event_mut());
        }
        self.output
            .write_all(self.reader.event())
            .map_err(BluError::io)
    }
}
