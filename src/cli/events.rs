use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;

use serde::Serialize;

use crate::binlog::event::EventType;
use crate::binlog::reader::BinlogReader;
use crate::cli::wprintln;
use crate::BluError;

pub struct EventsOptions {
    pub file: String,
    pub start_pos: u64,
    pub json: bool,
    pub max_event_size: usize,
}

#[derive(Serialize)]
struct EventRecord {
    offset: u64,
    name: &'static str,
    type_code: u8,
    size: u32,
    end_pos: u32,
    timestamp: u32,
    server_id: u32,
}

pub fn execute(opts: &EventsOptions, writer: &mut dyn Write) -> Result<(), BluError> {
    let input = File::open(&opts.file)
        .map_err(|e| BluError::Io(format!("Cannot open {}: {}", opts.file, e)))?;
    let mut reader = BinlogReader::open(input, opts.max_event_size * 1024 * 1024)?;

    if !opts.json {
        let fde = reader.fde();
        wprintln!(
            writer,
            "{}: binlog v{}, server {}, checksums {}",
            opts.file,
            fde.binlog_version,
            fde.server_version,
            if fde.has_checksum() { "CRC32" } else { "off" }
        )?;
        wprintln!(writer)?;
    }

    let mut records = Vec::new();
    let mut counts: BTreeMap<&'static str, u64> = BTreeMap::new();
    let mut offset = opts.start_pos;
    loop {
        if reader.read_header_at(offset)?.is_none() {
            break;
        }
        let header = *reader.header();
        let name = EventType::name_of(header.type_code);
        if opts.json {
            records.push(EventRecord {
                offset,
                name,
                type_code: header.type_code,
                size: header.data_written,
                end_pos: header.log_pos,
                timestamp: header.timestamp,
                server_id: header.server_id,
            });
        } else {
            wprintln!(
                writer,
                "@{} {}({}) size: {}; next pos: {}",
                offset,
                name,
                header.type_code,
                header.data_written,
                header.log_pos
            )?;
        }
        *counts.entry(name).or_insert(0) += 1;

        // The walk follows the file's own position chain; a `log_pos` that
        // does not move forward cannot be walked further.
        let next = u64::from(header.log_pos);
        if next <= offset {
            if !opts.json {
                wprintln!(
                    writer,
                    "@{} walk stopped: next pos {} does not advance",
                    offset,
                    next
                )?;
            }
            break;
        }
        offset = next;
    }

    if opts.json {
        serde_json::to_writer_pretty(&mut *writer, &records)
            .map_err(|e| BluError::Io(e.to_string()))?;
        wprintln!(writer)?;
    } else {
        wprintln!(writer)?;
        wprintln!(writer, "Event type summary:")?;
        for (name, count) in &counts {
            wprintln!(writer, "  {:<28} {}", name, count)?;
        }
    }
    Ok(())
}
