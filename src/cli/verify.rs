use std::fs::File;
use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::binlog::checksum;
use crate::binlog::constants::{LOG_EVENT_HEADER_LEN, LOG_FILE_HEADER_SIZE};
use crate::binlog::event::EventType;
use crate::binlog::reader::BinlogReader;
use crate::cli::wprintln;
use crate::BluError;

pub struct VerifyOptions {
    pub file: String,
    pub json: bool,
    pub max_event_size: usize,
}

#[derive(Serialize)]
struct FailureRecord {
    offset: u64,
    name: &'static str,
    stored: u32,
    calculated: u32,
}

#[derive(Serialize)]
struct VerifyReport {
    file: String,
    checksums: &'static str,
    events: u64,
    valid: u64,
    invalid: u64,
    unreadable: u64,
    failures: Vec<FailureRecord>,
}

pub fn execute(opts: &VerifyOptions, writer: &mut dyn Write) -> Result<(), BluError> {
    let input = File::open(&opts.file)
        .map_err(|e| BluError::Io(format!("Cannot open {}: {}", opts.file, e)))?;
    let mut reader = BinlogReader::open(input, opts.max_event_size * 1024 * 1024)?;

    if !reader.has_checksum() {
        if opts.json {
            let report = VerifyReport {
                file: opts.file.clone(),
                checksums: "off",
                events: 0,
                valid: 0,
                invalid: 0,
                unreadable: 0,
                failures: Vec::new(),
            };
            serde_json::to_writer_pretty(&mut *writer, &report)
                .map_err(|e| BluError::Io(e.to_string()))?;
            wprintln!(writer)?;
        } else {
            wprintln!(
                writer,
                "{}: checksums are not enabled; nothing to verify",
                opts.file
            )?;
        }
        return Ok(());
    }

    let mut events = 0u64;
    let mut valid = 0u64;
    let mut unreadable = 0u64;
    let mut failures = Vec::new();
    let mut offset = LOG_FILE_HEADER_SIZE;
    loop {
        match reader.read_header_at(offset) {
            Ok(None) => break,
            Ok(Some(())) => {}
            Err(e) => {
                // A header that cannot even be framed ends the scan; report
                // it rather than discarding everything counted so far.
                events += 1;
                unreadable += 1;
                if !opts.json {
                    wprintln!(writer, "@{} {} header ({})", offset, "UNREADABLE".red(), e)?;
                }
                break;
            }
        }
        let header = *reader.header();
        let name = EventType::name_of(header.type_code);
        events += 1;

        if let Err(e) = reader.read_body() {
            // One bad body fails the event, not the whole file; the claimed
            // length still locates the next candidate event.
            unreadable += 1;
            if !opts.json {
                wprintln!(writer, "@{} {}: {} ({})", offset, name, "UNREADABLE".red(), e)?;
            }
            if (header.data_written as usize) < LOG_EVENT_HEADER_LEN {
                break;
            }
            offset += u64::from(header.data_written);
            continue;
        }

        let result = checksum::validate(reader.event());
        if result.valid {
            valid += 1;
        } else {
            if !opts.json {
                wprintln!(
                    writer,
                    "@{} {}: {} checksum (stored=0x{:08x}, calculated=0x{:08x})",
                    offset,
                    name,
                    "INVALID".red(),
                    result.stored,
                    result.calculated
                )?;
            }
            failures.push(FailureRecord {
                offset,
                name,
                stored: result.stored,
                calculated: result.calculated,
            });
        }
        offset += u64::from(header.data_written);
    }

    let invalid = failures.len() as u64;
    if opts.json {
        let report = VerifyReport {
            file: opts.file.clone(),
            checksums: "CRC32",
            events,
            valid,
            invalid,
            unreadable,
            failures,
        };
        serde_json::to_writer_pretty(&mut *writer, &report)
            .map_err(|e| BluError::Io(e.to_string()))?;
        wprintln!(writer)?;
    } else {
        wprintln!(writer)?;
        wprintln!(writer, "Summary:")?;
        wprintln!(writer, "  Total events: {}", events)?;
        wprintln!(writer, "  Valid checksums: {}", valid)?;
        if invalid > 0 {
            wprintln!(writer, "  Invalid checksums: {}", invalid.to_string().red())?;
        } else {
            wprintln!(writer, "  Invalid checksums: {}", invalid.to_string().green())?;
        }
        if unreadable > 0 {
            wprintln!(
                writer,
                "  Unreadable events: {}",
                unreadable.to_string().red()
            )?;
        }
    }

    if invalid + unreadable > 0 {
        std::process::exit(1);
    }
    Ok(())
}
