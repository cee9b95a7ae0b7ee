use std::fs::File;
use std::io::{BufWriter, Write};

use colored::Colorize;

use crate::binlog::event::EventType;
use crate::binlog::undo::{UndoConfig, UndoProcessor};
use crate::cli::wprintln;
use crate::BluError;

pub struct UndoOptions {
    pub file: String,
    pub out: String,
    /// Scan start offset; `None` starts just past the format description.
    pub start_pos: Option<u64>,
    pub server_id: Option<u32>,
    pub max_event_size: usize,
    pub quiet: bool,
}

pub fn execute(opts: &UndoOptions, writer: &mut dyn Write) -> Result<(), BluError> {
    let input = File::open(&opts.file)
        .map_err(|e| BluError::Io(format!("Cannot open {}: {}", opts.file, e)))?;
    let output = File::create(&opts.out)
        .map_err(|e| BluError::Io(format!("Cannot create {}: {}", opts.out, e)))?;

    // u32::MAX is the historical "leave the ids alone" sentinel.
    let server_id = opts.server_id.filter(|&id| id != u32::MAX);

    let mut processor = UndoProcessor::new(
        input,
        BufWriter::new(output),
        UndoConfig {
            max_event_size_mb: opts.max_event_size,
            server_id,
        },
    )?;

    if !opts.quiet {
        let fde = processor.fde();
        wprintln!(
            writer,
            "{}: binlog v{}, server {}, checksums {}",
            opts.file,
            fde.binlog_version,
            fde.server_version,
            if fde.has_checksum() { "CRC32" } else { "off" }
        )?;
    }

    let start_pos = opts.start_pos.unwrap_or_else(|| processor.body_start());
    let count = if opts.quiet {
        processor.scan(start_pos, |_, _| {})?
    } else {
        processor.scan(start_pos, |pos, header| {
            let _ = writeln!(
                writer,
                "@{} {}({}) size: {}; next pos: {}",
                pos,
                EventType::name_of(header.type_code),
                header.type_code,
                header.data_written,
                header.log_pos
            );
        })?
    };

    if !opts.quiet {
        wprintln!(writer, "transactions to undo: {}", count)?;
    }

    processor.emit()?;

    if !opts.quiet {
        wprintln!(
            writer,
            "{} {} transactions into {}",
            "Rolled back".green(),
            count,
            opts.out
        )?;
    }
    Ok(())
}
