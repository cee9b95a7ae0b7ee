use clap::{Parser, Subcommand, ValueEnum};

/// Top-level CLI definition for the `blu` binary.
#[derive(Parser)]
#[command(name = "blu")]
#[command(about = "MySQL binary log rollback toolkit")]
#[command(version)]
pub struct Cli {
    /// Control colored output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    #[command(subcommand)]
    pub command: Commands,
}

/// Controls when colored output is emitted.
#[derive(Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

/// Available subcommands for the `blu` CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Build a rollback binlog from committed transactions
    ///
    /// Scans the input log from --start-pos, indexing every complete
    /// BEGIN..XID transaction, then writes a new binlog whose transactions
    /// undo the originals in reverse order: inserts become deletes, deletes
    /// become inserts, and updates swap their before and after row images.
    /// Event checksums are recomputed when the source log carries them, and
    /// the origin server id can be rewritten on the way out. The source must
    /// be logged with binlog_row_image=FULL; partial images are rejected.
    Undo {
        /// Path to the source binlog file
        #[arg(short, long)]
        file: String,

        /// Path of the rollback binlog to create (truncated if it exists)
        #[arg(short, long)]
        out: String,

        /// Byte offset to start scanning at (default: just past the
        /// format description)
        #[arg(long)]
        start_pos: Option<u64>,

        /// Rewrite the origin server id of every emitted event
        /// (4294967295 leaves the original ids untouched)
        #[arg(long)]
        server_id: Option<u32>,

        /// Event buffer size in MiB; larger events are rejected
        #[arg(long, default_value_t = 16)]
        max_event_size: usize,

        /// Suppress the per-event scan trace
        #[arg(short, long)]
        quiet: bool,
    },

    /// List the events in a binlog file
    ///
    /// Walks event headers from --start-pos and prints one line per event:
    /// offset, name, numeric type code, length and end-of-event position,
    /// followed by a per-type count summary. Headers are framed but not
    /// validated, so damaged files can still be listed.
    Events {
        /// Path to the binlog file
        #[arg(short, long)]
        file: String,

        /// Byte offset to start listing at
        #[arg(long, default_value_t = 4)]
        start_pos: u64,

        /// Output in JSON format
        #[arg(long)]
        json: bool,

        /// Event buffer size in MiB
        #[arg(long, default_value_t = 16)]
        max_event_size: usize,
    },

    /// Validate per-event CRC32 checksums
    ///
    /// Recomputes the CRC32 of every event, the format description event
    /// included, and compares it with the stored trailer. Events whose
    /// bodies cannot be read are reported and skipped, so the scan still
    /// covers the rest of the file. A log whose format description declares
    /// checksums off reports that and exits 0; any mismatch or unreadable
    /// event makes the process exit 1.
    Verify {
        /// Path to the binlog file
        #[arg(short, long)]
        file: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,

        /// Event buffer size in MiB
        #[arg(long, default_value_t = 16)]
        max_event_size: usize,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
