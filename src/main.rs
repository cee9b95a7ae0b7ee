#[cfg(not(feature = "cli"))]
compile_error!("The `blu` binary requires the `cli` feature. Build with `--features cli`.");

use clap::Parser;
use std::io::Write;
use std::process;

use blu::cli;
use blu::cli::app::{Cli, ColorMode, Commands};

fn main() {
    let cli = Cli::parse();

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {} // colored auto-detects tty
    }

    let mut writer: Box<dyn Write> = Box::new(std::io::stdout());

    let result = match cli.command {
        Commands::Undo {
            file,
            out,
            start_pos,
            server_id,
            max_event_size,
            quiet,
        } => cli::undo::execute(
            &cli::undo::UndoOptions {
                file,
                out,
                start_pos,
                server_id,
                max_event_size,
                quiet,
            },
            &mut writer,
        ),

        Commands::Events {
            file,
            start_pos,
            json,
            max_event_size,
        } => cli::events::execute(
            &cli::events::EventsOptions {
                file,
                start_pos,
                json,
                max_event_size,
            },
            &mut writer,
        ),

        Commands::Verify {
            file,
            json,
            max_event_size,
        } => cli::verify::execute(
            &cli::verify::VerifyOptions {
                file,
                json,
                max_event_size,
            },
            &mut writer,
        ),

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "blu", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
