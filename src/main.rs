use std::env;
use std::io::{self, BufRead, Read};
use std::process::ExitCode;

use clap::Parser;

use ccstatus::app;
use ccstatus::cli::Cli;
use ccstatus::error::StatusError;
use ccstatus::util::setup_tracing;

/// Hard cap on the stdin document, newline included.
const MAX_INPUT_LINE_BYTES: usize = 1024 * 1024;

fn main() -> ExitCode {
    setup_tracing();
    let cli = Cli::parse();
    let use_color = !cli.no_color && env::var_os("NO_COLOR").is_none();

    match run(&cli, use_color) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if matches!(err, StatusError::InvalidJson) {
                eprintln!("error: invalid JSON");
            }
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(cli: &Cli, use_color: bool) -> Result<(), StatusError> {
    // EOF without input is the quiet path: print nothing, exit clean.
    let Some(line) = read_stdin_line()? else {
        return Ok(());
    };
    app::process_document(&line, cli, use_color)
}

/// Read one line of raw bytes from stdin, enforcing the size cap and
/// stripping the trailing newline.
fn read_stdin_line() -> Result<Option<Vec<u8>>, StatusError> {
    let stdin = io::stdin().lock();
    let mut limited = stdin.take(MAX_INPUT_LINE_BYTES as u64 + 1);
    let mut line = Vec::new();
    limited.read_until(b'\n', &mut line)?;

    if line.is_empty() {
        return Ok(None);
    }
    if line.len() > MAX_INPUT_LINE_BYTES {
        eprintln!("error: input exceeds maximum size limit");
        return Err(StatusError::BufferTooSmall);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    Ok(Some(line))
}
