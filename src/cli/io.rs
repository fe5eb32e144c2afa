//! JSON I/O handling for CLI
//!
//! - Input: one envelope via stdin (UTF-8, may span lines)
//! - Output: one JSON object per line on stdout

use std::io::{self, Read, Write};

use serde_json::{json, Value};

use crate::errors::FieldDetail;

use super::errors::{CliError, CliResult};

/// Read all of stdin
pub fn read_input() -> CliResult<Vec<u8>> {
    let mut buffer = Vec::new();
    io::stdin().lock().read_to_end(&mut buffer)?;

    if buffer.iter().all(u8::is_ascii_whitespace) {
        return Err(CliError::io_error("Empty input"));
    }
    Ok(buffer)
}

/// Write a value as a single line to stdout
pub fn write_json(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_json(&json!({
        "status": "ok",
        "data": data
    }))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str, details: &[FieldDetail]) -> CliResult<()> {
    write_json(&json!({
        "status": "error",
        "code": code,
        "message": message,
        "details": details
    }))
}
