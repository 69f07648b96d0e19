use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use callscreen_core::hooks::HookResult;
use callscreen_core::{CallEvent, CallLog};
use tracing::info;

/// Appends one `timestamp,local_number,caller,outcome` row per call
pub struct CsvCallLog {
    path: PathBuf,
}

impl CsvCallLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CallLog for CsvCallLog {
    fn record(&mut self, event: &CallEvent) -> HookResult {
        let timestamp = event.timestamp.format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
        let caller = event.caller.as_deref().unwrap_or("");
        let row = csv_row(&[&timestamp, &event.local_number, caller, event.outcome.as_str()]);

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(row.as_bytes())?;

        info!(%timestamp, outcome = %event.outcome, caller, local = %event.local_number, "Call logged");
        Ok(())
    }
}

fn csv_row(fields: &[&str]) -> String {
    let mut row = fields.iter().map(|field| quote(field)).collect::<Vec<_>>().join(",");
    row.push_str("\r\n");
    row
}

fn quote(field: &str) -> String {
    if field.contains(|c: char| matches!(c, ',' | '"' | '\r' | '\n')) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
