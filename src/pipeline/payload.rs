//! Tabular row payloads for modification requests.

use crate::types::{PipelineError, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};

/// Rows supplied alongside a modification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPayload {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RowPayload {
    /// Parse CSV text, header line first.
    ///
    /// Surrounding whitespace on every field is trimmed, blank lines are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvalidPayload` if the text is not CSV, the
    /// header is empty, a row has the wrong number of fields, or there are no
    /// data rows
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .has_headers(true)
            .from_reader(text.trim().as_bytes());

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| PipelineError::InvalidPayload(e.to_string()))?
            .iter()
            .map(String::from)
            .collect();

        if columns.iter().all(|c| c.is_empty()) {
            return Err(PipelineError::InvalidPayload("missing header row".to_string()));
        }

        let rows = reader
            .records()
            .map(|record| {
                record
                    .map(|r| r.iter().map(String::from).collect::<Vec<_>>())
                    .map_err(|e| PipelineError::InvalidPayload(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        if rows.is_empty() {
            return Err(PipelineError::InvalidPayload("no data rows".to_string()));
        }

        Ok(Self { columns, rows })
    }

    /// Render back to canonical CSV (trimmed fields, quoted where needed).
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = WriterBuilder::new().from_writer(Vec::new());
        writer
            .write_record(&self.columns)
            .map_err(|e| PipelineError::InvalidPayload(e.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|e| PipelineError::InvalidPayload(e.to_string()))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| PipelineError::InternalError(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| PipelineError::InternalError(e.to_string()))
    }
}
