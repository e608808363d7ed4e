//! # ASCII Table Formatter
//!
//! Renders a select `Response` as a fixed-width ASCII table:
//!
//! ```text
//! +----+-------+-----+
//! | id | name  | age |
//! +----+-------+-----+
//! | 1  | Alice | 30  |
//! | 2  | Bob   | 25  |
//! +----+-------+-----+
//! ```
//!
//! Column widths are the maximum of the header length and the longest
//! rendered value, capped at `MAX_COLUMN_WIDTH` with `...` truncation.

use std::fmt::Write;

use crate::response::Response;
use crate::types::Value;

const MAX_COLUMN_WIDTH: usize = 40;

pub struct TableFormatter {
    headers: Vec<String>,
    widths: Vec<usize>,
    rows: Vec<Vec<String>>,
}

impl TableFormatter {
    pub fn new(response: &Response) -> Self {
        let headers: Vec<String> = response.column_names().map(str::to_string).collect();
        let mut widths: Vec<usize> = headers.iter().map(|h| h.len().max(1)).collect();

        let mut rows = Vec::with_capacity(response.row_count());
        for row in 0..response.row_count() {
            let mut cells = Vec::with_capacity(headers.len());
            for (i, header) in headers.iter().enumerate() {
                let formatted = response
                    .get(header, row)
                    .map(format_value)
                    .unwrap_or_default();
                widths[i] = widths[i].max(formatted.len()).min(MAX_COLUMN_WIDTH);
                cells.push(formatted);
            }
            rows.push(cells);
        }

        Self {
            headers,
            widths,
            rows,
        }
    }

    pub fn render(&self) -> String {
        let mut output = String::new();

        self.write_separator(&mut output);
        self.write_row(&mut output, &self.headers);
        self.write_separator(&mut output);
        for row in &self.rows {
            self.write_row(&mut output, row);
        }
        self.write_separator(&mut output);

        output
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn write_separator(&self, output: &mut String) {
        output.push('+');
        for width in &self.widths {
            for _ in 0..(*width + 2) {
                output.push('-');
            }
            output.push('+');
        }
        output.push('\n');
    }

    fn write_row(&self, output: &mut String, cells: &[String]) {
        output.push('|');
        for (i, cell) in cells.iter().enumerate() {
            let width = self.widths.get(i).copied().unwrap_or(1);
            let _ = write!(output, " {:<width$} |", truncate(cell, width), width = width);
        }
        output.push('\n');
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Real(f) => format!("{:.6}", f)
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string(),
        Value::Str(s) => s.clone(),
        Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let mut result: String = s.chars().take(max_len - 3).collect();
        result.push_str("...");
        result
    }
}
