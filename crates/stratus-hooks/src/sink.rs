//! Line-oriented output shared by the hooks.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::Serialize;
use stratus_engine::HookError;

/// Output line format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Comma-separated values, no header.
    #[default]
    Csv,
    /// One JSON object per line.
    Ndjson,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => f.write_str("csv"),
            Self::Ndjson => f.write_str("ndjson"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Self::Csv),
            "ndjson" => Ok(Self::Ndjson),
            other => Err(format!("unsupported output format: {other}")),
        }
    }
}

/// A writer plus the format lines are written in. Every line is flushed
/// as soon as it is written.
pub struct Sink {
    out: Box<dyn Write + Send>,
    format: OutputFormat,
}

impl Sink {
    /// Wrap `out`.
    pub fn new<W: Write + Send + 'static>(out: W, format: OutputFormat) -> Self {
        Self {
            out: Box::new(out),
            format,
        }
    }

    /// The line format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write one CSV row.
    pub(crate) fn csv_row<I, T>(&mut self, fields: I) -> Result<(), HookError>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        let row: Vec<String> = fields.into_iter().map(|f| f.to_string()).collect();
        let written = writeln!(self.out, "{}", row.join(",")).and_then(|()| self.out.flush());
        self.logged(written.map_err(HookError::from))
    }

    /// Write one JSON line.
    pub(crate) fn json_line<T: Serialize>(&mut self, value: &T) -> Result<(), HookError> {
        let written = serde_json::to_writer(&mut self.out, value)
            .map_err(|e| HookError::Sink {
                reason: e.to_string(),
            })
            .and_then(|()| {
                self.out.write_all(b"\n")?;
                self.out.flush()?;
                Ok(())
            });
        self.logged(written)
    }

    fn logged(&self, result: Result<(), HookError>) -> Result<(), HookError> {
        if let Err(e) = &result {
            tracing::warn!(format = %self.format, error = %e, "hook sink write failed");
        }
        result
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Formats a float with a decimal point: `1.0`, `0.25`.
pub(crate) struct Num(pub f64);

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_test_utils::SharedBuffer;

    #[test]
    fn parses_formats() {
        assert_eq!("csv".parse(), Ok(OutputFormat::Csv));
        assert_eq!("ndjson".parse(), Ok(OutputFormat::Ndjson));
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Ndjson.to_string(), "ndjson");
    }

    #[test]
    fn writes_lines() {
        let buf = SharedBuffer::new();
        let mut sink = Sink::new(buf.clone(), OutputFormat::Csv);
        sink.csv_row([3.to_string(), Num(1.0).to_string()]).unwrap();
        sink.json_line(&serde_json::json!({ "k": 4 })).unwrap();
        assert_eq!(buf.contents(), "3,1.0\n{\"k\":4}\n");
    }
}
