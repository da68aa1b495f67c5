//! Record output in JSON or JSONL.

use clap::ValueEnum;
use serde::Serialize;
use std::io::Write;

/// How records are written to stdout or `--output`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One pretty-printed JSON document (an array for directories)
    #[default]
    Json,
    /// One compact JSON object per line, written as each upload finishes
    Jsonl,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Writes serializable records to any `Write` sink.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    written: usize,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            written: 0,
        }
    }

    /// Write a single record.
    pub fn write<T: Serialize>(&mut self, item: &T) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Jsonl => serde_json::to_writer(&mut self.writer, item)?,
            OutputFormat::Json if self.pretty => {
                serde_json::to_writer_pretty(&mut self.writer, item)?
            }
            OutputFormat::Json => serde_json::to_writer(&mut self.writer, item)?,
        }
        writeln!(self.writer)?;
        self.written += 1;
        Ok(())
    }

    /// Write a batch. JSON gets a single array; JSONL gets one line per item.
    pub fn write_all<T: Serialize>(&mut self, items: &[T]) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => {
                if self.pretty {
                    serde_json::to_writer_pretty(&mut self.writer, items)?;
                } else {
                    serde_json::to_writer(&mut self.writer, items)?;
                }
                writeln!(self.writer)?;
                self.written += items.len();
            }
            OutputFormat::Jsonl => {
                for item in items {
                    self.write(item)?;
                }
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        path: &'static str,
        width: u32,
    }

    const ROWS: [Row; 2] = [
        Row { path: "a.jpg", width: 10 },
        Row { path: "b.jpg", width: 20 },
    ];

    #[test]
    fn test_jsonl_one_object_per_line() {
        let mut out = OutputWriter::new(Vec::new(), OutputFormat::Jsonl, false);
        out.write_all(&ROWS).unwrap();
        assert_eq!(out.written(), 2);

        let text = String::from_utf8(out.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"path":"a.jpg","width":10}"#);
    }

    #[test]
    fn test_json_batch_is_array() {
        let mut out = OutputWriter::new(Vec::new(), OutputFormat::Json, true);
        out.write_all(&ROWS).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out.into_inner()).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
        assert_eq!(value[1]["width"], 20);
    }

    #[test]
    fn test_format_display() {
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(OutputFormat::Jsonl.to_string(), "jsonl");
    }
}
