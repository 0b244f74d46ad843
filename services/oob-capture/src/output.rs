//! Decoded transport-stream output (raw binary or hex text)

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::str::FromStr;

/// Bytes per line in hex output
const HEX_LINE_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Binary,
    Hex,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bin" | "raw" => Ok(Self::Binary),
            "hex" => Ok(Self::Hex),
            other => Err(other.to_string()),
        }
    }
}

pub struct OutputWriter<W: Write> {
    inner: W,
    format: OutputFormat,
    /// Bytes already written on the current hex line
    column: usize,
    bytes_written: u64,
}

impl OutputWriter<Box<dyn Write + Send>> {
    /// Open stdout ("-") or create `path`
    pub fn open(path: &str, format: OutputFormat) -> Result<Self> {
        let inner: Box<dyn Write + Send> = if path == "-" {
            Box::new(io::stdout())
        } else {
            let file = File::create(path).with_context(|| format!("Failed to create {}", path))?;
            Box::new(BufWriter::new(file))
        };
        Ok(Self::new(inner, format))
    }
}

impl<W: Write> OutputWriter<W> {
    pub fn new(inner: W, format: OutputFormat) -> Self {
        Self {
            inner,
            format,
            column: 0,
            bytes_written: 0,
        }
    }

    /// Write one batch of decoded bytes and flush
    pub fn write_batch(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.format {
            OutputFormat::Binary => self.inner.write_all(bytes)?,
            OutputFormat::Hex => {
                let mut rest = bytes;
                while !rest.is_empty() {
                    let take = (HEX_LINE_BYTES - self.column).min(rest.len());
                    let (line, tail) = rest.split_at(take);
                    self.inner.write_all(hex::encode_upper(line).as_bytes())?;
                    self.column += take;
                    if self.column == HEX_LINE_BYTES {
                        self.inner.write_all(b"\n")?;
                        self.column = 0;
                    }
                    rest = tail;
                }
            }
        }
        self.bytes_written += bytes.len() as u64;
        self.inner.flush()
    }

    /// Terminate a partial hex line and flush
    pub fn finish(&mut self) -> io::Result<()> {
        if self.column != 0 {
            self.inner.write_all(b"\n")?;
            self.column = 0;
        }
        self.inner.flush()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!("binary".parse::<OutputFormat>(), Ok(OutputFormat::Binary));
        assert_eq!("HEX".parse::<OutputFormat>(), Ok(OutputFormat::Hex));
        assert_eq!("ts".parse::<OutputFormat>(), Err("ts".to_string()));
    }

    #[test]
    fn test_binary_passthrough() {
        let mut writer = OutputWriter::new(Vec::new(), OutputFormat::Binary);
        writer.write_batch(&[0x47, 0x00, 0xFF]).unwrap();
        writer.write_batch(&[0x64]).unwrap();
        writer.finish().unwrap();
        assert_eq!(writer.bytes_written(), 4);
        assert_eq!(writer.into_inner(), vec![0x47, 0x00, 0xFF, 0x64]);
    }

    #[test]
    fn test_hex_wraps_across_batches() {
        let mut writer = OutputWriter::new(Vec::new(), OutputFormat::Hex);
        writer.write_batch(&[0xAB; 20]).unwrap();
        writer.write_batch(&[0x47; 20]).unwrap();
        writer.finish().unwrap();

        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("{}{}", "AB".repeat(20), "47".repeat(12)));
        assert_eq!(lines[1], "47".repeat(8));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_hex_exact_line() {
        let mut writer = OutputWriter::new(Vec::new(), OutputFormat::Hex);
        writer.write_batch(&[0x01; HEX_LINE_BYTES]).unwrap();
        writer.finish().unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(text, format!("{}\n", "01".repeat(HEX_LINE_BYTES)));
    }
}
