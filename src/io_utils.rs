//! I/O utilities for CSV reading, writing, encoding, and delimiter resolution.
//!
//! All file I/O in csv-sieve flows through this module. It provides:
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` → comma,
//!   `.tsv` → tab) with manual override support.
//! - **Encoding**: input decoding and output transcoding via `encoding_rs`,
//!   defaulting to UTF-8.
//! - **Table loading**: the whole input is materialized as a [`Table`]. The
//!   reader is flexible about record length so short or long rows reach the
//!   validator and surface as `ROW_MALFORMED` instead of aborting the read.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.
//! - **Quoting**: CSV output uses `QuoteStyle::Always` for round-trip safety.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use log::debug;
use serde::Serialize;

use crate::{
    config::PipelineConfig,
    data::{CleanedTable, Table},
    validate::RejectedRecord,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';
pub const REJECTION_REASON_COLUMN: &str = "rejection_reason";

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn resolve_output_delimiter(path: Option<&Path>, provided: Option<u8>, fallback: u8) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    if let Some(path) = path {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => return DEFAULT_TSV_DELIMITER,
            Some(ext) if ext.eq_ignore_ascii_case("csv") => return DEFAULT_CSV_DELIMITER,
            _ => {}
        }
    }
    fallback
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(open_csv_reader(reader, delimiter))
}

pub fn open_csv_writer(
    path: Option<&Path>,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<csv::Writer<Box<dyn Write>>> {
    let base: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };

    let writer: Box<dyn Write> = if encoding == UTF_8 {
        base
    } else {
        Box::new(TranscodingWriter::new(base, encoding))
    };

    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true)
        .flexible(true);
    Ok(builder.from_writer(writer))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    Ok(decode_record(&headers, encoding)?
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect())
}

/// Materializes a whole CSV stream. Cells matching a configured null token
/// become missing; every other cell keeps its raw text.
pub fn read_table_from<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
    config: &PipelineConfig,
) -> Result<Table>
where
    R: Read,
{
    let headers = reader_headers(reader, encoding)?;
    let mut table = Table::new(headers);
    let mut record = csv::ByteRecord::new();
    while reader
        .read_byte_record(&mut record)
        .with_context(|| format!("Reading data row {}", table.row_count() + 1))?
    {
        let cells = decode_record(&record, encoding)
            .with_context(|| format!("Decoding data row {}", table.row_count() + 1))?
            .into_iter()
            .map(|cell| (!config.is_null_token(&cell)).then_some(cell))
            .collect();
        table.push_row(cells);
    }
    debug!(
        "Loaded {} row(s) across {} column(s)",
        table.row_count(),
        table.column_count()
    );
    Ok(table)
}

pub fn read_table(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
    config: &PipelineConfig,
) -> Result<Table> {
    let mut reader = open_csv_reader_from_path(path, delimiter)?;
    read_table_from(&mut reader, encoding, config)
        .with_context(|| format!("Reading CSV from {path:?}"))
}

pub fn write_cleaned<W: Write>(writer: &mut csv::Writer<W>, cleaned: &CleanedTable) -> Result<()> {
    writer.write_record(&cleaned.headers)?;
    for row in &cleaned.rows {
        writer.write_record(
            row.values
                .iter()
                .map(|value| value.as_ref().map(|v| v.as_display()).unwrap_or_default()),
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes rejected rows with their original values plus a trailing
/// `rejection_reason` column. Short rows are padded to the header width;
/// long rows keep every field.
pub fn write_rejected<W: Write>(
    writer: &mut csv::Writer<W>,
    headers: &[String],
    rejected: &[RejectedRecord],
) -> Result<()> {
    writer.write_record(
        headers
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(REJECTION_REASON_COLUMN)),
    )?;
    for entry in rejected {
        let mut fields = entry
            .record
            .values
            .iter()
            .map(|cell| cell.clone().unwrap_or_default())
            .collect::<Vec<_>>();
        if fields.len() < headers.len() {
            fields.resize(headers.len(), String::new());
        }
        fields.push(entry.rejection_reason());
        writer.write_record(&fields)?;
    }
    writer.flush()?;
    Ok(())
}

/// Pretty JSON to `path`, or stdout when `path` is absent or `-`.
pub fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    match path {
        Some(p) if !is_dash(p) => {
            let file = File::create(p).with_context(|| format!("Creating output file {p:?}"))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writeln!(writer)?;
            writer.flush()?;
        }
        _ => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, value)?;
            writeln!(handle)?;
        }
    }
    Ok(())
}

struct TranscodingWriter<W: Write> {
    inner: W,
    encoding: &'static Encoding,
    buffer: Vec<u8>,
}

impl<W: Write> TranscodingWriter<W> {
    fn new(inner: W, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoding,
            buffer: Vec::new(),
        }
    }

    /// Encodes the longest valid UTF-8 prefix of the buffer; an incomplete
    /// trailing sequence waits for more bytes unless `force` is set.
    fn flush_buffer(&mut self, force: bool) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let valid_up_to = match std::str::from_utf8(&self.buffer) {
            Ok(_) => self.buffer.len(),
            Err(err) if err.error_len().is_some() => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Invalid UTF-8 sequence in output stream",
                ));
            }
            Err(err) => err.valid_up_to(),
        };
        if valid_up_to > 0 {
            let text = String::from_utf8_lossy(&self.buffer[..valid_up_to]).into_owned();
            self.encode_and_write(&text)?;
            self.buffer.drain(..valid_up_to);
        }
        if force && !self.buffer.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Incomplete UTF-8 sequence at end of output stream",
            ));
        }
        Ok(())
    }

    fn encode_and_write(&mut self, text: &str) -> io::Result<()> {
        let (encoded, _output_encoding, had_errors) = self.encoding.encode(text);
        if had_errors {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to encode text using {}", self.encoding.name()),
            ));
        }
        self.inner.write_all(encoded.as_ref())
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        self.flush_buffer(false)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer(true)?;
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::Record,
        violation::{Category, Reason, Violation, ViolationCode},
    };

    fn load(text: &str) -> Table {
        let mut reader = open_csv_reader(text.as_bytes(), b',');
        read_table_from(&mut reader, UTF_8, &PipelineConfig::default()).unwrap()
    }

    #[test]
    fn delimiter_follows_extension_unless_overridden() {
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.csv"), None), b',');
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), Some(b';')), b';');
        assert_eq!(resolve_output_delimiter(Some(Path::new("o.tsv")), None, b','), b'\t');
    }

    #[test]
    fn unknown_encoding_is_an_error() {
        assert!(resolve_encoding(Some("definitely-not")).is_err());
        assert_eq!(resolve_encoding(Some("latin1")).unwrap().name(), "windows-1252");
    }

    #[test]
    fn null_tokens_become_missing_cells() {
        let table = load("id,amount,note\nA,NA,  \nB,N/A,kept\n");
        assert_eq!(table.rows[0].values, vec![Some("A".to_string()), None, None]);
        assert_eq!(table.rows[1].get(1), None);
        assert_eq!(table.rows[1].get(2), Some("kept"));
    }

    #[test]
    fn ragged_rows_are_loaded_not_rejected() {
        let table = load("a,b,c\n1,2,3\n1,2\n1,2,3,4\n");
        let widths = table.rows.iter().map(Record::len).collect::<Vec<_>>();
        assert_eq!(widths, [3, 2, 4]);
    }

    #[test]
    fn rejected_rows_carry_reason_column() {
        let headers = vec!["a".to_string(), "b".to_string()];
        let rejected = vec![
            RejectedRecord {
                record: Record::new(1, vec![Some("x".into())]),
                violations: vec![Violation::row(ViolationCode::ROW_MALFORMED)],
            },
            RejectedRecord {
                record: Record::new(2, vec![Some("y".into()), None]),
                violations: vec![Violation::field(Category::Text, Reason::Empty, "b")],
            },
        ];
        let mut writer = csv::WriterBuilder::new()
            .quote_style(QuoteStyle::Necessary)
            .flexible(true)
            .from_writer(Vec::new());
        write_rejected(&mut writer, &headers, &rejected).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(text, "a,b,rejection_reason\nx,,ROW_MALFORMED\ny,,TEXT_EMPTY(b)\n");
    }

    #[test]
    fn transcoding_writer_encodes_split_utf8() {
        let mut out = Vec::new();
        {
            let mut writer = TranscodingWriter::new(&mut out, encoding_rs::WINDOWS_1252);
            let bytes = "café".as_bytes();
            writer.write_all(&bytes[..4]).unwrap();
            writer.write_all(&bytes[4..]).unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(out, b"caf\xe9");
    }
}
