//! CSV adapters.
//!
//! [`CsvImportSource`] reads comma-delimited text with standard quoting and
//! reports the line each record starts on. [`CsvExportSink`] writes a
//! BOM-prefixed artifact; [`template_bytes`] writes a bare header row.

use crate::io::traits::{ImportSource, SourceRecord};
use crate::models::Cell;
use crate::{Error, Result};
use std::io::{self, Chain, Cursor, Read};

/// UTF-8 byte-order mark written before exported text.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// CSV import source.
///
/// A leading UTF-8 BOM is consumed before parsing, so it never reaches the
/// header. Records with a differing field count are passed through; pairing
/// fields with headers is the caller's concern.
pub struct CsvImportSource<R: Read> {
    reader: csv::Reader<Chain<Cursor<Vec<u8>>, R>>,
    record: csv::ByteRecord,
    finished: bool,
}

impl<R: Read> CsvImportSource<R> {
    /// Creates a source, consuming a leading BOM if present.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the first bytes cannot be read.
    pub fn new(reader: R) -> io::Result<Self> {
        let reader = skip_bom(reader)?;
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        Ok(Self {
            reader,
            record: csv::ByteRecord::new(),
            finished: false,
        })
    }

    fn line(&self) -> u64 {
        self.record.position().map_or(0, csv::Position::line)
    }

    fn read(&mut self) -> Option<std::result::Result<(), csv::Error>> {
        if self.finished {
            return None;
        }
        match self.reader.read_byte_record(&mut self.record) {
            Ok(true) => Some(Ok(())),
            Ok(false) => {
                self.finished = true;
                None
            },
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            },
        }
    }
}

impl<R: Read> ImportSource for CsvImportSource<R> {
    fn read_header(&mut self) -> std::result::Result<Vec<String>, String> {
        match self.read() {
            None => Ok(Vec::new()),
            Some(Err(e)) => Err(e.to_string()),
            Some(Ok(())) => decode(&self.record).map_err(|e| format!("header: {e}")),
        }
    }

    fn next_record(&mut self) -> Option<SourceRecord> {
        let outcome = self.read()?;
        let line = self.line();

        Some(match outcome.map(|()| decode(&self.record)) {
            Ok(Ok(fields)) => SourceRecord::Fields { line, fields },
            Ok(Err(reason)) => SourceRecord::Invalid {
                line,
                reason,
                fatal: false,
            },
            Err(e) => SourceRecord::Invalid {
                line,
                reason: e.to_string(),
                fatal: true,
            },
        })
    }
}

fn decode(record: &csv::ByteRecord) -> std::result::Result<Vec<String>, String> {
    record
        .iter()
        .enumerate()
        .map(|(i, field)| {
            std::str::from_utf8(field)
                .map(ToString::to_string)
                .map_err(|e| format!("field {} is not valid UTF-8: {e}", i + 1))
        })
        .collect()
}

/// Consumes a leading BOM and hands back the rest of the stream.
fn skip_bom<R: Read>(mut reader: R) -> io::Result<Chain<Cursor<Vec<u8>>, R>> {
    let mut prefix = Vec::with_capacity(UTF8_BOM.len());
    let mut buf = [0_u8; 3];

    while prefix.len() < UTF8_BOM.len() {
        match reader.read(&mut buf[..UTF8_BOM.len() - prefix.len()]) {
            Ok(0) => break,
            Ok(n) => prefix.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
            Err(e) => return Err(e),
        }
    }

    if prefix == UTF8_BOM {
        prefix.clear();
    }

    Ok(Cursor::new(prefix).chain(reader))
}

/// CSV export sink writing a BOM-prefixed buffer.
pub struct CsvExportSink {
    writer: csv::Writer<Vec<u8>>,
    rows: u64,
}

impl CsvExportSink {
    /// Creates a sink and writes the BOM and header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn new(headers: &[String]) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(UTF8_BOM.to_vec());
        writer
            .write_record(headers)
            .map_err(|e| Error::operation("write_csv_headers", e))?;

        Ok(Self { writer, rows: 0 })
    }

    /// Appends one normalized row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be serialized.
    pub fn write_row(&mut self, cells: &[Cell]) -> Result<()> {
        self.writer
            .write_record(cells.iter().map(Cell::to_field))
            .map_err(|e| Error::operation("write_csv", e))?;
        self.rows += 1;
        Ok(())
    }

    /// Returns the number of data rows written.
    #[must_use]
    pub const fn rows(&self) -> u64 {
        self.rows
    }

    /// Flushes and returns the artifact bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn finish(self) -> Result<Vec<u8>> {
        self.writer
            .into_inner()
            .map_err(|e| Error::operation("flush_csv", e.error()))
    }
}

/// Renders a header row as a template file: no BOM, newline terminated.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn template_bytes(headers: &[String]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(headers)
        .map_err(|e| Error::operation("write_template", e))?;
    writer
        .into_inner()
        .map_err(|e| Error::operation("write_template", e.error()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(input: &[u8]) -> CsvImportSource<&[u8]> {
        CsvImportSource::new(input).unwrap()
    }

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_reads_header_and_records_with_lines() {
        let mut src = source(b"name,email\nAda,ada@example.com\n\"Multi\nLine\",x@y.z\nLast,\n");
        assert_eq!(src.read_header().unwrap(), ["name", "email"]);

        let first = src.next_record().unwrap();
        assert_eq!(
            first,
            SourceRecord::Fields {
                line: 2,
                fields: headers(&["Ada", "ada@example.com"]),
            }
        );
        assert_eq!(src.next_record().unwrap().line(), 3);
        let last = src.next_record().unwrap();
        assert_eq!(last.line(), 5);
        assert!(src.next_record().is_none());
        assert!(src.next_record().is_none());
    }

    #[test]
    fn test_bom_is_not_header_content() {
        let mut src = source(b"\xEF\xBB\xBFname,email\nAda,a@b.co\n");
        assert_eq!(src.read_header().unwrap(), ["name", "email"]);
    }

    #[test]
    fn test_short_input_without_bom() {
        let mut src = source(b"id");
        assert_eq!(src.read_header().unwrap(), ["id"]);
        assert!(src.next_record().is_none());
    }

    #[test]
    fn test_empty_source_has_empty_header() {
        let mut src = source(b"");
        assert!(src.read_header().unwrap().is_empty());
        assert!(src.next_record().is_none());
    }

    #[test]
    fn test_uneven_records_pass_through() {
        let mut src = source(b"a,b\n1\n1,2,3\n");
        src.read_header().unwrap();
        let SourceRecord::Fields { fields, .. } = src.next_record().unwrap() else {
            panic!("expected fields");
        };
        assert_eq!(fields, ["1"]);
        let SourceRecord::Fields { fields, .. } = src.next_record().unwrap() else {
            panic!("expected fields");
        };
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn test_invalid_utf8_is_recoverable() {
        let mut src = source(b"a\n\xFF\xFE\nok\n");
        src.read_header().unwrap();
        assert!(matches!(
            src.next_record(),
            Some(SourceRecord::Invalid {
                line: 2,
                fatal: false,
                ..
            })
        ));
        assert!(matches!(
            src.next_record(),
            Some(SourceRecord::Fields { line: 3, .. })
        ));
    }

    #[test]
    fn test_io_error_is_fatal() {
        struct Failing {
            sent: bool,
        }

        impl Read for Failing {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.sent {
                    return Err(io::Error::other("disk went away"));
                }
                self.sent = true;
                let data = b"a\n1\n";
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
        }

        let mut src = CsvImportSource::new(Failing { sent: false }).unwrap();
        let header = src.read_header();
        let mut saw_fatal = header.is_err();
        while let Some(record) = src.next_record() {
            if let SourceRecord::Invalid { fatal: true, .. } = record {
                saw_fatal = true;
            }
        }
        assert!(saw_fatal);
    }

    #[test]
    fn test_export_sink_writes_bom_and_rows() {
        let mut sink = CsvExportSink::new(&headers(&["name", "active"])).unwrap();
        sink.write_row(&[Cell::Text("Ada, Countess".to_string()), Cell::Int(1)])
            .unwrap();
        sink.write_row(&[Cell::Null, Cell::Int(0)]).unwrap();
        assert_eq!(sink.rows(), 2);

        let bytes = sink.finish().unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        assert_eq!(
            &bytes[UTF8_BOM.len()..],
            b"name,active\n\"Ada, Countess\",1\n,0\n"
        );
    }

    #[test]
    fn test_template_is_bare_header() {
        let bytes = template_bytes(&headers(&["name", "email"])).unwrap();
        assert_eq!(bytes, b"name,email\n");
    }
}
