//! Core traits for reading import sources.

/// One record pulled from an import source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRecord {
    /// A decoded record.
    Fields {
        /// 1-based line number where the record starts.
        line: u64,
        /// Field values in source order.
        fields: Vec<String>,
    },
    /// A record that could not be decoded.
    Invalid {
        /// 1-based line number where the record starts.
        line: u64,
        /// Why decoding failed.
        reason: String,
        /// The source cannot continue past this record.
        fatal: bool,
    },
}

impl SourceRecord {
    /// Returns the line number of the record.
    #[must_use]
    pub const fn line(&self) -> u64 {
        match self {
            Self::Fields { line, .. } | Self::Invalid { line, .. } => *line,
        }
    }
}

/// A tabular source: one header record followed by data records.
pub trait ImportSource {
    /// Reads the header record.
    ///
    /// Returns an empty list for an empty source.
    ///
    /// # Errors
    ///
    /// Returns a description if the header cannot be decoded.
    fn read_header(&mut self) -> std::result::Result<Vec<String>, String>;

    /// Reads the next data record, `None` at end of input.
    fn next_record(&mut self) -> Option<SourceRecord>;
}
