//! Error types for resheet-core

use thiserror::Error;

/// Result type alias for resheet-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in resheet-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be found
    #[error("config file \"{path}\" cannot be found")]
    ConfigFileNotFound {
        /// Path that was given on the command line
        path: String,
    },

    /// Configuration file is not well-formed JSON
    #[error("config file \"{config}\" contains invalid syntax: {source}")]
    InvalidSyntax {
        /// Path of the offending config file
        config: String,
        /// Parse error reported by the JSON reader
        source: serde_json::Error,
    },

    /// Input config document is not a mapping or a non-empty sequence of mappings
    #[error("missing input file info in \"{config}\"")]
    MissingInputFileInfo {
        /// Path of the offending config file
        config: String,
    },

    /// Output config document is not a mapping or a non-empty sequence of mappings
    #[error("missing output file info in \"{config}\"")]
    MissingOutputFileInfo {
        /// Path of the offending config file
        config: String,
    },

    /// An output entry's sheet list is absent, empty, or not a sequence of mappings
    #[error("missing sheet info in \"{config}\"")]
    MissingSheetInfo {
        /// Path of the offending config file
        config: String,
    },

    /// A sheet entry is structurally unusable
    #[error("invalid sheet info in \"{config}\": {message}")]
    InvalidSheetInfo {
        /// Path of the offending config file
        config: String,
        /// Description of what's invalid
        message: String,
    },

    /// An entry's column list is absent, empty, or not a sequence
    #[error("missing column info in \"{config}\"")]
    MissingColumnInfo {
        /// Path of the offending config file
        config: String,
    },

    /// A column entry is structurally unusable
    #[error("invalid column info in \"{config}\": {message}")]
    InvalidColumnInfo {
        /// Path of the offending config file
        config: String,
        /// Description of what's invalid
        message: String,
    },

    /// One or more required keys are absent; collected across the whole document
    #[error("missing {} in \"{config}\"", quantify("key", .keys))]
    MissingKeys {
        /// Path of the offending config file
        config: String,
        /// Every missing key, in the order encountered
        keys: Vec<String>,
    },

    /// A sheet's range block is absent a required part
    #[error("missing range info in sheet '{sheet}' of \"{config}\"")]
    MissingRangeInfo {
        /// Path of the offending config file
        config: String,
        /// Name of the sheet carrying the range
        sheet: String,
    },

    /// A sheet's range block does not describe a usable date window
    #[error("invalid range in sheet '{sheet}' of \"{config}\": {message}")]
    InvalidRangeInfo {
        /// Path of the offending config file
        config: String,
        /// Name of the sheet carrying the range
        sheet: String,
        /// Description of what's invalid
        message: String,
    },

    /// A declared input file does not exist under the input directory
    #[error("input file \"{filename}\" cannot be found")]
    InputFileNotFound {
        /// Filename as declared in the input config
        filename: String,
    },

    /// An input file exists but could not be read as CSV
    #[error("input file \"{filename}\" could not be read: {source}")]
    SourceRead {
        /// Filename as declared in the input config
        filename: String,
        /// Error reported by the CSV reader
        source: csv::Error,
    },

    /// One or more from-referenced columns are absent from an input file
    #[error("{} cannot be found in \"{filename}\"", quantify("column", .columns))]
    ColumnsNotFound {
        /// Filename as declared in the input config
        filename: String,
        /// Every referenced column the file does not have
        columns: Vec<String>,
    },

    /// A cell value did not parse under the column's declared date format
    #[error("column '{column}' in \"{filename}\" has value \"{value}\" which does not match format '{format}': {source}")]
    InvalidFormat {
        /// Filename as declared in the input config
        filename: String,
        /// Source column whose cell failed to parse
        column: String,
        /// The offending cell value
        value: String,
        /// The declared date format
        format: String,
        /// Parse error reported by the date parser
        source: chrono::ParseError,
    },

    /// A join_on column is absent from the file that declares it
    #[error("'join_on' column '{column}' cannot be found in data from \"{filename}\"")]
    JoinColumnNotFound {
        /// Filename as declared in the input config
        filename: String,
        /// The declared join column
        column: String,
    },

    /// A join_on column has no counterpart in the accumulated dataset
    #[error("'join_on' column '{column}' from \"{filename}\" doesn't match any existing columns")]
    InvalidJoinColumn {
        /// Filename as declared in the input config
        filename: String,
        /// The declared join column
        column: String,
    },

    /// One or more from-referenced columns are absent from the assembled dataset
    #[error("{} cannot be found for sheet '{sheet}' of \"{filename}\"", quantify("column", .columns))]
    SheetColumnsNotFound {
        /// Filename as declared in the output config
        filename: String,
        /// Name of the sheet referencing the columns
        sheet: String,
        /// Every referenced column the dataset does not have
        columns: Vec<String>,
    },

    /// A range filter names a column the dataset does not have
    #[error("range column '{column}' for sheet '{sheet}' of \"{filename}\" cannot be found")]
    DateColumnNotFound {
        /// Filename as declared in the output config
        filename: String,
        /// Name of the sheet carrying the range
        sheet: String,
        /// The column named by the range filter
        column: String,
    },

    /// A range filter names a column that is not date-typed
    #[error("range column '{column}' for sheet '{sheet}' of \"{filename}\" is not a date column")]
    InvalidDateColumn {
        /// Filename as declared in the output config
        filename: String,
        /// Name of the sheet carrying the range
        sheet: String,
        /// The column named by the range filter
        column: String,
    },

    /// An output artifact could not be written
    #[error("output file \"{artifact}\" could not be written: {source}")]
    SinkWrite {
        /// Filename as declared in the output config
        artifact: String,
        /// Error reported by the CSV writer
        source: csv::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders a singular or plural noun phrase over quoted names, e.g.
/// `key 'filename'` or `keys 'filename', 'columns'`.
fn quantify(noun: &str, names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|name| format!("'{name}'")).collect();
    if quoted.len() == 1 {
        format!("{noun} {}", quoted[0])
    } else {
        format!("{noun}s {}", quoted.join(", "))
    }
}
