use arrow_schema::{ArrowError, DataType};
use parquet::errors::ParquetError;
use thiserror::Error;

use crate::types::ColumnType;

/// Errors produced while writing, opening or scanning a strata file.
///
/// Read-path structural errors (`TruncatedData`, `CorruptHeader`,
/// `CorruptFooter`, `CorruptMetadata`) are fatal for the open that raised
/// them. `EncodingTypeMismatch` is recovered by the writer, which substitutes
/// the column's null and keeps going.
#[derive(Debug, Error)]
pub enum StrataError {
    /// Underlying I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A value was decoded past the end of the available bytes
    #[error("Truncated data: needed {needed} bytes, {available} available")]
    TruncatedData {
        /// Bytes required to decode the next value
        needed: usize,
        /// Bytes remaining at the cursor
        available: usize,
    },

    /// A value cannot be represented in its declared column type
    #[error("Cannot encode {value} as {column_type}")]
    EncodingTypeMismatch {
        /// Declared type of the column
        column_type: ColumnType,
        /// Debug rendering of the offending value
        value: String,
    },

    /// Column chunk bytes that no encoder could have produced
    #[error("Corrupt chunk: {reason}")]
    CorruptChunk {
        /// What was found in the chunk
        reason: String,
    },

    /// A string value is not valid UTF-8
    #[error("Invalid UTF-8 in string value: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// The file does not start with the strata header magic
    #[error("Corrupt header: file magic not found")]
    CorruptHeader,

    /// The trailer (metadata offset + footer magic) is unusable
    #[error("Corrupt footer: {reason}")]
    CorruptFooter {
        /// Which structural expectation failed
        reason: String,
    },

    /// The metadata payload could not be deserialized or is inconsistent
    #[error("Corrupt metadata: {reason}")]
    CorruptMetadata {
        /// Which structural expectation failed
        reason: String,
    },

    /// A row does not carry one value per schema column
    #[error("Row has {found} values, schema has {expected} columns")]
    RowWidthMismatch {
        /// Number of columns in the schema
        expected: usize,
        /// Number of values in the row
        found: usize,
    },

    /// Row group index past the end of the file
    #[error("Row group {index} out of range, file has {num_row_groups}")]
    RowGroupOutOfRange {
        /// Requested row group
        index: usize,
        /// Row groups in the file
        num_row_groups: usize,
    },

    /// Two schema columns share a name
    #[error("Column '{column}' is defined more than once")]
    DuplicateColumn {
        /// The repeated column name
        column: String,
    },

    /// Column not found in the file schema
    #[error("Column '{column}' not found in schema")]
    ColumnNotFound {
        /// Name of the column that was not found
        column: String,
    },

    /// The aggregation target must be numeric
    #[error("Column '{column}' has type {column_type} and cannot be summed")]
    NonNumericTarget {
        /// Name of the target column
        column: String,
        /// Its declared type
        column_type: ColumnType,
    },

    /// Arrow type with no strata column type
    #[error("Unsupported Arrow type: {data_type:?}")]
    UnsupportedType {
        /// The Arrow type that was rejected
        data_type: DataType,
    },

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),
}

impl StrataError {
    pub(crate) fn corrupt_footer(reason: impl Into<String>) -> Self {
        StrataError::CorruptFooter {
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt_metadata(reason: impl Into<String>) -> Self {
        StrataError::CorruptMetadata {
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = StrataError> = std::result::Result<T, E>;
