//! A minimal columnar file format with predicate pushdown.
//!
//! Rows are buffered into row groups; each row group is written as one
//! contiguous chunk per column, and a JSON footer records where every chunk
//! lives:
//!
//! ```text
//! [STRAT1][rg0: col0 col1 ...][rg1: col0 col1 ...]...[metadata][offset: u64 LE][STRATF]
//! ```
//!
//! Readers locate the footer from the fixed-size trailer, then fetch only the
//! chunks a query needs. [`QueryEngine::scan_equality_and_sum`] reads the
//! filter column of each row group and touches the target column only in row
//! groups where something matched.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//!
//! use strata::{
//!     ColumnDef, ColumnStoreWriter, ColumnType, Schema, Value, WriterOptions, load_metadata,
//!     scan_equality_and_sum,
//! };
//!
//! # fn main() -> Result<(), strata::StrataError> {
//! let schema = Schema::new(vec![
//!     ColumnDef::new("status", ColumnType::Utf8),
//!     ColumnDef::new("value", ColumnType::Float64),
//! ]);
//! let mut writer = ColumnStoreWriter::try_new(Vec::new(), schema, WriterOptions::default())?;
//! writer.write_rows([
//!     vec![Value::from("OK"), Value::from(10.0)],
//!     vec![Value::from("FAIL"), Value::from(5.0)],
//!     vec![Value::from("FAIL"), Value::from(3.0)],
//! ])?;
//! let (bytes, _) = writer.finish()?;
//!
//! let mut file = Cursor::new(bytes);
//! let metadata = load_metadata(&mut file)?;
//! let result = scan_equality_and_sum(&mut file, &metadata, "status", &"FAIL".into(), "value")?;
//! assert_eq!(result.as_tuple(), (2, 8.0));
//! # Ok(())
//! # }
//! ```

pub mod arrow;
pub mod buffer;
pub mod codec;
mod error;
pub mod footer;
mod loader;
pub mod metadata;
mod options;
pub mod query;
pub mod reader;
mod types;
pub mod writer;

pub use arrow::{export_parquet, schema_from_arrow, schema_to_arrow};
pub use buffer::{DEFAULT_ROWS_PER_GROUP, RowGroupBuffer};
pub use error::{Result, StrataError};
pub use footer::{FILE_MAGIC, FOOTER_MAGIC, TRAILER_LEN, finalize};
pub use loader::load_metadata;
pub use metadata::{ChunkStatistics, ColumnChunkMetadata, FileMetadata, RowGroupMetadata};
pub use options::{ScanOptions, ScanOptionsBuilder, WriterOptions, WriterOptionsBuilder};
pub use query::{
    QueryEngine, ScanDiagnostics, ScanResult, naive_equality_and_sum, scan_equality_and_sum,
};
pub use reader::{ColumnarReader, CountingReader};
pub use types::{ColumnDef, ColumnType, Row, Schema, Value};
pub use writer::{ColumnStoreWriter, WriteDiagnostics, write_row_group};
