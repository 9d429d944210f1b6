//! Equality-filtered aggregation with predicate pushdown.
//!
//! For every row group the filter column chunk is read and decoded first.
//! The target column chunk is only read when at least one row matched, and
//! only the matched positions of it are decoded. No other column is ever
//! read.

use std::{
    io::{Read, Seek},
    sync::Arc,
};

use roaring::RoaringBitmap;
use tracing::{debug, trace, warn};

use crate::{
    codec::{decode_positions, decode_value},
    error::{Result, StrataError},
    metadata::FileMetadata,
    options::ScanOptions,
    reader::{ColumnarReader, read_chunk},
    types::{ColumnType, Value},
};

/// Counters collected while scanning.
///
/// Recoverable conditions (a row group missing a column, a null target value)
/// never abort a scan; they show up here instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanDiagnostics {
    /// Row groups whose filter chunk was read
    pub row_groups_scanned: u64,
    /// Row groups skipped because the filter or target column had no chunk
    pub row_groups_missing_column: u64,
    /// Row groups skipped on chunk statistics alone
    pub row_groups_pruned: u64,
    /// Scanned row groups in which no row matched the filter
    pub row_groups_without_match: u64,
    /// Rows whose filter value matched, including those with a null target
    pub filter_matches: u64,
    /// Matched rows whose target value was null
    pub null_targets: u64,
    /// Column chunk bytes read from the file
    pub bytes_read: u64,
}

/// Result of [`QueryEngine::scan_equality_and_sum`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScanResult {
    /// Matched rows with a non-null target value
    pub matched_count: u64,
    /// Sum of those target values
    pub sum: f64,
    pub diagnostics: ScanDiagnostics,
}

impl ScanResult {
    pub fn as_tuple(&self) -> (u64, f64) {
        (self.matched_count, self.sum)
    }

    /// Mean of the matched target values, `None` without matches.
    pub fn average(&self) -> Option<f64> {
        (self.matched_count > 0).then(|| self.sum / self.matched_count as f64)
    }
}

/// Runs filtered scans against one loaded snapshot of a file's metadata.
///
/// The engine holds no per-query state, so one engine (and one metadata
/// snapshot) can serve any number of queries, each with its own file handle.
#[derive(Clone, Debug)]
pub struct QueryEngine<'a> {
    metadata: &'a FileMetadata,
    options: ScanOptions,
}

impl<'a> QueryEngine<'a> {
    pub fn new(metadata: &'a FileMetadata) -> Self {
        Self::with_options(metadata, ScanOptions::default())
    }

    pub fn with_options(metadata: &'a FileMetadata, options: ScanOptions) -> Self {
        Self { metadata, options }
    }

    pub fn metadata(&self) -> &FileMetadata {
        self.metadata
    }

    /// Count the rows where `filter_column == filter_value` and sum their
    /// `target_column` values.
    ///
    /// `filter_value` is compared in the filter column's type: strings are
    /// parsed into numeric columns and a whole-number float matches the equal
    /// integer. A value no cell of that type can equal (`10.5` against an
    /// Int64 column, `"abc"` against a Float64 column) matches nothing and
    /// reads nothing. A null filter value matches null cells. Null targets
    /// are excluded from both count and sum and reported in
    /// [`ScanDiagnostics::null_targets`].
    ///
    /// A column absent from the schema is treated like a column absent from
    /// every row group: the scan succeeds with no matches.
    ///
    /// # Errors
    ///
    /// - [`StrataError::NonNumericTarget`] if the target column is a string
    /// - read-path errors ([`StrataError::TruncatedData`], I/O) abort the scan
    pub fn scan_equality_and_sum<R: Read + Seek>(
        &self,
        file: &mut R,
        filter_column: &str,
        filter_value: &Value,
        target_column: &str,
    ) -> Result<ScanResult> {
        let schema = self.metadata.schema();
        let filter_type = schema.column(filter_column).map(|c| c.column_type);
        let target_type = schema.column(target_column).map(|c| c.column_type);

        if let Some(column_type) = target_type.filter(|t| !t.is_numeric()) {
            return Err(StrataError::NonNumericTarget {
                column: target_column.to_string(),
                column_type,
            });
        }
        let filter_value = match filter_type {
            Some(column_type) => match filter_key(filter_value, column_type) {
                Some(key) => key,
                None => {
                    debug!(
                        filter_column,
                        ?filter_value,
                        %column_type,
                        "filter value cannot occur in column, nothing to scan"
                    );
                    return Ok(ScanResult::default());
                }
            },
            None => filter_value.clone(),
        };

        let mut result = ScanResult::default();
        for (index, row_group) in self.metadata.row_groups.iter().enumerate() {
            let (Some(filter_type), Some(target_type)) = (filter_type, target_type) else {
                result.diagnostics.row_groups_missing_column += 1;
                continue;
            };
            let (Some(filter_chunk), Some(target_chunk)) = (
                row_group.column_chunk(filter_column),
                row_group.column_chunk(target_column),
            ) else {
                warn!(
                    row_group = index,
                    filter_column, target_column, "row group is missing a column, skipping"
                );
                result.diagnostics.row_groups_missing_column += 1;
                continue;
            };

            if self.options.prune_with_statistics() {
                if let Some(statistics) = &filter_chunk.statistics {
                    if !statistics.may_contain(
                        &filter_value,
                        filter_type,
                        row_group.num_rows_in_group,
                    ) {
                        trace!(row_group = index, "pruned by statistics");
                        result.diagnostics.row_groups_pruned += 1;
                        continue;
                    }
                }
            }

            let filter_bytes = read_chunk(file, filter_chunk)?;
            result.diagnostics.bytes_read += filter_bytes.len() as u64;
            result.diagnostics.row_groups_scanned += 1;

            let positions = matching_positions(
                &filter_bytes,
                filter_type,
                row_group.num_rows_in_group,
                &filter_value,
            )?;
            trace!(row_group = index, matches = positions.len(), "filtered");
            if positions.is_empty() {
                result.diagnostics.row_groups_without_match += 1;
                continue;
            }

            let target_bytes = read_chunk(file, target_chunk)?;
            result.diagnostics.bytes_read += target_bytes.len() as u64;
            result.diagnostics.filter_matches += positions.len();

            for value in decode_positions(&target_bytes, target_type, &positions)? {
                match value.as_f64() {
                    Some(v) => {
                        result.matched_count += 1;
                        result.sum += v;
                    }
                    None => result.diagnostics.null_targets += 1,
                }
            }
        }

        debug!(
            filter_column,
            target_column,
            matched = result.matched_count,
            sum = result.sum,
            bytes_read = result.diagnostics.bytes_read,
            row_groups_missing_column = result.diagnostics.row_groups_missing_column,
            null_targets = result.diagnostics.null_targets,
            "scan complete"
        );
        Ok(result)
    }
}

/// Scan with default options; see [`QueryEngine::scan_equality_and_sum`].
pub fn scan_equality_and_sum<R: Read + Seek>(
    file: &mut R,
    metadata: &FileMetadata,
    filter_column: &str,
    filter_value: &Value,
    target_column: &str,
) -> Result<ScanResult> {
    QueryEngine::new(metadata).scan_equality_and_sum(
        file,
        filter_column,
        filter_value,
        target_column,
    )
}

/// Same query answered by decoding every row of each row group.
///
/// Reads everything, so it is only useful as a reference for the pushdown
/// path. Row groups missing the filter or target chunk are skipped and
/// counted the same way. `bytes_read` is left at zero.
pub fn naive_equality_and_sum<R: Read + Seek>(
    reader: &mut ColumnarReader<R>,
    filter_column: &str,
    filter_value: &Value,
    target_column: &str,
) -> Result<ScanResult> {
    let metadata = Arc::clone(reader.metadata());
    let schema = metadata.schema();
    let mut result = ScanResult::default();

    let (Some(filter_index), Some(target_index)) =
        (schema.index_of(filter_column), schema.index_of(target_column))
    else {
        result.diagnostics.row_groups_missing_column = metadata.num_row_groups() as u64;
        return Ok(result);
    };
    let target_type = schema.columns()[target_index].column_type;
    if !target_type.is_numeric() {
        return Err(StrataError::NonNumericTarget {
            column: target_column.to_string(),
            column_type: target_type,
        });
    }
    let Some(filter_value) = filter_key(filter_value, schema.columns()[filter_index].column_type)
    else {
        return Ok(result);
    };

    for (index, row_group) in metadata.row_groups.iter().enumerate() {
        if row_group.column_chunk(filter_column).is_none()
            || row_group.column_chunk(target_column).is_none()
        {
            result.diagnostics.row_groups_missing_column += 1;
            continue;
        }
        result.diagnostics.row_groups_scanned += 1;
        for row in reader.read_row_group(index)? {
            if row[filter_index] != filter_value {
                continue;
            }
            result.diagnostics.filter_matches += 1;
            match row[target_index].as_f64() {
                Some(v) => {
                    result.matched_count += 1;
                    result.sum += v;
                }
                None => result.diagnostics.null_targets += 1,
            }
        }
    }
    Ok(result)
}

/// `value` in the representation of `column_type`, or `None` when no cell of
/// that type can equal it.
fn filter_key(value: &Value, column_type: ColumnType) -> Option<Value> {
    match (value, column_type) {
        (Value::Float64(v), ColumnType::Int64) => {
            // 2^63 is exact as f64; anything at or above it overflows i64.
            let in_range = *v >= i64::MIN as f64 && *v < i64::MAX as f64;
            (v.fract() == 0.0 && in_range).then(|| Value::Int64(*v as i64))
        }
        _ => value.coerce_to(column_type).ok(),
    }
}

fn matching_positions(
    chunk: &[u8],
    column_type: ColumnType,
    num_rows: u64,
    filter_value: &Value,
) -> Result<RoaringBitmap> {
    let mut positions = RoaringBitmap::new();
    let mut cursor = chunk;
    for position in 0..num_rows {
        if decode_value(&mut cursor, column_type)? == *filter_value {
            positions.insert(position as u32);
        }
    }
    Ok(positions)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{
        loader::load_metadata,
        options::WriterOptions,
        reader::CountingReader,
        types::{ColumnDef, Schema},
        writer::ColumnStoreWriter,
    };

    fn status_file() -> Vec<u8> {
        let schema = Schema::new(vec![
            ColumnDef::new("status", ColumnType::Utf8),
            ColumnDef::new("value", ColumnType::Float64),
        ]);
        let mut writer =
            ColumnStoreWriter::try_new(Vec::new(), schema, WriterOptions::default()).unwrap();
        for (status, value) in [("OK", 10.0), ("FAIL", 5.0), ("FAIL", 3.0)] {
            writer
                .write_row(vec![Value::from(status), Value::from(value)])
                .unwrap();
        }
        writer.finish().unwrap().0
    }

    #[test]
    fn sums_matching_rows() {
        let mut file = CountingReader::new(Cursor::new(status_file()));
        let metadata = load_metadata(&mut file).unwrap();
        file.reset();

        let result =
            scan_equality_and_sum(&mut file, &metadata, "status", &Value::from("FAIL"), "value")
                .unwrap();
        assert_eq!(result.as_tuple(), (2, 8.0));
        assert_eq!(result.average(), Some(4.0));

        let status_size = (4 + 2) + (4 + 4) + (4 + 4);
        assert_eq!(file.bytes_read(), status_size + 24);
        assert_eq!(result.diagnostics.bytes_read, status_size + 24);
    }

    #[test]
    fn no_match_never_reads_target() {
        let mut file = CountingReader::new(Cursor::new(status_file()));
        let metadata = load_metadata(&mut file).unwrap();
        file.reset();

        let result =
            scan_equality_and_sum(&mut file, &metadata, "status", &Value::from("LOST"), "value")
                .unwrap();
        assert_eq!(result.as_tuple(), (0, 0.0));
        assert_eq!(result.diagnostics.row_groups_without_match, 1);
        assert_eq!(file.bytes_read(), 22);
    }

    #[test]
    fn string_target_is_rejected() {
        let bytes = status_file();
        let metadata = load_metadata(&mut Cursor::new(&bytes)).unwrap();
        let err = scan_equality_and_sum(
            &mut Cursor::new(&bytes),
            &metadata,
            "value",
            &Value::from(5.0),
            "status",
        )
        .unwrap_err();
        assert!(matches!(err, StrataError::NonNumericTarget { .. }));
    }

    #[test]
    fn unknown_column_matches_nothing() {
        let bytes = status_file();
        let metadata = load_metadata(&mut Cursor::new(&bytes)).unwrap();
        let result = scan_equality_and_sum(
            &mut Cursor::new(&bytes),
            &metadata,
            "region",
            &Value::from("EU"),
            "value",
        )
        .unwrap();
        assert_eq!(result.as_tuple(), (0, 0.0));
        assert_eq!(result.diagnostics.row_groups_missing_column, 1);
        assert_eq!(result.diagnostics.bytes_read, 0);
    }

    fn id_file() -> Vec<u8> {
        let schema = Schema::new(vec![
            ColumnDef::new("id", ColumnType::Int64),
            ColumnDef::new("value", ColumnType::Float64),
        ]);
        let mut writer =
            ColumnStoreWriter::try_new(Vec::new(), schema, WriterOptions::default()).unwrap();
        for (id, value) in [(10, 1.5), (11, 2.5), (10, 4.0)] {
            writer
                .write_row(vec![Value::Int64(id), Value::from(value)])
                .unwrap();
        }
        writer.finish().unwrap().0
    }

    #[test]
    fn whole_float_filter_matches_integer_column() {
        let bytes = id_file();
        let metadata = load_metadata(&mut Cursor::new(&bytes)).unwrap();
        let result = scan_equality_and_sum(
            &mut Cursor::new(&bytes),
            &metadata,
            "id",
            &Value::Float64(10.0),
            "value",
        )
        .unwrap();
        assert_eq!(result.as_tuple(), (2, 5.5));

        let mut reader = ColumnarReader::try_new(Cursor::new(&bytes)).unwrap();
        let naive =
            naive_equality_and_sum(&mut reader, "id", &Value::Float64(10.0), "value").unwrap();
        assert_eq!(naive.as_tuple(), (2, 5.5));
    }

    #[test]
    fn impossible_filter_value_matches_nothing() {
        let bytes = id_file();
        let metadata = load_metadata(&mut Cursor::new(&bytes)).unwrap();
        for filter_value in [Value::Float64(10.5), Value::Float64(1e300), Value::from("ten")] {
            let mut file = CountingReader::new(Cursor::new(&bytes));
            let result =
                scan_equality_and_sum(&mut file, &metadata, "id", &filter_value, "value").unwrap();
            assert_eq!(result.as_tuple(), (0, 0.0), "{filter_value:?}");
            assert_eq!(file.bytes_read(), 0);

            let mut reader = ColumnarReader::try_new(Cursor::new(&bytes)).unwrap();
            let naive =
                naive_equality_and_sum(&mut reader, "id", &filter_value, "value").unwrap();
            assert_eq!(naive.as_tuple(), (0, 0.0));
        }
    }

    #[test]
    fn filter_value_is_coerced() {
        let bytes = status_file();
        let metadata = load_metadata(&mut Cursor::new(&bytes)).unwrap();
        let result = scan_equality_and_sum(
            &mut Cursor::new(&bytes),
            &metadata,
            "value",
            &Value::from("5"),
            "value",
        )
        .unwrap();
        assert_eq!(result.as_tuple(), (1, 5.0));
    }
}
