use std::io::Write;

use arrow_array::RecordBatch;
use bytes::BytesMut;
use tracing::{debug, warn};

use crate::{
    arrow::batch_to_rows,
    buffer::RowGroupBuffer,
    codec::{decode_value, encode_null, encode_value},
    error::{Result, StrataError},
    footer::{FILE_MAGIC, TrackedWrite, finalize},
    metadata::{ChunkStatistics, ColumnChunkMetadata, FileMetadata, RowGroupMetadata},
    options::WriterOptions,
    types::{Row, Schema},
};

/// Counters for values the writer had to repair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteDiagnostics {
    /// Values replaced by their column's null because they could not be
    /// represented in the column type
    pub substituted_nulls: u64,
}

/// Outcome of flushing one row group.
#[derive(Clone, Debug)]
pub struct FlushedRowGroup {
    pub metadata: RowGroupMetadata,
    pub substituted_nulls: u64,
}

/// Write one row group: one chunk per column, in schema order, starting at
/// the output's current position.
///
/// Values that cannot be encoded as their column type are written as null.
pub fn write_row_group<W: Write>(
    rows: &[Row],
    schema: &Schema,
    output: &mut TrackedWrite<W>,
    options: &WriterOptions,
) -> Result<FlushedRowGroup> {
    schema.check_unique()?;
    if let Some(row) = rows.iter().find(|row| row.len() != schema.len()) {
        return Err(StrataError::RowWidthMismatch {
            expected: schema.len(),
            found: row.len(),
        });
    }

    let mut row_group = RowGroupMetadata {
        num_rows_in_group: rows.len() as u64,
        ..Default::default()
    };
    let mut substituted_nulls = 0;

    for (index, column) in schema.iter().enumerate() {
        let column_type = column.column_type;
        let mut chunk = BytesMut::with_capacity(rows.len() * column_type.fixed_width().unwrap_or(16));
        let mut statistics = ChunkStatistics::default();
        let mut substituted = 0u64;

        for row in rows {
            let start = chunk.len();
            match encode_value(&row[index], column_type, &mut chunk) {
                Ok(()) => {}
                Err(StrataError::EncodingTypeMismatch { .. }) => {
                    encode_null(column_type, &mut chunk);
                    substituted += 1;
                }
                Err(e) => return Err(e),
            }
            if options.collect_statistics() {
                let mut stored = &chunk[start..];
                statistics.update(&decode_value(&mut stored, column_type)?);
            }
        }

        if substituted > 0 {
            warn!(
                column = %column.name,
                %column_type,
                substituted,
                "wrote null for values that do not fit the column type"
            );
        }
        substituted_nulls += substituted;

        let offset = output.bytes_written();
        output.write_all(&chunk)?;
        row_group.column_chunks.insert(
            column.name.clone(),
            ColumnChunkMetadata {
                offset,
                size: chunk.len() as u64,
                statistics: options.collect_statistics().then_some(statistics),
            },
        );
    }

    Ok(FlushedRowGroup {
        metadata: row_group,
        substituted_nulls,
    })
}

/// Streams rows into a strata file.
///
/// Rows are buffered until a row group is full, then written column by
/// column. [`Self::finish`] flushes the last, possibly short, row group and
/// appends the footer; a file that was never finished has no valid trailer.
///
/// # Example
/// ```
/// use strata::{ColumnDef, ColumnStoreWriter, ColumnType, Schema, Value, WriterOptions};
///
/// # fn main() -> Result<(), strata::StrataError> {
/// let schema = Schema::new(vec![
///     ColumnDef::new("status", ColumnType::Utf8),
///     ColumnDef::new("value", ColumnType::Float64),
/// ]);
/// let mut writer = ColumnStoreWriter::try_new(Vec::new(), schema, WriterOptions::default())?;
/// writer.write_row(vec![Value::from("OK"), Value::from(10.0)])?;
/// let (bytes, metadata) = writer.finish()?;
/// assert_eq!(metadata.num_rows, 1);
/// assert!(bytes.ends_with(strata::FOOTER_MAGIC));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ColumnStoreWriter<W: Write> {
    output: TrackedWrite<W>,
    metadata: FileMetadata,
    buffer: RowGroupBuffer,
    options: WriterOptions,
    diagnostics: WriteDiagnostics,
}

impl<W: Write> ColumnStoreWriter<W> {
    /// Start a file by writing the header magic.
    ///
    /// Fails with [`StrataError::DuplicateColumn`] before anything is written
    /// if two columns share a name.
    pub fn try_new(output: W, schema: Schema, options: WriterOptions) -> Result<Self> {
        schema.check_unique()?;
        let mut output = TrackedWrite::new(output);
        output.write_all(FILE_MAGIC)?;
        Ok(Self {
            output,
            metadata: FileMetadata::new(schema),
            buffer: RowGroupBuffer::new(options.rows_per_group()),
            options,
            diagnostics: WriteDiagnostics::default(),
        })
    }

    pub fn schema(&self) -> &Schema {
        self.metadata.schema()
    }

    /// Metadata of the row groups flushed so far.
    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    pub fn diagnostics(&self) -> WriteDiagnostics {
        self.diagnostics
    }

    /// Number of rows buffered but not yet written.
    pub fn buffered_rows(&self) -> usize {
        self.buffer.len()
    }

    /// Buffer one row, flushing a row group once the buffer is full.
    pub fn write_row(&mut self, row: Row) -> Result<()> {
        let expected = self.metadata.schema().len();
        if row.len() != expected {
            return Err(StrataError::RowWidthMismatch {
                expected,
                found: row.len(),
            });
        }
        self.buffer.append(row);
        if self.buffer.is_full() {
            self.flush()?;
        }
        Ok(())
    }

    pub fn write_rows<I>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = Row>,
    {
        rows.into_iter().try_for_each(|row| self.write_row(row))
    }

    /// Buffer every row of an Arrow batch. Columns are matched by position.
    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        let rows = batch_to_rows(batch, self.metadata.schema())?;
        self.write_rows(rows)
    }

    /// Write the buffered rows as a row group, even if the buffer is not
    /// full. Does nothing when the buffer is empty.
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let rows = self.buffer.drain();
        let flushed = write_row_group(
            &rows,
            self.metadata.schema(),
            &mut self.output,
            &self.options,
        )?;
        debug!(
            row_group = self.metadata.num_row_groups(),
            rows = rows.len(),
            bytes = flushed.metadata.total_byte_size(),
            "flushed row group"
        );
        self.diagnostics.substituted_nulls += flushed.substituted_nulls;
        self.metadata.push_row_group(flushed.metadata);
        Ok(())
    }

    /// Flush the last row group, append the footer and hand back the output
    /// together with the metadata that was written.
    pub fn finish(mut self) -> Result<(W, FileMetadata)> {
        self.flush()?;
        finalize(&self.metadata, &mut self.output)?;
        let output = self.output.into_inner()?;
        Ok((output, self.metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        footer::TRAILER_LEN,
        types::{ColumnDef, ColumnType, Value},
    };

    fn schema() -> Schema {
        Schema::new(vec![
            ColumnDef::new("id", ColumnType::Int64),
            ColumnDef::new("status", ColumnType::Utf8),
            ColumnDef::new("value", ColumnType::Float64),
        ])
    }

    fn row(id: i64, status: &str, value: f64) -> Row {
        vec![Value::from(id), Value::from(status), Value::from(value)]
    }

    #[test]
    fn chunks_follow_schema_order() {
        let mut output = TrackedWrite::new(Vec::new());
        output.write_all(FILE_MAGIC).unwrap();
        let rows = vec![row(1, "OK", 1.5), row(2, "FAIL", 2.5)];
        let flushed =
            write_row_group(&rows, &schema(), &mut output, &WriterOptions::default()).unwrap();

        let chunks = &flushed.metadata.column_chunks;
        assert_eq!(chunks["id"].offset, 6);
        assert_eq!(chunks["id"].size, 16);
        assert_eq!(chunks["status"].offset, 22);
        assert_eq!(chunks["status"].size, 4 + 2 + 4 + 4);
        assert_eq!(chunks["value"].offset, 36);
        assert_eq!(chunks["value"].size, 16);
        assert_eq!(output.bytes_written(), 52);
    }

    #[test]
    fn substitutes_null_for_mismatches() {
        let mut writer =
            ColumnStoreWriter::try_new(Vec::new(), schema(), WriterOptions::default()).unwrap();
        writer
            .write_row(vec![Value::from("abc"), Value::from("OK"), Value::from("SEE_NOTES")])
            .unwrap();
        writer.write_row(row(2, "OK", 4.0)).unwrap();
        assert_eq!(writer.diagnostics().substituted_nulls, 2);

        let (_, metadata) = writer.finish().unwrap();
        let stats = metadata.row_groups[0].column_chunks["value"]
            .statistics
            .clone()
            .unwrap();
        assert_eq!(stats.null_count, 1);
        assert_eq!(stats.min, Some(Value::Float64(4.0)));
    }

    #[test]
    fn rejects_short_rows() {
        let mut writer =
            ColumnStoreWriter::try_new(Vec::new(), schema(), WriterOptions::default()).unwrap();
        let err = writer.write_row(vec![Value::Int64(1)]).unwrap_err();
        assert!(matches!(
            err,
            StrataError::RowWidthMismatch {
                expected: 3,
                found: 1
            }
        ));
        assert_eq!(writer.buffered_rows(), 0);
    }

    #[test]
    fn rejects_duplicate_column_names() {
        let schema = Schema::new(vec![
            ColumnDef::new("value", ColumnType::Float64),
            ColumnDef::new("value", ColumnType::Float64),
        ]);
        let err = ColumnStoreWriter::try_new(Vec::new(), schema.clone(), WriterOptions::default())
            .unwrap_err();
        assert!(matches!(err, StrataError::DuplicateColumn { ref column } if column == "value"));

        let mut output = TrackedWrite::new(Vec::new());
        let rows = vec![vec![Value::from(1.0), Value::from(2.0)]];
        let err = write_row_group(&rows, &schema, &mut output, &WriterOptions::default())
            .unwrap_err();
        assert!(matches!(err, StrataError::DuplicateColumn { .. }));
        assert_eq!(output.bytes_written(), 0);
    }

    #[test]
    fn flushes_full_and_final_groups() {
        let options = WriterOptions::builder().rows_per_group(2).build();
        let mut writer = ColumnStoreWriter::try_new(Vec::new(), schema(), options).unwrap();
        writer
            .write_rows((0..5).map(|i| row(i, "OK", i as f64 + 0.5)))
            .unwrap();
        assert_eq!(writer.metadata().num_row_groups(), 2);
        assert_eq!(writer.buffered_rows(), 1);

        let (bytes, metadata) = writer.finish().unwrap();
        let sizes: Vec<u64> = metadata
            .row_groups
            .iter()
            .map(|rg| rg.num_rows_in_group)
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(metadata.num_rows, 5);
        assert!(bytes.starts_with(FILE_MAGIC));
        assert!(bytes.len() > FILE_MAGIC.len() + TRAILER_LEN);
    }

    #[test]
    fn statistics_can_be_disabled() {
        let options = WriterOptions::builder().collect_statistics(false).build();
        let mut writer = ColumnStoreWriter::try_new(Vec::new(), schema(), options).unwrap();
        writer.write_row(row(1, "OK", 1.0)).unwrap();
        let (_, metadata) = writer.finish().unwrap();
        assert!(
            metadata.row_groups[0]
                .column_chunks
                .values()
                .all(|chunk| chunk.statistics.is_none())
        );
    }
}
