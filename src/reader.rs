use std::{
    io::{self, Read, Seek, SeekFrom},
    sync::Arc,
};

use arrow_array::RecordBatch;
use bytes::Bytes;
use roaring::RoaringBitmap;

use crate::{
    arrow::{rows_to_batch, schema_to_arrow},
    codec::{decode_all, decode_positions},
    error::{Result, StrataError},
    loader::load_metadata,
    metadata::{ColumnChunkMetadata, FileMetadata},
    types::{Row, Schema, Value},
};

/// Read exactly the bytes of one column chunk.
pub fn read_chunk<R: Read + Seek>(file: &mut R, chunk: &ColumnChunkMetadata) -> Result<Bytes> {
    let mut buf = vec![0u8; chunk.size as usize];
    file.seek(SeekFrom::Start(chunk.offset))?;
    file.read_exact(&mut buf)?;
    Ok(Bytes::from(buf))
}

/// Random access to the chunks of a finished file.
///
/// Owns the file handle and a shared, immutable copy of the metadata, which
/// can be handed to other readers of the same file through
/// [`Self::with_metadata`] without parsing the footer again.
#[derive(Debug)]
pub struct ColumnarReader<R> {
    file: R,
    metadata: Arc<FileMetadata>,
}

impl<R: Read + Seek> ColumnarReader<R> {
    /// Open a file, loading its footer.
    pub fn try_new(mut file: R) -> Result<Self> {
        let metadata = Arc::new(load_metadata(&mut file)?);
        Ok(Self { file, metadata })
    }

    /// Reuse metadata that was already loaded from the same file.
    pub fn with_metadata(file: R, metadata: Arc<FileMetadata>) -> Self {
        Self { file, metadata }
    }

    pub fn metadata(&self) -> &Arc<FileMetadata> {
        &self.metadata
    }

    pub fn schema(&self) -> &Schema {
        self.metadata.schema()
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.file
    }

    pub fn into_inner(self) -> R {
        self.file
    }

    /// Raw bytes of one column chunk, `None` if the row group has no chunk
    /// for the column.
    pub fn read_column_chunk(&mut self, row_group: usize, column: &str) -> Result<Option<Bytes>> {
        let Some(chunk) = self.chunk_metadata(row_group, column)? else {
            return Ok(None);
        };
        let chunk = chunk.clone();
        read_chunk(&mut self.file, &chunk).map(Some)
    }

    /// Decode every value of one column in one row group.
    pub fn read_column(&mut self, row_group: usize, column: &str) -> Result<Option<Vec<Value>>> {
        let column_type = self.metadata.schema().require(column)?.column_type;
        let num_rows = self.num_rows_in_group(row_group)?;
        let Some(chunk) = self.read_column_chunk(row_group, column)? else {
            return Ok(None);
        };
        decode_all(&chunk, column_type, num_rows).map(Some)
    }

    /// Decode the values at `positions` (row positions within the group).
    pub fn read_column_at(
        &mut self,
        row_group: usize,
        column: &str,
        positions: &RoaringBitmap,
    ) -> Result<Option<Vec<Value>>> {
        let column_type = self.metadata.schema().require(column)?.column_type;
        let Some(chunk) = self.read_column_chunk(row_group, column)? else {
            return Ok(None);
        };
        decode_positions(&chunk, column_type, positions).map(Some)
    }

    /// Decode whole rows of one row group. Columns the row group has no chunk
    /// for read as null.
    pub fn read_row_group(&mut self, row_group: usize) -> Result<Vec<Row>> {
        let num_rows = self.num_rows_in_group(row_group)?;
        let mut rows = vec![Vec::with_capacity(self.schema().len()); num_rows];
        let columns: Vec<String> = self.schema().iter().map(|c| c.name.clone()).collect();
        for column in &columns {
            let values = self
                .read_column(row_group, column)?
                .unwrap_or_else(|| vec![Value::Null; num_rows]);
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(value);
            }
        }
        Ok(rows)
    }

    /// Decode every row of the file, in order.
    pub fn read_all_rows(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::with_capacity(self.metadata.num_rows as usize);
        for row_group in 0..self.metadata.num_row_groups() {
            rows.extend(self.read_row_group(row_group)?);
        }
        Ok(rows)
    }

    /// Decode one row group as an Arrow batch holding only `projection`
    /// (all columns when `None`). Unlisted columns are never read.
    pub fn read_record_batch(
        &mut self,
        row_group: usize,
        projection: Option<&[&str]>,
    ) -> Result<RecordBatch> {
        let num_rows = self.num_rows_in_group(row_group)?;
        let schema: Schema = match projection {
            Some(names) => names
                .iter()
                .map(|name| self.schema().require(name).cloned())
                .collect::<Result<_>>()?,
            None => self.schema().clone(),
        };
        let mut columns = Vec::with_capacity(schema.len());
        for column in schema.iter() {
            columns.push(
                self.read_column(row_group, &column.name)?
                    .unwrap_or_else(|| vec![Value::Null; num_rows]),
            );
        }
        rows_to_batch(&schema_to_arrow(&schema), &schema, columns, num_rows)
    }

    fn num_rows_in_group(&self, row_group: usize) -> Result<usize> {
        self.metadata
            .row_group(row_group)
            .map(|rg| rg.num_rows_in_group as usize)
            .ok_or_else(|| missing_row_group(row_group, self.metadata.num_row_groups()))
    }

    fn chunk_metadata(&self, row_group: usize, column: &str) -> Result<Option<&ColumnChunkMetadata>> {
        let rg = self
            .metadata
            .row_group(row_group)
            .ok_or_else(|| missing_row_group(row_group, self.metadata.num_row_groups()))?;
        Ok(rg.column_chunk(column))
    }
}

fn missing_row_group(index: usize, num_row_groups: usize) -> StrataError {
    StrataError::RowGroupOutOfRange {
        index,
        num_row_groups,
    }
}

/// Counts the bytes read through it.
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    bytes_read: u64,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn reset(&mut self) {
        self.bytes_read = 0;
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

impl<R: Seek> Seek for CountingReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use arrow_array::{Array, Float64Array, StringArray};

    use super::*;
    use crate::{
        options::WriterOptions,
        types::{ColumnDef, ColumnType},
        writer::ColumnStoreWriter,
    };

    fn reader() -> ColumnarReader<Cursor<Vec<u8>>> {
        let schema = Schema::new(vec![
            ColumnDef::new("id", ColumnType::Int64),
            ColumnDef::new("name", ColumnType::Utf8),
            ColumnDef::new("score", ColumnType::Float64),
        ]);
        let options = WriterOptions::builder().rows_per_group(3).build();
        let mut writer = ColumnStoreWriter::try_new(Vec::new(), schema, options).unwrap();
        for i in 0..5i64 {
            let name = if i == 2 { Value::Null } else { Value::from(format!("n{i}")) };
            writer
                .write_row(vec![Value::Int64(i), name, Value::Float64(i as f64 + 0.5)])
                .unwrap();
        }
        let (bytes, _) = writer.finish().unwrap();
        ColumnarReader::try_new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn reads_all_rows_in_order() {
        let rows = reader().read_all_rows().unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[2], vec![Value::Int64(2), Value::Null, Value::Float64(2.5)]);
        assert_eq!(rows[4][1], Value::from("n4"));
    }

    #[test]
    fn reads_selected_positions() {
        let mut reader = reader();
        let positions: RoaringBitmap = [0u32, 2].into_iter().collect();
        let names = reader.read_column_at(0, "name", &positions).unwrap().unwrap();
        assert_eq!(names, vec![Value::from("n0"), Value::Null]);
    }

    #[test]
    fn projected_record_batch() {
        let mut reader = reader();
        let batch = reader.read_record_batch(1, Some(&["score", "name"])).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(0).name(), "score");
        let scores = batch.column(0).as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(scores.value(1), 4.5);
        let names = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(names.value(0), "n3");
        assert!(!names.is_null(1));
    }

    #[test]
    fn unknown_column_and_row_group() {
        let mut reader = reader();
        assert!(matches!(
            reader.read_column(0, "missing"),
            Err(StrataError::ColumnNotFound { .. })
        ));
        assert!(matches!(
            reader.read_column(7, "id"),
            Err(StrataError::RowGroupOutOfRange {
                index: 7,
                num_row_groups: 2
            })
        ));
    }

    #[test]
    fn counting_reader_counts_chunk_bytes() {
        let bytes = reader().into_inner().into_inner();
        let mut file = CountingReader::new(Cursor::new(bytes));
        let metadata = load_metadata(&mut file).unwrap();
        file.reset();
        let chunk = metadata.row_groups[0].column_chunks["score"].clone();
        let data = read_chunk(&mut file, &chunk).unwrap();
        assert_eq!(data.len(), 24);
        assert_eq!(file.bytes_read(), 24);
    }
}
