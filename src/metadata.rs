//! Footer metadata: schema, row groups and the column chunk index.
//!
//! Everything here is serialized by name, so readers ignore fields they do
//! not know and optional fields (such as statistics) may be absent.

use std::{cmp::Ordering, collections::BTreeMap, ops::Range};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, StrataError},
    types::{ColumnDef, ColumnType, Schema, Value},
};

/// Location of one column chunk in the file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnChunkMetadata {
    /// Absolute file offset of the first byte
    pub offset: u64,
    /// Length in bytes
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<ChunkStatistics>,
}

impl ColumnChunkMetadata {
    pub fn byte_range(&self) -> Range<u64> {
        self.offset..self.offset + self.size
    }
}

/// Null count and value bounds of one column chunk.
///
/// Bounds cover non-null values only and are omitted when the chunk holds
/// no comparable value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkStatistics {
    pub null_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
}

impl ChunkStatistics {
    /// Accumulate one stored value.
    pub fn update(&mut self, value: &Value) {
        if value.is_null() {
            self.null_count += 1;
            return;
        }
        if matches!(value, Value::Float64(v) if v.is_nan()) {
            return;
        }
        if self
            .min
            .as_ref()
            .is_none_or(|min| value.compare(min) == Some(Ordering::Less))
        {
            self.min = Some(value.clone());
        }
        if self
            .max
            .as_ref()
            .is_none_or(|max| value.compare(max) == Some(Ordering::Greater))
        {
            self.max = Some(value.clone());
        }
    }

    /// Whether a chunk with these statistics can hold a value equal to
    /// `value`. Answers `true` whenever the statistics cannot decide.
    pub fn may_contain(&self, value: &Value, column_type: ColumnType, num_rows: u64) -> bool {
        if value.is_null() {
            return self.null_count > 0;
        }
        if self.null_count >= num_rows {
            return false;
        }
        let bound = |bound: &Option<Value>| {
            bound
                .as_ref()
                .and_then(|bound| bound.coerce_to(column_type).ok())
        };
        if let Some(min) = bound(&self.min) {
            if value.compare(&min) == Some(Ordering::Less) {
                return false;
            }
        }
        if let Some(max) = bound(&self.max) {
            if value.compare(&max) == Some(Ordering::Greater) {
                return false;
            }
        }
        true
    }
}

/// Row count and chunk index of one row group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RowGroupMetadata {
    pub num_rows_in_group: u64,
    pub column_chunks: BTreeMap<String, ColumnChunkMetadata>,
}

impl RowGroupMetadata {
    pub fn column_chunk(&self, column: &str) -> Option<&ColumnChunkMetadata> {
        self.column_chunks.get(column)
    }

    /// Sum of all chunk sizes in this row group.
    pub fn total_byte_size(&self) -> u64 {
        self.column_chunks.values().map(|chunk| chunk.size).sum()
    }
}

/// The footer payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub num_rows: u64,
    pub num_cols: u64,
    pub columns: Schema,
    pub row_groups: Vec<RowGroupMetadata>,
}

impl FileMetadata {
    pub fn new(schema: Schema) -> Self {
        Self {
            num_rows: 0,
            num_cols: schema.len() as u64,
            columns: schema,
            row_groups: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.columns
    }

    pub fn num_row_groups(&self) -> usize {
        self.row_groups.len()
    }

    pub fn row_group(&self, index: usize) -> Option<&RowGroupMetadata> {
        self.row_groups.get(index)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.column(name)
    }

    /// Append a flushed row group, keeping `num_rows` in step.
    pub fn push_row_group(&mut self, row_group: RowGroupMetadata) {
        self.num_rows += row_group.num_rows_in_group;
        self.row_groups.push(row_group);
    }

    /// Half-open range of starting row ids covered by each row group.
    pub fn row_ranges(&self) -> Vec<Range<u64>> {
        let mut start = 0;
        self.row_groups
            .iter()
            .map(|row_group| {
                let range = start..start + row_group.num_rows_in_group;
                start = range.end;
                range
            })
            .collect()
    }

    /// Serialize as the footer payload.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StrataError::corrupt_metadata(e.to_string()))
    }

    /// Deserialize a footer payload and check it against the byte range the
    /// column chunks must lie in.
    pub fn from_json(payload: &[u8], data: Range<u64>) -> Result<Self> {
        let metadata: FileMetadata = serde_json::from_slice(payload)
            .map_err(|e| StrataError::corrupt_metadata(e.to_string()))?;
        metadata.validate(data)?;
        Ok(metadata)
    }

    /// Check counts, unique column names, and that every chunk lies inside
    /// `data` without overlapping another chunk.
    pub fn validate(&self, data: Range<u64>) -> Result<()> {
        if self.num_cols != self.columns.len() as u64 {
            return Err(StrataError::corrupt_metadata(format!(
                "num_cols is {} but {} columns are defined",
                self.num_cols,
                self.columns.len()
            )));
        }
        if let Err(StrataError::DuplicateColumn { column }) = self.columns.check_unique() {
            return Err(StrataError::corrupt_metadata(format!(
                "column '{column}' is defined more than once"
            )));
        }
        let counted: u64 = self.row_groups.iter().map(|rg| rg.num_rows_in_group).sum();
        if counted != self.num_rows {
            return Err(StrataError::corrupt_metadata(format!(
                "num_rows is {} but row groups hold {counted}",
                self.num_rows
            )));
        }

        let mut ranges = Vec::new();
        for (index, row_group) in self.row_groups.iter().enumerate() {
            if row_group.column_chunks.len() as u64 > self.num_cols {
                return Err(StrataError::corrupt_metadata(format!(
                    "row group {index} has {} chunks for {} columns",
                    row_group.column_chunks.len(),
                    self.num_cols
                )));
            }
            for (column, chunk) in &row_group.column_chunks {
                let end = chunk.offset.checked_add(chunk.size);
                if chunk.offset < data.start || end.is_none_or(|end| end > data.end) {
                    return Err(StrataError::corrupt_metadata(format!(
                        "chunk '{column}' of row group {index} at {}+{} is outside {data:?}",
                        chunk.offset, chunk.size
                    )));
                }
                if chunk.size > 0 {
                    ranges.push(chunk.byte_range());
                }
            }
        }
        ranges.sort_by_key(|range| range.start);
        if let Some(pair) = ranges.windows(2).find(|pair| pair[0].end > pair[1].start) {
            return Err(StrataError::corrupt_metadata(format!(
                "chunks {:?} and {:?} overlap",
                pair[0], pair[1]
            )));
        }
        Ok(())
    }
}
