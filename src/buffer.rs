use crate::types::Row;

/// Default number of rows per row group.
pub const DEFAULT_ROWS_PER_GROUP: usize = 50_000;

/// Rows waiting to be flushed as one row group.
#[derive(Debug)]
pub struct RowGroupBuffer {
    rows: Vec<Row>,
    rows_per_group: usize,
}

impl RowGroupBuffer {
    /// A threshold of zero is treated as one row per group.
    pub fn new(rows_per_group: usize) -> Self {
        let rows_per_group = rows_per_group.max(1);
        Self {
            rows: Vec::with_capacity(rows_per_group.min(DEFAULT_ROWS_PER_GROUP)),
            rows_per_group,
        }
    }

    pub fn append(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.rows_per_group
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows_per_group(&self) -> usize {
        self.rows_per_group
    }

    /// Take the buffered rows, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<Row> {
        std::mem::take(&mut self.rows)
    }
}

impl Default for RowGroupBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_ROWS_PER_GROUP)
    }
}
