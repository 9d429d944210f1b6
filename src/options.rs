use crate::buffer::DEFAULT_ROWS_PER_GROUP;

/// Options controlling how a file is written
#[derive(Clone, Debug)]
pub struct WriterOptions {
    rows_per_group: usize,
    collect_statistics: bool,
}

impl WriterOptions {
    /// Create a new builder for WriterOptions
    ///
    /// # Example
    /// ```
    /// use strata::WriterOptions;
    ///
    /// let options = WriterOptions::builder()
    ///     .rows_per_group(10_000)
    ///     .collect_statistics(false)
    ///     .build();
    /// assert_eq!(options.rows_per_group(), 10_000);
    /// ```
    pub fn builder() -> WriterOptionsBuilder {
        WriterOptionsBuilder::default()
    }

    /// Maximum number of rows in one row group
    pub fn rows_per_group(&self) -> usize {
        self.rows_per_group
    }

    /// Check if per-chunk statistics are written to the footer
    pub fn collect_statistics(&self) -> bool {
        self.collect_statistics
    }
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            rows_per_group: DEFAULT_ROWS_PER_GROUP,
            collect_statistics: true,
        }
    }
}

/// Builder for WriterOptions
#[derive(Clone, Debug, Default)]
pub struct WriterOptionsBuilder {
    rows_per_group: Option<usize>,
    collect_statistics: Option<bool>,
}

impl WriterOptionsBuilder {
    /// Set the row-group threshold (default: 50,000)
    ///
    /// The last row group of a file may be shorter.
    pub fn rows_per_group(mut self, value: usize) -> Self {
        self.rows_per_group = Some(value);
        self
    }

    /// Enable or disable chunk statistics (default: true)
    ///
    /// Statistics record null count, min and max of every column chunk.
    /// They are only consulted by scans that opt into
    /// [`ScanOptions::prune_with_statistics`].
    pub fn collect_statistics(mut self, value: bool) -> Self {
        self.collect_statistics = Some(value);
        self
    }

    /// Build the WriterOptions
    pub fn build(self) -> WriterOptions {
        WriterOptions {
            rows_per_group: self
                .rows_per_group
                .unwrap_or(DEFAULT_ROWS_PER_GROUP)
                .max(1),
            collect_statistics: self.collect_statistics.unwrap_or(true),
        }
    }
}

/// Options for controlling predicate pushdown scans
#[derive(Clone, Debug, Default)]
pub struct ScanOptions {
    prune_with_statistics: bool,
}

impl ScanOptions {
    /// Create a new builder for ScanOptions
    pub fn builder() -> ScanOptionsBuilder {
        ScanOptionsBuilder::default()
    }

    /// Check if row groups may be skipped using chunk statistics
    pub fn prune_with_statistics(&self) -> bool {
        self.prune_with_statistics
    }
}

/// Builder for ScanOptions
#[derive(Clone, Debug, Default)]
pub struct ScanOptionsBuilder {
    prune_with_statistics: Option<bool>,
}

impl ScanOptionsBuilder {
    /// Enable or disable statistics pruning (default: false)
    ///
    /// When enabled, a row group whose filter chunk statistics prove that no
    /// row can equal the filter value is skipped without reading the filter
    /// chunk. When disabled, every row group's filter chunk is read, so the
    /// bytes read are exactly the filter chunks plus the target chunks of
    /// row groups with at least one match.
    pub fn prune_with_statistics(mut self, value: bool) -> Self {
        self.prune_with_statistics = Some(value);
        self
    }

    /// Build the ScanOptions
    pub fn build(self) -> ScanOptions {
        ScanOptions {
            prune_with_statistics: self.prune_with_statistics.unwrap_or(false),
        }
    }
}
