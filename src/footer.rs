//! File framing constants and the footer assembler.

use std::io::{self, BufWriter, Write};

use tracing::debug;

use crate::{error::Result, metadata::FileMetadata};

/// First bytes of every file.
pub const FILE_MAGIC: &[u8; 6] = b"STRAT1";

/// Last bytes of every finalized file.
pub const FOOTER_MAGIC: &[u8; 6] = b"STRATF";

/// Fixed-size suffix: 8-byte little-endian metadata offset + footer magic.
pub const TRAILER_LEN: usize = 8 + FOOTER_MAGIC.len();

/// A writer that knows its absolute position in the output.
///
/// Offsets recorded in the footer are taken from [`Self::bytes_written`],
/// so all output must go through this wrapper.
#[derive(Debug)]
pub struct TrackedWrite<W: Write> {
    inner: BufWriter<W>,
    bytes_written: u64,
}

impl<W: Write> TrackedWrite<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush buffered bytes and return the wrapped writer.
    pub fn into_inner(self) -> Result<W> {
        self.inner
            .into_inner()
            .map_err(|e| e.into_error().into())
    }
}

impl<W: Write> Write for TrackedWrite<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.bytes_written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Append the metadata payload, its offset and the footer magic.
///
/// The output must not be written to afterwards.
pub fn finalize<W: Write>(metadata: &FileMetadata, output: &mut TrackedWrite<W>) -> Result<()> {
    let payload = metadata.to_json()?;
    let metadata_offset = output.bytes_written();
    output.write_all(&payload)?;
    output.write_all(&metadata_offset.to_le_bytes())?;
    output.write_all(FOOTER_MAGIC)?;
    output.flush()?;
    debug!(
        metadata_offset,
        payload_len = payload.len(),
        row_groups = metadata.num_row_groups(),
        num_rows = metadata.num_rows,
        "wrote footer"
    );
    Ok(())
}
