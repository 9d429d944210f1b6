use std::io::{Read, Seek, SeekFrom};

use tracing::debug;

use crate::{
    error::{Result, StrataError},
    footer::{FILE_MAGIC, FOOTER_MAGIC, TRAILER_LEN},
    metadata::FileMetadata,
};

/// Locate and parse the footer of a finished file.
///
/// Reads the header magic, the fixed-size trailer and the metadata payload.
/// Column chunk bytes are never touched.
///
/// # Errors
///
/// - [`StrataError::CorruptHeader`] if the file does not start with the
///   header magic
/// - [`StrataError::CorruptFooter`] if the file is too short, the footer
///   magic does not match, or the metadata offset points outside the file
/// - [`StrataError::CorruptMetadata`] if the payload does not deserialize or
///   describes chunks outside the data region
pub fn load_metadata<R: Read + Seek>(file: &mut R) -> Result<FileMetadata> {
    let file_size = file.seek(SeekFrom::End(0))?;
    let header_len = FILE_MAGIC.len() as u64;
    let trailer_len = TRAILER_LEN as u64;
    if file_size < header_len + trailer_len {
        return Err(StrataError::corrupt_footer(format!(
            "file of {file_size} bytes is too small to hold a header and trailer"
        )));
    }

    let mut header = [0u8; FILE_MAGIC.len()];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut header)?;
    if &header != FILE_MAGIC {
        return Err(StrataError::CorruptHeader);
    }

    let mut trailer = [0u8; TRAILER_LEN];
    file.seek(SeekFrom::Start(file_size - trailer_len))?;
    file.read_exact(&mut trailer)?;
    let (offset_bytes, magic) = trailer.split_at(8);
    if magic != FOOTER_MAGIC {
        return Err(StrataError::corrupt_footer("footer magic mismatch"));
    }
    let mut offset = [0u8; 8];
    offset.copy_from_slice(offset_bytes);
    let metadata_offset = u64::from_le_bytes(offset);

    let payload_end = file_size - trailer_len;
    if metadata_offset < header_len || metadata_offset > payload_end {
        return Err(StrataError::corrupt_footer(format!(
            "metadata offset {metadata_offset} outside {header_len}..{payload_end}"
        )));
    }

    let mut payload = vec![0u8; (payload_end - metadata_offset) as usize];
    file.seek(SeekFrom::Start(metadata_offset))?;
    file.read_exact(&mut payload)?;

    let metadata = FileMetadata::from_json(&payload, header_len..metadata_offset)?;
    debug!(
        file_size,
        metadata_offset,
        row_groups = metadata.num_row_groups(),
        num_rows = metadata.num_rows,
        "loaded metadata"
    );
    Ok(metadata)
}
