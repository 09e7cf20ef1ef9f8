//! ZIP archive preprocessing.
//!
//! Banks often deliver one MT940 file per day or per account inside a ZIP
//! archive. The members are joined into one text blob, in archive order, so
//! the MT940 parser sees them as back-to-back messages.

use crate::error::{Error, Result};
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Maximum uncompressed size accepted for a single archive member (50 MB).
const MAX_MEMBER_SIZE: u64 = 50 * 1024 * 1024;

/// Maximum uncompressed size accepted for a whole archive (200 MB).
const MAX_ARCHIVE_SIZE: u64 = 200 * 1024 * 1024;

/// Concatenate every file of a ZIP archive into one string, each member
/// followed by a newline.
pub fn concat_archive(bytes: &[u8]) -> Result<String> {
    concat_archive_with_limits(bytes, MAX_MEMBER_SIZE, MAX_ARCHIVE_SIZE)
}

fn concat_archive_with_limits(bytes: &[u8], max_member: u64, max_total: u64) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut combined = String::new();
    let mut total: u64 = 0;

    for index in 0..archive.len() {
        let member = archive.by_index(index)?;
        if member.is_dir() {
            continue;
        }

        let name = member.name().to_string();
        let declared_size = member.size();
        if declared_size > max_member {
            return Err(too_large(&name, declared_size, max_member));
        }

        // Read one byte past the limit: headers may understate the size.
        let mut data = Vec::with_capacity(declared_size as usize);
        member.take(max_member + 1).read_to_end(&mut data)?;
        let actual_size = data.len() as u64;
        if actual_size > max_member {
            return Err(too_large(&name, actual_size, max_member));
        }

        total += actual_size;
        if total > max_total {
            return Err(Error::InvalidFormat(format!(
                "archive expands beyond {} bytes",
                max_total
            )));
        }

        let text = String::from_utf8(data)
            .map_err(|e| Error::Encoding(format!("archive member '{}': {}", name, e)))?;

        tracing::debug!(member = %name, bytes = text.len(), "extracted archive member");

        combined.push_str(&text);
        combined.push('\n');
    }

    Ok(combined)
}

fn too_large(name: &str, size: u64, limit: u64) -> Error {
    Error::InvalidFormat(format!(
        "archive member '{}' is too large: {} bytes (max {} bytes)",
        name, size, limit
    ))
}
