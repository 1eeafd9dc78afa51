//! Index sidecar serialization.
//!
//! The sidecar stores one [`Index`] using the postcard binary format behind a
//! small header:
//!
//! ```text
//! magic "CCIX" | version u8 | payload length u32 (BE) | postcard payload
//! ```
//!
//! Any header or payload mismatch is reported as an error; callers treat every
//! error as a cache miss.

use std::io::Write;
use std::path::Path;

use crate::data::model::Index;

/// Error type for sidecar operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Postcard serialization error: {0}")]
    Postcard(#[from] postcard::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid cache format: {0}")]
    InvalidFormat(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Magic bytes for index sidecar files
const CACHE_MAGIC: &[u8; 4] = b"CCIX";

/// Version written by serialize()
const CACHE_VERSION: u8 = 1;

const HEADER_LEN: usize = 9;

/// Encode an index with header.
pub fn serialize(index: &Index) -> Result<Vec<u8>> {
    let payload = postcard::to_allocvec(index)?;
    let len = u32::try_from(payload.len())
        .map_err(|_| CacheError::InvalidFormat("index too large".to_string()))?;

    let mut data = Vec::with_capacity(HEADER_LEN + payload.len());
    data.extend_from_slice(CACHE_MAGIC);
    data.push(CACHE_VERSION);
    data.extend_from_slice(&len.to_be_bytes());
    data.extend_from_slice(&payload);
    Ok(data)
}

/// Decode an index written by [`serialize`].
pub fn deserialize(data: &[u8]) -> Result<Index> {
    if data.len() < HEADER_LEN {
        return Err(CacheError::InvalidFormat(
            "Data too short for header".to_string(),
        ));
    }

    if &data[0..4] != CACHE_MAGIC {
        return Err(CacheError::InvalidFormat(
            "Invalid magic bytes".to_string(),
        ));
    }

    if data[4] != CACHE_VERSION {
        return Err(CacheError::InvalidFormat(format!(
            "Expected version {}, got {}",
            CACHE_VERSION, data[4]
        )));
    }

    let len = u32::from_be_bytes([data[5], data[6], data[7], data[8]]) as usize;
    let payload = &data[HEADER_LEN..];
    if payload.len() != len {
        return Err(CacheError::InvalidFormat(format!(
            "Payload is {} bytes, header declares {len}",
            payload.len()
        )));
    }

    Ok(postcard::from_bytes(payload)?)
}

/// Read a sidecar file.
pub fn read(path: &Path) -> Result<Index> {
    let data = std::fs::read(path)?;
    deserialize(&data)
}

/// Write a sidecar file through a temporary sibling renamed into place.
pub fn write(path: &Path, index: &Index) -> Result<()> {
    let data = serialize(index)?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = Path::new(&tmp_name);

    let written = std::fs::File::create(tmp)
        .and_then(|mut file| {
            file.write_all(&data)?;
            file.sync_all()
        })
        .and_then(|()| std::fs::rename(tmp, path));
    if let Err(e) = written {
        let _ = std::fs::remove_file(tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Delete a sidecar file. Returns whether one existed.
pub fn remove(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
