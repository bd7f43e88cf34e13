use std::path::Path;

use bytes::Bytes;
use tracing::debug;

use crate::error::IoError;

/// Read an instrument file fully into memory.
///
/// The returned buffer is owned by the caller's decode call and dropped with
/// it; nothing is cached between calls.
pub fn read_file(path: &Path) -> Result<Bytes, IoError> {
    let path_str = path.display().to_string();

    let data = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => IoError::NotFound(path_str.clone()),
        _ => IoError::Read {
            path: path_str.clone(),
            message: e.to_string(),
        },
    })?;

    debug!(path = %path_str, size = data.len(), "read input file");
    Ok(Bytes::from(data))
}
