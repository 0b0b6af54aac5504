//! File system helpers

use std::fs;
use std::io;
use std::path::Path;

use super::error::{ProxyError, Result};

/// Read a key or configuration file into memory
///
/// A missing path or a directory is reported as a configuration error naming
/// the path; other read failures surface as [`ProxyError::Io`].
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    match fs::metadata(path) {
        Ok(meta) if !meta.is_file() => {
            return Err(ProxyError::Config(format!("Not a regular file: {}", path.display())));
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ProxyError::Config(format!("File not found: {}", path.display())));
        }
        Err(e) => return Err(ProxyError::Io(e)),
    }

    Ok(fs::read(path)?)
}
