//! Filesystem-backed artifact store.
//!
//! Reads artifacts straight from the local filesystem, which is what the shell
//! writes to when it runs on this machine (or on a mount of the remote home).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use super::{ArtifactStat, FileStore};
use crate::error::StoreError;

#[derive(Clone, Debug, Default)]
pub struct LocalFileStore;

impl LocalFileStore {
    pub fn new() -> Self {
        Self
    }
}

impl FileStore for LocalFileStore {
    fn stat(&self, path: &str) -> Result<ArtifactStat, StoreError> {
        let meta = std::fs::metadata(path).map_err(|e| StoreError::from_io(path, e))?;
        Ok(ArtifactStat { len: meta.len() })
    }

    fn read_at(&self, path: &str, offset: u64, max_len: usize) -> Result<Vec<u8>, StoreError> {
        let mut file = File::open(path).map_err(|e| StoreError::from_io(path, e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| StoreError::from_io(path, e))?;

        let mut buf = Vec::new();
        file.take(max_len as u64)
            .read_to_end(&mut buf)
            .map_err(|e| StoreError::from_io(path, e))?;
        Ok(buf)
    }
}
