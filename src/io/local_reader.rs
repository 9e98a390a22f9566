use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use super::{BlockCache, RangeReader};
use crate::error::IoError;

/// Filesystem-backed implementation of RangeReader.
///
/// The file size is captured once on open. Reads seek and fill a buffer under
/// a mutex, since a single handle carries one cursor.
pub struct LocalFileReader {
    file: Mutex<File>,
    path: PathBuf,
    size: u64,
    identifier: String,
}

impl LocalFileReader {
    /// Open a file for positional reads.
    ///
    /// Returns `IoError::NotFound` when the path does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref().to_path_buf();
        let identifier = path.display().to_string();

        let file = File::open(&path)
            .await
            .map_err(|e| IoError::from_std(e, &identifier))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| IoError::from_std(e, &identifier))?
            .len();

        Ok(Self {
            file: Mutex::new(file),
            path,
            size,
            identifier,
        })
    }

    /// Path this reader was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RangeReader for LocalFileReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        if offset.saturating_add(len as u64) > self.size {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.size,
            });
        }
        if len == 0 {
            return Ok(Bytes::new());
        }

        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| IoError::from_std(e, &self.identifier))?;

        let mut buf = BytesMut::zeroed(len);
        file.read_exact(&mut buf)
            .await
            .map_err(|e| IoError::from_std(e, &self.identifier))?;

        Ok(buf.freeze())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Open a file behind a block cache sized for the given block count.
pub async fn open_cached(
    path: impl AsRef<Path>,
    block_size: usize,
    blocks: usize,
) -> Result<BlockCache<LocalFileReader>, IoError> {
    let reader = LocalFileReader::open(path).await?;
    Ok(BlockCache::with_capacity(reader, block_size, blocks))
}
