//! Storage backend implementations for the reference volume

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{FsError, FsResult};

/// Identifier of a stored byte stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentId(u64);

/// How a stream occupies clusters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StorageLayout {
    #[default]
    Dense,
    /// Clusters holding only zeros are not allocated.
    Sparse,
    /// Content is run-length packed before allocation.
    Compressed,
}

/// Storage backend trait for byte streams
pub trait StorageBackend: Send + Sync {
    fn read(&self, id: ContentId, offset: u64, buf: &mut [u8]) -> FsResult<usize>;
    fn write(&self, id: ContentId, offset: u64, data: &[u8]) -> FsResult<usize>;
    fn truncate(&self, id: ContentId, new_len: u64) -> FsResult<()>;
    fn len(&self, id: ContentId) -> FsResult<u64>;
    fn allocate(&self, initial: &[u8]) -> FsResult<ContentId>;
    /// Independent copy of a stream.
    fn duplicate(&self, base: ContentId) -> FsResult<ContentId>;
    fn release(&self, id: ContentId) -> FsResult<()>;
    /// Bytes the stream occupies on the volume, rounded up to whole clusters.
    fn allocated(&self, id: ContentId, layout: StorageLayout, cluster_size: u64) -> FsResult<u64>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn round_up(len: u64, cluster_size: u64) -> u64 {
    if cluster_size == 0 {
        return len;
    }
    len.div_ceil(cluster_size) * cluster_size
}

/// Packed size under a simple run-length scheme: one (count, byte) pair per run
/// of at most 255 equal bytes.
fn run_length_size(content: &[u8]) -> u64 {
    let mut packed = 0u64;
    let mut iter = content.iter().peekable();
    while let Some(&byte) = iter.next() {
        let mut run = 1u32;
        while run < 255 && iter.peek() == Some(&&byte) {
            iter.next();
            run += 1;
        }
        packed += 2;
    }
    packed
}

/// In-memory storage backend implementation
pub struct InMemoryBackend {
    next_id: Mutex<u64>,
    data: Mutex<HashMap<ContentId, Vec<u8>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            data: Mutex::new(HashMap::new()),
        }
    }

    fn get_next_id(&self) -> ContentId {
        let mut next_id = lock(&self.next_id);
        let id = ContentId(*next_id);
        *next_id += 1;
        id
    }
}

impl StorageBackend for InMemoryBackend {
    fn read(&self, id: ContentId, offset: u64, buf: &mut [u8]) -> FsResult<usize> {
        let data = lock(&self.data);
        let content = data.get(&id).ok_or(FsError::NotFound)?;

        let start = usize::try_from(offset).map_err(|_| FsError::InvalidArgument)?;
        if start >= content.len() {
            return Ok(0);
        }

        let end = std::cmp::min(start + buf.len(), content.len());
        let bytes_to_copy = end - start;
        buf[..bytes_to_copy].copy_from_slice(&content[start..end]);
        Ok(bytes_to_copy)
    }

    fn write(&self, id: ContentId, offset: u64, data: &[u8]) -> FsResult<usize> {
        let mut storage_data = lock(&self.data);
        let content = storage_data.get_mut(&id).ok_or(FsError::NotFound)?;

        let start = usize::try_from(offset).map_err(|_| FsError::InvalidArgument)?;
        let end = start.checked_add(data.len()).ok_or(FsError::InvalidArgument)?;

        // Extend the content if necessary; the gap reads as zeros
        if end > content.len() {
            content.resize(end, 0);
        }

        content[start..end].copy_from_slice(data);
        Ok(data.len())
    }

    fn truncate(&self, id: ContentId, new_len: u64) -> FsResult<()> {
        let mut data = lock(&self.data);
        let content = data.get_mut(&id).ok_or(FsError::NotFound)?;
        let new_len = usize::try_from(new_len).map_err(|_| FsError::InvalidArgument)?;
        content.resize(new_len, 0);
        Ok(())
    }

    fn len(&self, id: ContentId) -> FsResult<u64> {
        let data = lock(&self.data);
        let content = data.get(&id).ok_or(FsError::NotFound)?;
        Ok(content.len() as u64)
    }

    fn allocate(&self, initial: &[u8]) -> FsResult<ContentId> {
        let id = self.get_next_id();
        lock(&self.data).insert(id, initial.to_vec());
        Ok(id)
    }

    fn duplicate(&self, base: ContentId) -> FsResult<ContentId> {
        let base_content = {
            let data = lock(&self.data);
            data.get(&base).ok_or(FsError::NotFound)?.clone()
        };
        let id = self.get_next_id();
        lock(&self.data).insert(id, base_content);
        Ok(id)
    }

    fn release(&self, id: ContentId) -> FsResult<()> {
        lock(&self.data)
            .remove(&id)
            .map(|_| ())
            .ok_or(FsError::NotFound)
    }

    fn allocated(&self, id: ContentId, layout: StorageLayout, cluster_size: u64) -> FsResult<u64> {
        let data = lock(&self.data);
        let content = data.get(&id).ok_or(FsError::NotFound)?;
        let dense = round_up(content.len() as u64, cluster_size);

        let allocated = match layout {
            StorageLayout::Dense => dense,
            StorageLayout::Sparse => {
                let chunk = usize::try_from(cluster_size.max(1)).unwrap_or(usize::MAX);
                let used = content
                    .chunks(chunk)
                    .filter(|c| c.iter().any(|b| *b != 0))
                    .count() as u64;
                used * cluster_size
            }
            StorageLayout::Compressed => {
                std::cmp::min(round_up(run_length_size(content), cluster_size), dense)
            }
        };
        Ok(allocated)
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_backend_basic() {
        let backend = InMemoryBackend::new();

        let id = backend.allocate(b"hello world").unwrap();
        assert_eq!(backend.len(id).unwrap(), 11);

        let mut buf = [0u8; 5];
        let n = backend.read(id, 0, &mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf, b"hello");

        let n = backend.write(id, 6, b"probes").unwrap();
        assert_eq!(n, 6);

        let mut buf = [0u8; 12];
        let n = backend.read(id, 0, &mut buf).unwrap();
        assert_eq!(n, 12);
        assert_eq!(&buf, b"hello probes");

        backend.truncate(id, 5).unwrap();
        let mut buf = [0u8; 10];
        let n = backend.read(id, 0, &mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf[..5], b"hello");
    }

    #[test]
    fn test_duplicate_is_independent() {
        let backend = InMemoryBackend::new();

        let id1 = backend.allocate(b"original").unwrap();
        let id2 = backend.duplicate(id1).unwrap();

        backend.write(id2, 0, b"modified").unwrap();

        let mut buf1 = [0u8; 8];
        let mut buf2 = [0u8; 8];
        backend.read(id1, 0, &mut buf1).unwrap();
        backend.read(id2, 0, &mut buf2).unwrap();
        assert_eq!(&buf1, b"original");
        assert_eq!(&buf2, b"modified");

        backend.release(id1).unwrap();
        assert!(matches!(backend.len(id1), Err(FsError::NotFound)));
    }

    #[test]
    fn test_read_beyond_eof() {
        let backend = InMemoryBackend::new();
        let id = backend.allocate(b"short").unwrap();

        let mut buf = [0u8; 10];
        let n = backend.read(id, 10, &mut buf).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_write_past_end_zero_fills() {
        let backend = InMemoryBackend::new();
        let id = backend.allocate(b"ab").unwrap();
        backend.write(id, 6, b"z").unwrap();

        let mut buf = [0xffu8; 7];
        backend.read(id, 0, &mut buf).unwrap();
        assert_eq!(&buf, b"ab\0\0\0\0z");
    }

    #[test]
    fn test_allocation_layouts() {
        let backend = InMemoryBackend::new();

        let mut sparse = vec![0u8; 1 << 20];
        sparse.push(1);
        let id = backend.allocate(&sparse).unwrap();
        assert_eq!(backend.allocated(id, StorageLayout::Sparse, 4096).unwrap(), 4096);
        assert_eq!(
            backend.allocated(id, StorageLayout::Dense, 4096).unwrap(),
            (1 << 20) + 4096
        );

        let id = backend.allocate(&vec![b'A'; 100 * 1024]).unwrap();
        let compressed = backend.allocated(id, StorageLayout::Compressed, 4096).unwrap();
        assert!(compressed < 100 * 1024);
        assert_eq!(compressed % 4096, 0);
    }
}
