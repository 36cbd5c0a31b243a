//! Reusable read buffers.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::ops::{Deref, DerefMut};
use std::path::Path;

use parking_lot::Mutex;

/// Pool of fixed-size byte buffers shared by aggregation workers.
///
/// Safe for concurrent borrow and return. Buffers go back to the pool when
/// the [`PooledBuffer`] guard drops, whatever the outcome of the read.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    buffer_size: usize,
    max_idle: usize,
}

impl BufferPool {
    /// Create a pool of `buffer_size`-byte buffers keeping up to 64 idle.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self::with_max_idle(buffer_size, 64)
    }

    /// Create a pool that keeps at most `max_idle` buffers between uses.
    #[must_use]
    pub fn with_max_idle(buffer_size: usize, max_idle: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
            buffer_size,
            max_idle,
        }
    }

    /// Size of each pooled buffer.
    #[must_use]
    pub const fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of buffers currently waiting in the pool.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.buffers.lock().len()
    }

    /// Borrow an empty buffer with at least `buffer_size` capacity.
    #[must_use]
    pub fn get(&self) -> PooledBuffer<'_> {
        let buf = self
            .buffers
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.buffer_size));
        PooledBuffer { pool: self, buf }
    }

    fn put(&self, mut buf: Vec<u8>) {
        buf.clear();
        if buf.capacity() > self.buffer_size {
            buf.shrink_to(self.buffer_size);
        }
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_idle {
            buffers.push(buf);
        }
    }
}

/// A buffer on loan from a [`BufferPool`].
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Vec<u8>,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.buf));
    }
}

/// How a file was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPath {
    /// Fit in a pooled buffer.
    Pooled,
    /// Larger than the pool's buffers; read into a one-off allocation.
    Oversized,
}

/// Read a file as text, reusing a pooled buffer when the file fits.
///
/// Invalid UTF-8 is replaced rather than rejected.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn read_file_with_pool(path: &Path, pool: &BufferPool) -> io::Result<(String, ReadPath)> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();

    if size <= pool.buffer_size() as u64 {
        let mut buf = pool.get();
        file.read_to_end(&mut buf)?;
        return Ok((String::from_utf8_lossy(&buf).into_owned(), ReadPath::Pooled));
    }

    let capacity = usize::try_from(size).unwrap_or(usize::MAX);
    let mut content = Vec::with_capacity(capacity);
    BufReader::new(file).read_to_end(&mut content)?;
    let text = match String::from_utf8(content) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    };
    Ok((text, ReadPath::Oversized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_buffer_returned_on_drop() {
        let pool = BufferPool::new(16);
        assert_eq!(pool.idle(), 0);
        {
            let mut buf = pool.get();
            buf.extend_from_slice(b"hello");
            assert_eq!(pool.idle(), 0);
        }
        assert_eq!(pool.idle(), 1);
        let buf = pool.get();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 16);
    }

    #[test]
    fn test_max_idle() {
        let pool = BufferPool::with_max_idle(8, 1);
        let a = pool.get();
        let b = pool.get();
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_grown_buffer_is_shrunk() {
        let pool = BufferPool::new(8);
        {
            let mut buf = pool.get();
            buf.extend_from_slice(&[0u8; 1024]);
        }
        assert!(pool.get().capacity() < 1024);
    }

    #[test]
    fn test_read_small_and_large() {
        let tmp = TempDir::new().unwrap();
        let small = tmp.path().join("small.txt");
        let large = tmp.path().join("large.txt");
        fs::write(&small, "tiny").unwrap();
        fs::write(&large, "x".repeat(100)).unwrap();

        let pool = BufferPool::new(32);
        let (text, how) = read_file_with_pool(&small, &pool).unwrap();
        assert_eq!(text, "tiny");
        assert_eq!(how, ReadPath::Pooled);

        let (text, how) = read_file_with_pool(&large, &pool).unwrap();
        assert_eq!(text.len(), 100);
        assert_eq!(how, ReadPath::Oversized);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_read_missing_file_returns_buffer() {
        let pool = BufferPool::new(32);
        assert!(read_file_with_pool(Path::new("/definitely/missing"), &pool).is_err());
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bin.dat");
        fs::write(&path, [b'a', 0xff, b'b']).unwrap();
        let pool = BufferPool::new(32);
        let (text, _) = read_file_with_pool(&path, &pool).unwrap();
        assert_eq!(text, "a\u{fffd}b");
    }

    #[test]
    fn test_concurrent_borrow() {
        let pool = Arc::new(BufferPool::new(64));
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let pool = Arc::clone(&pool);
                scope.spawn(move || {
                    for _ in 0..100 {
                        let mut buf = pool.get();
                        buf.push(1);
                    }
                });
            }
        });
        assert!(pool.idle() <= 8);
        assert!(pool.idle() >= 1);
    }
}
