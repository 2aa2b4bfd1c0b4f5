//! Local gzip file reading with byte counting for progress.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use flate2::read::MultiGzDecoder;

/// Buffer size for the decompressed line reader (256KB)
const GZIP_BUF_SIZE: usize = 256 * 1024;

/// Buffered reader over a gzipped file with compressed-byte counting
pub type GzipReader = BufReader<MultiGzDecoder<CountingReader<File>>>;

/// Shared byte counter for progress tracking
pub type ByteCounter = Arc<AtomicU64>;

/// Open a file → gunzip → buffered reader with byte counter.
///
/// Returns (reader, compressed_bytes_read, compressed_file_size).
/// Concatenated gzip members are read as one stream.
pub fn open_gzip_file(path: &Path) -> io::Result<(GzipReader, ByteCounter, u64)> {
    let file = File::open(path)?;
    let total_bytes = file.metadata()?.len();

    let counter = Arc::new(AtomicU64::new(0));
    let counting_reader = CountingReader {
        inner: file,
        count: counter.clone(),
    };
    let gz = MultiGzDecoder::new(counting_reader);
    let buf = BufReader::with_capacity(GZIP_BUF_SIZE, gz);

    Ok((buf, counter, total_bytes))
}

/// Reader wrapper that tracks bytes read
pub struct CountingReader<R> {
    inner: R,
    count: ByteCounter,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, Write};

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;

    fn write_gz(path: &Path, content: &[u8]) {
        let mut enc = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        enc.write_all(content).unwrap();
        enc.finish().unwrap();
    }

    #[test]
    fn reads_lines_and_counts_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("part_000.gz");
        write_gz(&path, b"{\"id\":1}\n{\"id\":2}\n");

        let (mut reader, counter, total) = open_gzip_file(&path).unwrap();
        let mut lines = Vec::new();
        let mut buf = String::new();
        while reader.read_line(&mut buf).unwrap() > 0 {
            lines.push(buf.trim_end().to_string());
            buf.clear();
        }

        assert_eq!(lines, vec!["{\"id\":1}", "{\"id\":2}"]);
        assert_eq!(counter.load(Ordering::Relaxed), total);
    }

    #[test]
    fn reads_concatenated_members() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.gz");
        let b = dir.path().join("b.gz");
        write_gz(&a, b"one\n");
        write_gz(&b, b"two\n");
        let mut joined = std::fs::read(&a).unwrap();
        joined.extend(std::fs::read(&b).unwrap());
        let path = dir.path().join("joined.gz");
        std::fs::write(&path, joined).unwrap();

        let (mut reader, _, _) = open_gzip_file(&path).unwrap();
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, "one\ntwo\n");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = open_gzip_file(&dir.path().join("nope.gz")).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
