//! A regular file opened with a growing, memory-mapped sliding window.
//!
//! Rather than
//! mapping the whole file once, a bounded *region* around the current
//! position is mapped, re-mapped as the cursor or a write-induced grow moves
//! outside it. File I/O is deliberately synchronous — mapping and unmapping
//! a region never suspends the calling task, so this type is used from
//! blocking contexts (e.g. via `tokio::task::spawn_blocking`) rather than
//! awaited directly.

use memmap2::{MmapMut, MmapOptions};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// What a [`MappedFile`] was opened to do; fixes its open-time preconditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    /// The file must already exist and be a regular file.
    Read,
    /// The file must not already exist.
    WriteNew,
    /// Truncate to zero length if the file exists, else create it.
    Write,
    /// Leave existing contents in place; the cursor starts at EOF.
    Append,
}

/// A segment-aligned mapped window into a file, reused across `Read`/`Write`
/// calls until the cursor moves outside of it.
struct Region {
    start: u64,
    mmap: MmapMut,
}

/// An open file handle backed by a sliding memory-mapped window.
///
/// Implements a growing, segment-aligned sliding-window mapping: reads and
/// writes re-map around the cursor instead of mapping the whole file once.
pub struct MappedFile {
    path: PathBuf,
    file: File,
    operation: FileOperation,
    pos: u64,
    file_size: u64,
    end_of_file_pos: u64,
    segment_size: u64,
    region_limit: u64,
    grow_size: u64,
    region: Option<Region>,
    last_buffer_len: usize,
    do_truncate: bool,
    closed: bool,
}

fn os_page_size() -> u64 {
    // 4 KiB is the universal baseline; platforms with a larger native page
    // size still function correctly (the window is just a touch smaller
    // than optimal), so a fixed constant is preferable to an unsafe syscall.
    4096
}

impl MappedFile {
    /// Opens `path` for `operation`, applying the open-time preconditions
    /// above and performing the initial mapping.
    pub fn open(path: impl AsRef<Path>, operation: FileOperation) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let exists = path.exists();

        match operation {
            FileOperation::Read => {
                if !path.is_file() {
                    return Err(io::Error::new(io::ErrorKind::NotFound, "not a regular file"));
                }
            }
            FileOperation::WriteNew => {
                if exists {
                    return Err(io::Error::new(io::ErrorKind::AlreadyExists, "file already exists"));
                }
            }
            FileOperation::Write => {
                if exists {
                    fs::OpenOptions::new().write(true).open(&path)?.set_len(0)?;
                } else {
                    File::create(&path)?;
                }
            }
            FileOperation::Append => {
                if !exists {
                    File::create(&path)?;
                }
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(!matches!(operation, FileOperation::Read))
            .create(matches!(operation, FileOperation::WriteNew))
            .open(&path)?;

        let file_size = file.metadata()?.len();
        let segment_size = os_page_size();

        let mut mapped = MappedFile {
            path,
            file,
            operation,
            pos: 0,
            file_size,
            end_of_file_pos: file_size,
            segment_size,
            region_limit: segment_size * 8,
            grow_size: segment_size * 8 * 128,
            region: None,
            last_buffer_len: 0,
            do_truncate: false,
            closed: false,
        };

        if operation == FileOperation::Append {
            mapped.seek(mapped.end_of_file_pos)?;
        }

        Ok(mapped)
    }

    /// The current logical end-of-file position.
    pub fn len(&self) -> u64 {
        self.end_of_file_pos
    }

    /// Whether the file is logically empty.
    pub fn is_empty(&self) -> bool {
        self.end_of_file_pos == 0
    }

    /// Moves the cursor to `pos`. Errors if `pos` is beyond the current
    /// logical end of file.
    pub fn seek(&mut self, pos: u64) -> io::Result<()> {
        if pos > self.end_of_file_pos.max(self.file_size) {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "seek beyond EOF"));
        }
        self.pos = pos;
        Ok(())
    }

    fn map_region(&mut self, want_bytes: u64) -> io::Result<()> {
        let start_segment = self.pos / self.segment_size;
        let region_start = start_segment * self.segment_size;
        let max_region_size = if want_bytes == 0 { self.region_limit } else { (want_bytes + self.segment_size).min(self.region_limit) };
        let region_len = max_region_size.min(self.file_size.saturating_sub(region_start)).max(1);

        let needs_remap = match &self.region {
            Some(r) => r.start != region_start || (r.mmap.len() as u64) < region_len,
            None => true,
        };

        if needs_remap {
            let mmap = unsafe { MmapOptions::new().offset(region_start).len(region_len as usize).map_mut(&self.file)? };
            self.region = Some(Region { start: region_start, mmap });
        }

        Ok(())
    }

    /// Returns `(offset_into_region, usable_length)` for a request of
    /// `bytes` (0 meaning "as much of the mapped region as remains").
    fn buffer_values(&mut self, bytes: usize) -> io::Result<(usize, usize)> {
        self.map_region(bytes as u64)?;
        let region = self.region.as_ref().expect("just mapped");
        let offset = (self.pos - region.start) as usize;
        let seg_len = region.mmap.len() - offset;
        let use_len = if bytes == 0 { seg_len } else { bytes.min(seg_len) };
        self.pos += use_len as u64;
        self.last_buffer_len = use_len;
        Ok((offset, use_len))
    }

    /// Returns a read-only view of up to `bytes` bytes starting at the
    /// current cursor, advancing the cursor by the amount actually
    /// returned. The slice is valid until the next `read`/`write`/`seek`.
    pub fn read(&mut self, bytes: usize) -> io::Result<&[u8]> {
        let (offset, use_len) = self.buffer_values(bytes)?;
        let region = self.region.as_ref().expect("just mapped");
        Ok(&region.mmap[offset..offset + use_len])
    }

    fn grow_to_fit(&mut self, bytes: u64) -> io::Result<()> {
        let min_file_size = self.pos + bytes + self.segment_size;
        if min_file_size > self.file_size {
            let align = if min_file_size % self.segment_size != 0 { self.segment_size } else { 0 };
            let segments = min_file_size / self.segment_size;
            let rounded = segments * self.segment_size + align;
            let new_size = rounded.max(self.file_size + self.grow_size);

            self.region = None; // drop the mapping before resizing
            self.file.set_len(new_size)?;
            self.file_size = new_size;
        }
        Ok(())
    }

    /// Returns a writable view of up to `bytes` bytes (0 meaning one full
    /// segment) starting at the current cursor, growing the underlying file
    /// first if necessary. Must be followed by [`MappedFile::set_bytes_written`].
    pub fn write(&mut self, bytes: usize) -> io::Result<&mut [u8]> {
        let want = if bytes == 0 { self.segment_size as usize } else { bytes };
        self.grow_to_fit(want as u64)?;
        let (offset, use_len) = self.buffer_values(want)?;
        let region = self.region.as_mut().expect("just mapped");
        Ok(&mut region.mmap[offset..offset + use_len])
    }

    /// Tells the file how many of the bytes from the last [`MappedFile::write`]
    /// call were actually used. Rewinds the cursor by the unused tail and
    /// marks the file dirty for truncation at [`MappedFile::close`].
    pub fn set_bytes_written(&mut self, bytes: usize) {
        debug_assert!(bytes <= self.last_buffer_len);
        if bytes < self.last_buffer_len {
            let diff = (self.last_buffer_len - bytes) as u64;
            self.pos -= diff;
            self.do_truncate = true;
        }
        if self.end_of_file_pos < self.pos {
            self.end_of_file_pos = self.pos;
        }
    }

    /// Unmaps and, if the file was written and its real end is below its
    /// physical (grown) size, truncates it down to the logical end of file.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.region = None;

        if self.do_truncate && self.file_size > self.end_of_file_pos && self.path.is_file() {
            self.file.set_len(self.end_of_file_pos)?;
        }
        Ok(())
    }

    /// The operation this file was opened for.
    pub fn operation(&self) -> FileOperation {
        self.operation
    }
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    fn tempfile(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("vftpd-mapped-file-test-{name}-{}", std::process::id()));
        p
    }

    #[test]
    fn write_then_read_roundtrip() {
        let path = tempfile("roundtrip");
        let _ = fs::remove_file(&path);

        {
            let mut f = MappedFile::open(&path, FileOperation::WriteNew).unwrap();
            let buf = f.write(4).unwrap();
            buf[..4].copy_from_slice(b"ABCD");
            f.set_bytes_written(4);
            f.close().unwrap();
        }

        let mut f = MappedFile::open(&path, FileOperation::Read).unwrap();
        let data = f.read(4).unwrap().to_vec();
        assert_eq!(&data, b"ABCD");
        assert_eq!(f.len(), 4);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn close_truncates_to_logical_end() {
        let path = tempfile("truncate");
        let _ = fs::remove_file(&path);

        let mut f = MappedFile::open(&path, FileOperation::WriteNew).unwrap();
        // Ask for a whole segment but only use 10 bytes of it.
        let buf = f.write(0).unwrap();
        buf[..10].copy_from_slice(b"0123456789");
        f.set_bytes_written(10);
        f.close().unwrap();

        let mut raw = File::open(&path).unwrap();
        let mut contents = Vec::new();
        raw.read_to_end(&mut contents).unwrap();
        assert_eq!(contents.len(), 10);
        assert_eq!(&contents, b"0123456789");

        fs::remove_file(&path).ok();
    }

    #[test]
    fn append_starts_at_eof() {
        let path = tempfile("append");
        let _ = fs::remove_file(&path);
        fs::write(&path, b"hello").unwrap();

        let mut f = MappedFile::open(&path, FileOperation::Append).unwrap();
        let buf = f.write(5).unwrap();
        buf[..5].copy_from_slice(b"world");
        f.set_bytes_written(5);
        f.close().unwrap();

        let contents = fs::read(&path).unwrap();
        assert_eq!(&contents, b"helloworld");

        fs::remove_file(&path).ok();
    }

    #[test]
    fn write_new_rejects_existing_file() {
        let path = tempfile("write-new-exists");
        fs::write(&path, b"x").unwrap();
        assert!(MappedFile::open(&path, FileOperation::WriteNew).is_err());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn seek_beyond_eof_errors() {
        let path = tempfile("seek-eof");
        let _ = fs::remove_file(&path);
        fs::write(&path, b"abc").unwrap();

        let mut f = MappedFile::open(&path, FileOperation::Read).unwrap();
        assert!(f.seek(100).is_err());

        fs::remove_file(&path).ok();
    }
}
