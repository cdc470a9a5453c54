use crate::error::{StorageError, StorageResult};
use crate::ring::WatermarkBuffer;
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const HEADER_SIZE: usize = 8;

/// Formats a segment's file name: 20 zero-padded decimal digits plus the `.log` suffix.
pub fn segment_file_name(number: u64) -> String {
    format!("{:020}.log", number)
}

/// Owns one on-disk segment file plus an in-memory watermark buffer. On-disk record framing is
/// `[size: u64 LE][payload]`; the size excludes the 8-byte header.
pub struct SegmentWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    buf: WatermarkBuffer,
}

impl SegmentWriter {
    /// Opens (creating if absent) the segment file in append mode and prefills the in-memory
    /// buffer from the file's existing contents, so subsequent writes continue at the correct
    /// offset.
    pub fn open(dir: &Path, number: u64, backing: Vec<u8>) -> StorageResult<Self> {
        let path = dir.join(segment_file_name(number));
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let mut backing = backing;
        let mut prefilled = 0;
        loop {
            if prefilled == backing.len() {
                break;
            }
            match file.read(&mut backing[prefilled..])? {
                0 => break,
                n => prefilled += n,
            }
        }

        let buf = WatermarkBuffer::new(backing, prefilled);

        Ok(SegmentWriter {
            path,
            writer: BufWriter::new(file),
            buf,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes an 8-byte little-endian length header followed by `data` into the in-memory
    /// buffer. Returns `(offset, false)` without writing anything if it would not fit.
    pub fn write(&mut self, data: &[u8]) -> (u64, bool) {
        let total = HEADER_SIZE + data.len();

        let offset = match self.buf.advance_high(total) {
            Some(offset) => offset,
            None => return (self.buf.high() as u64, false),
        };

        let backing = self.buf.backing_mut();
        (&mut backing[offset..offset + HEADER_SIZE])
            .write_u64::<LittleEndian>(data.len() as u64)
            .expect("header region is exactly 8 bytes");
        backing[offset + HEADER_SIZE..offset + total].copy_from_slice(data);

        (offset as u64, true)
    }

    /// Drains the in-memory buffer to the buffered file writer, flushes it, then fsyncs the
    /// underlying file. Returns the number of bytes drained plus any joined flush/fsync error.
    pub fn flush(&mut self) -> StorageResult<usize> {
        let drained = self.buf.drain(&mut self.writer)?;

        let flush_err = self.writer.flush().err();
        let fsync_err = self.writer.get_ref().sync_all().err();

        if flush_err.is_some() || fsync_err.is_some() {
            return Err(StorageError::Flush {
                flush: flush_err,
                fsync: fsync_err,
            });
        }

        Ok(drained)
    }

    /// Flushes then closes the file. Errors from both steps are joined.
    pub fn close(mut self) -> StorageResult<()> {
        self.flush()?;
        Ok(())
    }
}
