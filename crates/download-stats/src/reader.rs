// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batched line reading from a stored byte offset.
//!
//! The reader only sees the bytes present when the file was opened; anything appended later
//! is left for the next run. A trailing line without its newline is treated the same way, so a
//! line being written while we read is never split.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Take};
use std::path::Path;

use tracing::debug;

/// One batch of raw lines (newline stripped) and the offset just past its last line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub lines: Vec<Vec<u8>>,
    pub end_offset: u64,
}

pub struct LineReader<R> {
    reader: BufReader<R>,
    offset: u64,
    exhausted: bool,
}

impl LineReader<Take<File>> {
    /// Opens `path` positioned at `offset`, bounded by the file size at open time.
    pub fn open(path: &Path, offset: u64) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        LineReader::from_file(file, size, offset)
    }

    /// Reads `file` from `offset` up to `size`, the length observed by the caller.
    pub fn from_file(mut file: File, size: u64, offset: u64) -> io::Result<Self> {
        let start = offset.min(size);
        file.seek(SeekFrom::Start(start))?;
        Ok(LineReader::new(file.take(size - start), start))
    }
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R, start_offset: u64) -> Self {
        Self {
            reader: BufReader::new(inner),
            offset: start_offset,
            exhausted: false,
        }
    }

    /// Offset just past the last complete line handed out.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn next_line(&mut self) -> Option<io::Result<Vec<u8>>> {
        if self.exhausted {
            return None;
        }
        let mut line = Vec::new();
        let read = match self.reader.read_until(b'\n', &mut line) {
            Ok(read) => read,
            Err(e) => {
                self.exhausted = true;
                return Some(Err(e));
            }
        };
        if read == 0 {
            self.exhausted = true;
            return None;
        }
        if line.last() != Some(&b'\n') {
            debug!(
                "Leaving {read} bytes of unterminated line at offset {} for the next run",
                self.offset
            );
            self.exhausted = true;
            return None;
        }

        self.offset += read as u64;
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(Ok(line))
    }

    pub fn batches(self, batch_size: usize) -> Batches<R> {
        Batches {
            reader: self,
            batch_size: batch_size.max(1),
        }
    }
}

impl<R: Read> Iterator for LineReader<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line()
    }
}

/// Full batches of `batch_size` lines, then one final partial batch if any lines remain.
pub struct Batches<R> {
    reader: LineReader<R>,
    batch_size: usize,
}

impl<R: Read> Iterator for Batches<R> {
    type Item = io::Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut lines = Vec::with_capacity(self.batch_size);
        while lines.len() < self.batch_size {
            match self.reader.next_line() {
                Some(Ok(line)) => lines.push(line),
                Some(Err(e)) => return Some(Err(e)),
                None => break,
            }
        }
        if lines.is_empty() {
            return None;
        }
        Some(Ok(Batch {
            lines,
            end_offset: self.reader.offset(),
        }))
    }
}
