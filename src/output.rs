//! Output sink interface and BGZF-style gzip-framed writing (spec §4.7),
//! plus the 8-column output line format (spec §4.5).

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{HapIbdError, Result};
use crate::types::{Chromosome, OutputSegment};

/// Each worker's per-sink byte buffer is flushed once it grows past this,
/// keeping concurrent writes coarse-grained (spec §5, §9).
pub const BAOS_THRESHOLD: usize = 256 * 1024;

/// Format one output segment as the 8-column tab-separated line (spec §4.5).
pub fn format_line(seg: &OutputSegment, chrom: &Chromosome) -> String {
    debug_assert!(
        seg.sample1 < seg.sample2 || (seg.sample1 == seg.sample2 && seg.copy1 < seg.copy2)
    );
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.3}\n",
        seg.sample1,
        seg.copy1 + 1,
        seg.sample2,
        seg.copy2 + 1,
        chrom,
        seg.start,
        seg.end,
        seg.cm
    )
}

/// An append-only, internally synchronized receiver for raw (already
/// gzip-compressed) byte blocks.
pub trait OutputSink: Send + Sync {
    fn write_block(&self, block: &[u8]) -> Result<()>;
}

/// Writes each flushed block as one self-contained gzip member directly to
/// a file, so the stream can be concatenated block-by-block (BGZF-style
/// "multistream" framing) without holding the whole output in memory.
pub struct FileSink {
    file: Mutex<File>,
}

impl FileSink {
    pub fn create(path: &Path) -> Result<FileSink> {
        let file = File::create(path).map_err(HapIbdError::Io)?;
        Ok(FileSink {
            file: Mutex::new(file),
        })
    }

    /// Append a terminating empty BGZF block, marking the stream complete.
    pub fn finalize(&self) -> Result<()> {
        self.write_block(&compress_block(b"")?)
    }
}

impl OutputSink for FileSink {
    fn write_block(&self, block: &[u8]) -> Result<()> {
        let mut f = self.file.lock().expect("output sink mutex poisoned");
        f.write_all(block).map_err(HapIbdError::Io)
    }
}

/// Compress `data` into one independent gzip member.
pub fn compress_block(data: &[u8]) -> Result<Vec<u8>> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).map_err(HapIbdError::Io)?;
    enc.finish().map_err(HapIbdError::Io)
}

/// A worker's per-sink text buffer, flushed to the shared sink once it
/// crosses [`BAOS_THRESHOLD`].
#[derive(Default)]
pub struct LineBuffer {
    text: String,
}

impl LineBuffer {
    pub fn push(&mut self, line: &str) {
        self.text.push_str(line);
    }

    pub fn should_flush(&self) -> bool {
        self.text.len() >= BAOS_THRESHOLD
    }

    pub fn flush_to(&mut self, sink: &dyn OutputSink) -> Result<()> {
        if self.text.is_empty() {
            return Ok(());
        }
        let block = compress_block(self.text.as_bytes())?;
        sink.write_block(&block)?;
        self.text.clear();
        Ok(())
    }
}
