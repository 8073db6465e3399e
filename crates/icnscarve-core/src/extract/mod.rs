//! Extraction passes over a source buffer.
//!
//! A pass alternates between two steps until it halts:
//!
//! 1. **Scanning** - look for the next marker from the cursor on
//! 2. **Extracting** - decode the chunk after the marker and move the cursor
//!    past it
//!
//! A pass ends normally when no further marker exists (or a configured chunk
//! limit is hit) and abnormally when a chunk header is malformed. Either way
//! the chunks accepted before the halt stay valid; only sink failures are
//! raised as errors.
//!
//! Scanning always resumes after the end of the last accepted chunk, so a
//! marker that happens to occur inside a payload is never revisited.

mod progress;
mod sink;

use crate::error::{ChunkError, Error, Result};
use crate::scanner::{find_next, read_chunk, Chunk, Marker, MARKER_LEN};
use bytes::Bytes;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

pub use progress::{NullProgress, Progress};
pub use sink::{artifact_file_name, ChunkSink, DirectorySink, MemorySink, NullSink};

/// Configuration for an extraction pass
#[derive(Debug, Clone, Default)]
pub struct ExtractorConfig {
    /// Marker announcing each chunk
    pub marker: Marker,
    /// Maximum number of chunks to extract (0 = unlimited)
    pub max_chunks: usize,
}

impl ExtractorConfig {
    /// Creates a new extractor config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the marker to search for
    pub fn marker(mut self, marker: Marker) -> Self {
        self.marker = marker;
        self
    }

    /// Sets the maximum number of chunks to extract
    pub fn max_chunks(mut self, max: usize) -> Self {
        self.max_chunks = max;
        self
    }
}

/// Why a pass stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// No further marker in the buffer
    Exhausted,
    /// The configured chunk limit was reached
    LimitReached,
    /// A malformed chunk header stopped the pass early
    Halted(ChunkError),
}

/// Summary of a finished pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Number of chunks handed to the sink
    pub chunks: usize,
    /// Final cursor position
    pub cursor: usize,
    /// Length of the source buffer
    pub total_bytes: usize,
    /// Why the pass stopped
    pub outcome: PassOutcome,
}

impl ExtractionReport {
    /// Returns true unless the pass halted on malformed data
    pub fn is_complete(&self) -> bool {
        !matches!(self.outcome, PassOutcome::Halted(_))
    }

    /// Turns an early halt into [`Error::Malformed`]
    pub fn ensure_complete(&self) -> Result<()> {
        match self.outcome {
            PassOutcome::Halted(reason) => Err(Error::Malformed(reason)),
            PassOutcome::Exhausted | PassOutcome::LimitReached => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PassState {
    Scanning,
    Halted(PassOutcome),
}

/// Lazy iterator over the chunks of one pass.
///
/// Yields `Ok` for every accepted chunk and at most one `Err`, after which it
/// is fused.
#[derive(Debug)]
pub struct Chunks<'a> {
    buffer: &'a Bytes,
    marker: Marker,
    max_chunks: usize,
    emitted: usize,
    cursor: usize,
    state: PassState,
}

impl<'a> Chunks<'a> {
    fn new(buffer: &'a Bytes, config: &ExtractorConfig) -> Self {
        Self {
            buffer,
            marker: config.marker,
            max_chunks: config.max_chunks,
            emitted: 0,
            cursor: 0,
            state: PassState::Scanning,
        }
    }

    /// Current cursor position
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Why the pass stopped, or `None` while it is still running
    pub fn outcome(&self) -> Option<PassOutcome> {
        match self.state {
            PassState::Scanning => None,
            PassState::Halted(outcome) => Some(outcome),
        }
    }

    fn halt(&mut self, outcome: PassOutcome) {
        self.state = PassState::Halted(outcome);
    }
}

impl Iterator for Chunks<'_> {
    type Item = std::result::Result<Chunk, ChunkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let PassState::Halted(_) = self.state {
            return None;
        }

        if self.max_chunks > 0 && self.emitted >= self.max_chunks {
            self.halt(PassOutcome::LimitReached);
            return None;
        }

        let Some(offset) = find_next(self.buffer, self.cursor, &self.marker) else {
            self.cursor = self.buffer.len();
            self.halt(PassOutcome::Exhausted);
            return None;
        };

        match read_chunk(self.buffer, offset) {
            Ok((chunk, next_offset)) => {
                self.cursor = next_offset;
                self.emitted += 1;
                Some(Ok(chunk))
            }
            Err(e) => {
                self.halt(PassOutcome::Halted(e));
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for Chunks<'_> {}

/// Drives extraction passes
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractorConfig,
}

impl Extractor {
    /// Creates a new extractor with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new extractor with custom configuration
    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Starts a lazy pass over `buffer`
    pub fn chunks<'a>(&self, buffer: &'a Bytes) -> Chunks<'a> {
        Chunks::new(buffer, &self.config)
    }

    /// Runs a full pass, handing every chunk to `sink` with a 0-based index.
    ///
    /// Malformed data ends the pass and is described in the returned report.
    /// A sink failure aborts the pass and is returned as an error; chunks the
    /// sink accepted before that are left in place.
    pub fn run(
        &self,
        buffer: &Bytes,
        mut sink: impl ChunkSink,
        mut progress: impl Progress,
    ) -> Result<ExtractionReport> {
        let total = buffer.len() as u64;
        debug!(
            "Starting pass over {} bytes (marker: {})",
            buffer.len(),
            self.config.marker
        );

        let mut chunks = self.chunks(buffer);
        let mut count = 0;
        let mut reported = 0;

        for item in chunks.by_ref() {
            match item {
                Ok(chunk) => {
                    debug!(
                        "Found chunk {} at {}..{} ({} bytes)",
                        count,
                        chunk.start(),
                        chunk.range().end,
                        chunk.len()
                    );
                    if let Err(e) = sink.accept(count, &chunk) {
                        progress.finish();
                        return Err(e);
                    }
                    count += 1;
                    reported = chunk.range().end as u64;
                    progress.report(reported, total);
                }
                Err(e) => warn!("Halting pass: {}", e),
            }
        }

        let outcome = chunks.outcome().unwrap_or(PassOutcome::Exhausted);
        if outcome == PassOutcome::Exhausted && reported < total {
            progress.report(total, total);
        }
        progress.finish();

        debug!("Pass complete: {} chunk(s), outcome {:?}", count, outcome);
        Ok(ExtractionReport {
            chunks: count,
            cursor: chunks.cursor(),
            total_bytes: buffer.len(),
            outcome,
        })
    }
}

/// Loads a source file fully into memory.
///
/// Fails with [`Error::SourceUnavailable`] when the path is missing, is not a
/// regular file, cannot be read, or is too small to hold a single marker.
pub fn load_source(path: impl AsRef<Path>) -> Result<Bytes> {
    let path = path.as_ref();

    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::source_unavailable(path, "file does not exist"),
        ErrorKind::PermissionDenied => {
            Error::source_unavailable(path, "file cannot be read, check permissions")
        }
        _ => Error::source_unavailable(path, e.to_string()),
    })?;
    if !metadata.is_file() {
        return Err(Error::source_unavailable(path, "not a regular file"));
    }

    let data = fs::read(path)
        .map_err(|e| Error::source_unavailable(path, format!("file cannot be read: {}", e)))?;

    if data.is_empty() {
        return Err(Error::source_unavailable(path, "file is empty"));
    }
    if data.len() <= MARKER_LEN {
        return Err(Error::source_unavailable(
            path,
            "file is too small to contain valid data",
        ));
    }

    debug!("Read {} bytes from {}", data.len(), path.display());
    Ok(Bytes::from(data))
}

/// Extract every chunk of a file into `output_dir`.
///
/// This is a convenience function that validates and loads the source, creates
/// the output directory and runs a single pass with default artifact naming.
pub fn extract_file(
    path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: ExtractorConfig,
    progress: impl Progress,
) -> Result<ExtractionReport> {
    let buffer = load_source(path.as_ref())?;
    let sink = DirectorySink::create(output_dir.as_ref())?;

    info!("Starting extraction of {}", path.as_ref().display());
    let report = Extractor::with_config(config).run(&buffer, sink, progress)?;
    info!("Extraction complete. {} chunk(s) extracted.", report.chunks);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::progress::RecordingProgress;
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn run_memory(buffer: &Bytes) -> (ExtractionReport, Vec<Chunk>) {
        let mut sink = MemorySink::default();
        let report = Extractor::new()
            .run(buffer, &mut sink, NullProgress)
            .unwrap();
        (report, sink.chunks)
    }

    fn two_chunk_buffer() -> Bytes {
        let mut data = Vec::new();
        data.extend_from_slice(b"icns\x00\x00\x00\x08PAY!");
        data.extend_from_slice(b"icns\x00\x00\x00\x06ab");
        Bytes::from(data)
    }

    #[test]
    fn test_two_chunks_exhaust_buffer() {
        let buffer = two_chunk_buffer();
        let (report, chunks) = run_memory(&buffer);

        assert_eq!(report.chunks, 2);
        assert_eq!(report.outcome, PassOutcome::Exhausted);
        assert_eq!(report.cursor, buffer.len());
        assert_eq!(chunks[0].range(), 4..12);
        assert_eq!(chunks[0].as_bytes(), b"\x00\x00\x00\x08PAY!");
        assert_eq!(chunks[1].range(), 16..22);
        assert_eq!(chunks[1].as_bytes(), b"\x00\x00\x00\x06ab");
    }

    #[test]
    fn test_oversized_chunk_halts() {
        let buffer = Bytes::from_static(b"icns\xff\xff\xff\xff");
        let (report, chunks) = run_memory(&buffer);

        assert!(chunks.is_empty());
        assert_eq!(
            report.outcome,
            PassOutcome::Halted(ChunkError::OversizedChunk {
                offset: 4,
                size: u32::MAX,
                available: 4
            })
        );
        assert!(!report.is_complete());
        assert!(matches!(
            report.ensure_complete(),
            Err(Error::Malformed(ChunkError::OversizedChunk { .. }))
        ));
    }

    #[test]
    fn test_no_marker_is_not_an_error() {
        let buffer = Bytes::from_static(b"just some bytes without the magic");
        let (report, chunks) = run_memory(&buffer);

        assert!(chunks.is_empty());
        assert_eq!(report.outcome, PassOutcome::Exhausted);
        assert!(report.ensure_complete().is_ok());
    }

    #[test]
    fn test_truncated_header_keeps_earlier_chunks() {
        let buffer = Bytes::from_static(b"icns\x00\x00\x00\x06abicns\x00\x00");
        let (report, chunks) = run_memory(&buffer);

        assert_eq!(chunks.len(), 1);
        assert_eq!(report.chunks, 1);
        assert_eq!(report.cursor, 10);
        assert_eq!(
            report.outcome,
            PassOutcome::Halted(ChunkError::IncompleteHeader {
                offset: 14,
                remaining: 2
            })
        );
    }

    #[test]
    fn test_undersized_chunk_halts() {
        let buffer = Bytes::from_static(b"icns\x00\x00\x00\x00icns\x00\x00\x00\x04");
        let (report, chunks) = run_memory(&buffer);

        assert!(chunks.is_empty());
        assert_eq!(
            report.outcome,
            PassOutcome::Halted(ChunkError::UndersizedChunk { offset: 4, size: 0 })
        );
    }

    #[test]
    fn test_marker_inside_payload_is_skipped() {
        let buffer = Bytes::from_static(b"icns\x00\x00\x00\x0cicns\x00\x00\x00\x04");
        let (report, chunks) = run_memory(&buffer);

        assert_eq!(report.chunks, 1);
        assert_eq!(chunks[0].range(), 4..16);
        assert_eq!(report.outcome, PassOutcome::Exhausted);
    }

    #[test]
    fn test_leading_garbage_is_skipped() {
        let buffer = Bytes::from_static(b"\x00\x01icn\x02icns\x00\x00\x00\x05Z");
        let (_, chunks) = run_memory(&buffer);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].range(), 10..15);
    }

    #[test]
    fn test_repeated_passes_are_identical() {
        let buffer = two_chunk_buffer();
        let (first_report, first) = run_memory(&buffer);
        let (second_report, second) = run_memory(&buffer);

        assert_eq!(first_report, second_report);
        assert_eq!(first, second);
    }

    #[test]
    fn test_chunks_stay_in_bounds_and_advance() {
        let mut data = b"noise".to_vec();
        for size in [4u32, 9, 5, 32] {
            data.extend_from_slice(b"icns");
            data.extend_from_slice(&size.to_be_bytes());
            data.extend(std::iter::repeat(0xAA).take(size as usize - 4));
            data.extend_from_slice(b"--");
        }
        let buffer = Bytes::from(data);

        let mut last_end = 0;
        let mut count = 0;
        for chunk in Extractor::new().chunks(&buffer) {
            let chunk = chunk.unwrap();
            assert!(chunk.range().end <= buffer.len());
            assert!(chunk.range().end > last_end);
            assert_eq!(chunk.as_bytes(), &buffer[chunk.range()]);
            last_end = chunk.range().end;
            count += 1;
        }
        assert_eq!(count, 4);
    }

    #[test]
    fn test_chunks_iterator_is_fused_after_error() {
        let buffer = Bytes::from_static(b"icns\x00\x00\x00\x06abicns\xff\xff\xff\xff");
        let mut chunks = Extractor::new().chunks(&buffer);

        assert!(chunks.next().unwrap().is_ok());
        assert!(chunks.next().unwrap().is_err());
        assert!(chunks.next().is_none());
        assert!(matches!(chunks.outcome(), Some(PassOutcome::Halted(_))));
    }

    #[test]
    fn test_max_chunks_limit() {
        let buffer = two_chunk_buffer();
        let config = ExtractorConfig::new().max_chunks(1);
        let mut sink = MemorySink::default();
        let report = Extractor::with_config(config)
            .run(&buffer, &mut sink, NullProgress)
            .unwrap();

        assert_eq!(report.chunks, 1);
        assert_eq!(report.cursor, 12);
        assert_eq!(report.outcome, PassOutcome::LimitReached);
        assert!(report.is_complete());
    }

    #[test]
    fn test_custom_marker() {
        let buffer = Bytes::from_static(b"icns\x00\x00\x00\x05xRIFF\x00\x00\x00\x06yy");
        let config = ExtractorConfig::new().marker("RIFF".parse().unwrap());
        let mut sink = MemorySink::default();
        Extractor::with_config(config)
            .run(&buffer, &mut sink, NullProgress)
            .unwrap();

        assert_eq!(sink.chunks.len(), 1);
        assert_eq!(sink.chunks[0].as_bytes(), b"\x00\x00\x00\x06yy");
    }

    #[test]
    fn test_progress_reports_cursor() {
        let buffer = two_chunk_buffer();
        let mut progress = RecordingProgress::default();
        Extractor::new()
            .run(&buffer, NullSink, &mut progress)
            .unwrap();

        assert_eq!(progress.updates, vec![(12, 22), (22, 22)]);
        assert!(progress.finished);
    }

    #[test]
    fn test_progress_reaches_end_past_trailing_bytes() {
        let mut data = two_chunk_buffer().to_vec();
        data.extend_from_slice(b"trailer");
        let buffer = Bytes::from(data);
        let mut progress = RecordingProgress::default();
        Extractor::new()
            .run(&buffer, NullSink, &mut progress)
            .unwrap();

        assert_eq!(progress.updates, vec![(12, 29), (22, 29), (29, 29)]);
    }

    #[test]
    fn test_extract_file_writes_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("layouts.dat");
        fs::write(&source, two_chunk_buffer()).unwrap();
        let out = temp_dir.path().join("icons");

        let report = extract_file(&source, &out, ExtractorConfig::new(), NullProgress).unwrap();
        assert_eq!(report.chunks, 2);

        let first = fs::read(out.join("icon_0000.icns")).unwrap();
        let second = fs::read(out.join("icon_0001.icns")).unwrap();
        assert_eq!(first, b"\x00\x00\x00\x08PAY!");
        assert_eq!(second, b"\x00\x00\x00\x06ab");
        assert!(!out.join("icon_0002.icns").exists());
    }

    #[test]
    fn test_sink_failure_aborts_but_keeps_written() {
        let temp_dir = TempDir::new().unwrap();
        let sink = DirectorySink::create(temp_dir.path()).unwrap();
        fs::write(sink.artifact_path(1), b"taken").unwrap();

        let err = Extractor::new()
            .run(&two_chunk_buffer(), sink, NullProgress)
            .unwrap_err();
        assert!(matches!(err, Error::ArtifactExists { .. }));
        assert!(temp_dir.path().join("icon_0000.icns").exists());
    }

    #[test]
    fn test_load_source_missing() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_source(temp_dir.path().join("nope.dat")).unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_load_source_empty_and_tiny() {
        let temp_dir = TempDir::new().unwrap();
        let empty = temp_dir.path().join("empty.dat");
        let tiny = temp_dir.path().join("tiny.dat");
        fs::write(&empty, b"").unwrap();
        fs::write(&tiny, b"icns").unwrap();

        assert!(load_source(&empty)
            .unwrap_err()
            .to_string()
            .contains("empty"));
        assert!(load_source(&tiny)
            .unwrap_err()
            .to_string()
            .contains("too small"));
    }

    #[test]
    fn test_load_source_directory() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_source(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }

    #[test]
    fn test_source_checked_before_output_created() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("icons");
        let result = extract_file(
            temp_dir.path().join("missing.dat"),
            &out,
            ExtractorConfig::new(),
            NullProgress,
        );

        assert!(result.is_err());
        assert!(!out.exists());
    }
}
