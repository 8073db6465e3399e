//! Destinations for extracted chunks.
//!
//! The driving loop hands every accepted chunk to a [`ChunkSink`] together
//! with its sequential index. An error returned by a sink aborts the whole
//! operation.

use crate::error::{Error, Result};
use crate::scanner::Chunk;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Trait for consuming extracted chunks.
pub trait ChunkSink {
    /// Accept the chunk with the given 0-based index
    fn accept(&mut self, index: usize, chunk: &Chunk) -> Result<()>;
}

impl<S: ChunkSink + ?Sized> ChunkSink for &mut S {
    fn accept(&mut self, index: usize, chunk: &Chunk) -> Result<()> {
        (**self).accept(index, chunk)
    }
}

/// A no-op sink that discards all chunks
#[derive(Debug, Default)]
pub struct NullSink;

impl ChunkSink for NullSink {
    fn accept(&mut self, _index: usize, _chunk: &Chunk) -> Result<()> {
        Ok(())
    }
}

/// A sink that keeps every chunk in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Chunks in extraction order
    pub chunks: Vec<Chunk>,
}

impl ChunkSink for MemorySink {
    fn accept(&mut self, _index: usize, chunk: &Chunk) -> Result<()> {
        self.chunks.push(chunk.clone());
        Ok(())
    }
}

/// File name for the artifact with the given index, e.g. `icon_0003.icns`
pub fn artifact_file_name(prefix: &str, index: usize, extension: &str) -> String {
    format!("{}_{:04}.{}", prefix, index, extension)
}

/// A sink writing each chunk to `<dir>/<prefix>_<index:04>.<extension>`
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    prefix: String,
    extension: String,
    overwrite: bool,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    /// Creates a sink for `dir`, creating the directory if absent
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            info!("Creating output directory: {}", dir.display());
            fs::create_dir_all(&dir).map_err(|e| Error::directory_create(&dir, e))?;
        }

        Ok(Self {
            dir,
            prefix: "icon".to_string(),
            extension: "icns".to_string(),
            overwrite: false,
            written: Vec::new(),
        })
    }

    /// Sets the file name prefix (default: `icon`)
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the file extension, without the dot (default: `icns`)
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Sets whether existing artifacts may be replaced
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths written so far, in index order
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Path of the artifact for `index`
    pub fn artifact_path(&self, index: usize) -> PathBuf {
        self.dir
            .join(artifact_file_name(&self.prefix, index, &self.extension))
    }

    /// Deletes artifacts left behind by an earlier, longer run.
    ///
    /// Artifacts are numbered without gaps, so removal starts at `from_index`
    /// and stops at the first index with no file. Returns how many were removed.
    pub fn remove_stale(&self, from_index: usize) -> Result<usize> {
        let mut removed = 0;
        loop {
            let path = self.artifact_path(from_index + removed);
            if !path.is_file() {
                break;
            }
            fs::remove_file(&path).map_err(|e| Error::file_write(&path, e))?;
            debug!("Removed stale artifact {}", path.display());
            removed += 1;
        }

        if removed > 0 {
            info!(
                "Removed {} stale artifact(s) from {}",
                removed,
                self.dir.display()
            );
        }
        Ok(removed)
    }
}

impl ChunkSink for DirectorySink {
    fn accept(&mut self, index: usize, chunk: &Chunk) -> Result<()> {
        let path = self.artifact_path(index);

        if !self.overwrite && path.exists() {
            return Err(Error::artifact_exists(path));
        }

        let mut file = fs::File::create(&path).map_err(|e| Error::file_write(&path, e))?;
        file.write_all(chunk.as_bytes())
            .map_err(|e| Error::file_write(&path, e))?;

        debug!(
            "Extracted chunk {} ({} bytes) to {}",
            index + 1,
            chunk.len(),
            path.display()
        );
        self.written.push(path);
        Ok(())
    }
}
