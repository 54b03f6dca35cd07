//! Write-once persistence of composite outputs
//!
//! Composites are stored under unique, time-ordered names
//! (`processed_{timestamp}_{seq}.{ext}`) and never overwritten. The sequence
//! counter keeps names collision-free when several requests land in the same
//! timestamp second.

use crate::config::OutputFormat;
use crate::error::{BgSwapError, Result};
use crate::types::CompositeOutput;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of one persisted composite, unique within its store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// The artifact's file name within the store
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable storage for composite outputs
#[derive(Debug)]
pub struct ArtifactStore {
    output_dir: PathBuf,
    sequence: AtomicU64,
}

impl ArtifactStore {
    /// Open a store rooted at `output_dir`, creating it if needed
    ///
    /// # Errors
    /// - Directory creation failure
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)
            .map_err(|e| BgSwapError::file_io_error("create output directory", &output_dir, &e))?;
        Ok(Self {
            output_dir,
            sequence: AtomicU64::new(0),
        })
    }

    /// Persist a composite under a fresh time-ordered identifier
    ///
    /// Artifacts are write-once: an existing file under the generated name is
    /// never overwritten.
    ///
    /// # Errors
    /// - Encoding failures
    /// - The generated name already exists on disk
    /// - File write failures
    pub fn persist(
        &self,
        output: &CompositeOutput,
        format: OutputFormat,
        jpeg_quality: u8,
    ) -> Result<ArtifactId> {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "processed_{}_{:04}.{}",
            timestamp,
            sequence,
            format.extension()
        );
        let path = self.output_dir.join(&name);

        if path.exists() {
            return Err(BgSwapError::file_io_error(
                "persist artifact",
                &path,
                &std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "artifact names are write-once",
                ),
            ));
        }

        let bytes = output.to_bytes(format, jpeg_quality)?;
        std::fs::write(&path, bytes)
            .map_err(|e| BgSwapError::file_io_error("write artifact", &path, &e))?;

        log::info!("Persisted composite as {}", name);
        Ok(ArtifactId(name))
    }

    /// Absolute path of an artifact within this store
    #[must_use]
    pub fn path_for(&self, id: &ArtifactId) -> PathBuf {
        self.output_dir.join(id.as_str())
    }

    /// The store's root directory
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
