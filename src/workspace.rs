//! Per-request temporary files
//!
//! Every artifact a request stages on disk is named after the request
//! (`<utc timestamp>_<uuid>_...`) and registered here before it is created.
//! Registered paths are removed by [`RequestWorkspace::cleanup`], which also
//! runs on drop, so every exit path of a request cleans up exactly once.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

/// Temporary artifacts owned by one request
#[derive(Debug)]
pub struct RequestWorkspace {
    id: Uuid,
    prefix: String,
    dir: PathBuf,
    registered: Vec<PathBuf>,
}

impl RequestWorkspace {
    /// Allocate a workspace in `tmp_dir`, creating the directory if needed
    pub fn create(tmp_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(tmp_dir)?;

        let id = Uuid::new_v4();
        let prefix = format!("{}_{}", Utc::now().format("%Y%m%dT%H%M%S"), id.simple());

        Ok(Self {
            id,
            prefix,
            dir: tmp_dir.to_path_buf(),
            registered: Vec::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Path for the `index`-th uploaded file
    pub fn input_path(&mut self, index: usize) -> PathBuf {
        self.register(format!("{}_input_{}.pdf", self.prefix, index))
    }

    /// Path the engine writes the `index`-th watermarked file to
    pub fn output_path(&mut self, index: usize) -> PathBuf {
        self.register(format!("{}_output_{}.pdf", self.prefix, index))
    }

    pub fn archive_path(&mut self) -> PathBuf {
        self.register(format!("{}.zip", self.prefix))
    }

    /// Persist an upload and return where it was written
    pub fn write_input(&mut self, index: usize, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.input_path(index);
        fs::write(&path, data)?;
        Ok(path)
    }

    /// Remove every registered artifact. Missing files are fine; other
    /// failures are logged and otherwise ignored. Returns how many files
    /// were actually removed.
    pub fn cleanup(&mut self) -> usize {
        let mut removed = 0;
        for path in self.registered.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Failed to remove temp file");
                }
            }
        }

        if removed > 0 {
            tracing::debug!(request_id = %self.id, removed, "Cleaned up temp files");
        }
        removed
    }

    fn register(&mut self, file_name: String) -> PathBuf {
        let path = self.dir.join(file_name);
        if !self.registered.contains(&path) {
            self.registered.push(path.clone());
        }
        path
    }
}

impl Drop for RequestWorkspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}
