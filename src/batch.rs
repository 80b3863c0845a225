//! Watermark batch processing
//!
//! A batch is one validated request: an ordered list of uploads, the
//! watermark text and the style. [`WatermarkBatch::run`] is fully
//! synchronous and is meant to be called from a blocking worker thread.
//!
//! Files are processed strictly one after another and each output is added
//! to the archive as soon as it is produced, so entry order always matches
//! upload order.

use std::fs::{self, File};
use std::path::Path;

use axum::body::Bytes;
use uuid::Uuid;

use crate::archive::ArchiveBuilder;
use crate::error::{AppError, Result};
use crate::watermark::{PageSelection, WatermarkEngine, WatermarkStyle};
use crate::workspace::RequestWorkspace;

/// One uploaded PDF
#[derive(Debug, Clone)]
pub struct UploadedPdf {
    pub file_name: String,
    pub data: Bytes,
}

/// Result of a finished batch
#[derive(Debug)]
pub struct BatchOutput {
    pub request_id: Uuid,
    pub archive: Vec<u8>,
    pub entries: usize,
}

/// Validated work for one request
#[derive(Debug)]
pub struct WatermarkBatch {
    pub files: Vec<UploadedPdf>,
    pub text: String,
    pub style: WatermarkStyle,
}

impl WatermarkBatch {
    /// Watermark every file and bundle the results.
    ///
    /// All temporary files live in a [`RequestWorkspace`] under `tmp_dir`
    /// and are gone by the time this returns, whatever the outcome.
    pub fn run(self, tmp_dir: &Path, engine: &dyn WatermarkEngine) -> Result<BatchOutput> {
        let mut workspace = RequestWorkspace::create(tmp_dir)?;
        let request_id = workspace.id();
        let span = tracing::info_span!("watermark_batch", request_id = %request_id);
        let _enter = span.enter();

        tracing::info!(files = self.files.len(), "Processing watermark batch");

        let archive_path = workspace.archive_path();
        let mut archive = ArchiveBuilder::create(&archive_path)?;

        for (index, upload) in self.files.iter().enumerate() {
            let input = workspace.write_input(index, &upload.data)?;
            let output = workspace.output_path(index);

            let pages = engine
                .add_text_watermark(
                    &input,
                    &output,
                    &PageSelection::All,
                    &self.text,
                    &self.style,
                )
                .map_err(|source| AppError::Watermark {
                    file: upload.file_name.clone(),
                    source,
                })?;

            let mut stamped = File::open(&output).map_err(|source| AppError::ProcessedFile {
                file: upload.file_name.clone(),
                source,
            })?;
            let bytes = archive.add_entry(&upload.file_name, &mut stamped)?;

            tracing::debug!(
                index,
                file_name = %upload.file_name,
                pages,
                bytes,
                "File watermarked"
            );
        }

        let entries = archive.finish()?;
        let archive = fs::read(&archive_path)?;

        tracing::info!(entries, size = archive.len(), "Archive ready");

        Ok(BatchOutput {
            request_id,
            archive,
            entries,
        })
    }
}
