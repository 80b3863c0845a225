//! Watermark Routes
//!
//! Endpoints:
//! - POST /api/watermark - Watermark uploaded PDFs, respond with a ZIP archive
//! - OPTIONS /api/watermark - CORS preflight
//!
//! Form fields:
//! - `pdfs` (repeated file part, each name ending in `.pdf`)
//! - `email` (watermark text)
//! - `reference` (archive file name)
//! - optional style overrides: `fontSize`, `opacity`, `position`, `rotation`, `onTop`

use std::collections::HashSet;
use std::str::FromStr;

use axum::{
    body::Body,
    extract::{multipart::MultipartError, multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::Response,
    routing::post,
    Router,
};

use crate::batch::{UploadedPdf, WatermarkBatch};
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::watermark::descriptor::{parse_flag, parse_opacity, parse_points, parse_rotation};
use crate::watermark::{Anchor, DescriptorError, StyleOverrides, WatermarkStyle, DEFAULT_DESCRIPTOR};

const INVALID_FORM: &str = "Invalid form data";

// ============================================================================
// Router
// ============================================================================

/// Create the watermark router
pub fn router(max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/watermark", post(watermark_pdfs).options(preflight))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/watermark
async fn watermark_pdfs(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Response> {
    let multipart = multipart.map_err(|e| {
        tracing::warn!("Rejected multipart body: {}", e);
        AppError::bad_request(INVALID_FORM)
    })?;

    let form = WatermarkForm::read(multipart).await?;
    let (batch, reference) = form.into_batch()?;

    let tmp_dir = state.config().upload.tmp_dir.clone();
    let engine = state.engine();

    // File I/O and PDF rewriting block, keep them off the async workers
    let output = tokio::task::spawn_blocking(move || batch.run(&tmp_dir, engine.as_ref()))
        .await
        .map_err(|e| AppError::Internal(format!("watermark task failed: {}", e)))??;

    tracing::info!(
        request_id = %output.request_id,
        reference = %reference,
        entries = output.entries,
        size = output.archive.len(),
        "Watermark request complete"
    );

    zip_response(&reference, output.archive)
}

/// OPTIONS /api/watermark
async fn preflight() -> StatusCode {
    StatusCode::OK
}

// ============================================================================
// Form
// ============================================================================

/// Raw multipart fields, before validation
#[derive(Debug, Default)]
struct WatermarkForm {
    files: Vec<UploadedPdf>,
    email: Option<String>,
    reference: Option<String>,
    font_size: Option<String>,
    opacity: Option<String>,
    position: Option<String>,
    rotation: Option<String>,
    on_top: Option<String>,
}

impl WatermarkForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = WatermarkForm::default();

        while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
            let name = field.name().unwrap_or("").to_string();

            if name == "pdfs" {
                let file_name = base_name(field.file_name().unwrap_or("")).to_string();
                let data = field.bytes().await.map_err(invalid_form)?;
                tracing::debug!("Received file '{}' ({} bytes)", file_name, data.len());
                form.files.push(UploadedPdf { file_name, data });
                continue;
            }

            match form.text_slot(&name) {
                Some(slot) => {
                    let value = field.text().await.map_err(invalid_form)?;
                    // first occurrence wins
                    if slot.is_none() {
                        *slot = Some(value);
                    }
                }
                None => tracing::debug!("Ignoring form field '{}'", name),
            }
        }

        Ok(form)
    }

    fn text_slot(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            "email" => Some(&mut self.email),
            "reference" => Some(&mut self.reference),
            "fontSize" => Some(&mut self.font_size),
            "opacity" => Some(&mut self.opacity),
            "position" => Some(&mut self.position),
            "rotation" => Some(&mut self.rotation),
            "onTop" => Some(&mut self.on_top),
            _ => None,
        }
    }

    /// Validate everything up front so a rejected request never touches disk.
    /// Returns the batch and the archive reference.
    fn into_batch(self) -> Result<(WatermarkBatch, String)> {
        if self.files.is_empty() {
            return Err(AppError::bad_request("At least one PDF file is required"));
        }

        let email = self.email.clone().unwrap_or_default();
        if email.trim().is_empty() {
            return Err(AppError::bad_request("Email parameter is required"));
        }

        let reference = self.reference.clone().unwrap_or_default();
        if reference.trim().is_empty() {
            return Err(AppError::bad_request("Reference parameter is required"));
        }

        {
            let mut seen = HashSet::new();
            for upload in &self.files {
                if !is_pdf_name(&upload.file_name) {
                    return Err(AppError::bad_request(format!(
                        "File '{}' must be a PDF",
                        upload.file_name
                    )));
                }
                if !seen.insert(upload.file_name.as_str()) {
                    return Err(AppError::bad_request(format!(
                        "File '{}' was uploaded more than once",
                        upload.file_name
                    )));
                }
            }
        }

        let overrides = self.overrides()?;
        let style = WatermarkStyle::parse(DEFAULT_DESCRIPTOR)
            .map_err(|e| AppError::Internal(format!("default watermark descriptor: {}", e)))?
            .with_overrides(&overrides);

        if !overrides.is_empty() {
            tracing::debug!("Using watermark style '{}'", style);
        }

        Ok((
            WatermarkBatch {
                files: self.files,
                text: email,
                style,
            },
            reference,
        ))
    }

    fn overrides(&self) -> Result<StyleOverrides> {
        Ok(StyleOverrides {
            points: override_field(&self.font_size, "fontSize", parse_points)?,
            opacity: override_field(&self.opacity, "opacity", parse_opacity)?,
            position: override_field(&self.position, "position", Anchor::from_str)?,
            rotation: override_field(&self.rotation, "rotation", parse_rotation)?,
            on_top: override_field(&self.on_top, "onTop", |v| parse_flag("onTop", v))?,
        })
    }
}

/// Parse an optional style field; blank counts as absent
fn override_field<T>(
    raw: &Option<String>,
    name: &str,
    parse: impl Fn(&str) -> std::result::Result<T, DescriptorError>,
) -> Result<Option<T>> {
    match raw.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => parse(value)
            .map(Some)
            .map_err(|e| AppError::bad_request(format!("Invalid {}: {}", name, e))),
    }
}

fn invalid_form(e: MultipartError) -> AppError {
    tracing::warn!("Error parsing multipart form: {}", e);
    AppError::bad_request(INVALID_FORM)
}

// ============================================================================
// Helpers
// ============================================================================

/// Last path component of a client-supplied file name, so archive entries
/// never carry directories
fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name)
}

fn is_pdf_name(file_name: &str) -> bool {
    file_name.to_lowercase().ends_with(".pdf")
}

/// Reference reduced to characters that are safe in a file name and a
/// quoted header parameter
fn archive_stem(reference: &str) -> String {
    reference
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn zip_response(reference: &str, archive: Vec<u8>) -> Result<Response> {
    let length = archive.len();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_LENGTH, length)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}.zip\"", archive_stem(reference)),
        )
        .body(Body::from(archive))
        .map_err(|e| AppError::Internal(e.to_string()))
}
