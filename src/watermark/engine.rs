//! Watermark engine abstraction
//!
//! The request handler only depends on [`WatermarkEngine`]; the lopdf backed
//! implementation lives in `lopdf_engine`.

use std::collections::BTreeSet;
use std::path::Path;

use thiserror::Error;

use super::descriptor::WatermarkStyle;

/// Engine errors. Unreadable input is kept apart from processing failures
/// so callers can tell a corrupt upload from a bug.
#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("unreadable input PDF: {0}")]
    UnreadableInput(String),

    #[error("no pages matched the selection")]
    NoPagesSelected,

    #[error("watermark processing failed: {0}")]
    Processing(String),

    #[error("failed to write output PDF: {0}")]
    Output(String),
}

/// Pages to stamp
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelection {
    #[default]
    All,
    /// 1-based page numbers; numbers past the end are ignored
    Only(BTreeSet<u32>),
}

impl PageSelection {
    pub fn includes(&self, page_number: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Only(pages) => pages.contains(&page_number),
        }
    }
}

impl FromIterator<u32> for PageSelection {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        PageSelection::Only(iter.into_iter().collect())
    }
}

/// Capability to stamp text onto the pages of a PDF file
pub trait WatermarkEngine: Send + Sync {
    /// Read `input`, stamp `text` on the selected pages using `style` and
    /// write the result to `output`. Returns the number of pages stamped.
    fn add_text_watermark(
        &self,
        input: &Path,
        output: &Path,
        pages: &PageSelection,
        text: &str,
        style: &WatermarkStyle,
    ) -> Result<usize, WatermarkError>;
}
