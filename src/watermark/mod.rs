//! PDF text watermarking
//!
//! - `descriptor`: style descriptor model and parser
//! - `engine`: the engine trait the HTTP layer talks to
//! - `lopdf_engine`: content stream stamping on top of lopdf
//! - `metrics`: Helvetica widths used to place the text

pub mod descriptor;
pub mod engine;
pub mod lopdf_engine;
mod metrics;

pub use descriptor::{
    Anchor, DescriptorError, Rgb, StandardFont, StyleOverrides, WatermarkStyle, DEFAULT_DESCRIPTOR,
};
pub use engine::{PageSelection, WatermarkEngine, WatermarkError};
pub use lopdf_engine::LopdfEngine;
