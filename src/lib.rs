//! PDF Stamp Server Library
//!
//! Watermarks uploaded PDFs with the caller's email and returns them bundled
//! in a ZIP archive. The server binary is in main.rs.
//!
//! # Modules
//!
//! - `routes`: HTTP surface (`/api/watermark`, `/health`)
//! - `batch`: per-request pipeline (temp files, engine calls, archive)
//! - `watermark`: style descriptor and the lopdf stamping engine
//! - `workspace`: temporary artifact naming and cleanup
//! - `archive`: ZIP assembly

pub mod archive;
pub mod batch;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod watermark;
pub mod workspace;

pub use config::Config;
pub use routes::app;
pub use state::AppState;
