//! Configuration management for PDF Stamp Server

use std::env;
use std::path::PathBuf;

/// Default listen port
pub const DEFAULT_PORT: u16 = 1234;

/// Default working directory for per-request temporary files
pub const DEFAULT_TMP_DIR: &str = "tmp";

/// Maximum combined upload size: 500MB
pub const DEFAULT_MAX_BODY_BYTES: usize = 500 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory holding input, output and archive files while a request runs
    pub tmp_dir: PathBuf,
    /// Ceiling on the whole multipart body
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: DEFAULT_PORT,
            },
            upload: UploadConfig {
                tmp_dir: PathBuf::from(DEFAULT_TMP_DIR),
                max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            },
        }
    }
}

impl Config {
    /// Build the configuration from the environment.
    ///
    /// Every variable is optional; values that fail to parse fall back to the
    /// compiled-in default.
    pub fn from_env() -> Self {
        Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", DEFAULT_PORT),
            },
            upload: UploadConfig {
                tmp_dir: env::var("WATERMARK_TMP_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_TMP_DIR)),
                max_body_bytes: parse_var("MAX_UPLOAD_BYTES", DEFAULT_MAX_BODY_BYTES),
            },
        }
    }

    /// Use a different temp directory (tests point this at a `TempDir`)
    pub fn with_tmp_dir(mut self, tmp_dir: impl Into<PathBuf>) -> Self {
        self.upload.tmp_dir = tmp_dir.into();
        self
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}
