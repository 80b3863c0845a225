//! Shared helpers for the HTTP tests

#![allow(dead_code)]

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum_test::multipart::Part;
use axum_test::TestServer;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tempfile::TempDir;
use zip::ZipArchive;

use pdf_stamp_server::watermark::WatermarkEngine;
use pdf_stamp_server::{app, AppState, Config};

/// Application wired to a private temp directory
pub struct TestApp {
    pub server: TestServer,
    pub router: Router,
    pub tmp_dir: PathBuf,
    _temp_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(|config| AppState::new(config))
    }

    pub fn with_engine(engine: Arc<dyn WatermarkEngine>) -> Self {
        Self::build(move |config| AppState::with_engine(config, engine))
    }

    pub fn with_max_body_bytes(max_body_bytes: usize) -> Self {
        Self::build(move |mut config| {
            config.upload.max_body_bytes = max_body_bytes;
            AppState::new(config)
        })
    }

    fn build(state: impl FnOnce(Config) -> AppState) -> Self {
        let temp_dir = TempDir::new().unwrap();
        // not created up front: the first request has to create it
        let tmp_dir = temp_dir.path().join("tmp");
        let config = Config::default().with_tmp_dir(&tmp_dir);

        let router = app(state(config));
        let server = TestServer::new(router.clone()).unwrap();

        Self {
            server,
            router,
            tmp_dir,
            _temp_dir: temp_dir,
        }
    }

    /// Files still present in the temp directory
    pub fn leftover_files(&self) -> Vec<String> {
        leftover_files(&self.tmp_dir)
    }
}

pub fn leftover_files(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// A small, valid PDF with `page_count` A4 pages of text
pub fn sample_pdf(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let kids: Vec<Object> = (0..page_count)
        .map(|i| {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), Object::Integer(24)]),
                    Operation::new("Td", vec![Object::Integer(72), Object::Integer(700)]),
                    Operation::new("Tj", vec![Object::string_literal(format!("Page {}", i + 1))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            }))
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

pub fn pdf_part(file_name: &str, data: Vec<u8>) -> Part {
    Part::bytes(data)
        .file_name(file_name)
        .mime_type("application/pdf")
}

/// Entry names and contents of a ZIP archive, in archive order
pub fn unzip(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            (entry.name().to_string(), data)
        })
        .collect()
}

/// Concatenated content streams of every page
pub fn page_texts(pdf: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|page_id| String::from_utf8_lossy(&doc.get_page_content(*page_id).unwrap()).into_owned())
        .collect()
}
