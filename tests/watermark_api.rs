//! HTTP tests for the watermark endpoint

mod common;

use std::future::IntoFuture;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum_test::multipart::MultipartForm;
use serde_json::Value;
use tower::ServiceExt;

use pdf_stamp_server::watermark::{PageSelection, WatermarkEngine, WatermarkError, WatermarkStyle};

use common::{page_texts, pdf_part, sample_pdf, unzip, TestApp};

fn valid_form(files: &[(&str, Vec<u8>)]) -> MultipartForm {
    let mut form = MultipartForm::new()
        .add_text("email", "user@example.com")
        .add_text("reference", "order123");
    for (name, data) in files {
        form = form.add_part("pdfs", pdf_part(name, data.clone()));
    }
    form
}

fn error_message(body: &Value) -> &str {
    body["error"].as_str().unwrap()
}

#[tokio::test]
async fn test_watermarks_each_file_into_archive() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/watermark")
        .multipart(valid_form(&[("a.pdf", sample_pdf(2)), ("b.pdf", sample_pdf(1))]))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"order123.zip\""
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let entries = unzip(response.as_bytes());
    let names: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["a.pdf", "b.pdf"]);

    let a_pages = page_texts(&entries[0].1);
    assert_eq!(a_pages.len(), 2);
    for page in a_pages.iter().chain(page_texts(&entries[1].1).iter()) {
        assert!(page.contains("(user@example.com) Tj"));
    }

    assert!(app.leftover_files().is_empty(), "{:?}", app.leftover_files());
}

#[tokio::test]
async fn test_archive_order_follows_upload_order() {
    let app = TestApp::new();
    let files: Vec<(&str, Vec<u8>)> = ["zeta.pdf", "alpha.pdf", "Mid.PDF"]
        .into_iter()
        .map(|name| (name, sample_pdf(1)))
        .collect();

    let response = app
        .server
        .post("/api/watermark")
        .multipart(valid_form(&files))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let names: Vec<String> = unzip(response.as_bytes())
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["zeta.pdf", "alpha.pdf", "Mid.PDF"]);
}

#[tokio::test]
async fn test_missing_files_is_bad_request() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/watermark")
        .multipart(valid_form(&[]))
        .expect_failure()
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(error_message(&body), "At least one PDF file is required");
    assert!(app.leftover_files().is_empty());
}

#[tokio::test]
async fn test_empty_email_is_bad_request() {
    let app = TestApp::new();
    let form = MultipartForm::new()
        .add_text("email", "")
        .add_text("reference", "order123")
        .add_part("pdfs", pdf_part("a.pdf", sample_pdf(1)));

    let response = app
        .server
        .post("/api/watermark")
        .multipart(form)
        .expect_failure()
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(error_message(&body), "Email parameter is required");
}

#[tokio::test]
async fn test_missing_reference_is_bad_request() {
    let app = TestApp::new();
    let form = MultipartForm::new()
        .add_text("email", "user@example.com")
        .add_part("pdfs", pdf_part("a.pdf", sample_pdf(1)));

    let response = app
        .server
        .post("/api/watermark")
        .multipart(form)
        .expect_failure()
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(error_message(&body), "Reference parameter is required");
    assert!(app.leftover_files().is_empty());
}

#[tokio::test]
async fn test_non_pdf_name_rejects_whole_request() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/watermark")
        .multipart(valid_form(&[("a.pdf", sample_pdf(1)), ("b.txt", b"hello".to_vec())]))
        .expect_failure()
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let body: Value = response.json();
    assert_eq!(error_message(&body), "File 'b.txt' must be a PDF");
    // nothing was staged for a.pdf
    assert!(app.leftover_files().is_empty());
}

#[tokio::test]
async fn test_directories_are_stripped_from_entry_names() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/watermark")
        .multipart(valid_form(&[
            ("../../etc/a.pdf", sample_pdf(1)),
            ("scans/2024/b.pdf", sample_pdf(1)),
        ]))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let names: Vec<String> = unzip(response.as_bytes())
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["a.pdf", "b.pdf"]);
}

#[tokio::test]
async fn test_same_base_name_in_two_directories_is_duplicate() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/watermark")
        .multipart(valid_form(&[("x/a.pdf", sample_pdf(1)), ("y/a.pdf", sample_pdf(1))]))
        .expect_failure()
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(error_message(&body), "File 'a.pdf' was uploaded more than once");
    assert!(app.leftover_files().is_empty());
}

#[tokio::test]
async fn test_body_over_limit_is_bad_request() {
    let app = TestApp::with_max_body_bytes(2048);

    let response = app
        .server
        .post("/api/watermark")
        .multipart(valid_form(&[("a.pdf", vec![b'x'; 10_000])]))
        .expect_failure()
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(error_message(&body), "Invalid form data");
    assert!(app.leftover_files().is_empty());
}

#[tokio::test]
async fn test_bad_style_override_is_bad_request() {
    let app = TestApp::new();
    let form = valid_form(&[("a.pdf", sample_pdf(1))]).add_text("opacity", "7");

    let response = app
        .server
        .post("/api/watermark")
        .multipart(form)
        .expect_failure()
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(error_message(&body).starts_with("Invalid opacity"));
}

#[tokio::test]
async fn test_style_override_reaches_output() {
    let app = TestApp::new();
    let form = valid_form(&[("a.pdf", sample_pdf(1))]).add_text("fontSize", "30");

    let response = app.server.post("/api/watermark").multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let entries = unzip(response.as_bytes());
    let content = lopdf::content::Content::decode(page_texts(&entries[0].1)[0].as_bytes()).unwrap();
    let sizes: Vec<f32> = content
        .operations
        .iter()
        .filter(|op| op.operator == "Tf")
        .map(|op| op.operands[1].as_float().unwrap())
        .collect();
    // the page's own text plus the stamp
    assert_eq!(sizes, vec![24.0, 30.0]);
}

#[tokio::test]
async fn test_corrupt_pdf_is_internal_error_and_cleans_up() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/watermark")
        .multipart(valid_form(&[
            ("a.pdf", sample_pdf(1)),
            ("broken.pdf", b"%PDF-1.5 but nothing else".to_vec()),
        ]))
        .expect_failure()
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(error_message(&body), "Error adding watermark to 'broken.pdf'");
    assert!(app.leftover_files().is_empty(), "{:?}", app.leftover_files());
}

struct FailingEngine;

impl WatermarkEngine for FailingEngine {
    fn add_text_watermark(
        &self,
        _input: &Path,
        output: &Path,
        _pages: &PageSelection,
        _text: &str,
        _style: &WatermarkStyle,
    ) -> Result<usize, WatermarkError> {
        std::fs::write(output, b"half written").unwrap();
        Err(WatermarkError::Processing("engine exploded".to_string()))
    }
}

#[tokio::test]
async fn test_engine_failure_hides_detail() {
    let app = TestApp::with_engine(Arc::new(FailingEngine));

    let response = app
        .server
        .post("/api/watermark")
        .multipart(valid_form(&[("a.pdf", sample_pdf(1))]))
        .expect_failure()
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = response.text();
    assert!(!text.contains("engine exploded"));
    assert!(text.contains("a.pdf"));
    assert!(app.leftover_files().is_empty());
}

#[tokio::test]
async fn test_non_multipart_body_is_bad_request() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/watermark")
        .text("email=user@example.com")
        .expect_failure()
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(error_message(&body), "Invalid form data");
}

#[tokio::test]
async fn test_concurrent_identical_references_do_not_collide() {
    let app = TestApp::new();

    let first = app
        .server
        .post("/api/watermark")
        .multipart(valid_form(&[("a.pdf", sample_pdf(1))]));
    let second = app
        .server
        .post("/api/watermark")
        .multipart(valid_form(&[("b.pdf", sample_pdf(2))]));

    let (first, second) = tokio::join!(first.into_future(), second.into_future());

    assert_eq!(first.status_code(), StatusCode::OK);
    assert_eq!(second.status_code(), StatusCode::OK);
    assert_eq!(unzip(first.as_bytes())[0].0, "a.pdf");
    assert_eq!(unzip(second.as_bytes())[0].0, "b.pdf");
    assert!(app.leftover_files().is_empty());
}

#[tokio::test]
async fn test_options_is_ok_with_cors_headers() {
    let app = TestApp::new();

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/watermark")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_preflight_advertises_methods() {
    let app = TestApp::new();

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/watermark")
        .header(header::ORIGIN, "https://shop.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let methods = response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("POST"));
    assert!(methods.contains("OPTIONS"));
}

#[tokio::test]
async fn test_other_methods_are_not_allowed() {
    let app = TestApp::new();

    for method in [Method::GET, Method::PUT, Method::DELETE] {
        let request = Request::builder()
            .method(method.clone())
            .uri("/api/watermark")
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();

        assert_eq!(
            response.status(),
            StatusCode::METHOD_NOT_ALLOWED,
            "method {}",
            method
        );
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();

    let response = app.server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "pdf-stamp-server");
}
