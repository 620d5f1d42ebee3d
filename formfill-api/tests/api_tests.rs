//! Integration tests for formfill-api
//!
//! Drives the router end to end with multipart uploads built by hand.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use formfill::lopdf::{Document, Object};
use formfill::{sample, FormFiller, FormTemplate};
use formfill_api::{app, app_with, ErrorResponse};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Write;
use tower::util::ServiceExt;

const BOUNDARY: &str = "----WebKitFormBoundary7MA4YWxkTrZu0gW";

fn complete_record() -> serde_json::Value {
    json!({
        "CustomerName": "Acme",
        "ServiceAddress": "1 Rd",
        "City": "X",
        "State": "Y",
        "ZipCode": "00000",
        "PhoneNumber": "555",
        "Email": "a@b.c",
        "AgreementCheckbox1": true
    })
}

/// Helper function to create a multipart request with an optional PDF file
/// and optional JSON data
fn multipart_request(uri: &str, pdf: Option<&[u8]>, data: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();

    if let Some(pdf) = pdf {
        write!(body, "--{}\r\n", BOUNDARY).unwrap();
        write!(
            body,
            "Content-Disposition: form-data; name=\"file\"; filename=\"form.pdf\"\r\n"
        )
        .unwrap();
        write!(body, "Content-Type: application/pdf\r\n\r\n").unwrap();
        body.extend_from_slice(pdf);
        write!(body, "\r\n").unwrap();
    }

    if let Some(data) = data {
        write!(body, "--{}\r\n", BOUNDARY).unwrap();
        write!(body, "Content-Disposition: form-data; name=\"data\"\r\n\r\n").unwrap();
        write!(body, "{}\r\n", data).unwrap();
    }

    write!(body, "--{}--\r\n", BOUNDARY).unwrap();

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, header::HeaderMap, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body.to_vec())
}

async fn send_error(app: Router, request: Request<Body>) -> (StatusCode, ErrorResponse) {
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[tokio::test]
async fn test_fill_endpoint_success() {
    let pdf = sample::quote_agreement_pdf().unwrap();
    let data = complete_record().to_string();

    let (status, headers, body) = send(
        app(),
        multipart_request("/api/fill", Some(&pdf), Some(&data)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"filled_constellation_form.pdf\""
    );
    assert!(body.starts_with(b"%PDF-"));

    // flattened: the value is page content, the form is gone
    let doc = Document::load_mem(&body).unwrap();
    let painted = doc.objects.values().any(|object| match object {
        Object::Stream(stream) => contains(
            &stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone()),
            b"(Acme)",
        ),
        _ => false,
    });
    assert!(painted);
    assert!(formfill::form_fields(&doc).unwrap().is_empty());
}

#[tokio::test]
async fn test_fill_endpoint_reports_written_count() {
    let pdf = sample::quote_agreement_pdf().unwrap();
    let data = complete_record().to_string();

    let (status, headers, _) = send(
        app(),
        multipart_request("/api/fill", Some(&pdf), Some(&data)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let written: usize = headers["x-fields-written"].to_str().unwrap().parse().unwrap();
    assert_eq!(written, FormTemplate::quote_agreement().rules.len());
}

#[tokio::test]
async fn test_fill_endpoint_invalid_json() {
    let pdf = sample::quote_agreement_pdf().unwrap();

    let (status, error) = send_error(
        app(),
        multipart_request("/api/fill", Some(&pdf), Some("{\"CustomerName\": ")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error.error.starts_with("Invalid JSON format"));
    assert_eq!(error.missing_fields, None);
}

#[tokio::test]
async fn test_fill_endpoint_non_object_json() {
    let pdf = sample::quote_agreement_pdf().unwrap();

    let (status, _) = send_error(
        app(),
        multipart_request("/api/fill", Some(&pdf), Some("[1, 2, 3]")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_fill_endpoint_missing_fields() {
    let pdf = sample::quote_agreement_pdf().unwrap();
    let mut record = complete_record();
    record.as_object_mut().unwrap().remove("Email");
    record["ZipCode"] = json!("");

    let (status, error) = send_error(
        app(),
        multipart_request("/api/fill", Some(&pdf), Some(&record.to_string())),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error.missing_fields,
        Some(vec!["ZipCode".to_string(), "Email".to_string()])
    );
    assert_eq!(
        error.error,
        "Missing or empty required fields: ZipCode, Email"
    );
}

#[tokio::test]
async fn test_fill_endpoint_no_file() {
    let data = complete_record().to_string();

    let (status, error) =
        send_error(app(), multipart_request("/api/fill", None, Some(&data))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error.error, "No file provided in upload");
}

#[tokio::test]
async fn test_fill_endpoint_no_data() {
    let pdf = sample::quote_agreement_pdf().unwrap();

    let (status, error) =
        send_error(app(), multipart_request("/api/fill", Some(&pdf), None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error.error, "No form data provided in upload");
}

#[tokio::test]
async fn test_fill_endpoint_unreadable_pdf() {
    let data = complete_record().to_string();

    let (status, error) = send_error(
        app(),
        multipart_request("/api/fill", Some(b"definitely not a pdf"), Some(&data)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error.error.starts_with("PDF form filling failed while"));
}

#[tokio::test]
async fn test_fill_endpoint_custom_template() {
    let template = FormTemplate::new("notes")
        .require("Note")
        .output_file_name("notes.pdf")
        .input("office.notes", "Note");
    let app = app_with(FormFiller::new(template), 1024 * 1024);
    let pdf = sample::quote_agreement_pdf().unwrap();

    let (status, headers, _) = send(
        app,
        multipart_request("/api/fill", Some(&pdf), Some(r#"{"Note": "call back"}"#)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"notes.pdf\""
    );
}

#[tokio::test]
async fn test_fill_endpoint_rejects_oversized_upload() {
    let app = app_with(FormFiller::default(), 512);
    let pdf = sample::quote_agreement_pdf().unwrap();
    let data = complete_record().to_string();

    let (status, _, _) = send(
        app,
        multipart_request("/api/fill", Some(&pdf), Some(&data)),
    )
    .await;

    assert!(status.is_client_error(), "unexpected status {status}");
}

#[tokio::test]
async fn test_fill_endpoint_invalid_multipart() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/fill")
        .header("Content-Type", "multipart/form-data; boundary=invalid")
        .body(Body::from("not multipart at all"))
        .unwrap();

    let (status, _, _) = send(app(), request).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_fields_endpoint_lists_form() {
    let pdf = sample::quote_agreement_pdf().unwrap();

    let (status, _, body) = send(app(), multipart_request("/api/fields", Some(&pdf), None)).await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let fields = json["fields"].as_array().unwrap();
    assert_eq!(json["count"], fields.len());

    let customer = fields
        .iter()
        .find(|f| f["name"] == "//Contract/CustomerName")
        .unwrap();
    assert_eq!(customer["kind"], "text");

    let agreement = fields
        .iter()
        .find(|f| f["name"] == "//ContractStartDate/MonthName")
        .unwrap();
    assert_eq!(agreement["kind"], "checkbox");
    assert_eq!(agreement["states"], json!(["Yes"]));
}

#[tokio::test]
async fn test_fields_endpoint_unreadable_pdf() {
    let (status, error) = send_error(
        app(),
        multipart_request("/api/fields", Some(b"%PDF-1.7 broken"), None),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error.error.starts_with("Failed to parse PDF"));
}
