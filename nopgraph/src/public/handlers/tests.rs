// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::{content_disposition, decode_path, query_params};
use crate::app_state::AppState;
use crate::content::MemoryRepository;
use crate::iam::MemoryPrincipalStore;
use crate::public::configure;
use crate::util::test_config;
use crate::util::test_fixtures::TestFixtureRoot;
use actix_web::{App, http::StatusCode, test as actix_test, web};
use std::sync::Arc;

const BLOB_ID: &str = "0000000000000000000000000000000f";

fn state_with_blob(fixture: &TestFixtureRoot, bytes: &[u8]) -> AppState {
    fixture.write_blob(BLOB_ID, bytes).unwrap();
    let yaml = format!(
        r#"
resources:
  - id: "{id}"
    type: file
    name: video.bin
    path: /video.bin
    content_type: video/bin
"#,
        id = BLOB_ID
    );
    let repository = MemoryRepository::from_yaml_str(&yaml, &fixture.content_dir()).unwrap();
    let state = AppState::new(
        &test_config(),
        Arc::new(repository),
        Arc::new(MemoryPrincipalStore::default()),
    );
    state.mark_ready();
    state
}

#[actix_web::test]
async fn test_streaming_range_response_matches_expected_bytes() {
    let fixture = TestFixtureRoot::new_unique("public-streaming-range").unwrap();
    let content: Vec<u8> = (0u8..=255).collect();
    let state = state_with_blob(&fixture, &content);
    let app = actix_test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure),
    )
    .await;

    let req = actix_test::TestRequest::get()
        .uri("/video.bin")
        .insert_header(("range", "bytes=5-9"))
        .to_request();
    let response = actix_test::call_service(&app, req).await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    let headers = response.headers();
    assert_eq!(
        headers.get("Accept-Ranges").and_then(|v| v.to_str().ok()),
        Some("bytes")
    );
    assert_eq!(
        headers.get("Content-Range").and_then(|v| v.to_str().ok()),
        Some("bytes 5-9/256")
    );
    assert_eq!(
        headers.get("Content-Length").and_then(|v| v.to_str().ok()),
        Some("5")
    );
    assert_eq!(
        headers.get("Content-Type").and_then(|v| v.to_str().ok()),
        Some("video/bin")
    );

    let body = actix_test::read_body(response).await;
    assert_eq!(body.as_ref(), &content[5..10]);
}

#[actix_web::test]
async fn test_unsatisfiable_range_serves_whole_file() {
    let fixture = TestFixtureRoot::new_unique("public-streaming-full").unwrap();
    let content: Vec<u8> = (0u8..=255).collect();
    let state = state_with_blob(&fixture, &content);
    let app = actix_test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure),
    )
    .await;

    let req = actix_test::TestRequest::get()
        .uri("/video.bin")
        .insert_header(("range", "bytes=300-400"))
        .to_request();
    let response = actix_test::call_service(&app, req).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("Content-Range").is_none());
    assert_eq!(
        response
            .headers()
            .get("Content-Length")
            .and_then(|v| v.to_str().ok()),
        Some("256")
    );
    let body = actix_test::read_body(response).await;
    assert_eq!(body.len(), 256);
}

#[test]
fn download_names_cannot_split_headers() {
    assert_eq!(
        content_disposition("report\r\nSet-Cookie: x=1.pdf").as_deref(),
        Some("attachment; filename=\"reportSet-Cookie: x=1.pdf\"")
    );
    assert_eq!(
        content_disposition("a\"b").as_deref(),
        Some("attachment; filename=\"a\\\"b\"")
    );
    assert_eq!(content_disposition("\r\n"), None);
}

#[test]
fn download_names_drop_control_characters() {
    assert_eq!(
        content_disposition("\0a\tb\u{7f}.txt").as_deref(),
        Some("attachment; filename=\"ab.txt\"")
    );
    assert_eq!(content_disposition("\0"), None);
}

#[test]
fn paths_are_decoded() {
    assert_eq!(decode_path("/my%20file.pdf"), "/my file.pdf");
    assert_eq!(decode_path("/%FF"), "/%FF");
}

#[test]
fn query_parameters_are_collected() {
    let params = query_params("edit=2&filename=a%20b.txt");
    assert_eq!(params.get("edit").map(String::as_str), Some("2"));
    assert_eq!(params.get("filename").map(String::as_str), Some("a b.txt"));
    assert!(query_params("").is_empty());
}
