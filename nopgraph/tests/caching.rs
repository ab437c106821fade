// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

mod common;

use actix_web::{http::StatusCode, test};
use nopgraph::public::cache::CACHE_CONTROL_NEVER;

const LAST_MODIFIED: &str = "Tue, 14 Nov 2023 22:13:20 GMT";

#[actix_web::test]
async fn if_modified_since_yields_304() {
    let harness = common::TestHarness::new();
    let app = test::init_service(common::build_test_app(&harness)).await;

    let req = test::TestRequest::get()
        .uri("/about")
        .insert_header(("If-Modified-Since", LAST_MODIFIED))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(common::header(&resp, "last-modified"), Some(LAST_MODIFIED));
    assert_eq!(common::header(&resp, "vary"), Some("Accept-Encoding"));
    let body = test::read_body(resp).await;
    assert!(body.is_empty());
}

#[actix_web::test]
async fn older_if_modified_since_gets_full_page() {
    let harness = common::TestHarness::new();
    let app = test::init_service(common::build_test_app(&harness)).await;

    let req = test::TestRequest::get()
        .uri("/about")
        .insert_header(("If-Modified-Since", "Mon, 13 Nov 2023 00:00:00 GMT"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert!(!body.is_empty());
}

#[actix_web::test]
async fn garbage_if_modified_since_is_ignored() {
    let harness = common::TestHarness::new();
    let app = test::init_service(common::build_test_app(&harness)).await;

    let req = test::TestRequest::get()
        .uri("/about")
        .insert_header(("If-Modified-Since", "last tuesday"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn logged_in_users_never_get_cacheable_pages() {
    let harness = common::TestHarness::new();
    let app = test::init_service(common::build_test_app(&harness)).await;

    let req = test::TestRequest::get()
        .uri("/about")
        .cookie(harness.login_cookie())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(common::header(&resp, "cache-control"), Some(CACHE_CONTROL_NEVER));
    assert!(common::header(&resp, "expires").is_none());
}

#[actix_web::test]
async fn unknown_session_cookie_is_treated_as_anonymous() {
    let harness = common::TestHarness::new();
    let app = test::init_service(common::build_test_app(&harness)).await;

    let cookie = harness.app_state.sessions.session_cookie("not-a-session");
    let req = test::TestRequest::get()
        .uri("/about")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        common::header(&resp, "cache-control"),
        Some("max-age=120, s-maxage=120")
    );
}

#[actix_web::test]
async fn edit_mode_is_ignored_for_anonymous_requests() {
    let harness = common::TestHarness::new();
    let app = test::init_service(common::build_test_app(&harness)).await;

    let req = test::TestRequest::get().uri("/about?edit=1").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(
        common::header(&resp, "cache-control"),
        Some("max-age=120, s-maxage=120")
    );
}
