// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::util::html_escape;
use actix_web::http::StatusCode;
use actix_web::http::header::WWW_AUTHENTICATE;
use actix_web::{HttpResponse, HttpResponseBuilder};

/// Container-level error bodies, used when no error Page is configured.
#[derive(Clone)]
pub struct ErrorRenderer {
    app_name: String,
}

impl ErrorRenderer {
    pub fn new(app_name: String) -> Self {
        Self { app_name }
    }

    pub fn fallback_html(&self, status: StatusCode) -> String {
        let reason = status.canonical_reason().unwrap_or("Error");
        format!(
            r#"<!DOCTYPE html>
<html><head><title>{code} - {reason} | {app}</title></head>
<body><h1>{code} - {reason}</h1></body></html>"#,
            code = status.as_u16(),
            reason = reason,
            app = html_escape(&self.app_name)
        )
    }
}

/// Builder preloaded with the no-store headers every error response carries.
pub fn error_response(status: StatusCode) -> HttpResponseBuilder {
    let mut builder = HttpResponse::build(status);
    builder
        .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate"))
        .insert_header(("Pragma", "no-cache"))
        .insert_header(("Expires", "0"));
    builder
}

pub fn serve_status(renderer: &ErrorRenderer, status: StatusCode) -> HttpResponse {
    error_response(status)
        .content_type("text/html; charset=utf-8")
        .body(renderer.fallback_html(status))
}

pub fn serve_403(renderer: &ErrorRenderer) -> HttpResponse {
    serve_status(renderer, StatusCode::FORBIDDEN)
}

pub fn serve_404(renderer: &ErrorRenderer) -> HttpResponse {
    serve_status(renderer, StatusCode::NOT_FOUND)
}

pub fn serve_500(renderer: &ErrorRenderer) -> HttpResponse {
    serve_status(renderer, StatusCode::INTERNAL_SERVER_ERROR)
}

pub fn serve_503(renderer: &ErrorRenderer) -> HttpResponse {
    serve_status(renderer, StatusCode::SERVICE_UNAVAILABLE)
}

/// `Basic realm="..."` with embedded quotes and backslashes escaped.
pub fn www_authenticate_value(realm: &str) -> String {
    let mut escaped = String::with_capacity(realm.len());
    for c in realm.chars() {
        match c {
            '"' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\r' | '\n' => {}
            _ => escaped.push(c),
        }
    }
    format!("Basic realm=\"{}\"", escaped)
}

pub fn serve_401(renderer: &ErrorRenderer, realm: &str, body: Option<String>) -> HttpResponse {
    error_response(StatusCode::UNAUTHORIZED)
        .insert_header((WWW_AUTHENTICATE, www_authenticate_value(realm)))
        .content_type("text/html; charset=utf-8")
        .body(body.unwrap_or_else(|| renderer.fallback_html(StatusCode::UNAUTHORIZED)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realm_quotes_are_escaped() {
        assert_eq!(
            www_authenticate_value(r#"Say "hi""#),
            r#"Basic realm="Say \"hi\"""#
        );
        assert_eq!(www_authenticate_value("a\r\nb"), r#"Basic realm="ab""#);
    }

    #[test]
    fn fallback_pages_name_the_status() {
        let renderer = ErrorRenderer::new("Test <App>".to_string());
        let html = renderer.fallback_html(StatusCode::NOT_FOUND);
        assert!(html.contains("404 - Not Found"));
        assert!(html.contains("Test &lt;App&gt;"));
    }

    #[test]
    fn error_responses_are_not_cacheable() {
        let res = serve_503(&ErrorRenderer::new("x".to_string()));
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            res.headers().get("Cache-Control").unwrap(),
            "no-cache, no-store, must-revalidate"
        );
    }
}
