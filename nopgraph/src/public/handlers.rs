// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::basic_auth::{BasicAuthGate, GateOutcome};
use super::cache::{self, CacheDecision};
use super::confirmation;
use super::error;
use super::range;
use super::resolver::{PathResolver, Resolution, ResolveRequest};
use crate::app_state::AppState;
use crate::content::{RequestHost, Resource, ResourceQuery, Transaction};
use crate::iam::{AuthRequest, SecurityContext};
use crate::render::{EditMode, RenderContext, RequestInfo};
use crate::security;
use actix_web::http::header::{
    ACCEPT_RANGES, ALLOW, AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, HOST,
    WWW_AUTHENTICATE,
};
use actix_web::http::{Method, StatusCode};
use actix_web::{HttpRequest, HttpResponse, Result, body::SizedStream, web};
use std::collections::BTreeMap;
use std::time::SystemTime;
use tokio_util::io::ReaderStream;

const ALLOWED_METHODS: &str = "GET,HEAD,OPTIONS";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";
/// Query parameter that turns a file response into a download.
pub const DOWNLOAD_PARAM: &str = "filename";

pub async fn handle_route(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !state.is_ready() {
        return Ok(error::serve_503(&state.error_renderer));
    }
    if req.method() == Method::OPTIONS {
        return Ok(options_response());
    }

    let raw_path = req.path().to_string();
    if let Some(response) = security::route_checks(&raw_path, &state.error_renderer) {
        return Ok(response);
    }
    let path = decode_path(&raw_path);
    let params = query_params(req.query_string());

    if let Some(key) = confirmation::confirmation_key(&state.confirmation, &path, &params) {
        return Ok(confirmation::handle(&state, key, &params));
    }

    let user = req.user_info();
    let logged_in = user.is_some();
    let edit_mode = if logged_in {
        EditMode::from_param(params.get(EditMode::PARAM).map(String::as_str))
    } else {
        EditMode::None
    };
    let request = RequestInfo {
        method: req.method().to_string(),
        path: raw_path.clone(),
        query_string: req.query_string().to_string(),
        remote_addr: req.peer_addr().map(|addr| addr.ip().to_string()),
        params: params.clone(),
    };
    let mut ctx = RenderContext::new(SecurityContext::from_optional_user(user), edit_mode, request);
    ctx.mark_dont_cache(logged_in);

    let host = request_host(&req, state.server_port);
    let head = req.method() == Method::HEAD;
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let transaction = match state.repository.begin_transaction() {
        Ok(transaction) => transaction,
        Err(err) => {
            log::error!("Could not open transaction for {}: {}", ctx.request, err);
            return Ok(error::serve_500(&state.error_renderer));
        }
    };

    let gate = BasicAuthGate::new(
        state.repository.as_ref(),
        state.principals.as_ref(),
        state.expander.as_ref(),
    );
    let mut gated = false;
    let resolution = match gate.check_and_resolve(&path, authorization, &ctx) {
        Ok(GateOutcome::NoBasicAuth) => {
            resolve_path(&state, &ctx, &path, &raw_path, req.query_string(), &host)
        }
        Ok(GateOutcome::MustAuthenticate { realm }) => {
            if let Some(failed) = commit(transaction, &ctx.request, &state) {
                return Ok(failed);
            }
            return Ok(unauthorized(&state, ctx, &host, &realm, head).await);
        }
        Ok(GateOutcome::Authenticated { security, resource }) => {
            gated = true;
            ctx.narrow_to(security);
            ctx.mark_dont_cache(true);
            Some(Resolution::new(resource))
        }
        Err(err) => {
            log::error!("Basic auth lookup failed for {}: {}", ctx.request, err);
            resolve_path(&state, &ctx, &path, &raw_path, req.query_string(), &host)
        }
    };

    let Some(mut resolution) = resolution else {
        if let Some(failed) = commit(transaction, &ctx.request, &state) {
            return Ok(failed);
        }
        return Ok(not_found(&state, ctx, &host, head).await);
    };

    if !gated && resolution.resource.enable_basic_auth {
        match gate.authenticate(&resolution.resource, authorization, &ctx) {
            GateOutcome::Authenticated { security, resource } => {
                ctx.narrow_to(security);
                ctx.mark_dont_cache(true);
                resolution.resource = resource;
            }
            GateOutcome::MustAuthenticate { realm } => {
                if let Some(failed) = commit(transaction, &ctx.request, &state) {
                    return Ok(failed);
                }
                return Ok(unauthorized(&state, ctx, &host, &realm, head).await);
            }
            GateOutcome::NoBasicAuth => {}
        }
    }

    let widget = ctx.edit_mode == EditMode::Widget;
    ctx.mark_dont_cache(resolution.resource.dont_cache);
    ctx.mark_dont_cache(resolution.dynamic);
    ctx.mark_dont_cache(widget);
    ctx.request
        .params
        .extend(std::mem::take(&mut resolution.route_params));
    ctx.partial = resolution.partial;
    ctx.data_node = resolution.data_node.take();
    let resource = resolution.resource;

    let decision = cache::evaluate(
        req.headers(),
        &resource,
        ctx.dont_cache(),
        SystemTime::now(),
    );
    if decision.not_modified {
        if let Some(failed) = commit(transaction, &ctx.request, &state) {
            return Ok(failed);
        }
        let mut builder = HttpResponse::NotModified();
        decision.apply(&mut builder);
        return Ok(builder.finish());
    }

    if resource.is_file() {
        if let Some(failed) = commit(transaction, &ctx.request, &state) {
            return Ok(failed);
        }
        return Ok(serve_file(&req, &state, &resource, &decision, &params, head).await);
    }

    serve_page(&state, transaction, resource, ctx, &decision, head).await
}

pub async fn index(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    handle_route(req, state).await
}

/// Commits the request transaction. Returns the 500 to send if that fails.
fn commit(
    transaction: Box<dyn Transaction>,
    request: &RequestInfo,
    state: &AppState,
) -> Option<HttpResponse> {
    match transaction.commit() {
        Ok(()) => None,
        Err(err) => {
            log::error!("Commit failed for {}: {}", request, err);
            Some(error::serve_500(&state.error_renderer))
        }
    }
}

fn resolve_path(
    state: &AppState,
    ctx: &RenderContext,
    path: &str,
    raw_path: &str,
    query_string: &str,
    host: &RequestHost,
) -> Option<Resolution> {
    let resolve_request = ResolveRequest {
        path,
        raw_path,
        query_string,
        host,
        edit_mode: ctx.edit_mode,
        security: &ctx.security,
    };
    match PathResolver::new(state.repository.as_ref()).resolve(&resolve_request) {
        Ok(resolution) => resolution,
        Err(err) => {
            log::error!("Resolution failed for {}: {}", ctx.request, err);
            None
        }
    }
}

async fn serve_page(
    state: &AppState,
    transaction: Box<dyn Transaction>,
    resource: std::sync::Arc<Resource>,
    ctx: RenderContext,
    decision: &CacheDecision,
    head: bool,
) -> Result<HttpResponse> {
    let request = ctx.request.clone();
    let content_type = resource
        .content_type
        .clone()
        .unwrap_or_else(|| HTML_CONTENT_TYPE.to_string());
    let mut builder = HttpResponse::Ok();
    decision.apply(&mut builder);
    builder.content_type(content_type);

    if head {
        return Ok(commit(transaction, &request, state).unwrap_or_else(|| builder.finish()));
    }

    if state.pipeline.use_streaming(&resource) {
        // The transaction must not outlive the synchronous part of the request.
        if let Some(failed) = commit(transaction, &request, state) {
            return Ok(failed);
        }
        return match state.pipeline.render_streaming(resource, ctx).await {
            Ok(body) => Ok(builder.streaming(body)),
            Err(err) => {
                log::error!("Render failed for {}: {}", request, err);
                Ok(error::serve_500(&state.error_renderer))
            }
        };
    }

    match state.pipeline.render_buffered(resource, ctx).await {
        Ok(html) => Ok(commit(transaction, &request, state).unwrap_or_else(|| builder.body(html))),
        Err(err) => {
            log::error!("Render failed for {}: {}", request, err);
            Ok(error::serve_500(&state.error_renderer))
        }
    }
}

async fn serve_file(
    req: &HttpRequest,
    state: &AppState,
    resource: &Resource,
    decision: &CacheDecision,
    params: &BTreeMap<String, String>,
    head: bool,
) -> HttpResponse {
    use std::io::SeekFrom;
    use tokio::fs::File;
    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    let Some(location) = state.repository.file_location(resource) else {
        log::debug!("File {} has no stored bytes", resource.id);
        return error::serve_404(&state.error_renderer);
    };
    let total = match tokio::fs::metadata(&location).await {
        Ok(metadata) => metadata.len(),
        Err(err) => {
            log::debug!("File {} unreadable: {}", resource.id, err);
            return error::serve_404(&state.error_renderer);
        }
    };

    let range_header = req
        .headers()
        .get(actix_web::http::header::RANGE)
        .and_then(|value| value.to_str().ok());
    let byte_range = range::parse_range(range_header, total);

    let mut builder = if byte_range.is_partial() {
        HttpResponse::PartialContent()
    } else {
        HttpResponse::Ok()
    };
    decision.apply(&mut builder);
    builder
        .content_type(
            resource
                .content_type
                .as_deref()
                .unwrap_or(DEFAULT_FILE_CONTENT_TYPE),
        )
        .insert_header((ACCEPT_RANGES, "bytes"));
    if let Some(disposition) = params.get(DOWNLOAD_PARAM).and_then(|f| content_disposition(f)) {
        builder.insert_header((CONTENT_DISPOSITION, disposition));
    }

    let with_length = byte_range.is_partial() || !resource.is_template_file();
    if byte_range.is_partial() {
        builder.insert_header((CONTENT_RANGE, byte_range.content_range()));
    }
    if with_length {
        builder.insert_header((CONTENT_LENGTH, byte_range.len().to_string()));
    }

    if head {
        return builder.finish();
    }

    let mut file = match File::open(&location).await {
        Ok(file) => file,
        Err(_) => return error::serve_404(&state.error_renderer),
    };
    if byte_range.is_partial() && file.seek(SeekFrom::Start(byte_range.start)).await.is_err() {
        return error::serve_500(&state.error_renderer);
    }

    let stream = ReaderStream::new(file.take(byte_range.len()));
    if with_length {
        builder.body(SizedStream::new(byte_range.len(), stream))
    } else {
        builder.streaming(stream)
    }
}

async fn not_found(
    state: &AppState,
    ctx: RenderContext,
    host: &RequestHost,
    head: bool,
) -> HttpResponse {
    if head {
        return error::error_response(StatusCode::NOT_FOUND).finish();
    }
    match render_error_page(state, ctx, host, StatusCode::NOT_FOUND).await {
        Some(html) => error::error_response(StatusCode::NOT_FOUND)
            .content_type(HTML_CONTENT_TYPE)
            .body(html),
        None => error::serve_404(&state.error_renderer),
    }
}

async fn unauthorized(
    state: &AppState,
    ctx: RenderContext,
    host: &RequestHost,
    realm: &str,
    head: bool,
) -> HttpResponse {
    if head {
        return error::error_response(StatusCode::UNAUTHORIZED)
            .insert_header((WWW_AUTHENTICATE, error::www_authenticate_value(realm)))
            .finish();
    }
    let body = render_error_page(state, ctx, host, StatusCode::UNAUTHORIZED).await;
    error::serve_401(&state.error_renderer, realm, body)
}

/// Renders the first visible page bound to `status`, if any.
async fn render_error_page(
    state: &AppState,
    ctx: RenderContext,
    host: &RequestHost,
    status: StatusCode,
) -> Option<String> {
    let query = ResourceQuery::pages().error_code(status.as_u16());
    let pages = match state.repository.find(&ctx.security, &query) {
        Ok(pages) => pages,
        Err(err) => {
            log::error!("Error page lookup failed for {}: {}", ctx.request, err);
            return None;
        }
    };
    let page = pages
        .into_iter()
        .find(|page| ctx.edit_mode == EditMode::Content || page.is_visible_for_site(host))?;
    let request = ctx.request.clone();
    match state.pipeline.render_buffered(page, ctx).await {
        Ok(html) => Some(html),
        Err(err) => {
            log::error!("Error page {} failed for {}: {}", status.as_u16(), request, err);
            None
        }
    }
}

fn options_response() -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((ALLOW, ALLOWED_METHODS))
        .insert_header((CONTENT_LENGTH, "0"))
        .finish()
}

fn request_host(req: &HttpRequest, server_port: u16) -> RequestHost {
    let header = req
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    RequestHost::parse(header, Some(server_port))
}

fn decode_path(raw_path: &str) -> String {
    let decoded = urlencoding::decode(raw_path)
        .map(|path| path.into_owned())
        .unwrap_or_else(|_| raw_path.to_string());
    if decoded.starts_with('/') {
        decoded
    } else {
        format!("/{}", decoded)
    }
}

fn query_params(query_string: &str) -> BTreeMap<String, String> {
    web::Query::<BTreeMap<String, String>>::from_query(query_string)
        .map(web::Query::into_inner)
        .unwrap_or_default()
}

/// `attachment; filename="..."` with control characters removed and quotes escaped.
fn content_disposition(filename: &str) -> Option<String> {
    let mut cleaned = String::with_capacity(filename.len());
    for c in filename.chars() {
        match c {
            c if c.is_control() => {}
            '"' | '\\' => {
                cleaned.push('\\');
                cleaned.push(c);
            }
            _ => cleaned.push(c),
        }
    }
    if cleaned.trim().is_empty() {
        return None;
    }
    Some(format!("attachment; filename=\"{}\"", cleaned))
}

#[cfg(test)]
mod tests;
