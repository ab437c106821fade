// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::config::SecurityConfig;
use actix_web::Error;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{
    HeaderMap, HeaderName, HeaderValue, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY,
    X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
};
use futures_util::future::{Ready, ok};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Adds the security headers every response carries. Caching headers are
/// left to the handlers.
pub struct Headers {
    security: Arc<SecurityConfig>,
}

impl Headers {
    pub fn new(security: &SecurityConfig) -> Self {
        Headers {
            security: Arc::new(security.clone()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Headers
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = HeadersMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(HeadersMiddleware {
            service: Arc::new(service),
            hsts: hsts_value(&self.security),
        })
    }
}

pub struct HeadersMiddleware<S> {
    service: Arc<S>,
    hsts: Option<HeaderValue>,
}

impl<S, B> Service<ServiceRequest> for HeadersMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(
        &self,
        cx: &mut core::task::Context<'_>,
    ) -> core::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let fut = self.service.call(req);
        let hsts = self.hsts.clone();

        Box::pin(async move {
            let mut res = fut.await?;
            apply_security_headers(res.headers_mut(), hsts);
            Ok(res)
        })
    }
}

fn hsts_value(security: &SecurityConfig) -> Option<HeaderValue> {
    if !security.hsts_enabled {
        return None;
    }
    HeaderValue::from_str(&format!("max-age={}", security.hsts_max_age)).ok()
}

fn apply_security_headers(headers: &mut HeaderMap, hsts: Option<HeaderValue>) {
    set_default(
        headers,
        X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    set_default(
        headers,
        X_FRAME_OPTIONS,
        HeaderValue::from_static("SAMEORIGIN"),
    );
    set_default(
        headers,
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    match hsts {
        Some(value) => {
            headers.insert(STRICT_TRANSPORT_SECURITY, value);
        }
        None => {
            headers.remove(STRICT_TRANSPORT_SECURITY);
        }
    }
}

fn set_default(headers: &mut HeaderMap, name: HeaderName, value: HeaderValue) {
    if !headers.contains_key(&name) {
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::CACHE_CONTROL;
    use actix_web::{App, HttpResponse, test, web};

    async fn cached() -> HttpResponse {
        HttpResponse::Ok()
            .insert_header((CACHE_CONTROL, "max-age=60"))
            .finish()
    }

    #[actix_web::test]
    async fn adds_security_headers_without_touching_cache_control() {
        let security = SecurityConfig {
            hsts_enabled: true,
            hsts_max_age: 600,
        };
        let app = test::init_service(
            App::new()
                .wrap(Headers::new(&security))
                .route("/", web::get().to(cached)),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let headers = res.headers();
        assert_eq!(headers.get(X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert_eq!(headers.get(X_FRAME_OPTIONS).unwrap(), "SAMEORIGIN");
        assert_eq!(
            headers.get(REFERRER_POLICY).unwrap(),
            "strict-origin-when-cross-origin"
        );
        assert_eq!(headers.get(STRICT_TRANSPORT_SECURITY).unwrap(), "max-age=600");
        assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "max-age=60");
    }

    #[actix_web::test]
    async fn hsts_is_omitted_when_disabled() {
        let app = test::init_service(
            App::new()
                .wrap(Headers::new(&SecurityConfig::default()))
                .route("/", web::get().to(cached)),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert!(res.headers().get(STRICT_TRANSPORT_SECURITY).is_none());
    }
}
