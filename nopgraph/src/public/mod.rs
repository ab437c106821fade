// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use actix_web::http::Method;
use actix_web::web;

pub mod basic_auth;
pub mod cache;
pub mod confirmation;
pub mod error;
pub mod handlers;
pub mod range;
pub mod resolver;

pub use basic_auth::{BasicAuthGate, GateOutcome};
pub use cache::CacheDecision;
pub use range::{ByteRange, RangeStatus};
pub use resolver::{PathResolver, Resolution, ResolveRequest};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/")
            .route(web::get().to(handlers::index))
            .route(web::head().to(handlers::index))
            .route(web::method(Method::OPTIONS).to(handlers::index)),
    )
    .service(
        web::resource("/{path:.*}")
            .route(web::get().to(handlers::handle_route))
            .route(web::head().to(handlers::handle_route))
            .route(web::method(Method::OPTIONS).to(handlers::handle_route)),
    );
}
