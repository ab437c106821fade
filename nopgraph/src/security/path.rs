// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::public::error::{self, ErrorRenderer};
use actix_web::HttpResponse;
use log::warn;

/// True when the path, raw or percent-decoded, tries to step outside the
/// content root.
pub fn is_traversal_attempt(path: &str) -> bool {
    // URL decode the path to catch encoded path traversal attempts
    let decoded = urlencoding::decode(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    [path, decoded.as_ref()].iter().any(|candidate| {
        candidate.contains('\0')
            || candidate
                .split(['/', '\\'])
                .any(|segment| segment == ".." || segment == ".")
    })
}

/// Returns Some(403 response) if the route must be refused.
pub fn route_checks(path: &str, renderer: &ErrorRenderer) -> Option<HttpResponse> {
    if is_traversal_attempt(path) {
        warn!("🚨 SECURITY: Path traversal attempt refused - path: {}", path);
        return Some(error::serve_403(renderer));
    }
    None
}
