// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::error;
use crate::app_state::AppState;
use crate::config::ConfirmationConfig;
use crate::security::validate_redirect_target;
use actix_web::HttpResponse;
use actix_web::http::header::{CACHE_CONTROL, LOCATION};
use std::collections::BTreeMap;

const TARGET_PARAM: &str = "target";
const ERROR_TARGET_PARAM: &str = "onerror";

/// Returns the confirmation key when `path` is a confirmation route and the
/// request carries a non-blank key.
pub fn confirmation_key<'a>(
    config: &ConfirmationConfig,
    path: &str,
    params: &'a BTreeMap<String, String>,
) -> Option<&'a str> {
    if path != config.registration_path && path != config.reset_path {
        return None;
    }
    params
        .get(&config.key_param)
        .map(String::as_str)
        .filter(|key| !key.trim().is_empty())
}

/// Consumes a registration or password-reset key, logs the principal in and
/// redirects. Runs outside normal path resolution.
pub fn handle(state: &AppState, key: &str, params: &BTreeMap<String, String>) -> HttpResponse {
    let config = &state.confirmation;
    let transaction = match state.repository.begin_transaction() {
        Ok(transaction) => transaction,
        Err(err) => {
            log::error!("Could not open transaction for confirmation: {}", err);
            return error::serve_500(&state.error_renderer);
        }
    };

    let user = match state.principals.find_by_confirmation_key(key) {
        Ok(Some(user)) => user,
        Ok(None) => {
            log::info!("Unknown or already used confirmation key");
            return redirect(redirect_target(
                params.get(ERROR_TARGET_PARAM),
                &config.default_error_target,
            ));
        }
        Err(err) => {
            log::error!("Confirmation key lookup failed: {}", err);
            return error::serve_500(&state.error_renderer);
        }
    };

    if let Err(err) = state.principals.clear_confirmation_key(&user.name) {
        log::error!("Failed to clear confirmation key for {}: {}", user.name, err);
        return error::serve_500(&state.error_renderer);
    }
    if let Err(err) = transaction.commit() {
        log::error!("Confirmation commit failed for {}: {}", user.name, err);
        return error::serve_500(&state.error_renderer);
    }

    log::info!("Confirmed {} and opened a session", user.name);
    let session_id = state.sessions.open(&user.name);
    let mut response = redirect(redirect_target(
        params.get(TARGET_PARAM),
        &config.default_target,
    ));
    if let Err(err) = response.add_cookie(&state.sessions.session_cookie(&session_id)) {
        log::error!("Failed to attach session cookie: {}", err);
    }
    response
}

fn redirect_target(requested: Option<&String>, default: &str) -> String {
    requested
        .and_then(|target| validate_redirect_target(target))
        .unwrap_or_else(|| default.to_string())
}

fn redirect(location: String) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((LOCATION, location))
        .insert_header((CACHE_CONTROL, "no-store"))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn key_only_counts_on_confirmation_routes() {
        let config = ConfirmationConfig::default();
        let with_key = params(&[("key", "abc")]);
        assert_eq!(
            confirmation_key(&config, "/confirm_registration", &with_key),
            Some("abc")
        );
        assert_eq!(confirmation_key(&config, "/reset-password", &with_key), Some("abc"));
        assert_eq!(confirmation_key(&config, "/about", &with_key), None);
        assert_eq!(
            confirmation_key(&config, "/confirm_registration", &params(&[("key", "  ")])),
            None
        );
    }

    #[test]
    fn unsafe_targets_fall_back_to_default() {
        let target = "https://evil.test".to_string();
        assert_eq!(redirect_target(Some(&target), "/"), "/");
        let target = "/welcome".to_string();
        assert_eq!(redirect_target(Some(&target), "/"), "/welcome");
        assert_eq!(redirect_target(None, "/oops"), "/oops");
    }
}
