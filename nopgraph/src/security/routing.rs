// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

/// Validate redirect targets to prevent open redirects.
///
/// Rules:
/// - Reject scheme/host-prefixed values (must start with `/`, but not `//`).
/// - CR/LF are stripped before checking.
/// - Backslashes are rejected, browsers treat `/\host` like `//host`.
pub fn validate_redirect_target(raw_target: &str) -> Option<String> {
    let cleaned = raw_target.trim().replace(['\r', '\n'], "");
    if cleaned.is_empty() {
        return None;
    }
    if !cleaned.starts_with('/') || cleaned.starts_with("//") || cleaned.contains('\\') {
        return None;
    }
    Some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_site_relative_targets() {
        assert_eq!(validate_redirect_target("/"), Some("/".to_string()));
        assert_eq!(
            validate_redirect_target(" /welcome?x=1 "),
            Some("/welcome?x=1".to_string())
        );
    }

    #[test]
    fn rejects_external_targets() {
        assert_eq!(validate_redirect_target("https://evil.test/"), None);
        assert_eq!(validate_redirect_target("//evil.test/"), None);
        assert_eq!(validate_redirect_target("/\\evil.test"), None);
        assert_eq!(validate_redirect_target("welcome"), None);
        assert_eq!(validate_redirect_target(""), None);
    }
}
