// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

pub mod connection_ids;
pub mod html;
pub mod test_config;
pub mod test_fixtures;

pub use connection_ids::next_connection_id;
pub use html::html_escape;
pub use test_config::{TestConfigBuilder, test_config};
