// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

pub mod memory;
pub mod model;
pub mod repository;

pub use memory::MemoryRepository;
pub use model::{
    KindFilter, RequestHost, Resource, ResourceId, ResourceKind, RouteTemplate, Site,
    is_uuid_shaped,
};
pub use repository::{ContentRepository, RepositoryError, ResourceQuery, Transaction};
