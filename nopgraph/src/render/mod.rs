// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

pub mod context;
pub mod expander;
pub mod pipeline;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod renderer;

pub use context::{DontCache, EditMode, RenderContext, RenderError, RequestInfo};
pub use expander::{PlaceholderExpander, TemplateExpander};
pub use pipeline::{RenderBody, RenderPipeline};
pub use pool::{PoolError, RenderPool};
pub use queue::FragmentQueue;
pub use registry::StreamRegistry;
pub use renderer::{MAX_RENDER_DEPTH, TemplateTreeRenderer, TreeRenderer};
