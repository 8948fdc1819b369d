// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>
#![allow(clippy::too_many_arguments)]

pub mod app;
pub mod common;
pub mod domain;
pub mod infrastructure;
pub mod services;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use infrastructure::data;
pub use infrastructure::network;
pub use services::session;
