// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod block_listener;
pub mod gas;
pub mod provider;
pub mod routing;
pub mod rpc_wallet;
pub mod wallet;
