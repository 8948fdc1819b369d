// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::error::AppError;
use crate::network::provider::{HttpProvider, WsProvider};
use alloy::providers::Provider;
use futures::StreamExt;
use tokio::sync::broadcast::Sender;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;

/// Publishes new block heights. Prefers a `newHeads` subscription and falls
/// back to polling `eth_blockNumber` over HTTP.
pub struct BlockListener {
    http: HttpProvider,
    ws: Option<WsProvider>,
    broadcaster: Sender<u64>,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl BlockListener {
    pub fn new(
        http: HttpProvider,
        ws: Option<WsProvider>,
        broadcaster: Sender<u64>,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            http,
            ws,
            broadcaster,
            poll_interval,
            shutdown,
        }
    }

    pub async fn run(self) -> Result<(), AppError> {
        let mut last_seen: Option<u64> = None;
        loop {
            if self.shutdown.is_cancelled() {
                tracing::info!(target: "blocks", "Shutdown requested; stopping block listener");
                return Ok(());
            }

            if let Some(ws) = &self.ws {
                match ws.subscribe_blocks().await {
                    Ok(sub) => {
                        let mut stream = sub.into_stream();
                        tracing::info!(target: "blocks", "subscribed to newHeads");
                        loop {
                            tokio::select! {
                                _ = self.shutdown.cancelled() => {
                                    tracing::info!(target: "blocks", "Shutdown requested; exiting newHeads stream");
                                    return Ok(());
                                }
                                maybe_header = stream.next() => {
                                    match maybe_header {
                                        Some(header) => self.publish(header.inner.number, &mut last_seen),
                                        None => break,
                                    }
                                }
                            }
                        }
                        tracing::warn!(target: "blocks", "subscription ended, retrying after backoff");
                    }
                    Err(e) => {
                        tracing::warn!(target: "blocks", error = %e, "block subscription failed; polling");
                        self.poll_once(&mut last_seen).await;
                    }
                }
            } else {
                self.poll_once(&mut last_seen).await;
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!(target: "blocks", "Shutdown requested during block-listener backoff");
                    return Ok(());
                }
                _ = sleep(self.poll_interval) => {}
            }
        }
    }

    async fn poll_once(&self, last_seen: &mut Option<u64>) {
        match self.http.get_block_number().await {
            Ok(number) => self.publish(number, last_seen),
            Err(e) => tracing::warn!(target: "blocks", error = %e, "polling block number failed"),
        }
    }

    fn publish(&self, number: u64, last_seen: &mut Option<u64>) {
        if !is_new_height(*last_seen, number) {
            return;
        }
        *last_seen = Some(number);
        tracing::debug!(target: "blocks", number, "new block");
        // No receivers is fine; nobody is watching an allowance right now.
        let _ = self.broadcaster.send(number);
    }
}

/// Reorgs can replay a height; only strictly newer heights are published.
fn is_new_height(last_seen: Option<u64>, number: u64) -> bool {
    last_seen.is_none_or(|last| number > last)
}
