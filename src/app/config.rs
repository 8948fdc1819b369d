// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::data_path::{resolve_data_dir, resolve_data_file};
use crate::common::parsing::parse_address_list;
use crate::domain::constants;
use crate::domain::error::AppError;
use crate::domain::types::Category;
use alloy::primitives::Address;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalSettings {
    // General
    #[serde(default = "default_false")]
    pub debug: bool,
    #[serde(default = "default_false")]
    pub log_json: bool,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    pub data_dir: Option<String>,

    // RPC
    pub http_provider: Option<String>,
    pub websocket_provider: Option<String>,
    #[serde(default = "default_block_poll_ms")]
    pub block_poll_ms: u64,

    // Wallets
    /// Key behind the injected (EOA) connector.
    #[serde(default)]
    pub wallet_key: String,
    /// Key behind the embedded connector; absent means only injected is offered.
    pub embedded_wallet_key: Option<String>,

    // Routing API
    #[serde(default = "default_routing_api_url")]
    pub routing_api_url: String,
    #[serde(default)]
    pub routing_api_key: String,
    #[serde(default = "default_route_retries")]
    pub route_retries: usize,

    // Swap
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u64,
    #[serde(default = "default_lucky_slippage_bps")]
    pub lucky_slippage_bps: u64,
    pub tokenlist_path: Option<String>,
    pub preferences_path: Option<String>,
    /// Category name -> token addresses, replacing the built-in list.
    pub categories: Option<HashMap<String, Vec<String>>>,

    // Receipts
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,
}

// Defaults
fn default_false() -> bool {
    false
}
fn default_chain_id() -> u64 {
    constants::DEFAULT_CHAIN_ID
}
fn default_block_poll_ms() -> u64 {
    2_000
}
fn default_routing_api_url() -> String {
    constants::DEFAULT_ROUTING_API_URL.to_string()
}
fn default_route_retries() -> usize {
    constants::ROUTE_READ_RETRIES
}
fn default_slippage_bps() -> u64 {
    constants::DEFAULT_SLIPPAGE_BPS
}
fn default_lucky_slippage_bps() -> u64 {
    constants::DEFAULT_LUCKY_SLIPPAGE_BPS
}
fn default_receipt_poll_ms() -> u64 {
    1_000
}
fn default_receipt_timeout_ms() -> u64 {
    120_000
}

impl GlobalSettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(selected) = path {
            builder = builder.add_source(File::from(Path::new(selected)).required(true));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }
        // Precedence: CLI (in main) > env/.env > config file.
        builder = builder.add_source(Environment::default().try_parsing(true));

        let settings: GlobalSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load() -> Result<Self, AppError> {
        Self::load_with_path(None)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        Url::parse(&self.routing_api_url)
            .map_err(|e| AppError::Config(format!("Invalid routing_api_url: {e}")))?;
        if self.slippage_bps > 10_000 || self.lucky_slippage_bps > 10_000 {
            return Err(AppError::Config(
                "slippage must be expressed in basis points (<= 10000)".into(),
            ));
        }
        if self.receipt_poll_ms == 0 {
            return Err(AppError::Config("receipt_poll_ms must be > 0".into()));
        }
        self.category_overrides()?;
        Ok(())
    }

    /// Keys that are required only by commands that sign or call the API.
    pub fn require_signing(&self) -> Result<(), AppError> {
        if self.wallet_key.trim().is_empty() {
            return Err(AppError::Config("WALLET_KEY is missing".to_string()));
        }
        Ok(())
    }

    pub fn require_routing_key(&self) -> Result<&str, AppError> {
        let key = self.routing_api_key.trim();
        if key.is_empty() {
            return Err(AppError::Config("ROUTING_API_KEY is missing".to_string()));
        }
        Ok(key)
    }

    pub fn http_provider_url(&self) -> Result<String, AppError> {
        if let Some(url) = self
            .http_provider
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return Ok(url.to_string());
        }
        let key = format!("http_provider_{}", self.chain_id);
        if let Ok(v) = std::env::var(&key) {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }
        Err(AppError::Config(format!(
            "No RPC URL found for chain {}",
            self.chain_id
        )))
    }

    pub fn websocket_provider_url(&self) -> Option<String> {
        self.websocket_provider
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
    }

    pub fn data_dir(&self) -> PathBuf {
        resolve_data_dir(self.data_dir.as_deref())
    }

    pub fn preferences_path(&self) -> PathBuf {
        resolve_data_file(
            self.preferences_path
                .as_deref()
                .unwrap_or(constants::PREFERENCES_FILE),
            self.data_dir.as_deref(),
        )
    }

    pub fn tokenlist_path(&self) -> PathBuf {
        resolve_data_file(
            self.tokenlist_path.as_deref().unwrap_or("tokenlist.json"),
            self.data_dir.as_deref(),
        )
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_millis(self.receipt_timeout_ms)
    }

    pub fn block_poll_interval(&self) -> Duration {
        Duration::from_millis(self.block_poll_ms.max(250))
    }

    /// Parsed category overrides. Unknown category names are a config error.
    pub fn category_overrides(&self) -> Result<HashMap<Category, Vec<Address>>, AppError> {
        let Some(raw) = &self.categories else {
            return Ok(HashMap::new());
        };
        let mut out = HashMap::new();
        for (name, list) in raw {
            let category: Category = name.parse().map_err(AppError::Config)?;
            let addresses = parse_address_list(list, name).map_err(AppError::Config)?;
            if addresses.is_empty() {
                return Err(AppError::Config(format!("category {name} has no tokens")));
            }
            out.insert(category, addresses);
        }
        Ok(out)
    }
}
