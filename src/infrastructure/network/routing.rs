// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

//! Typed client for the swap-routing HTTP API.

use crate::common::constants::{
    ONEINCH_ONLY_IGNORED_AGGREGATORS, ONEINCH_ONLY_TOKENS, ROUTING_STRATEGY_ROUTER,
};
use crate::common::error::AppError;
use crate::common::parsing::{deserialize_one_or_many, deserialize_u256_lenient};
use crate::common::retry::{RetryPolicy, retry_async_if};
use crate::common::validation::RouteKey;
use crate::domain::types::{RouteQuote, RouteTransaction};
use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const RETRY_DELAY: Duration = Duration::from_millis(250);

#[async_trait]
pub trait RouteSource: Send + Sync {
    async fn route(&self, params: &RouteParams) -> Result<RouteData, AppError>;
    async fn quote(&self, params: &QuoteParams) -> Result<QuoteData, AppError>;
    async fn approval(&self, params: &ApproveParams) -> Result<ApproveData, AppError>;
    async fn balances(&self, params: &BalanceParams) -> Result<Vec<TokenBalance>, AppError>;
}

// ---------------------------------------------------------------------------
// Request parameters. Amounts are decimal strings on the wire.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteParams {
    pub from_address: Address,
    pub receiver: Address,
    pub spender: Address,
    pub chain_id: u64,
    pub amount_in: String,
    pub token_in: Address,
    pub token_out: Address,
    pub slippage: u64,
    pub routing_strategy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_aggregators: Option<String>,
}

impl RouteParams {
    /// Router-variant params; `None` when the key has no sender.
    pub fn for_key(key: &RouteKey) -> Option<Self> {
        let from = key.from_address?;
        Some(Self {
            from_address: from,
            receiver: from,
            spender: from,
            chain_id: key.chain_id,
            amount_in: key.amount_in.to_string(),
            token_in: key.token_in,
            token_out: key.token_out,
            slippage: key.slippage_bps,
            routing_strategy: ROUTING_STRATEGY_ROUTER.to_string(),
            ignore_aggregators: ignored_aggregators(key.token_in, key.token_out),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_address: Option<Address>,
    pub chain_id: u64,
    pub amount_in: String,
    pub token_in: Address,
    pub token_out: Address,
    pub routing_strategy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_aggregators: Option<String>,
}

impl QuoteParams {
    pub fn for_key(key: &RouteKey) -> Self {
        Self {
            from_address: key.from_address,
            chain_id: key.chain_id,
            amount_in: key.amount_in.to_string(),
            token_in: key.token_in,
            token_out: key.token_out,
            routing_strategy: ROUTING_STRATEGY_ROUTER.to_string(),
            ignore_aggregators: ignored_aggregators(key.token_in, key.token_out),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveParams {
    pub from_address: Address,
    pub token_address: Address,
    pub chain_id: u64,
    pub amount: String,
    pub routing_strategy: String,
}

impl ApproveParams {
    /// Approval of the key's input amount, used to learn the spender when a
    /// quote carries no calldata.
    pub fn for_key(key: &RouteKey) -> Option<Self> {
        Some(Self {
            from_address: key.from_address?,
            token_address: key.token_in,
            chain_id: key.chain_id,
            amount: key.amount_in.to_string(),
            routing_strategy: ROUTING_STRATEGY_ROUTER.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceParams {
    pub chain_id: u64,
    pub eoa_address: Address,
    pub use_eoa: bool,
}

fn ignored_aggregators(token_in: Address, token_out: Address) -> Option<String> {
    let oneinch_only =
        ONEINCH_ONLY_TOKENS.contains(&token_in) || ONEINCH_ONLY_TOKENS.contains(&token_out);
    oneinch_only.then(|| ONEINCH_ONLY_IGNORED_AGGREGATORS.to_string())
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteData {
    #[serde(default)]
    pub route: Vec<RouteStep>,
    #[serde(default, deserialize_with = "deserialize_u256_lenient")]
    pub gas: U256,
    #[serde(deserialize_with = "deserialize_u256_lenient")]
    pub amount_out: U256,
    #[serde(default, deserialize_with = "deserialize_f64_opt")]
    pub price_impact: Option<f64>,
    #[serde(default)]
    pub created_at: Option<u64>,
    pub tx: RouteTx,
    #[serde(default, deserialize_with = "deserialize_one_or_many")]
    pub fee_amount: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStep {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default, deserialize_with = "deserialize_one_or_many")]
    pub token_in: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_one_or_many")]
    pub token_out: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteTx {
    pub data: Bytes,
    pub to: Address,
    pub from: Address,
    #[serde(default, deserialize_with = "deserialize_u256_lenient")]
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteData {
    #[serde(deserialize_with = "deserialize_u256_lenient")]
    pub amount_out: U256,
    #[serde(default, deserialize_with = "deserialize_u256_lenient")]
    pub gas: U256,
    #[serde(default, deserialize_with = "deserialize_f64_opt")]
    pub price_impact: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApproveData {
    #[serde(deserialize_with = "deserialize_u256_lenient")]
    pub amount: U256,
    #[serde(default, deserialize_with = "deserialize_u256_lenient")]
    pub gas: U256,
    pub spender: Address,
    pub token: Address,
    pub tx: ApproveTx,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApproveTx {
    pub data: Bytes,
    pub from: Address,
    pub to: Address,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenBalance {
    #[serde(deserialize_with = "deserialize_u256_lenient")]
    pub amount: U256,
    pub decimals: u8,
    pub token: Address,
    #[serde(default, deserialize_with = "deserialize_f64_opt")]
    pub price: Option<f64>,
}

impl From<RouteData> for RouteQuote {
    fn from(data: RouteData) -> Self {
        RouteQuote {
            amount_out: data.amount_out,
            gas: data.gas,
            price_impact_bps: data.price_impact,
            tx: Some(RouteTransaction {
                to: data.tx.to,
                from: data.tx.from,
                data: data.tx.data,
                value: data.tx.value,
            }),
        }
    }
}

impl From<QuoteData> for RouteQuote {
    fn from(data: QuoteData) -> Self {
        RouteQuote {
            amount_out: data.amount_out,
            gas: data.gas,
            price_impact_bps: data.price_impact,
            tx: None,
        }
    }
}

fn deserialize_f64_opt<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum RequestError {
    Transport(String),
    Status(u16, String),
    Decode(String),
}

impl RequestError {
    fn is_transient(&self) -> bool {
        match self {
            RequestError::Transport(_) => true,
            RequestError::Status(code, _) => *code == 429 || *code >= 500,
            RequestError::Decode(_) => false,
        }
    }
}

impl From<RequestError> for AppError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Transport(msg) | RequestError::Decode(msg) => AppError::Api(msg),
            RequestError::Status(_, msg) => AppError::Api(msg),
        }
    }
}

#[derive(Clone)]
pub struct RoutingClient {
    client: Client,
    base_url: String,
    api_key: String,
    retries: usize,
}

impl RoutingClient {
    pub fn new(base_url: &str, api_key: &str, retries: usize) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Initialization(format!("HTTP client build failed: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            retries,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_once<Q, T>(&self, path: &str, query: &Q) -> Result<T, RequestError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .client
            .get(self.endpoint(path))
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RequestError::Status(
                status.as_u16(),
                error_message(status.as_u16(), &body),
            ));
        }
        resp.json::<T>()
            .await
            .map_err(|e| RequestError::Decode(format!("invalid {path} response: {e}")))
    }

    async fn get<Q, T>(&self, path: &str, query: &Q, retries: usize) -> Result<T, AppError>
    where
        Q: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let result = retry_async_if(
            |attempt| async move {
                if attempt > 1 {
                    tracing::debug!(target: "routing", path, attempt, "retrying request");
                }
                self.get_once(path, query).await
            },
            RetryPolicy::new(retries, RETRY_DELAY),
            RequestError::is_transient,
        )
        .await;
        result.map_err(|e| {
            tracing::warn!(target: "routing", path, error = ?e, "routing API request failed");
            AppError::from(e)
        })
    }
}

/// Prefer the API's own `message` field over the raw body.
fn error_message(status: u16, body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        v.get("message")
            .or_else(|| v.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    match parsed {
        Some(msg) if !msg.is_empty() => msg,
        _ if !body.trim().is_empty() => format!("{status}: {}", body.trim()),
        _ => format!("HTTP {status}"),
    }
}

#[async_trait]
impl RouteSource for RoutingClient {
    async fn route(&self, params: &RouteParams) -> Result<RouteData, AppError> {
        self.get("shortcuts/route", params, self.retries).await
    }

    async fn quote(&self, params: &QuoteParams) -> Result<QuoteData, AppError> {
        self.get("shortcuts/quote", params, self.retries).await
    }

    async fn approval(&self, params: &ApproveParams) -> Result<ApproveData, AppError> {
        self.get("wallet/approve", params, self.retries).await
    }

    async fn balances(&self, params: &BalanceParams) -> Result<Vec<TokenBalance>, AppError> {
        self.get("wallet/balances", params, 0).await
    }
}
