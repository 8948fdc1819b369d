// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use clap::{Parser, Subcommand};
use std::sync::{Arc, Mutex};
use swap_session::app::config::GlobalSettings;
use swap_session::app::logging::setup_logging;
use swap_session::common::constants::{NATIVE_TOKEN, usdc_for_chain};
use swap_session::common::units::{denormalize_str, format_significant};
use swap_session::common::validation::{ExecutionVariant, SwapInput};
use swap_session::data::erc20::Erc20Reader;
use swap_session::data::preference::PreferenceStore;
use swap_session::data::token_manager::TokenManager;
use swap_session::domain::error::AppError;
use swap_session::domain::types::{Category, ConnectorKind};
use swap_session::network::block_listener::BlockListener;
use swap_session::network::provider::{ConnectionFactory, HttpProvider};
use swap_session::network::routing::RoutingClient;
use swap_session::network::rpc_wallet::RpcWallet;
use swap_session::network::wallet::{TokenStateReader, WalletProvider};
use swap_session::session::orchestrator::BlockUpdate;
use swap_session::session::{
    LuckyPicker, Notifier, ProviderFactory, SessionContext, SwapAction, SwapOrchestrator,
    TxOutcome,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Upper bound on approve/switch/swap steps for one command.
const MAX_STEPS: usize = 4;

#[derive(Parser, Debug)]
#[command(author, version, about = "wallet session and swap lifecycle driver")]
struct Cli {
    /// Path to config file (default: config.{toml,yaml,...})
    #[arg(long, global = true)]
    config: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile the active account and print the session state
    Status,
    /// Flip EOA mode and rebuild the wallet context
    ToggleEoa,
    /// List holdings of the active account
    Positions,
    /// Swap into a random token of a category
    Lucky {
        #[arg(long)]
        category: Category,
        /// Human amount of the input token, e.g. "25.5"
        #[arg(long)]
        amount: String,
        /// Input token (default: USDC on the configured chain)
        #[arg(long)]
        token_in: Option<String>,
        /// Send transactions instead of only quoting
        #[arg(long, default_value_t = false)]
        execute: bool,
    },
    /// Move a position into another token
    Migrate {
        #[arg(long)]
        token_in: String,
        #[arg(long)]
        token_out: String,
        /// Human amount (default: full balance)
        #[arg(long)]
        amount: Option<String>,
        #[arg(long)]
        slippage_bps: Option<u64>,
        #[arg(long, default_value_t = false)]
        execute: bool,
    },
}

struct Runtime {
    settings: GlobalSettings,
    http: HttpProvider,
    blocks: broadcast::Sender<u64>,
    notifier: Notifier,
    /// Latest wallet built by the provider factory; it is also the signer.
    current_wallet: Arc<Mutex<Option<Arc<RpcWallet>>>>,
}

impl Runtime {
    fn signers(settings: &GlobalSettings) -> Result<Vec<(ConnectorKind, PrivateKeySigner)>, AppError> {
        settings.require_signing()?;
        let mut signers = vec![(
            ConnectorKind::Injected,
            RpcWallet::parse_key(&settings.wallet_key, "WALLET_KEY")?,
        )];
        if let Some(raw) = settings
            .embedded_wallet_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
        {
            signers.push((
                ConnectorKind::Embedded,
                RpcWallet::parse_key(raw, "EMBEDDED_WALLET_KEY")?,
            ));
        }
        Ok(signers)
    }

    fn factory(&self) -> Result<ProviderFactory, AppError> {
        let signers = Self::signers(&self.settings)?;
        let http = self.http.clone();
        let blocks = self.blocks.clone();
        let slot = self.current_wallet.clone();
        let chain_id = self.settings.chain_id;
        let poll = self.settings.receipt_poll_interval();
        let timeout = self.settings.receipt_timeout();
        Ok(Box::new(move |eoa_mode| {
            tracing::debug!(target: "reconciler", eoa_mode, "building wallet context");
            let wallet = Arc::new(RpcWallet::new(
                http.clone(),
                chain_id,
                signers.clone(),
                blocks.clone(),
                poll,
                timeout,
            ));
            *slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(wallet.clone());
            Ok(wallet as Arc<dyn WalletProvider>)
        }))
    }

    fn wallet(&self) -> Result<Arc<RpcWallet>, AppError> {
        self.current_wallet
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or_else(|| AppError::Initialization("wallet context not built".into()))
    }

    fn orchestrator(&self, tokens: Arc<TokenManager>) -> Result<SwapOrchestrator, AppError> {
        let routes = RoutingClient::new(
            &self.settings.routing_api_url,
            self.settings.require_routing_key()?,
            self.settings.route_retries,
        )?;
        Ok(SwapOrchestrator::new(
            Arc::new(routes),
            Arc::new(Erc20Reader::new(self.http.clone())),
            self.wallet()?,
            tokens,
            self.notifier.clone(),
            self.settings.chain_id,
            ExecutionVariant::Router,
        ))
    }
}

fn parse_token(raw: &str, field: &str) -> Result<Address, AppError> {
    raw.trim().parse().map_err(|_| AppError::Validation {
        field: field.to_string(),
        message: format!("{raw} is not an address"),
    })
}

/// Decimals for `token`, asking the chain when the token list does not know it.
async fn token_decimals(
    tokens: &TokenManager,
    reader: &Erc20Reader,
    chain_id: u64,
    token: Address,
) -> Result<u8, AppError> {
    if let Some(decimals) = tokens.decimals(chain_id, token) {
        return Ok(decimals);
    }
    let (symbol, decimals) = reader.metadata(token).await?;
    tokens.register(chain_id, token, &symbol, decimals);
    Ok(decimals)
}

fn print_decision(orchestrator: &SwapOrchestrator, session: &SessionContext) {
    if let Some(preview) = orchestrator.preview() {
        println!(
            "quote: {} in -> {} out (rate {}, impact {}, gas {})",
            format_significant(preview.amount_in, 6),
            preview.amount_out_display,
            format_significant(preview.rate, 6),
            preview
                .price_impact_pct
                .map(|p| format!("{p:.2}%"))
                .unwrap_or_else(|| "n/a".into()),
            preview.gas
        );
    }
    let decision = orchestrator.decision(session.active_account().as_ref());
    println!("decision: {:?}", decision.action);
    if decision.insufficient_balance {
        println!("warning: balance is below the input amount");
    }
    if decision.high_price_impact {
        println!("warning: high price impact");
    }
}

/// Quote, then walk the decision until the swap is sent or something blocks.
async fn run_swap(
    runtime: &Runtime,
    session: &SessionContext,
    orchestrator: &SwapOrchestrator,
    input: SwapInput,
    execute: bool,
) -> Result<(), AppError> {
    orchestrator
        .set_request(input)
        .map_err(|e| AppError::Validation {
            field: "swap".into(),
            message: e.to_string(),
        })?;
    orchestrator.refresh().await?;
    print_decision(orchestrator, session);
    if !execute {
        return Ok(());
    }

    let mut watch = orchestrator.allowance_watch(runtime.blocks.subscribe());
    for _ in 0..MAX_STEPS {
        let account = session.active_account();
        match orchestrator.decision(account.as_ref()).action {
            SwapAction::NeedsLogin => {
                return Err(AppError::Initialization("no active account".into()));
            }
            SwapAction::SwitchChain { required } => {
                let outcome = session.switch_chain(required).await?;
                tracing::info!(target: "reconciler", ?outcome, required, "chain switched");
            }
            SwapAction::Approve(intent) => {
                println!("{}", intent.title);
                match orchestrator.approve(account.as_ref()).await {
                    TxOutcome::Confirmed(_) => {
                        // Wait for a block if the confirmed allowance is not visible yet.
                        if let Some(w) = watch.as_mut()
                            && matches!(
                                orchestrator.decision(account.as_ref()).action,
                                SwapAction::Approve(_)
                            )
                            && let Some(BlockUpdate::ReadFailed) =
                                orchestrator.next_block_update(w).await
                        {
                            tracing::warn!(target: "allowance", "allowance re-read failed");
                        }
                    }
                    other => {
                        println!("approval: {other:?}");
                        return Ok(());
                    }
                }
            }
            SwapAction::Swap => {
                let outcome = orchestrator.swap(account.as_ref()).await;
                println!("swap: {outcome:?}");
                return Ok(());
            }
            SwapAction::Blocked(reason) => {
                println!("blocked: {reason:?}");
                return Ok(());
            }
        }
    }
    tracing::warn!(target: "orchestrator", steps = MAX_STEPS, "gave up before the swap was sent");
    Ok(())
}

async fn positions(
    runtime: &Runtime,
    session: &SessionContext,
    tokens: Arc<TokenManager>,
) -> Result<(), AppError> {
    let active = session
        .active_account()
        .ok_or_else(|| AppError::Initialization("no active account".into()))?;
    let orchestrator = runtime.orchestrator(tokens)?;
    for p in orchestrator.positions(active.address, session.eoa_mode()).await? {
        println!(
            "{:>12} {:<10} {}",
            format_significant(p.normalized, 6),
            p.symbol,
            p.value_usd.map(|v| format!("${v:.2}")).unwrap_or_default()
        );
    }
    Ok(())
}

async fn lucky(
    runtime: &Runtime,
    session: &SessionContext,
    tokens: Arc<TokenManager>,
    category: Category,
    amount: &str,
    token_in: Option<&str>,
    execute: bool,
) -> Result<(), AppError> {
    let chain_id = runtime.settings.chain_id;
    let token_in = match token_in {
        Some(raw) => parse_token(raw, "token_in")?,
        None => usdc_for_chain(chain_id).ok_or_else(|| {
            AppError::Config(format!("no default input token for chain {chain_id}"))
        })?,
    };
    let token_out = {
        let mut picker =
            LuckyPicker::new(rand::thread_rng(), runtime.settings.category_overrides()?);
        picker.pick(category)
    }
    .ok_or_else(|| AppError::Config(format!("category {category} has no tokens")))?;
    println!("lucky {category}: {token_out:#x}");

    let decimals = if token_in == NATIVE_TOKEN {
        18
    } else {
        let reader = Erc20Reader::new(runtime.http.clone());
        token_decimals(&tokens, &reader, chain_id, token_in).await?
    };
    let slippage_bps = runtime.settings.lucky_slippage_bps;
    let orchestrator = runtime.orchestrator(tokens)?;
    let input = SwapInput {
        token_in: format!("{token_in:#x}"),
        token_out: format!("{token_out:#x}"),
        amount_in: denormalize_str(amount, decimals)?,
        chain_id,
        slippage_bps,
        from_address: session.active_account().map(|a| a.address),
    };
    run_swap(runtime, session, &orchestrator, input, execute).await
}

async fn migrate(
    runtime: &Runtime,
    session: &SessionContext,
    tokens: Arc<TokenManager>,
    token_in: &str,
    token_out: String,
    amount: Option<&str>,
    slippage_bps: Option<u64>,
    execute: bool,
) -> Result<(), AppError> {
    let chain_id = runtime.settings.chain_id;
    let token_in = parse_token(token_in, "token_in")?;
    let owner = session.active_account().map(|a| a.address);
    let reader = Erc20Reader::new(runtime.http.clone());
    let amount_in = match (amount, owner) {
        (Some(raw), _) => {
            let decimals = token_decimals(&tokens, &reader, chain_id, token_in).await?;
            denormalize_str(raw, decimals)?
        }
        (None, Some(owner)) => reader.balance_of(token_in, owner).await?,
        // Rejected by validation as a zero amount.
        (None, None) => U256::ZERO,
    };
    let slippage_bps = slippage_bps.unwrap_or(runtime.settings.slippage_bps);
    let orchestrator = runtime.orchestrator(tokens)?;
    let input = SwapInput {
        token_in: format!("{token_in:#x}"),
        token_out,
        amount_in,
        chain_id,
        slippage_bps,
        from_address: owner,
    };
    run_swap(runtime, session, &orchestrator, input, execute).await
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let settings = GlobalSettings::load_with_path(cli.config.as_deref())?;
    setup_logging(
        if settings.debug { "debug" } else { "info" },
        cli.json_logs || settings.log_json,
    );

    let http = ConnectionFactory::http(&settings.http_provider_url()?)?;
    let ws = match settings.websocket_provider_url() {
        Some(url) => match ConnectionFactory::ws(&url).await {
            Ok(ws) => Some(ws),
            Err(e) => {
                tracing::warn!(target: "blocks", error = %e, "WS unavailable; polling block numbers");
                None
            }
        },
        None => None,
    };

    let (blocks, _) = broadcast::channel(64);
    let shutdown = CancellationToken::new();
    let listener = BlockListener::new(
        http.clone(),
        ws,
        blocks.clone(),
        settings.block_poll_interval(),
        shutdown.clone(),
    );
    let listener_task = tokio::spawn(listener.run());

    let (notifier, mut notifications) = Notifier::channel();
    let printer = tokio::spawn(async move {
        while let Some(n) = notifications.recv().await {
            println!("[{}] {}", n.severity, n.message);
        }
    });

    let runtime = Runtime {
        http: http.clone(),
        notifier,
        blocks,
        current_wallet: Arc::new(Mutex::new(None)),
        settings,
    };
    let mut session = SessionContext::start(
        PreferenceStore::new(runtime.settings.preferences_path()),
        runtime.factory()?,
    )?;
    let reconciled = session.reconcile().await;
    tracing::info!(target: "reconciler", outcome = ?reconciled, "initial reconciliation");

    let tokens = Arc::new(TokenManager::load_or_defaults(&runtime.settings.tokenlist_path())?);

    let result = match cli.command {
        Command::Status => {
            println!("eoa mode: {}", session.eoa_mode());
            for wallet in session.wallets() {
                println!("wallet: {:#x} via {}", wallet.address, wallet.connector);
            }
            match session.active_account() {
                Some(active) => println!(
                    "active: {:#x} on chain {}",
                    active.address,
                    active.chain_id.map(|c| c.to_string()).unwrap_or_else(|| "?".into())
                ),
                None => println!("active: none"),
            }
            Ok(())
        }
        Command::ToggleEoa => session.toggle_eoa_mode().await.map(|outcome| {
            println!("eoa mode: {} ({outcome:?})", session.eoa_mode());
        }),
        Command::Positions => positions(&runtime, &session, tokens).await,
        Command::Lucky {
            category,
            amount,
            token_in,
            execute,
        } => lucky(&runtime, &session, tokens, category, &amount, token_in.as_deref(), execute).await,
        Command::Migrate {
            token_in,
            token_out,
            amount,
            slippage_bps,
            execute,
        } => {
            migrate(
                &runtime,
                &session,
                tokens,
                &token_in,
                token_out,
                amount.as_deref(),
                slippage_bps,
                execute,
            )
            .await
        }
    };

    shutdown.cancel();
    drop(runtime);
    let _ = printer.await;
    match listener_task.await {
        Ok(Err(e)) => tracing::warn!(target: "blocks", error = %e, "block listener stopped"),
        Err(e) => tracing::warn!(target: "blocks", error = %e, "block listener task failed"),
        Ok(Ok(())) => {}
    }
    result
}
