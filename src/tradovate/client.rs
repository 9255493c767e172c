//! Tradovate API client
//!
//! HTTP client for the Tradovate REST API with token-based authentication.
//! The token lives in a `TokenManager` that refreshes it on a timer; the
//! `TradovateBroker` reads it through the manager's guarded accessor.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::models::*;
use crate::broker::BrokerAdapter;

/// Configuration for the Tradovate connection, read from the environment
#[derive(Debug, Clone)]
pub struct TradovateConfig {
    pub api_url: String,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub cid: i32,
    pub secret: String,
}

impl TradovateConfig {
    /// Read the connection settings from environment variables
    ///
    /// Expects `TRADOVATE_API_URL`, `TRADOVATE_USERNAME`, `TRADOVATE_PASSWORD`,
    /// `TRADOVATE_CLIENT_ID`, `TRADOVATE_CID` and `TRADOVATE_SECRET`.
    pub fn from_env() -> Result<Self> {
        let var = |key: &str| {
            std::env::var(key).with_context(|| format!("{key} environment variable not set"))
        };
        Ok(Self {
            api_url: var("TRADOVATE_API_URL")?,
            username: var("TRADOVATE_USERNAME")?,
            password: var("TRADOVATE_PASSWORD")?,
            client_id: var("TRADOVATE_CLIENT_ID")?,
            cid: var("TRADOVATE_CID")?
                .parse::<i32>()
                .context("TRADOVATE_CID must be a valid integer")?,
            secret: var("TRADOVATE_SECRET")?,
        })
    }
}

fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")
}

/// Owns the access token and renews it on a periodic timer.
///
/// All readers go through [`TokenManager::token`]; only the refresh task
/// mutates the value.
pub struct TokenManager {
    client: Client,
    config: TradovateConfig,
    token: RwLock<Option<String>>,
    refresh_interval: Duration,
}

impl TokenManager {
    pub fn new(config: TradovateConfig, refresh_interval: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            config,
            token: RwLock::new(None),
            refresh_interval,
        })
    }

    /// Fetch the initial token and spawn the periodic refresh task
    pub async fn start(self: Arc<Self>) -> Result<()> {
        self.authenticate().await?;

        let manager = Arc::clone(&self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.refresh_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                if let Err(e) = manager.renew().await {
                    // Keep the current token; the next tick retries
                    error!("token renewal failed: {e:#}");
                }
            }
        });
        Ok(())
    }

    /// Current access token; errors until `start` has succeeded once
    pub async fn token(&self) -> Result<String> {
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| anyhow!("not authenticated - no access token available"))
    }

    /// Request a fresh token with full credentials
    pub async fn authenticate(&self) -> Result<()> {
        info!("authenticating with Tradovate at {}", self.config.api_url);

        let request = AuthRequest {
            name: self.config.username.clone(),
            password: self.config.password.clone(),
            app_id: self.config.client_id.clone(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            cid: self.config.cid,
            sec: self.config.secret.clone(),
        };

        let response = self
            .client
            .post(format!("{}/auth/accesstokenrequest", self.config.api_url))
            .json(&request)
            .send()
            .await
            .context("failed to send authentication request")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("authentication failed with status {status}: {body}"));
        }

        let auth: AuthResponse =
            serde_json::from_str(&body).context("failed to parse authentication response")?;
        if let Some(error) = auth.error_text {
            return Err(anyhow!("authentication failed: {error}"));
        }
        if auth.p_ticket.is_some() {
            return Err(anyhow!(
                "authentication requires additional verification (P-Ticket); \
                 complete it through the Tradovate web interface first"
            ));
        }
        let token = auth
            .access_token
            .ok_or_else(|| anyhow!("no access token returned"))?;

        *self.token.write().await = Some(token);
        info!("successfully authenticated with Tradovate");
        Ok(())
    }

    /// Renew the current token; falls back to full re-authentication
    pub async fn renew(&self) -> Result<()> {
        let current = self.token().await?;
        debug!("renewing Tradovate access token");

        let response = self
            .client
            .get(format!("{}/auth/renewaccesstoken", self.config.api_url))
            .bearer_auth(&current)
            .send()
            .await
            .context("failed to send token renewal request")?;

        if !response.status().is_success() {
            warn!("token renewal rejected, attempting full re-authentication");
            return self.authenticate().await;
        }

        let auth: AuthResponse = response
            .json()
            .await
            .context("failed to parse renewal response")?;
        match auth.access_token {
            Some(token) => {
                *self.token.write().await = Some(token);
                debug!("token renewed");
                Ok(())
            }
            None => self.authenticate().await,
        }
    }
}

/// Broker adapter backed by the Tradovate REST API
///
/// The account id is resolved lazily on first use and cached for the life of
/// the process.
pub struct TradovateBroker {
    client: Client,
    api_url: String,
    username: String,
    symbol: String,
    tokens: Arc<TokenManager>,
    account_id: RwLock<Option<i64>>,
}

impl TradovateBroker {
    pub fn new(config: &TradovateConfig, tokens: Arc<TokenManager>, symbol: String) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_url: config.api_url.clone(),
            username: config.username.clone(),
            symbol,
            tokens,
            account_id: RwLock::new(None),
        })
    }

    /// Resolve and cache the trading account id. An empty account list is a
    /// hard error: nothing can be traded without it.
    async fn ensure_account_id(&self) -> Result<i64> {
        if let Some(id) = *self.account_id.read().await {
            return Ok(id);
        }

        let token = self.tokens.token().await?;
        debug!("resolving account id for symbol {}", self.symbol);
        let accounts: Vec<Account> = self
            .client
            .get(format!("{}/account/list", self.api_url))
            .query(&[("name", self.symbol.as_str())])
            .bearer_auth(&token)
            .send()
            .await
            .context("failed to request account list")?
            .error_for_status()
            .context("account list request rejected")?
            .json()
            .await
            .context("failed to parse account list")?;

        let account = accounts
            .first()
            .ok_or_else(|| anyhow!("no Tradovate accounts available"))?;
        info!("using Tradovate account {} (id {})", account.name, account.id);

        *self.account_id.write().await = Some(account.id);
        Ok(account.id)
    }
}

#[async_trait]
impl BrokerAdapter for TradovateBroker {
    async fn enter_position(&self, quantity: i32, is_long: bool) -> Result<bool> {
        let account_id = self.ensure_account_id().await?;
        let token = self.tokens.token().await?;

        let action = if is_long {
            OrderAction::Buy
        } else {
            OrderAction::Sell
        };
        let order = PlaceOrderRequest {
            account_spec: self.username.clone(),
            account_id,
            action,
            symbol: self.symbol.clone(),
            order_qty: quantity,
            order_type: "Market".to_string(),
            is_automated: true,
        };

        info!("placing market order: {} {} {}", action, quantity, self.symbol);
        let result = self
            .client
            .post(format!("{}/order/placeorder", self.api_url))
            .bearer_auth(&token)
            .json(&order)
            .send()
            .await;

        // A transient transport failure means the order is treated as not
        // filled; the strategy must not book the position.
        let response = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("order placement failed: {e:#}");
                return Ok(false);
            }
        };
        if !response.status().is_success() {
            warn!("order rejected with status {}", response.status());
            return Ok(false);
        }

        let placed: PlaceOrderResponse = response
            .json()
            .await
            .context("failed to parse order placement response")?;
        if let Some(error) = placed.error_text {
            warn!("order rejected: {error}");
            return Ok(false);
        }

        info!("{} order placed: id {:?}", action, placed.order_id);
        Ok(true)
    }

    async fn net_position(&self) -> Result<i32> {
        let account_id = self.ensure_account_id().await?;
        let token = self.tokens.token().await?;

        let positions: Vec<Position> = self
            .client
            .get(format!("{}/position/list", self.api_url))
            .bearer_auth(&token)
            .send()
            .await
            .context("failed to request position list")?
            .error_for_status()
            .context("position list request rejected")?
            .json()
            .await
            .context("failed to parse position list")?;

        let net = positions
            .iter()
            .filter(|p| p.account_id == account_id)
            .map(|p| p.net_pos)
            .sum();
        debug!("net position for account {account_id}: {net}");
        Ok(net)
    }
}
