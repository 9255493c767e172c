//! Broker adapter seam
//!
//! The strategy talks to the broker through this minimal contract so the
//! same state machine drives live trading and broker-less replays.

use anyhow::Result;
use async_trait::async_trait;

/// Minimal order-routing contract the strategy depends on
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    /// Submit a market order for `quantity` contracts.
    ///
    /// Returns `Ok(true)` when the order was accepted, `Ok(false)` when it
    /// was rejected or could not be delivered (the strategy must then treat
    /// the position as not opened).
    async fn enter_position(&self, quantity: i32, is_long: bool) -> Result<bool>;

    /// Net position as reported by the broker (positive = long)
    async fn net_position(&self) -> Result<i32>;
}

/// Broker that fills everything and holds nothing; used for replays and tests
#[derive(Debug, Default)]
pub struct NoopBroker;

#[async_trait]
impl BrokerAdapter for NoopBroker {
    async fn enter_position(&self, _quantity: i32, _is_long: bool) -> Result<bool> {
        Ok(true)
    }

    async fn net_position(&self) -> Result<i32> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_broker_always_fills_and_stays_flat() {
        let broker = NoopBroker;
        assert!(broker.enter_position(1, true).await.unwrap());
        assert!(broker.enter_position(3, false).await.unwrap());
        assert_eq!(broker.net_position().await.unwrap(), 0);
    }
}
