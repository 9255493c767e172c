//! Shared types for the webhook server

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::dispatcher::BarDispatcher;

/// One OHLC bar as delivered to the webhook
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Shared application state behind the HTTP handlers
///
/// The dispatcher mutex serializes bars end-to-end: the persistence snapshot
/// of update N happens-before bar N+1 is accepted.
pub struct AppState {
    pub dispatcher: Mutex<BarDispatcher>,
}

impl AppState {
    pub fn new(dispatcher: BarDispatcher) -> Self {
        Self {
            dispatcher: Mutex::new(dispatcher),
        }
    }
}
