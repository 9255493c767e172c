//! Tradovate API data models
//!
//! Request and response types for the subset of the Tradovate REST API the
//! engine consumes.

use serde::{Deserialize, Serialize};

/// Request body for authentication via access token request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    /// Account username
    pub name: String,
    /// Account password
    pub password: String,
    /// Application identifier (client id)
    pub app_id: String,
    /// Application version
    pub app_version: String,
    /// Client ID from API access settings
    pub cid: i32,
    /// Client secret from API access settings
    pub sec: String,
}

/// Response from the authentication and renewal endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Access token for API calls
    #[serde(default)]
    pub access_token: Option<String>,
    /// Token expiration time
    #[serde(default)]
    pub expiration_time: Option<String>,
    /// Error text if authentication failed
    #[serde(default)]
    pub error_text: Option<String>,
    /// P-Ticket for additional security challenges
    #[serde(rename = "p-ticket", default)]
    pub p_ticket: Option<String>,
}

/// Account information
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account ID (used for order placement)
    pub id: i64,
    /// Account name/spec
    pub name: String,
    /// Whether the account is active
    #[serde(default)]
    pub active: bool,
}

/// Order action (Buy or Sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAction {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderAction::Buy => write!(f, "Buy"),
            OrderAction::Sell => write!(f, "Sell"),
        }
    }
}

/// Request to place a market order
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    /// Account spec (account name)
    pub account_spec: String,
    /// Account ID
    pub account_id: i64,
    /// Buy or Sell
    pub action: OrderAction,
    /// Contract symbol (e.g. "ESM5")
    pub symbol: String,
    /// Quantity (number of contracts)
    pub order_qty: i32,
    /// Always "Market" for this engine
    pub order_type: String,
    /// REQUIRED for CME compliance on automated flows
    pub is_automated: bool,
}

/// Response from order placement
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    /// Order ID on success
    #[serde(default)]
    pub order_id: Option<i64>,
    /// Error text when the order was rejected
    #[serde(default)]
    pub error_text: Option<String>,
}

/// Position information
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Position ID
    pub id: i64,
    /// Account ID
    pub account_id: i64,
    /// Net position (positive = long, negative = short)
    #[serde(default)]
    pub net_pos: i32,
    /// Average entry price
    #[serde(default)]
    pub net_price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_request_serializes_camel_case() {
        let request = PlaceOrderRequest {
            account_spec: "trader1".to_string(),
            account_id: 42,
            action: OrderAction::Buy,
            symbol: "ESM5".to_string(),
            order_qty: 1,
            order_type: "Market".to_string(),
            is_automated: true,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["accountSpec"], "trader1");
        assert_eq!(value["accountId"], 42);
        assert_eq!(value["action"], "Buy");
        assert_eq!(value["orderQty"], 1);
        assert_eq!(value["orderType"], "Market");
        assert_eq!(value["isAutomated"], true);
    }

    #[test]
    fn auth_response_tolerates_missing_fields() {
        let response: AuthResponse = serde_json::from_str(r#"{"accessToken": "abc"}"#).unwrap();
        assert_eq!(response.access_token.as_deref(), Some("abc"));
        assert!(response.error_text.is_none());
        assert!(response.p_ticket.is_none());
    }

    #[test]
    fn position_deserializes_net_pos() {
        let position: Position =
            serde_json::from_str(r#"{"id": 1, "accountId": 42, "netPos": -2, "netPrice": 5100.25}"#)
                .unwrap();
        assert_eq!(position.net_pos, -2);
        assert_eq!(position.account_id, 42);
    }

    #[test]
    fn order_action_display() {
        assert_eq!(format!("{}", OrderAction::Buy), "Buy");
        assert_eq!(format!("{}", OrderAction::Sell), "Sell");
    }
}
