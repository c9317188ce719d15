//! Client for the third-party order API.
//!
//! Two form-encoded calls against a single endpoint: `get_token` exchanges the
//! API key for a session token, `put_order` submits an order as a JSON `data`
//! field. Tokens are cached for `relay.token_ttl_secs`.

pub mod response;

use chrono::{DateTime, Duration, Utc};
use orderdesk_core::config::RelayConfig;
use orderdesk_core::domain::order::{ForwardingReceipt, Order};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use self::response::{body_excerpt, parse_reply, RelayReply};

const DETAIL_LIMIT: usize = 500;
const ACCEPTED_MESSAGE: &str = "Pedido enviado correctamente";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("order relay is disabled")]
    Disabled,
    #[error("order relay request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("order relay returned HTTP {status}")]
    HttpStatus { status: u16, detail: String },
    #[error("order relay reply could not be parsed")]
    Unparseable { detail: String },
    #[error("order relay refused the token request: {message}")]
    TokenRejected { message: String },
    #[error("order relay rejected the order: {message}")]
    OrderRejected { message: String, detail: RelayReply },
    #[error("order payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RelayError {
    /// Reply text worth showing next to the error message, if any.
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::HttpStatus { detail, .. } | Self::Unparseable { detail } => Some(detail.clone()),
            Self::OrderRejected { detail, .. } => serde_json::to_string(detail).ok(),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RelaySettings {
    pub endpoint: String,
    pub api_key: SecretString,
    pub dealer: String,
    pub token_ttl: Duration,
    pub timeout: std::time::Duration,
}

impl RelaySettings {
    /// `None` when the relay is switched off or incompletely configured.
    pub fn from_config(config: &RelayConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        Some(Self {
            endpoint: config.endpoint.clone()?,
            api_key: config.api_key.clone()?,
            dealer: config.dealer.clone(),
            token_ttl: Duration::seconds(i64::try_from(config.token_ttl_secs).ok()?),
            timeout: std::time::Duration::from_secs(config.timeout_secs),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenCache {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenCache {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && now < self.expires_at
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PayloadLine {
    pub products_code: String,
    pub units: u64,
    pub description: String,
}

/// The `data` document of a `put_order` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderPayload {
    pub customers_code: String,
    pub customers_name: String,
    pub date_order: i64,
    pub customers_order_code: String,
    pub user: String,
    pub user_code: String,
    pub agent: String,
    pub agent_code: String,
    pub salesman_code: String,
    pub notes: String,
    pub lines: Vec<PayloadLine>,
}

impl OrderPayload {
    pub fn from_order(order: &Order) -> Self {
        let zone = order.zone.clone();
        let (name, _) = order.display_customer();

        Self {
            customers_code: order.customer.code.clone(),
            customers_name: name.to_string(),
            date_order: order.created_at.timestamp(),
            customers_order_code: order.id.0.clone(),
            user: zone.clone(),
            user_code: zone.clone(),
            agent: zone.clone(),
            agent_code: zone.clone(),
            salesman_code: zone,
            notes: order_notes(order),
            lines: order
                .lines
                .iter()
                .map(|line| PayloadLine {
                    products_code: line.code.0.clone(),
                    units: line.quantity,
                    description: line.name.clone(),
                })
                .collect(),
        }
    }
}

pub fn order_notes(order: &Order) -> String {
    let mut notes = format!("Pedido Betrés ON #{} | Zona: {}", order.id, order.zone);
    if let Some(comments) = order.notes.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        notes.push_str(" | Comentarios: ");
        notes.push_str(comments);
    }
    notes
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    Accepted(ForwardingReceipt),
    /// The upstream flagged problems but still registered the order under a code.
    AcceptedWithWarnings(ForwardingReceipt),
}

impl RelayOutcome {
    pub fn receipt(&self) -> &ForwardingReceipt {
        match self {
            Self::Accepted(receipt) | Self::AcceptedWithWarnings(receipt) => receipt,
        }
    }

    pub fn into_receipt(self) -> ForwardingReceipt {
        match self {
            Self::Accepted(receipt) | Self::AcceptedWithWarnings(receipt) => receipt,
        }
    }

    pub fn has_warnings(&self) -> bool {
        matches!(self, Self::AcceptedWithWarnings(_))
    }
}

fn is_partial_warning(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("no encontrado") || lowered.contains("error")
}

/// Maps a `put_order` reply to an outcome.
pub fn classify_order_reply(
    reply: RelayReply,
    now: DateTime<Utc>,
) -> Result<RelayOutcome, RelayError> {
    let receipt = |reply: &RelayReply| ForwardingReceipt {
        external_code: reply.code.clone(),
        external_total: reply.total.clone(),
        message: if reply.message.is_empty() {
            ACCEPTED_MESSAGE.to_string()
        } else {
            reply.message.clone()
        },
        forwarded_at: now,
    };

    if reply.is_success() {
        return Ok(RelayOutcome::Accepted(receipt(&reply)));
    }

    // A warning only means the order exists when the relay assigned it a code.
    if !reply.code.is_empty() && is_partial_warning(&reply.message) {
        return Ok(RelayOutcome::AcceptedWithWarnings(receipt(&reply)));
    }

    let message =
        if reply.message.is_empty() { "order relay error".to_string() } else { reply.message.clone() };
    Err(RelayError::OrderRejected { message, detail: reply })
}

pub struct OrderRelayClient {
    client: Client,
    settings: RelaySettings,
    cache: Mutex<Option<TokenCache>>,
}

impl OrderRelayClient {
    pub fn new(settings: RelaySettings) -> Result<Self, RelayError> {
        let client =
            Client::builder().timeout(settings.timeout).build().map_err(RelayError::Transport)?;
        Ok(Self { client, settings, cache: Mutex::new(None) })
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Cached token, requesting a new one when absent or expired.
    pub async fn token(&self) -> Result<String, RelayError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref().filter(|cached| cached.is_valid(Utc::now())) {
            return Ok(cached.token.clone());
        }

        let fresh = self.request_token().await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    /// Drops the cached token and requests a new one.
    pub async fn refresh(&self) -> Result<String, RelayError> {
        self.cache.lock().await.take();
        self.token().await
    }

    async fn request_token(&self) -> Result<TokenCache, RelayError> {
        let response = self
            .client
            .post(&self.settings.endpoint)
            .form(&[("apikey", self.settings.api_key.expose_secret()), ("action", "get_token")])
            .send()
            .await
            .map_err(RelayError::Transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(RelayError::Transport)?;
        if !status.is_success() {
            return Err(RelayError::HttpStatus {
                status: status.as_u16(),
                detail: body_excerpt(&body, DETAIL_LIMIT),
            });
        }

        let reply = parse_reply(&body)
            .ok_or_else(|| RelayError::Unparseable { detail: body_excerpt(&body, DETAIL_LIMIT) })?;
        let token = match reply.token {
            Some(token) if reply.result == "1" => token,
            _ => {
                let message = if reply.message.is_empty() {
                    "token request was not accepted".to_string()
                } else {
                    reply.message
                };
                return Err(RelayError::TokenRejected { message });
            }
        };

        let now = Utc::now();
        info!(
            event_name = "relay.token.refreshed",
            ttl_secs = self.settings.token_ttl.num_seconds(),
            "order relay token refreshed"
        );
        Ok(TokenCache { token, expires_at: now + self.settings.token_ttl })
    }

    /// Submits an order. The reply is parsed regardless of HTTP status because
    /// the upstream reports business errors with non-2xx codes.
    pub async fn forward(&self, order: &Order) -> Result<RelayOutcome, RelayError> {
        let token = self.token().await?;
        let data = serde_json::to_string(&OrderPayload::from_order(order))?;

        let response = self
            .client
            .post(&self.settings.endpoint)
            .form(&[
                ("token", token.as_str()),
                ("action", "put_order"),
                ("dealer", self.settings.dealer.as_str()),
                ("user", order.zone.as_str()),
                ("data", data.as_str()),
            ])
            .send()
            .await
            .map_err(RelayError::Transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(RelayError::Transport)?;
        let Some(reply) = parse_reply(&body) else {
            let detail = body_excerpt(&body, DETAIL_LIMIT);
            return Err(if status.is_success() {
                RelayError::Unparseable { detail }
            } else {
                RelayError::HttpStatus { status: status.as_u16(), detail }
            });
        };

        let outcome = classify_order_reply(reply, Utc::now());
        match &outcome {
            Ok(accepted) => info!(
                event_name = "relay.order.forwarded",
                order_id = %order.id,
                external_code = %accepted.receipt().external_code,
                with_warnings = accepted.has_warnings(),
                "order forwarded"
            ),
            Err(error) => warn!(
                event_name = "relay.order.rejected",
                order_id = %order.id,
                error = %error,
                "order relay rejected order"
            ),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use orderdesk_core::config::AppConfig;
    use orderdesk_core::domain::customer::CustomerDetails;
    use orderdesk_core::domain::order::{Order, OrderId, OrderLine, OrderStatus, OrderTotals};
    use orderdesk_core::domain::product::ProductCode;
    use rust_decimal::Decimal;

    use super::response::RelayReply;
    use super::{
        classify_order_reply, order_notes, OrderPayload, RelayError, RelayOutcome, RelaySettings,
        TokenCache,
    };

    fn order(notes: Option<&str>) -> Order {
        Order {
            id: OrderId("ORD-20240610-ab12cd34".to_string()),
            status: OrderStatus::Submitted,
            customer: CustomerDetails::new("FARM001"),
            zone: "MURCIA".to_string(),
            notes: notes.map(str::to_string),
            lines: vec![OrderLine {
                code: ProductCode::from("GEL-ALOE"),
                name: "Gel aloe vera 750ml".to_string(),
                quantity: 48,
                list_price: Decimal::new(148, 2),
                unit_price: Decimal::new(139, 2),
                subtotal: Decimal::new(6672, 2),
                savings: Decimal::new(432, 2),
                tiered: true,
                two_for_one: false,
            }],
            totals: OrderTotals::default(),
            created_at: Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).single().expect("valid date"),
            forwarding: None,
        }
    }

    fn reply(result: &str, code: &str, message: &str) -> RelayReply {
        RelayReply {
            result: result.to_string(),
            token: None,
            code: code.to_string(),
            total: "80.73".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn payload_uses_zone_for_every_agent_field() {
        let payload = OrderPayload::from_order(&order(Some("  entregar lunes ")));

        assert_eq!(payload.customers_name, "FARM001");
        assert_eq!(payload.date_order, 1_718_006_400);
        assert_eq!(payload.customers_order_code, "ORD-20240610-ab12cd34");
        let agent_fields = [
            &payload.user,
            &payload.user_code,
            &payload.agent,
            &payload.agent_code,
            &payload.salesman_code,
        ];
        for field in agent_fields {
            assert_eq!(field, "MURCIA");
        }
        assert_eq!(
            payload.notes,
            "Pedido Betrés ON #ORD-20240610-ab12cd34 | Zona: MURCIA | Comentarios: entregar lunes"
        );
        assert_eq!(payload.lines[0].products_code, "GEL-ALOE");
        assert_eq!(payload.lines[0].units, 48);
        assert_eq!(payload.lines[0].description, "Gel aloe vera 750ml");
    }

    #[test]
    fn notes_omit_empty_comments() {
        let expected = "Pedido Betrés ON #ORD-20240610-ab12cd34 | Zona: MURCIA";
        assert_eq!(order_notes(&order(Some("   "))), expected);
        assert_eq!(order_notes(&order(None)), expected);
    }

    #[test]
    fn successful_reply_is_accepted_with_default_message() {
        let outcome = classify_order_reply(reply("1", "P-1", ""), Utc::now()).expect("accepted");
        assert!(!outcome.has_warnings());
        assert_eq!(outcome.receipt().external_code, "P-1");
        assert_eq!(outcome.receipt().message, "Pedido enviado correctamente");
    }

    #[test]
    fn partial_warning_with_code_is_accepted() {
        let outcome =
            classify_order_reply(reply("0", "P-2", "Artículo X NO ENCONTRADO"), Utc::now())
                .expect("accepted with warnings");
        assert!(matches!(outcome, RelayOutcome::AcceptedWithWarnings(_)));
        assert_eq!(outcome.into_receipt().message, "Artículo X NO ENCONTRADO");
    }

    #[test]
    fn partial_warning_without_code_is_rejected() {
        let error = classify_order_reply(reply("0", "", "Artículo X NO ENCONTRADO"), Utc::now())
            .expect_err("no order was created");
        assert!(matches!(error, RelayError::OrderRejected { .. }));
    }

    #[test]
    fn failure_without_code_is_rejected() {
        let error = classify_order_reply(reply("0", "", "Error de cliente"), Utc::now())
            .expect_err("rejected");
        match error {
            RelayError::OrderRejected { message, .. } => assert_eq!(message, "Error de cliente"),
            other => panic!("unexpected error: {other}"),
        }

        let error = classify_order_reply(reply("0", "P-3", "cliente bloqueado"), Utc::now())
            .expect_err("rejected");
        assert!(matches!(error, RelayError::OrderRejected { .. }));
    }

    #[test]
    fn token_cache_expires() {
        let now = Utc::now();
        let cache = TokenCache { token: "tok".to_string(), expires_at: now + Duration::seconds(10) };
        assert!(cache.is_valid(now));
        assert!(!cache.is_valid(now + Duration::seconds(10)));
        assert!(!TokenCache { token: String::new(), ..cache }.is_valid(now));
    }

    #[test]
    fn settings_require_enabled_and_complete_config() {
        let mut config = AppConfig::default().relay;
        assert!(RelaySettings::from_config(&config).is_none());

        config.enabled = true;
        config.endpoint = Some("http://127.0.0.1:9/api".to_string());
        assert!(RelaySettings::from_config(&config).is_none());

        config.api_key = Some("key".to_string().into());
        let settings = RelaySettings::from_config(&config).expect("settings");
        assert_eq!(settings.dealer, "BET");
        assert_eq!(settings.token_ttl, Duration::seconds(12_600));
    }
}
