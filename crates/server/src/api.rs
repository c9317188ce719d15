//! JSON API: catalog, pricing preview, orders and forwarding.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use orderdesk_core::domain::order::{Order, OrderId, OrderStatistics, OrderStatus};
use orderdesk_core::pricing::{
    CategoryKey, DeterministicPricingEngine, PriceTier, PricedOrder, PricingEngine,
};
use orderdesk_core::{
    validate_submission, ApplicationError, Catalog, CustomerDetails, InterfaceError, Product,
    Selection, SubmissionViolation,
};
use orderdesk_db::{OrderRepository, ProductRepository, RepositoryError};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::relay::{OrderRelayClient, RelayError, RelayOutcome};

const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 500;

/// Where the price list comes from.
#[derive(Clone)]
pub enum CatalogSource {
    /// Loaded once from the configured JSON file.
    Fixed(Arc<Catalog>),
    /// Read from the product table on every request.
    Products,
}

#[derive(Clone)]
pub struct ApiState {
    pub orders: Arc<dyn OrderRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub catalog: CatalogSource,
    pub engine: Arc<DeterministicPricingEngine>,
    pub relay: Option<Arc<OrderRelayClient>>,
}

impl ApiState {
    async fn catalog(&self) -> Result<Arc<Catalog>, RepositoryError> {
        match &self.catalog {
            CatalogSource::Fixed(catalog) => Ok(Arc::clone(catalog)),
            CatalogSource::Products => Ok(Arc::new(Catalog::new(self.products.list_all().await?))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<SubmissionViolation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

fn api_error(
    status: StatusCode,
    message: impl Into<String>,
    correlation_id: &str,
) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: message.into(),
            correlation_id: Some(correlation_id.to_string()),
            violations: Vec::new(),
            detail: None,
        }),
    )
}

fn interface_error(error: InterfaceError) -> (StatusCode, Json<ApiError>) {
    let (status, message, correlation_id) = match &error {
        InterfaceError::BadRequest { message, correlation_id } => {
            (StatusCode::BAD_REQUEST, message.clone(), correlation_id)
        }
        InterfaceError::NotFound { message, correlation_id } => {
            (StatusCode::NOT_FOUND, message.clone(), correlation_id)
        }
        InterfaceError::ServiceUnavailable { correlation_id, .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, error.user_message().to_string(), correlation_id)
        }
        InterfaceError::Internal { correlation_id, .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, error.user_message().to_string(), correlation_id)
        }
    };
    api_error(status, message, correlation_id)
}

fn repository_error(error: RepositoryError, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    error!(
        event_name = "api.repository.error",
        correlation_id = %correlation_id,
        error = %error,
        "repository call failed"
    );
    interface_error(ApplicationError::Persistence(error.to_string()).into_interface(correlation_id))
}

fn order_not_found(id: &OrderId, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    interface_error(
        ApplicationError::NotFound(format!("order {id} does not exist")).into_interface(correlation_id),
    )
}

fn new_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/catalog", get(list_catalog))
        .route("/api/v1/orders/price", post(price_order))
        .route("/api/v1/orders/stats", get(order_statistics))
        .route("/api/v1/orders", get(list_orders).post(create_order))
        .route("/api/v1/orders/{id}", get(get_order).delete(delete_order))
        .route("/api/v1/orders/{id}/forward", post(forward_order))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub product: Product,
    pub has_tiered_pricing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_category: Option<CategoryKey>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tiers: Vec<PriceTier>,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub products: Vec<CatalogEntry>,
}

pub async fn list_catalog(State(state): State<ApiState>) -> ApiResult<Json<CatalogResponse>> {
    let correlation_id = new_correlation_id();
    let catalog = state.catalog().await.map_err(|e| repository_error(e, &correlation_id))?;
    let resolver = state.engine.resolver();

    let products = catalog
        .products()
        .iter()
        .map(|product| {
            let resolved = resolver.resolve_product(product);
            CatalogEntry {
                product: product.clone(),
                has_tiered_pricing: resolved.is_some(),
                tier_category: resolved.map(|tier| tier.category.clone()),
                tiers: resolved.map(|tier| tier.table.tiers().to_vec()).unwrap_or_default(),
            }
        })
        .collect();

    Ok(Json(CatalogResponse { products }))
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PriceRequest {
    #[serde(default)]
    pub selection: Selection,
}

pub async fn price_order(
    State(state): State<ApiState>,
    Json(body): Json<PriceRequest>,
) -> ApiResult<Json<PricedOrder>> {
    let correlation_id = new_correlation_id();
    let catalog = state.catalog().await.map_err(|e| repository_error(e, &correlation_id))?;
    let priced = state.engine.price(&catalog, &body.selection);

    info!(
        event_name = "order.priced",
        correlation_id = %correlation_id,
        lines = priced.lines.len(),
        total = %priced.totals.total,
        "order priced"
    );
    Ok(Json(priced))
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer: CustomerDetails,
    pub zone: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub selection: Selection,
}

pub async fn create_order(
    State(state): State<ApiState>,
    Json(body): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let correlation_id = new_correlation_id();
    let catalog = state.catalog().await.map_err(|e| repository_error(e, &correlation_id))?;
    let priced = state.engine.price(&catalog, &body.selection);
    let customer = body.customer.normalized();
    let zone = body.zone.trim().to_string();

    if let Err(blocked) = validate_submission(&priced, &customer, &zone) {
        warn!(
            event_name = "order.submission_blocked",
            correlation_id = %correlation_id,
            violations = blocked.violations.len(),
            "order submission blocked"
        );
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError {
                error: blocked.to_string(),
                correlation_id: Some(correlation_id),
                violations: blocked.violations,
                detail: None,
            }),
        ));
    }

    let now = Utc::now();
    let mut order = Order {
        id: OrderId::generate(now),
        status: OrderStatus::Draft,
        customer,
        zone,
        notes: body.notes.map(|notes| notes.trim().to_string()).filter(|notes| !notes.is_empty()),
        lines: priced.lines,
        totals: priced.totals,
        created_at: now,
        forwarding: None,
    };
    order.transition_to(OrderStatus::Submitted).map_err(|e| {
        interface_error(ApplicationError::from(e).into_interface(correlation_id.as_str()))
    })?;

    state.orders.save(order.clone()).await.map_err(|e| repository_error(e, &correlation_id))?;
    info!(
        event_name = "order.created",
        correlation_id = %correlation_id,
        order_id = %order.id,
        total = %order.totals.total,
        "order created"
    );

    Ok((StatusCode::CREATED, Json(order)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub limit: Option<u32>,
}

pub async fn list_orders(
    State(state): State<ApiState>,
    Query(query): Query<ListOrdersQuery>,
) -> ApiResult<Json<Vec<Order>>> {
    let correlation_id = new_correlation_id();
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let orders =
        state.orders.list_recent(limit).await.map_err(|e| repository_error(e, &correlation_id))?;
    Ok(Json(orders))
}

pub async fn get_order(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<Order>> {
    let correlation_id = new_correlation_id();
    let id = OrderId(id);
    match state.orders.find_by_id(&id).await.map_err(|e| repository_error(e, &correlation_id))? {
        Some(order) => Ok(Json(order)),
        None => Err(order_not_found(&id, &correlation_id)),
    }
}

pub async fn delete_order(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<StatusCode> {
    let correlation_id = new_correlation_id();
    let id = OrderId(id);
    let removed =
        state.orders.delete(&id).await.map_err(|e| repository_error(e, &correlation_id))?;
    if !removed {
        return Err(order_not_found(&id, &correlation_id));
    }

    info!(
        event_name = "order.deleted",
        correlation_id = %correlation_id,
        order_id = %id,
        "order deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

pub async fn order_statistics(State(state): State<ApiState>) -> ApiResult<Json<OrderStatistics>> {
    let correlation_id = new_correlation_id();
    let stats = state
        .orders
        .statistics(Utc::now())
        .await
        .map_err(|e| repository_error(e, &correlation_id))?;
    Ok(Json(stats))
}

// ---------------------------------------------------------------------------
// Forwarding
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ForwardResponse {
    pub order: Order,
    pub with_warnings: bool,
}

pub async fn forward_order(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<ForwardResponse>> {
    let correlation_id = new_correlation_id();
    let Some(relay) = state.relay.clone() else {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            RelayError::Disabled.to_string(),
            &correlation_id,
        ));
    };

    let id = OrderId(id);
    let Some(mut order) =
        state.orders.find_by_id(&id).await.map_err(|e| repository_error(e, &correlation_id))?
    else {
        return Err(order_not_found(&id, &correlation_id));
    };

    if !order.can_transition_to(OrderStatus::Forwarded) {
        return Err(api_error(
            StatusCode::CONFLICT,
            format!("order {id} cannot be forwarded from status {}", order.status.as_str()),
            &correlation_id,
        ));
    }

    match relay.forward(&order).await {
        Ok(outcome) => {
            let with_warnings = outcome.has_warnings();
            record_acceptance(state.orders.as_ref(), &mut order, outcome, &correlation_id)
                .await?;
            Ok(Json(ForwardResponse { order, with_warnings }))
        }
        Err(relay_error) => {
            error!(
                event_name = "order.forward_failed",
                correlation_id = %correlation_id,
                order_id = %order.id,
                error = %relay_error,
                "order forwarding failed"
            );
            order.transition_to(OrderStatus::ForwardFailed).map_err(|e| {
                interface_error(ApplicationError::from(e).into_interface(correlation_id.as_str()))
            })?;
            state.orders.save(order).await.map_err(|e| repository_error(e, &correlation_id))?;

            Err((
                StatusCode::BAD_GATEWAY,
                Json(ApiError {
                    error: relay_error.to_string(),
                    correlation_id: Some(correlation_id),
                    violations: Vec::new(),
                    detail: relay_error.detail(),
                }),
            ))
        }
    }
}

/// The order already exists upstream once the relay accepts it, so a failed
/// local write is logged with the external code for manual reconciliation.
async fn record_acceptance(
    orders: &dyn OrderRepository,
    order: &mut Order,
    outcome: RelayOutcome,
    correlation_id: &str,
) -> ApiResult<()> {
    let receipt = outcome.into_receipt();
    let external_code = receipt.external_code.clone();

    let recorded = match order.record_forwarding(receipt) {
        Ok(()) => orders.save(order.clone()).await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    if let Err(reason) = recorded {
        error!(
            event_name = "order.forward_unrecorded",
            correlation_id = %correlation_id,
            order_id = %order.id,
            external_code = %external_code,
            error = %reason,
            "relay accepted the order but it could not be recorded locally"
        );
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "order {} was accepted upstream as {external_code} but could not be recorded",
                order.id
            ),
            correlation_id,
        ));
    }
    Ok(())
}
