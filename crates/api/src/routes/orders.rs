//! Order creation and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::OrderId;
use domain::{Money, Order, OrderItem, OrderStatus, PaymentMethod, ShippingInfo};
use order_store::OrderStore;
use serde::{Deserialize, Serialize};
use workflow::ExecutionStore;

use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    /// Generated when missing.
    pub id: Option<String>,
    pub customer_email: String,
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub currency: Option<String>,
    #[serde(default)]
    pub shipping: ShippingInfo,
    #[serde(default)]
    pub notes: String,
    /// Start fulfillment right after creation.
    #[serde(default = "default_process")]
    pub process: bool,
}

fn default_process() -> bool {
    true
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub product_name: String,
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: String,
    pub status: OrderStatus,
    pub total_cents: i64,
    /// Set when fulfillment was started.
    pub execution_id: Option<String>,
}

// -- Handlers --

/// POST /orders: store a new order and, unless `process` is false,
/// start its fulfillment workflow.
#[tracing::instrument(skip(state, req))]
pub async fn create<S, E>(
    State(state): State<Arc<AppState<S, E>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError>
where
    S: OrderStore + 'static,
    E: ExecutionStore + 'static,
{
    let id = req
        .id
        .map(OrderId::from)
        .filter(|id| !id.is_blank())
        .unwrap_or_else(OrderId::generate);

    let items = req
        .items
        .into_iter()
        .map(|item| {
            let line = OrderItem::new(
                item.product_id,
                item.product_name,
                item.quantity,
                Money::from_cents(item.unit_price_cents),
            );
            match item.sku {
                Some(sku) => line.with_sku(sku),
                None => line,
            }
        })
        .collect();

    let mut order = Order::new(id.clone(), req.customer_email, items)
        .with_payment_method(req.payment_method)
        .with_shipping(req.shipping);
    order.notes = req.notes;
    if let Some(currency) = req.currency {
        order.currency = currency;
    }
    order.validate()?;

    let response = OrderCreatedResponse {
        order_id: id.to_string(),
        status: order.status,
        total_cents: order.total.cents(),
        execution_id: None,
    };
    state.orders.insert_order(order).await?;
    metrics::counter!("orders_created_total").increment(1);
    tracing::info!(order_id = %id, "order created");

    let execution_id = if req.process {
        match state.supervisor.start_workflow(id.clone()).await {
            Ok(ack) => Some(ack.execution_id.to_string()),
            Err(err) => {
                tracing::warn!(order_id = %id, error = %err, "could not start fulfillment");
                None
            }
        }
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            execution_id,
            ..response
        }),
    ))
}

/// GET /orders/{id}: load an order record.
#[tracing::instrument(skip(state))]
pub async fn get<S, E>(
    State(state): State<Arc<AppState<S, E>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError>
where
    S: OrderStore + 'static,
    E: ExecutionStore + 'static,
{
    let order = state.orders.get_order(&OrderId::new(id)).await?;
    Ok(Json(order))
}
