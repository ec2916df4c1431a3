//! Order REST API Routes

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use orderinfo_core::Order;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::services::OrderReadService;
use crate::state::AppState;

/// GET /orders/{id} - Get one order aggregate
pub async fn get_order(
    State(orders): State<OrderReadService>,
    Path(id): Path<String>,
) -> ApiResult<Json<Arc<Order>>> {
    let order = orders.get_order(&id).await?;
    Ok(Json(order))
}

/// GET /orders/ - Lookup without an identifier
pub async fn missing_order_id() -> ApiError {
    ApiError::missing_field("order_uid")
}

/// Create the order routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(missing_order_id))
        .route("/orders/", get(missing_order_id))
        .route("/orders/:id", get(get_order))
}
