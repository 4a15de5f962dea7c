use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::orders::OrderWithItems,
    error::AppResult,
    middleware::auth::AuthUser,
    models::Order,
    response::{ApiResponse, Meta},
    services::{checkout_service, order_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout))
        .route("/{id}", get(get_order))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    responses(
        (status = 201, description = "Cart checked out into a new order", body = ApiResponse<Order>),
        (status = 400, description = "Shopping cart is empty"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "User or profile not found"),
        (status = 500, description = "Order could not be persisted")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<(StatusCode, Json<ApiResponse<Order>>)> {
    let order = checkout_service::checkout(&state, &user).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Checkout success", order, Some(Meta::empty()))),
    ))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order with its line items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}
