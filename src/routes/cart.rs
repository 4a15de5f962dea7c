use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::{
    dto::cart::UpdateQuantityRequest,
    error::AppResult,
    middleware::auth::AuthUser,
    models::Cart,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route(
            "/products/{product_id}",
            post(add_product).put(update_quantity).delete(remove_product),
        )
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart of the current user", body = ApiResponse<Cart>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp = cart_service::view_cart(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/products/{product_id}",
    params(
        ("product_id" = i32, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product added, or its quantity increased by one", body = ApiResponse<Cart>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<i32>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp = cart_service::add_to_cart(&state, &user, product_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/cart/products/{product_id}",
    params(
        ("product_id" = i32, Path, description = "Product ID")
    ),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Quantity replaced; zero removes the product", body = ApiResponse<Cart>),
        (status = 400, description = "Negative quantity"),
        (status = 404, description = "Product is not in the cart")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_quantity(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<i32>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp = cart_service::set_quantity(&state, &user, product_id, payload.quantity).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/products/{product_id}",
    params(
        ("product_id" = i32, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product removed from the cart", body = ApiResponse<Cart>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<i32>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp = cart_service::remove_from_cart(&state, &user, product_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart emptied", body = ApiResponse<Cart>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp = cart_service::empty_cart(&state, &user).await?;
    Ok(Json(resp))
}
