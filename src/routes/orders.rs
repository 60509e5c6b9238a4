use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::orders::{ConfirmRequest, OrderDetail, OrderList, PreviewRequest},
    error::AppResult,
    middleware::auth::{AuthUser, ensure_customer},
    preview::PreviewRecord,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::{order_service, preview_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/preview", post(preview_order))
        .route("/confirm", post(confirm_order))
        .route("/{id}", get(get_order))
}

#[utoipa::path(
    post,
    path = "/api/orders/preview",
    request_body = PreviewRequest,
    responses(
        (status = 201, description = "Priced preview, valid until its token expires", body = ApiResponse<PreviewRecord>),
        (status = 400, description = "Empty order, bad quantity or unavailable product")
    ),
    tag = "Orders"
)]
pub async fn preview_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PreviewRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<PreviewRecord>>)> {
    let customer = ensure_customer(&user)?;
    let resp = preview_service::create_preview(&state, &customer, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/orders/confirm",
    request_body = ConfirmRequest,
    responses(
        (status = 201, description = "Order created from the preview", body = ApiResponse<OrderDetail>),
        (status = 403, description = "Preview belongs to another customer"),
        (status = 404, description = "Unknown, expired or already used preview token"),
        (status = 409, description = "Prices or offers changed since the preview"),
        (status = 500, description = "Order could not be persisted")
    ),
    tag = "Orders"
)]
pub async fn confirm_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ConfirmRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<OrderDetail>>)> {
    let customer = ensure_customer(&user)?;
    let resp = order_service::confirm(&state, &customer, payload.preview_token.trim()).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders of the authenticated customer", body = ApiResponse<OrderList>)
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let customer = ensure_customer(&user)?;
    let resp = order_service::list_orders(&state, &customer, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with items and bonuses", body = ApiResponse<OrderDetail>),
        (status = 404, description = "No such order for this customer")
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let customer = ensure_customer(&user)?;
    let resp = order_service::get_order(&state, &customer, id).await?;
    Ok(Json(resp))
}
