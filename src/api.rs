//! HTTP surface for the storefront and admin back-office.
//!
//! Thin glue: handlers parse and validate input, call into the workflow or
//! the store facade, and map errors onto the `{error, details?}` JSON shape.
//! Anything that fails before a sale header is committed becomes a 4xx/5xx;
//! post-commit partial failures never change a success response.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query as QueryParams, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use validator::Validate;

use crate::models::{
    Category, CategoryInput, Product, ProductInput, ProductPatch, Sale, StockMovement,
};
use crate::reports::{DailyReport, MonthlyReport, ReportEngine};
use crate::sales::{RecordSaleRequest, SaleError, SaleRecorder};
use crate::store::query::{Filter, Query};
use crate::store::{ItemStore, Page, StoreError};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ItemStore>,
    pub sales: SaleRecorder,
    pub reports: ReportEngine,
}

impl AppState {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self {
            sales: SaleRecorder::new(store.clone()),
            reports: ReportEngine::new(store.clone()),
            store,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/products", get(list_products).post(create_product))
        .route("/api/v1/products/:id", get(get_product).put(update_product))
        .route("/api/v1/categories", get(list_categories).post(create_category))
        .route("/api/v1/categories/:id", get(get_category))
        .route("/api/v1/sales", get(list_sales).post(create_sale))
        .route("/api/v1/sales/:id", get(get_sale))
        .route("/api/v1/reports/daily", get(daily_report))
        .route("/api/v1/reports/monthly", get(monthly_report))
        .route("/api/v1/stock-movements", get(list_stock_movements))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// =============================================================================
// Error mapping
// =============================================================================

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    details: Option<Value>,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            details: None,
        }
    }

    fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    fn not_found(error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "error": self.error });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

// Malformed bodies get the same `{error}` shape as every other failure
// instead of axum's plain-text rejection.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, err.to_string())
    }
}

impl From<SaleError> for ApiError {
    fn from(err: SaleError) -> Self {
        match err {
            SaleError::ProductNotFound(_)
            | SaleError::InsufficientStock { .. }
            | SaleError::InvalidQuantity { .. } => Self::bad_request(err.to_string()),
            SaleError::Store(store) => store.into(),
        }
    }
}

// =============================================================================
// Health
// =============================================================================

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "atelier-commerce" }))
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Deserialize)]
struct ProductListParams {
    slug: Option<String>,
    category: Option<String>,
    active: Option<bool>,
    limit: Option<u32>,
    offset: Option<u32>,
}

async fn list_products(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ProductListParams>,
) -> Result<Json<Page<Product>>, ApiError> {
    let mut filter = Filter::new();
    if let Some(slug) = &params.slug {
        filter = filter.eq("slug", slug.as_str());
    }
    if let Some(category) = &params.category {
        filter = filter.eq("category", category.as_str());
    }
    if let Some(active) = params.active {
        filter = filter.eq("is_active", active);
    }
    let mut query = Query::new()
        .filter(filter)
        .sort(&["-date_created"])
        .with_total();
    if let Some(limit) = params.limit {
        query = query.limit(limit.min(100));
    }
    if let Some(offset) = params.offset {
        query = query.offset(offset);
    }
    Ok(Json(state.store.list_products(query).await?))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    state
        .store
        .find_product(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Product not found"))
}

async fn create_product(
    State(state): State<AppState>,
    body: Result<Json<ProductInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let Json(input) = body?;
    let product = state.store.create_product(&input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ProductPatch>, JsonRejection>,
) -> Result<Json<Product>, ApiError> {
    let Json(patch) = body?;
    match state.store.update_product(&id, &patch).await {
        Ok(product) => Ok(Json(product)),
        Err(StoreError::Backend { status: 404, .. }) => {
            Err(ApiError::not_found("Product not found"))
        }
        Err(err) => Err(err.into()),
    }
}

async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.store.list_categories().await?))
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Category>, ApiError> {
    state
        .store
        .find_category(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Category not found"))
}

async fn create_category(
    State(state): State<AppState>,
    body: Result<Json<CategoryInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let Json(input) = body?;
    let category = state.store.create_category(&input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

// =============================================================================
// Sales
// =============================================================================

#[derive(Debug, Serialize)]
struct SaleResponse {
    success: bool,
    sale: Sale,
}

async fn create_sale(
    State(state): State<AppState>,
    body: Result<Json<RecordSaleRequest>, JsonRejection>,
) -> Result<Json<SaleResponse>, ApiError> {
    let Json(request) = body?;
    request.validate().map_err(|errors| {
        ApiError::bad_request("invalid sale request")
            .with_details(serde_json::to_value(&errors).unwrap_or(Value::Null))
    })?;
    let sale = state.sales.record(&request).await?;
    Ok(Json(SaleResponse {
        success: true,
        sale,
    }))
}

#[derive(Debug, Deserialize)]
struct SaleListParams {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    limit: Option<u32>,
    offset: Option<u32>,
}

async fn list_sales(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<SaleListParams>,
) -> Result<Json<Page<Sale>>, ApiError> {
    let mut filter = Filter::new();
    if let Some(from) = params.from {
        filter = filter.gte("sale_date", format!("{from}T00:00:00"));
    }
    if let Some(to) = params.to {
        filter = filter.lte("sale_date", format!("{to}T23:59:59"));
    }
    let mut query = Query::new()
        .filter(filter)
        .sort(&["-sale_date", "-date_created"])
        .with_total();
    if let Some(limit) = params.limit {
        query = query.limit(limit.min(100));
    }
    if let Some(offset) = params.offset {
        query = query.offset(offset);
    }
    Ok(Json(state.store.list_sales(query).await?))
}

async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Sale>, ApiError> {
    state
        .store
        .find_sale(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Sale not found"))
}

// =============================================================================
// Reports
// =============================================================================

#[derive(Debug, Deserialize)]
struct DailyParams {
    date: NaiveDate,
}

async fn daily_report(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<DailyParams>,
) -> Json<DailyReport> {
    Json(state.reports.daily(params.date).await)
}

#[derive(Debug, Deserialize)]
struct MonthlyParams {
    year: i32,
    month: u32,
}

async fn monthly_report(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<MonthlyParams>,
) -> Result<Json<MonthlyReport>, ApiError> {
    if !(1..=12).contains(&params.month) {
        return Err(ApiError::bad_request("month must be between 1 and 12"));
    }
    Ok(Json(state.reports.monthly(params.year, params.month).await))
}

// =============================================================================
// Stock movements
// =============================================================================

#[derive(Debug, Deserialize)]
struct MovementParams {
    product: Option<String>,
}

async fn list_stock_movements(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<MovementParams>,
) -> Result<Json<Vec<StockMovement>>, ApiError> {
    Ok(Json(
        state
            .store
            .list_stock_movements(params.product.as_deref())
            .await?,
    ))
}
